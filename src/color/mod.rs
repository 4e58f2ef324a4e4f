// Color values and brightness scales

mod validation;

pub use validation::{
    denormalize_brightness, normalize_brightness, validate, validate_raw,
    MAX_NORMALIZED_BRIGHTNESS,
};

use serde::{Deserialize, Serialize};

/// Raw 8-bit RGB color as sent to the strip
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Scale every channel by a raw 0-255 brightness level.
    pub fn scaled(self, brightness: u8) -> Self {
        let scale = |channel: u8| (u16::from(channel) * u16::from(brightness) / 255) as u8;
        Self {
            red: scale(self.red),
            green: scale(self.green),
            blue: scale(self.blue),
        }
    }
}
