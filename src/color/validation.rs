use super::Rgb;
use crate::error::{LightError, LightResult};

/// Upper bound of the normalized (storage) brightness scale.
pub const MAX_NORMALIZED_BRIGHTNESS: u8 = 100;

const MAX_CHANNEL: i64 = 255;

/// Validates channel values and a normalized brightness.
///
/// Rules:
/// - red, green, blue: 0-255
/// - brightness: 0-100 (normalized scale, see `normalize_brightness`)
///
/// Every violating field is listed in the error reason.
pub fn validate(red: i64, green: i64, blue: i64, brightness: i64) -> LightResult<()> {
    let mut problems = channel_problems(red, green, blue);
    if !(0..=i64::from(MAX_NORMALIZED_BRIGHTNESS)).contains(&brightness) {
        problems.push(format!(
            "brightness must be between 0 and {} (got {})",
            MAX_NORMALIZED_BRIGHTNESS, brightness
        ));
    }
    into_result(problems)
}

/// Validates API input where brightness is on the raw 0-255 scale.
///
/// Returns the typed color and raw brightness on success.
pub fn validate_raw(red: i64, green: i64, blue: i64, brightness: i64) -> LightResult<(Rgb, u8)> {
    let mut problems = channel_problems(red, green, blue);
    if !(0..=MAX_CHANNEL).contains(&brightness) {
        problems.push(format!(
            "brightness must be between 0 and {} (got {})",
            MAX_CHANNEL, brightness
        ));
    }
    into_result(problems)?;

    Ok((
        Rgb::new(channel(red)?, channel(green)?, channel(blue)?),
        channel(brightness)?,
    ))
}

/// Converts raw 0-255 brightness to the 0-100 storage scale.
///
/// Equivalent to `floor(raw / 2.55)`, computed in integers.
pub fn normalize_brightness(raw: u8) -> u8 {
    let normalized = u16::from(raw) * u16::from(MAX_NORMALIZED_BRIGHTNESS) / 255;
    normalized.min(u16::from(MAX_NORMALIZED_BRIGHTNESS)) as u8
}

/// Smallest raw brightness that normalizes back to `normalized`.
pub fn denormalize_brightness(normalized: u8) -> u8 {
    let normalized = u16::from(normalized.min(MAX_NORMALIZED_BRIGHTNESS));
    ((normalized * 255 + 99) / 100) as u8
}

fn channel_problems(red: i64, green: i64, blue: i64) -> Vec<String> {
    [("red", red), ("green", green), ("blue", blue)]
        .into_iter()
        .filter(|(_, value)| !(0..=MAX_CHANNEL).contains(value))
        .map(|(name, value)| format!("{} must be between 0 and 255 (got {})", name, value))
        .collect()
}

fn into_result(problems: Vec<String>) -> LightResult<()> {
    if problems.is_empty() {
        Ok(())
    } else {
        Err(LightError::invalid_color(problems.join("; ")))
    }
}

fn channel(value: i64) -> LightResult<u8> {
    u8::try_from(value)
        .map_err(|_| LightError::invalid_color(format!("{} is not a valid channel value", value)))
}
