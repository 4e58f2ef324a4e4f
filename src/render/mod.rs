// Pixel buffer reconciliation and hardware flush

mod sink;

pub use sink::{MemorySink, PixelSink, SinkCall};

use crate::color::Rgb;
use crate::error::{LightError, LightResult};
use crate::storage::LightStore;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, error, info};


/// What is driving one physical pixel; brightness on the raw 0-255 scale
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelState {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub brightness: u8,
}

impl PixelState {
    pub const OFF: PixelState = PixelState {
        red: 0,
        green: 0,
        blue: 0,
        brightness: 0,
    };

    pub fn new(color: Rgb, brightness: u8) -> Self {
        Self {
            red: color.red,
            green: color.green,
            blue: color.blue,
            brightness,
        }
    }

    pub fn color(&self) -> Rgb {
        Rgb::new(self.red, self.green, self.blue)
    }

    /// Color sent to the sink: channels pre-scaled by this pixel's brightness
    pub fn output(&self) -> Rgb {
        self.color().scaled(self.brightness)
    }
}

/// Pixel buffer renderer
///
/// Sole owner of the pixel array, the hardware sink and the `address`
/// table. Lifecycle: loaded once at startup from storage, then mutated only
/// through `render`/`render_ranges` while the controller holds its write
/// lock.
///
/// The sink only has a global brightness, so the renderer latches it at
/// full scale and pre-scales each pixel's color by that pixel's own
/// brightness. Ranges with different brightness render side by side.
pub struct Renderer {
    pixels: Vec<PixelState>,
    sink: Box<dyn PixelSink>,
    store: Arc<LightStore>,
}

impl Renderer {
    /// Build the buffer from persisted pixels; missing ones are off.
    pub fn load(store: Arc<LightStore>, sink: Box<dyn PixelSink>) -> LightResult<Self> {
        let strip_length = sink.num_pixels();
        let pixels = store.load_pixels(strip_length)?;

        info!(strip_length = strip_length, "Loaded pixel buffer");

        Ok(Self {
            pixels,
            sink,
            store,
        })
    }

    pub fn strip_length(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixels(&self) -> &[PixelState] {
        &self.pixels
    }

    /// Push the current buffer to the sink without changing it.
    pub fn restore(&mut self) -> LightResult<()> {
        self.flush()?;
        info!(strip_length = self.pixels.len(), "Strip restored from pixel buffer");
        Ok(())
    }

    /// Render one inclusive range; everything outside it keeps its state.
    pub fn render(
        &mut self,
        color: Rgb,
        brightness: u8,
        range_start: usize,
        range_end: usize,
        power_on: bool,
    ) -> LightResult<()> {
        self.render_ranges(color, brightness, &[range_start..=range_end], power_on)
    }

    /// Render several ranges in order, then flush and persist once.
    ///
    /// Overlapping pixels take the value of the last range listing them,
    /// which is the same buffer as rendering each range separately.
    /// All ranges are checked before the buffer changes.
    pub fn render_ranges(
        &mut self,
        color: Rgb,
        brightness: u8,
        ranges: &[RangeInclusive<usize>],
        power_on: bool,
    ) -> LightResult<()> {
        self.check_ranges(ranges)?;

        let next = if power_on {
            PixelState::new(color, brightness)
        } else {
            PixelState::OFF
        };

        for range in ranges {
            self.pixels[range.clone()].fill(next);
        }

        debug!(
            ranges = ranges.len(),
            red = next.red,
            green = next.green,
            blue = next.blue,
            brightness = next.brightness,
            "Pixel buffer merged"
        );

        // Persist even when the flush fails so the stored buffer keeps
        // matching the appended history.
        let flushed = self.flush();
        self.persist()?;
        flushed
    }

    /// Reject any range that is reversed or runs past the end of the strip.
    pub fn check_ranges(&self, ranges: &[RangeInclusive<usize>]) -> LightResult<()> {
        ranges.iter().try_for_each(|range| self.check_range(range))
    }

    fn check_range(&self, range: &RangeInclusive<usize>) -> LightResult<()> {
        if range.start() > range.end() {
            return Err(LightError::invalid_range(format!(
                "range start {} is greater than range end {}",
                range.start(),
                range.end()
            )));
        }
        if *range.end() >= self.pixels.len() {
            return Err(LightError::invalid_range(format!(
                "range {}-{} is outside the strip (0-{})",
                range.start(),
                range.end(),
                self.pixels.len().saturating_sub(1)
            )));
        }
        Ok(())
    }

    fn flush(&mut self) -> LightResult<()> {
        self.push_frame().map_err(|e| {
            error!(error = %e, "Strip flush failed");
            LightError::HardwareFault(format!("{:#}", e))
        })
    }

    fn push_frame(&mut self) -> anyhow::Result<()> {
        for (index, pixel) in self.pixels.iter().enumerate() {
            self.sink.set_pixel_color(index, pixel.output())?;
        }
        self.sink.set_brightness(u8::MAX)?;
        self.sink.show()
    }

    fn persist(&self) -> LightResult<()> {
        self.store.upsert_pixels(&self.pixels)?;
        Ok(())
    }
}
