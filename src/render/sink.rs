use crate::color::Rgb;
use anyhow::{bail, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Hardware sink for an addressable strip.
///
/// Mirrors the WS281x driver surface: per-pixel color, one global
/// brightness, and `show()` to latch the staged frame. Implementations must
/// not block indefinitely; the API layer bounds every call with a timeout.
pub trait PixelSink: Send + Sync {
    /// Number of pixels on the strip
    fn num_pixels(&self) -> usize;

    /// Stage a color for one pixel
    fn set_pixel_color(&mut self, index: usize, color: Rgb) -> Result<()>;

    /// Set the global brightness applied on the next `show()`
    fn set_brightness(&mut self, level: u8) -> Result<()>;

    /// Latch staged colors to the strip
    fn show(&mut self) -> Result<()>;
}

/// Hardware call as recorded by `MemorySink`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkCall {
    SetPixelColor { index: usize, color: Rgb },
    SetBrightness(u8),
    Show,
}

#[derive(Debug, Default)]
struct Frame {
    staged: Vec<Rgb>,
    shown: Vec<Rgb>,
    brightness: u8,
    show_count: usize,
    calls: Vec<SinkCall>,
}

/// In-memory strip
///
/// Used as the virtual strip when no physical driver is attached, and as a
/// test double. Clones share the same frame, so a handle kept outside the
/// renderer can inspect what was shown.
#[derive(Clone, Debug)]
pub struct MemorySink {
    len: usize,
    frame: Arc<Mutex<Frame>>,
}

impl MemorySink {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            frame: Arc::new(Mutex::new(Frame {
                staged: vec![Rgb::OFF; len],
                shown: vec![Rgb::OFF; len],
                ..Default::default()
            })),
        }
    }

    fn frame(&self) -> MutexGuard<'_, Frame> {
        self.frame.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Colors latched by the last `show()`
    pub fn shown(&self) -> Vec<Rgb> {
        self.frame().shown.clone()
    }

    /// Global brightness latched by the last `show()`
    pub fn brightness(&self) -> u8 {
        self.frame().brightness
    }

    pub fn show_count(&self) -> usize {
        self.frame().show_count
    }

    /// Every call received since creation or the last `clear_calls()`
    pub fn calls(&self) -> Vec<SinkCall> {
        self.frame().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.frame().calls.clear();
    }
}

impl PixelSink for MemorySink {
    fn num_pixels(&self) -> usize {
        self.len
    }

    fn set_pixel_color(&mut self, index: usize, color: Rgb) -> Result<()> {
        let mut frame = self.frame();
        let Some(slot) = frame.staged.get_mut(index) else {
            bail!("pixel index {} out of range (strip has {})", index, self.len);
        };
        *slot = color;
        frame.calls.push(SinkCall::SetPixelColor { index, color });
        Ok(())
    }

    fn set_brightness(&mut self, level: u8) -> Result<()> {
        let mut frame = self.frame();
        frame.brightness = level;
        frame.calls.push(SinkCall::SetBrightness(level));
        Ok(())
    }

    fn show(&mut self) -> Result<()> {
        let mut frame = self.frame();
        frame.shown = frame.staged.clone();
        frame.show_count += 1;
        frame.calls.push(SinkCall::Show);
        trace!(show_count = frame.show_count, "Memory strip shown");
        Ok(())
    }
}
