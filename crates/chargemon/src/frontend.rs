//! Seam between the decision core and whatever draws pixels.
//!
//! Icon shapes, surfaces, textures, and input-device polling all live
//! behind this trait, out of tree. The core hands a [`Frame`] over and gets
//! discrete events back; the shipped binary uses [`HeadlessFrontend`],
//! which draws nothing and never reports input.

use crate::state::{Frame, InputEvent};

pub const DEFAULT_SCREEN_W: u32 = 540;
pub const DEFAULT_SCREEN_H: u32 = 960;

/// A rendering/input front end for the indicator.
pub trait Frontend {
    /// Screen size in pixels; bounds the anti-burn-in walk.
    fn dimensions(&self) -> (u32, u32);

    /// Drain pending input events, oldest first.
    fn poll(&mut self) -> Vec<InputEvent>;

    /// Show one frame. Called only while the display is on.
    fn present(&mut self, frame: &Frame);
}

/// Frontend that renders to the log and nothing else.
pub struct HeadlessFrontend {
    width: u32,
    height: u32,
}

impl HeadlessFrontend {
    pub fn new() -> Self {
        Self {
            width: DEFAULT_SCREEN_W,
            height: DEFAULT_SCREEN_H,
        }
    }
}

impl Default for HeadlessFrontend {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontend for HeadlessFrontend {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn poll(&mut self) -> Vec<InputEvent> {
        Vec::new()
    }

    fn present(&mut self, frame: &Frame) {
        tracing::trace!(
            "frame: {}%{}{}",
            frame.percent,
            if frame.charging { ", charging" } else { "" },
            if frame.icon_visible { "" } else { ", icon hidden" },
        );
    }
}
