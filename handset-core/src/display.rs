//! Display payloads and the sink abstraction engines render into.
//!
//! Engines never draw. Each update they describe the screen as a
//! `DisplayFrame` and hand it to a `FrameSink`, which works identically for
//! testing (HeadlessSink) and real terminals.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// A filled rectangle on the display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub color: String,
}

/// Complete description of one displayed frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayFrame {
    pub background_color: String,
    pub pixels: Vec<PixelRect>,
    pub text: String,
    pub text_color: String,
    pub font: String,
    pub text_x: i32,
    pub text_y: i32,
}

/// Receiver of rendered frames.
pub trait FrameSink: Send + Sync {
    /// Present a frame. Called from the engine's tick task.
    fn present(&self, frame: &DisplayFrame);
}

/// Sink that discards every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&self, _frame: &DisplayFrame) {}
}

/// Headless sink for testing - captures every presented frame.
#[derive(Default)]
pub struct HeadlessSink {
    frames: Mutex<Vec<DisplayFrame>>,
}

impl HeadlessSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames presented so far.
    pub fn frame_count(&self) -> usize {
        self.frames.lock().map(|f| f.len()).unwrap_or(0)
    }

    /// Most recent frame, if any.
    pub fn last_frame(&self) -> Option<DisplayFrame> {
        self.frames.lock().ok()?.last().cloned()
    }

    /// Drain all captured frames.
    pub fn take_frames(&self) -> Vec<DisplayFrame> {
        self.frames
            .lock()
            .map(|mut f| std::mem::take(&mut *f))
            .unwrap_or_default()
    }
}

impl FrameSink for HeadlessSink {
    fn present(&self, frame: &DisplayFrame) {
        if let Ok(mut frames) = self.frames.lock() {
            frames.push(frame.clone());
        }
    }
}
