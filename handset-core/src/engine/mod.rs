//! Playable engines.
//!
//! Every catalog entry is played through the [`Engine`] trait. Built-in
//! games run their own tick loop in this crate; imported games are hosted by
//! the bytecode runtime through an [`EmulatorSession`].
//!
//! [`EmulatorSession`]: crate::session::EmulatorSession

mod hosted;
pub mod snake;

use async_trait::async_trait;

use crate::error::{HandsetError, HandsetResult};
use crate::input::Key;

pub use hosted::HostedEngine;
pub use snake::{SnakeEngine, SnakeGame};

/// Contract shared by built-in and runtime-hosted games.
///
/// Engines push frames to the `FrameSink` they were built with; the caller
/// only drives lifecycle and input.
#[async_trait]
pub trait Engine: Send {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Start (or boot) the game. Starting a running engine is a no-op.
    async fn start(&mut self) -> HandsetResult<()>;

    /// Stop the game. Safe to call repeatedly.
    fn stop(&mut self);

    /// Deliver one key tap.
    fn handle_input(&mut self, key: &Key);

    fn is_running(&self) -> bool;

    /// Whether `save_state`/`load_state` are available.
    fn supports_save(&self) -> bool {
        false
    }

    /// Snapshot the game to durable storage.
    fn save_state(&mut self) -> HandsetResult<()> {
        Err(HandsetError::SaveUnsupported(self.name().to_string()))
    }

    /// Restore the last snapshot and resume.
    fn load_state(&mut self) -> HandsetResult<()> {
        Err(HandsetError::SaveUnsupported(self.name().to_string()))
    }
}
