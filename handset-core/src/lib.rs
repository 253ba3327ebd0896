//! Handset game shell core
//!
//! This crate provides everything needed to run a small catalog of phone
//! games:
//! - Catalog of built-in and imported games, persisted in a `KvStore`
//! - JAR import: manifest/descriptor metadata, icon extraction
//! - Single-flight bootstrap of the shared bytecode runtime
//! - Per-game sessions that boot archives and turn key taps into
//!   press/release pairs
//! - The built-in Snake engine
//!
//! # Architecture
//!
//! - `KvStore` trait: document storage (memory or directory backed)
//! - `ModuleHost` / `Runtime` traits: boundary to the third-party runtime
//! - `Engine` trait: one contract for built-in and runtime-hosted games
//! - `FrameSink` trait: where built-in engines send their frames
//! - `SessionManager`: picks an engine by catalog origin and routes input

pub mod archive;
pub mod catalog;
pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod input;
pub mod manager;
pub mod runtime;
pub mod session;
pub mod storage;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use archive::{import_file, parse_archive};
pub use catalog::{BuiltinGame, GameCatalog, GameDescriptor, Icon, Origin};
pub use config::HandsetConfig;
pub use display::{DisplayFrame, FrameSink, HeadlessSink, NullSink, PixelRect};
pub use engine::{Engine, HostedEngine, SnakeEngine, SnakeGame};
pub use error::{BootstrapError, HandsetError, HandsetResult};
pub use input::Key;
pub use manager::SessionManager;
pub use runtime::{BootstrapStatus, ModuleHost, Runtime, RuntimeBootstrap, ScriptDirHost};
pub use session::{BootState, EmulatorSession};
pub use storage::{file_name_key, key_file_name, DirStore, KvStore, MemoryStore};
