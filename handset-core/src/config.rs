//! Shell configuration, loaded from `handset.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{HandsetError, HandsetResult};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "HANDSET_CONFIG";

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "handset.toml";

/// Largest accepted Snake grid side, in cells.
pub const MAX_GRID_SIDE: i32 = 1024;

/// Script resources of the bytecode runtime, in load order.
///
/// Decompression and byte-stream support must come before the interpreter
/// core; auxiliary subsystems come last.
pub const DEFAULT_RUNTIME_MODULES: &[&str] = &[
    "zip/zip.js",
    "zip/inflate.js",
    "zip/zip-ext.js",
    "js2me.js",
    "bufferStream.js",
    "convert.js",
    "classes.js",
    "emulator.js",
    "execute.js",
    "events.js",
    "manifest.js",
    "methodStub.js",
    "launcher.js",
    "loader.js",
    "numbers.js",
    "resources.js",
    "threads.js",
    "workers.js",
    "utils.js",
];

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HandsetConfig {
    /// Where the catalog and save data live. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
    pub runtime: RuntimeConfig,
    pub snake: SnakeConfig,
}

/// Runtime bootstrap and session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory holding the runtime's script resources.
    pub module_dir: PathBuf,
    /// Module resources relative to `module_dir`, in load order.
    pub modules: Vec<String>,
    /// Delay between a key press and its synthesized release (ms).
    pub key_release_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            module_dir: PathBuf::from("vendor/js2me"),
            modules: DEFAULT_RUNTIME_MODULES
                .iter()
                .map(|m| m.to_string())
                .collect(),
            key_release_ms: 100,
        }
    }
}

impl RuntimeConfig {
    pub fn key_release_delay(&self) -> Duration {
        Duration::from_millis(self.key_release_ms)
    }
}

/// Data-driven configuration for the built-in Snake game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnakeConfig {
    /// Grid width in cells.
    pub cols: i32,
    /// Grid height in cells.
    pub rows: i32,
    /// Size of one cell on the display (pixels).
    pub cell_size: i32,
    /// Tick interval (ms).
    pub tick_ms: u64,
    /// Points awarded per food eaten.
    pub food_score: u32,
    /// Starting cell of the single-segment body.
    pub origin: (i32, i32),
}

impl Default for SnakeConfig {
    fn default() -> Self {
        Self {
            cols: 22,
            rows: 26,
            cell_size: 8,
            tick_ms: 150,
            food_score: 10,
            origin: (10, 10),
        }
    }
}

impl SnakeConfig {
    /// Reject grids and timings the simulation cannot run with.
    pub fn validate(&self) -> HandsetResult<()> {
        let invalid = |msg: String| Err(HandsetError::InvalidConfig(msg));
        if !(1..=MAX_GRID_SIDE).contains(&self.cols) || !(1..=MAX_GRID_SIDE).contains(&self.rows) {
            return invalid(format!(
                "snake grid {}x{} outside 1..={}",
                self.cols, self.rows, MAX_GRID_SIDE
            ));
        }
        if self.cell_size < 1 {
            return invalid(format!("snake cell_size {} must be at least 1", self.cell_size));
        }
        if self.tick_ms == 0 {
            return invalid("snake tick_ms must be at least 1".to_string());
        }
        let (x, y) = self.origin;
        if !(0..self.cols).contains(&x) || !(0..self.rows).contains(&y) {
            return invalid(format!(
                "snake origin ({}, {}) outside the {}x{} grid",
                x, y, self.cols, self.rows
            ));
        }
        Ok(())
    }
}

impl HandsetConfig {
    /// Load config from environment or TOML file, falling back to defaults.
    ///
    /// A file that exists but fails to read, parse or validate is skipped
    /// with a warning.
    pub fn load() -> Self {
        let mut candidates = Vec::new();
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            candidates.push(PathBuf::from(path));
        }
        candidates.push(PathBuf::from(CONFIG_FILE));

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::from_path(path) {
                Ok(config) => return config,
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring config file"),
            }
        }
        Self::default()
    }

    /// Load config from a specific file, surfacing I/O, parse and
    /// validation errors.
    pub fn from_path(path: &Path) -> HandsetResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str::<Self>(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> HandsetResult<()> {
        self.snake.validate()
    }

    /// Resolve the data directory: configured, else the platform default.
    pub fn resolved_data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(default_data_dir)
    }
}

/// Platform data directory (e.g. `~/.local/share/handset`).
pub fn default_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "handset", "handset")
        .map(|dirs| dirs.data_dir().to_path_buf())
}
