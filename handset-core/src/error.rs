//! Error types for the handset core.

use thiserror::Error;

/// A failed runtime bootstrap attempt.
///
/// Cloneable so that every caller awaiting the same attempt observes it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("runtime module {module} failed to load: {reason}")]
pub struct BootstrapError {
    pub module: String,
    pub reason: String,
}

/// Errors that can occur while importing, cataloguing or running games.
#[derive(Error, Debug)]
pub enum HandsetError {
    #[error("Invalid or corrupt JAR archive: {0}")]
    InvalidArchive(String),

    #[error("Not a .jar file: {0}")]
    UnsupportedFile(String),

    #[error("Game id already in catalog: {0}")]
    DuplicateId(String),

    #[error("Imported game has no payload: {0}")]
    EmptyPayload(String),

    #[error("Built-in game cannot be modified: {0}")]
    BuiltinImmutable(String),

    #[error("Unknown game: {0}")]
    UnknownGame(String),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("Runtime not available on host after bootstrap")]
    RuntimeUnavailable,

    #[error("Boot failed: {0}")]
    Boot(String),

    #[error("No saved state")]
    NoSavedState,

    #[error("Saved state unusable: {0}")]
    CorruptSave(String),

    #[error("Game does not support save states: {0}")]
    SaveUnsupported(String),

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for handset operations.
pub type HandsetResult<T> = Result<T, HandsetError>;
