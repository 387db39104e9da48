//! Error types for the dhkeeper daemon

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for daemon operations
pub type Result<T> = std::result::Result<T, DaemonError>;

/// Errors that can occur in the daemon
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] dhkeeper_core::CoreError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Temporary parameters file could not be created. Unrecoverable:
    /// the environment is broken and the daemon must not limp along
    /// with stale TLS parameters.
    #[error("Can't create temporary parameters file {path:?}: {source}")]
    TempFileCreate { path: PathBuf, source: io::Error },

    /// Worker could not flush the parameters it wrote. Unrecoverable in
    /// the worker: the data may not have reached the file.
    #[error("flush({path:?}) failed: {source}")]
    Flush { path: PathBuf, source: io::Error },

    /// Worker could not publish the finished file. Unrecoverable in the
    /// worker.
    #[error("rename({from:?}, {to:?}) failed: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    /// Named acceleration engine does not exist
    #[error("Unknown crypto engine '{0}'")]
    UnknownEngine(String),

    /// Engine found but failed to initialize
    #[error("Crypto engine '{0}' initialization failed: {1}")]
    EngineInit(String, String),

    /// Engine initialized but could not become the default provider
    #[error("Crypto engine '{0}' activation failed: {1}")]
    EngineActivate(String, String),
}

impl From<serde_json::Error> for DaemonError {
    fn from(e: serde_json::Error) -> Self {
        DaemonError::Serialization(e.to_string())
    }
}
