//! Error types for the dhkeeper core library

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown DH group '{0}'")]
    UnknownGroup(String),

    #[error("Parameter encoding error: {0}")]
    Encoding(String),
}
