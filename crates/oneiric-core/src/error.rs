//! Error types for oneiric-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    /// A key-value backend refused a read or write.
    #[error("store error for {key}: {message}")]
    Store { key: String, message: String },

    #[error("dream not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
