//! Error types for the risk analysis engine

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the risk analysis engine.
///
/// Endpoint absence is not an error anywhere in the pipeline; a wallet
/// or resource the provider does not know stays `None`.
#[derive(Error, Debug)]
pub enum Error {
    // Data provider errors
    #[error("Provider error: {0}")]
    Provider(String),

    // Analysis errors
    #[error("No analyzable flows: every transaction was intermediary-only")]
    NoAnalyzableFlows,

    // Cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Provider(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
