//! Error handling module for the gatekeeper

use thiserror::Error;
use tokio::time::error::Elapsed;

/// Custom error type for the gatekeeper
///
/// Gate rejections are not errors; they travel as [`crate::models::Decision`] values.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("HTTP message error: {0}")]
    HttpMessage(#[from] hyper::http::Error),

    #[error("Invalid URI: {0}")]
    InvalidUri(#[from] hyper::http::uri::InvalidUri),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audit log error: {0}")]
    Audit(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Timeout error: {0}")]
    Timeout(#[from] Elapsed),
}

/// Result type for the gatekeeper
pub type Result<T> = std::result::Result<T, Error>;
