//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "missing config file `{}`\nadd it to the site root with the following structure:\n{example}",
        .path.display()
    )]
    Missing { path: PathBuf, example: String },

    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config file parsing error in `{0}`")]
    Json(PathBuf, #[source] serde_json::Error),

    #[error("config file parsing error in `{0}`")]
    Toml(PathBuf, #[source] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}
