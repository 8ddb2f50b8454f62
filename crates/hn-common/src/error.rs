//! Error types shared across hn-pulse crates

use thiserror::Error;

/// Result type alias for hn-pulse operations
pub type Result<T> = std::result::Result<T, HnError>;

/// Main error type for hn-pulse
#[derive(Error, Debug)]
pub enum HnError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },
}

impl HnError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Read a required environment variable, treating empty values as missing.
pub fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(HnError::MissingEnv(name.to_string())),
    }
}

/// Read and parse an optional environment variable, falling back to `default`.
///
/// Unlike a silent `unwrap_or`, a present but unparsable value is an error so
/// that typos in deployment configuration surface at startup.
pub fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|_| HnError::InvalidEnv {
                name: name.to_string(),
                value,
            })
        },
        _ => Ok(default),
    }
}
