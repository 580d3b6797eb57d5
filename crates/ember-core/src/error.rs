//! Error types for Ember

use thiserror::Error;

/// The main error type for Ember operations
#[derive(Debug, Error)]
pub enum EmberError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Generator shape mismatch: expected {expected} component(s), got {got}")]
    GeneratorShape { expected: usize, got: usize },

    #[error("Invalid keyframes: {0}")]
    InvalidKeyframes(String),

    #[error("Invalid sequence: {0}")]
    InvalidSequence(String),

    #[error("Simulation error in '{system}': {message}")]
    Simulation { system: String, message: String },

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Invalid value for parameter '{key}': {message}")]
    InvalidParameter { key: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),
}

/// Result type alias for Ember operations
pub type Result<T> = std::result::Result<T, EmberError>;

impl From<toml::de::Error> for EmberError {
    fn from(err: toml::de::Error) -> Self {
        EmberError::TomlParseError(err.to_string())
    }
}
