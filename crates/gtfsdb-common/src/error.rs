//! Error types shared across gtfsdb crates

use thiserror::Error;

/// Configuration could not be assembled from the environment.
///
/// Missing keys are collected rather than reported one at a time, so an
/// operator fixing a `.env` file sees the whole list in a single run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}. Add them to your environment or .env file.", .0.join(", "))]
    MissingEnv(Vec<String>),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Names of missing keys, empty for other variants.
    pub fn missing_keys(&self) -> &[String] {
        match self {
            ConfigError::MissingEnv(keys) => keys,
            ConfigError::Invalid { .. } => &[],
        }
    }
}
