// Error types for configuration and session resources.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no stream slot available ({capacity} streams already active)")]
    ResourceExhausted { capacity: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(key: &'static str, value: impl Into<String>, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            key,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}
