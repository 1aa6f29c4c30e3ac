//! Configuration Error Types
//!
//! Specific, actionable error messages for configuration loading and validation.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Base configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigFileNotFound { path: PathBuf },

    /// Layered sources could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// Reference to an entity that is not declared
    #[error("Unknown {entity} '{reference}' referenced by {referrer}")]
    UnknownReference {
        entity: String,
        reference: String,
        referrer: String,
    },

    /// Two entities declared with the same identity
    #[error("Duplicate {entity} '{identity}'")]
    Duplicate { entity: String, identity: String },
}

impl ConfigurationError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }

    pub fn unknown_reference(
        entity: impl Into<String>,
        reference: impl Into<String>,
        referrer: impl Into<String>,
    ) -> Self {
        Self::UnknownReference {
            entity: entity.into(),
            reference: reference.into(),
            referrer: referrer.into(),
        }
    }

    pub fn duplicate(entity: impl Into<String>, identity: impl Into<String>) -> Self {
        Self::Duplicate {
            entity: entity.into(),
            identity: identity.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
