//! Domain-specific error types for cg-tutor

use thiserror::Error;

use crate::clients::ModelError;
use crate::executor::ExecError;

/// Errors raised while processing a single question
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Model call failed: {0}")]
    Model(#[from] ModelError),

    #[error("No Python code block found after {attempts} attempt(s)")]
    NoCode { attempts: u32 },

    #[error("Generated code failed: {0}")]
    Exec(#[from] ExecError),

    #[error("Image error: {message}")]
    Image { message: String },

    #[error("I/O error while saving results: {0}")]
    Io(#[from] std::io::Error),
}

/// Main error type for cg-tutor
#[derive(Error, Debug)]
pub enum TutorError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<anyhow::Error> for TutorError {
    fn from(err: anyhow::Error) -> Self {
        TutorError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for TutorError {
    fn from(err: serde_json::Error) -> Self {
        TutorError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for TutorError {
    fn from(err: toml::de::Error) -> Self {
        TutorError::Config {
            message: format!("invalid TOML: {}", err),
        }
    }
}

/// Result type alias for cg-tutor operations
pub type Result<T> = std::result::Result<T, TutorError>;
