use thiserror::Error;

use crate::domain::Regulator;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("duplicate reference number {reference}: published by both {first} and {second}")]
    DuplicateReference {
        reference: String,
        first: Regulator,
        second: Regulator,
    },

    #[error("extraction result rejected: {0}")]
    DataValidation(String),

    #[error("extraction failed after retries: {0}")]
    ExtractionTransient(String),

    #[error("controls library unavailable: {0}")]
    ControlDataUnavailable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
