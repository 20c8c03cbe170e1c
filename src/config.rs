use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{PipelineError, Result};

/// Pipeline-wide configuration, loadable from a TOML file. Every field has a
/// default so a missing file or a partial file is usable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunker: ChunkerConfig,
    pub extraction: ExtractionConfig,
    /// Evaluation date for the urgency factor. Defaults to today at run
    /// start; pinning it makes re-runs reproducible.
    pub evaluation_date: Option<NaiveDate>,
}

/// Configuration for the content chunker
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters
    pub max_chunk_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 4000,
        }
    }
}

/// Configuration for the extraction orchestrator
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum extraction calls in flight at once
    pub max_in_flight: usize,
    /// Retries per chunk on transient failure before escalating
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries
    pub retry_base_delay_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            max_retries: 3,
            retry_base_delay_ms: 250,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunker.max_chunk_chars == 0 {
            return Err(PipelineError::Config(
                "chunker.max_chunk_chars must be at least 1".to_string(),
            ));
        }
        if self.extraction.max_in_flight == 0 {
            return Err(PipelineError::Config(
                "extraction.max_in_flight must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
