use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::domain::{RawUpdate, Regulator};
use crate::error::Result;

/// Core trait that all regulator publication sources must implement.
/// The production crawlers live outside this crate; anything that can
/// produce a stream of raw updates for one regulator plugs in here.
#[async_trait]
pub trait RegulatorSource: Send + Sync {
    /// The regulator this source reads from
    fn regulator(&self) -> Regulator;

    /// Fetch all available publications, in publication order
    async fn fetch_updates(&self) -> Result<Vec<RawUpdate>>;
}

/// Source backed by a JSON fixture file containing an array of raw updates.
/// Used for local runs and tests; the file is the contract boundary with
/// whatever actually crawled the regulator's site.
pub struct JsonFileSource {
    regulator: Regulator,
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(regulator: Regulator, path: PathBuf) -> Self {
        Self { regulator, path }
    }
}

#[async_trait]
impl RegulatorSource for JsonFileSource {
    fn regulator(&self) -> Regulator {
        self.regulator
    }

    async fn fetch_updates(&self) -> Result<Vec<RawUpdate>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let updates: Vec<RawUpdate> = serde_json::from_str(&raw)?;
        info!(
            regulator = %self.regulator,
            count = updates.len(),
            "loaded raw updates from fixture"
        );
        Ok(updates)
    }
}
