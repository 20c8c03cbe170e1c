use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use super::ObligationStore;
use crate::domain::{ActionTier, Regulator, ScoredObligation};
use crate::error::Result;

/// In-memory store implementation for development/testing
pub struct InMemoryStore {
    records: Arc<Mutex<Vec<ScoredObligation>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn filtered<F>(&self, predicate: F) -> Vec<ScoredObligation>
    where
        F: Fn(&ScoredObligation) -> bool,
    {
        let records = self.records.lock().unwrap();
        records.iter().filter(|r| predicate(r)).cloned().collect()
    }
}

#[async_trait]
impl ObligationStore for InMemoryStore {
    async fn append(&self, mut scored: ScoredObligation) -> Result<ScoredObligation> {
        let mut records = self.records.lock().unwrap();
        let latest = records
            .iter()
            .filter(|r| r.obligation.obligation_id == scored.obligation.obligation_id)
            .map(|r| r.version)
            .max()
            .unwrap_or(0);
        scored.version = latest + 1;
        records.push(scored.clone());
        debug!(
            obligation_id = %scored.obligation.obligation_id,
            version = scored.version,
            "appended scored obligation"
        );
        Ok(scored)
    }

    async fn by_reference(&self, reference_number: &str) -> Result<Vec<ScoredObligation>> {
        Ok(self.filtered(|r| r.obligation.reference_number == reference_number))
    }

    async fn by_regulator(&self, regulator: Regulator) -> Result<Vec<ScoredObligation>> {
        Ok(self.filtered(|r| r.obligation.regulator == regulator))
    }

    async fn by_action_tier(&self, tier: ActionTier) -> Result<Vec<ScoredObligation>> {
        Ok(self.filtered(|r| r.action_tier == tier))
    }

    async fn consumer_duty(&self) -> Result<Vec<ScoredObligation>> {
        Ok(self.filtered(|r| r.obligation.is_consumer_duty))
    }

    async fn all(&self) -> Result<Vec<ScoredObligation>> {
        Ok(self.filtered(|_| true))
    }
}
