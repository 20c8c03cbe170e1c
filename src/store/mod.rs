mod in_memory;

pub use in_memory::InMemoryStore;

use async_trait::async_trait;

use crate::domain::{ActionTier, Regulator, ScoredObligation};
use crate::error::Result;

/// Append-only store of scored obligations. Records are never mutated:
/// re-scoring an obligation appends a new version, preserving the audit
/// trail. Queries cover the access paths the pipeline output promises.
#[async_trait]
pub trait ObligationStore: Send + Sync {
    /// Append a scored obligation. The store assigns the version (one more
    /// than the latest stored version for the same obligation_id) and
    /// returns the record as stored.
    async fn append(&self, scored: ScoredObligation) -> Result<ScoredObligation>;

    async fn by_reference(&self, reference_number: &str) -> Result<Vec<ScoredObligation>>;

    async fn by_regulator(&self, regulator: Regulator) -> Result<Vec<ScoredObligation>>;

    async fn by_action_tier(&self, tier: ActionTier) -> Result<Vec<ScoredObligation>>;

    async fn consumer_duty(&self) -> Result<Vec<ScoredObligation>>;

    async fn all(&self) -> Result<Vec<ScoredObligation>>;
}
