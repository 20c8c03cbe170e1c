use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::controls::ControlsLibrary;
use crate::domain::{RawUpdate, Regulator, ScoredObligation};
use crate::error::Result;
use crate::pipeline::chunk::{compare_chunk_ids, content_digest, Chunker};
use crate::pipeline::combine::combine;
use crate::pipeline::extract::{
    CandidateReject, ChunkFailure, ExtractionCapability, ObligationExtractor,
};
use crate::pipeline::score::ImpactScorer;
use crate::store::ObligationStore;

/// Non-fatal condition observed during a run (e.g. a document with empty
/// content, chunked to nothing and skipped)
#[derive(Debug, Clone, Serialize)]
pub struct RunWarning {
    pub reference_number: String,
    pub message: String,
}

/// Per-document content digests, recorded so identical re-runs can be
/// verified without diffing full text
#[derive(Debug, Clone, Serialize)]
pub struct DocumentDigest {
    pub reference_number: String,
    pub content_sha256: String,
}

/// Stage counts for the run summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageCounts {
    pub updates: usize,
    pub chunks: usize,
    pub obligations: usize,
    pub scored: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    /// No failures of any kind
    Success,
    /// Scored output was produced but some units failed; never reported
    /// as a full success
    PartialSuccess,
}

/// The run's output set plus its failure manifest. Per-unit failures are
/// collected here; only pipeline-wide integrity failures abort the run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub counts: StageCounts,
    pub scored: Vec<ScoredObligation>,
    pub chunk_failures: Vec<ChunkFailure>,
    pub candidate_rejects: Vec<CandidateReject>,
    pub warnings: Vec<RunWarning>,
    pub digests: Vec<DocumentDigest>,
    pub controls_snapshot: String,
    pub evaluation_date: chrono::NaiveDate,
}

/// Drives the full pipeline: combine, chunk, extract, score, persist.
/// The controls snapshot is loaded by the caller once per run and treated
/// as read-only for the run's duration.
pub struct PipelineRun {
    config: PipelineConfig,
    capability: Arc<dyn ExtractionCapability>,
    controls: Arc<dyn ControlsLibrary>,
    store: Arc<dyn ObligationStore>,
}

impl PipelineRun {
    pub fn new(
        config: PipelineConfig,
        capability: Arc<dyn ExtractionCapability>,
        controls: Arc<dyn ControlsLibrary>,
        store: Arc<dyn ObligationStore>,
    ) -> Self {
        Self {
            config,
            capability,
            controls,
            store,
        }
    }

    pub async fn execute(
        &self,
        streams: Vec<(Regulator, Vec<RawUpdate>)>,
    ) -> Result<RunReport> {
        let evaluation_date = self
            .config
            .evaluation_date
            .unwrap_or_else(|| Utc::now().date_naive());

        // Integrity failures here abort the run
        let combined = combine(streams)?;

        let chunker = Chunker::new(self.config.chunker.clone());
        let mut warnings = Vec::new();
        let mut digests = Vec::new();
        let mut chunks = Vec::new();
        for update in &combined {
            digests.push(DocumentDigest {
                reference_number: update.update.reference_number.clone(),
                content_sha256: content_digest(&update.update.full_content),
            });
            if update.update.full_content.is_empty() {
                warn!(
                    reference = %update.update.reference_number,
                    "document has empty content; skipping"
                );
                crate::observability::metrics::chunker::empty_content();
                warnings.push(RunWarning {
                    reference_number: update.update.reference_number.clone(),
                    message: "empty content: no chunks produced".to_string(),
                });
                continue;
            }
            chunks.extend(chunker.chunk(update));
        }

        let extractor =
            ObligationExtractor::new(Arc::clone(&self.capability), self.config.extraction.clone());
        let extraction = extractor.extract_all(&chunks).await;

        let mut scorer = ImpactScorer::new(Arc::clone(&self.controls), evaluation_date);
        if self.config.evaluation_date.is_some() {
            // Pinned evaluation date means a reproducible run: pin the audit
            // timestamp as well so re-runs are byte-identical
            let pinned = evaluation_date
                .and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc());
            if let Some(pinned) = pinned {
                scorer = scorer.with_scored_at(pinned);
            }
        }
        // ControlDataUnavailable propagates: fatal for the run
        let scored = scorer.score_all(&extraction.obligations).await?;

        let mut persisted = Vec::with_capacity(scored.len());
        for record in scored {
            persisted.push(self.store.append(record).await?);
        }
        persisted.sort_by(|a, b| {
            a.obligation
                .reference_number
                .cmp(&b.obligation.reference_number)
                .then_with(|| {
                    compare_chunk_ids(&a.obligation.chunk_id, &b.obligation.chunk_id)
                })
                .then_with(|| a.obligation.obligation_id.cmp(&b.obligation.obligation_id))
        });

        let counts = StageCounts {
            updates: combined.len(),
            chunks: chunks.len(),
            obligations: extraction.obligations.len(),
            scored: persisted.len(),
        };
        let outcome = if extraction.chunk_failures.is_empty()
            && extraction.rejects.is_empty()
            && warnings.is_empty()
        {
            RunOutcome::Success
        } else {
            RunOutcome::PartialSuccess
        };

        info!(
            updates = counts.updates,
            chunks = counts.chunks,
            obligations = counts.obligations,
            scored = counts.scored,
            failures = extraction.chunk_failures.len(),
            ?outcome,
            "pipeline run complete"
        );

        Ok(RunReport {
            outcome,
            counts,
            scored: persisted,
            chunk_failures: extraction.chunk_failures,
            candidate_rejects: extraction.rejects,
            warnings,
            digests,
            controls_snapshot: self.controls.snapshot_id().to_string(),
            evaluation_date,
        })
    }
}
