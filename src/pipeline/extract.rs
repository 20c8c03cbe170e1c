use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ExtractionConfig;
use crate::domain::{Applicability, ContentChunk, DocumentType, Obligation};
use crate::error::PipelineError;
use crate::pipeline::chunk::compare_chunk_ids;

/// Namespace for deterministic obligation ids (UUID v5 of chunk id + the
/// candidate's sequence within its chunk)
static OBLIGATION_NAMESPACE: Lazy<Uuid> =
    Lazy::new(|| Uuid::new_v5(&Uuid::NAMESPACE_OID, b"regmon.obligation"));

/// An obligation candidate as returned by the external extraction
/// capability. Every field beyond the text is optional: the capability may
/// return nothing for a field, and absence is a valid, expected response.
#[derive(Debug, Clone)]
pub struct ObligationCandidate {
    pub obligation_text: String,
    pub document_type_hint: Option<DocumentType>,
    pub effective_date: Option<NaiveDate>,
    pub is_consumer_duty: Option<bool>,
    pub owner_hint: Option<String>,
    pub applicability_hint: Option<Applicability>,
}

/// Failure modes of one extraction call
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Worth retrying with backoff (rate limit, timeout, upstream hiccup)
    #[error("transient extraction failure: {0}")]
    Transient(String),
    /// The capability returned something unusable; retrying won't help
    #[error("malformed extraction result: {0}")]
    Malformed(String),
}

/// Port for the external extraction capability (AI/NLP). The intelligence is
/// out of scope; the pipeline only depends on this contract.
#[async_trait]
pub trait ExtractionCapability: Send + Sync {
    async fn extract(
        &self,
        chunk: &ContentChunk,
    ) -> std::result::Result<Vec<ObligationCandidate>, ExtractionError>;
}

/// One chunk whose extraction failed after retries. Collected, not dropped.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChunkFailure {
    pub chunk_id: String,
    pub reference_number: String,
    pub error: String,
}

/// One candidate rejected by validation. The record is dropped from the
/// output set but the rejection is reported.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CandidateReject {
    pub chunk_id: String,
    pub candidate_seq: u32,
    pub error: String,
}

/// Everything the extraction stage produced for one run
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    pub obligations: Vec<Obligation>,
    pub chunk_failures: Vec<ChunkFailure>,
    pub rejects: Vec<CandidateReject>,
}

/// Orchestrates extraction across chunks: bounded concurrency, bounded
/// retries with exponential backoff, candidate validation, metadata mapping
/// and deterministic id assignment. One chunk's failure never aborts its
/// siblings.
pub struct ObligationExtractor {
    capability: Arc<dyn ExtractionCapability>,
    config: ExtractionConfig,
}

impl ObligationExtractor {
    pub fn new(capability: Arc<dyn ExtractionCapability>, config: ExtractionConfig) -> Self {
        Self { capability, config }
    }

    /// Extract obligations from all chunks. Completion order is arbitrary;
    /// the output is re-sorted into (reference_number, chunk_id, sequence)
    /// order before returning.
    pub async fn extract_all(&self, chunks: &[ContentChunk]) -> ExtractionOutcome {
        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let mut join_set = JoinSet::new();

        for chunk in chunks.iter().cloned() {
            let capability = Arc::clone(&self.capability);
            let config = self.config.clone();
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = extract_with_retry(capability.as_ref(), &chunk, &config).await;
                (chunk, result)
            });
        }

        let mut outcome = ExtractionOutcome::default();
        while let Some(joined) = join_set.join_next().await {
            let (chunk, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "extraction task panicked");
                    continue;
                }
            };
            match result {
                Ok(candidates) => {
                    crate::observability::metrics::extract::chunk_succeeded();
                    self.collect_candidates(&chunk, candidates, &mut outcome);
                }
                Err(e) => {
                    crate::observability::metrics::extract::chunk_failed();
                    warn!(chunk_id = %chunk.chunk_id, error = %e, "extraction failed for chunk");
                    // Classify into the pipeline taxonomy before recording:
                    // exhausted retries stay transient, malformed output is a
                    // validation failure
                    let classified = match e {
                        ExtractionError::Transient(reason) => {
                            PipelineError::ExtractionTransient(reason)
                        }
                        ExtractionError::Malformed(reason) => {
                            PipelineError::DataValidation(reason)
                        }
                    };
                    outcome.chunk_failures.push(ChunkFailure {
                        chunk_id: chunk.chunk_id.clone(),
                        reference_number: chunk.reference_number.clone(),
                        error: classified.to_string(),
                    });
                }
            }
        }

        // Restore deterministic order regardless of completion order
        outcome.obligations.sort_by(|a, b| {
            a.reference_number
                .cmp(&b.reference_number)
                .then_with(|| compare_chunk_ids(&a.chunk_id, &b.chunk_id))
                .then_with(|| a.obligation_id.cmp(&b.obligation_id))
        });
        outcome.chunk_failures.sort_by(|a, b| {
            a.reference_number
                .cmp(&b.reference_number)
                .then_with(|| compare_chunk_ids(&a.chunk_id, &b.chunk_id))
        });
        outcome.rejects.sort_by(|a, b| {
            compare_chunk_ids(&a.chunk_id, &b.chunk_id)
                .then_with(|| a.candidate_seq.cmp(&b.candidate_seq))
        });

        crate::observability::metrics::extract::obligations_extracted(
            outcome.obligations.len() as u64
        );
        outcome
    }

    fn collect_candidates(
        &self,
        chunk: &ContentChunk,
        candidates: Vec<ObligationCandidate>,
        outcome: &mut ExtractionOutcome,
    ) {
        for (seq, candidate) in candidates.into_iter().enumerate() {
            match build_obligation(chunk, seq as u32, candidate) {
                Ok(obligation) => outcome.obligations.push(obligation),
                Err(reason) => {
                    crate::observability::metrics::extract::candidate_rejected();
                    warn!(chunk_id = %chunk.chunk_id, seq, reason = %reason, "rejected extraction candidate");
                    outcome.rejects.push(CandidateReject {
                        chunk_id: chunk.chunk_id.clone(),
                        candidate_seq: seq as u32,
                        error: PipelineError::DataValidation(reason).to_string(),
                    });
                }
            }
        }
    }
}

async fn extract_with_retry(
    capability: &dyn ExtractionCapability,
    chunk: &ContentChunk,
    config: &ExtractionConfig,
) -> std::result::Result<Vec<ObligationCandidate>, ExtractionError> {
    let mut attempt: u32 = 0;
    loop {
        match capability.extract(chunk).await {
            Ok(candidates) => return Ok(candidates),
            Err(ExtractionError::Transient(reason)) if attempt < config.max_retries => {
                let delay_ms = config
                    .retry_base_delay_ms
                    .saturating_mul(1u64 << attempt.min(16));
                crate::observability::metrics::extract::retry();
                debug!(
                    chunk_id = %chunk.chunk_id,
                    attempt,
                    delay_ms,
                    reason = %reason,
                    "retrying extraction after transient failure"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Validate one candidate and map chunk metadata onto it. The document type
/// always comes from the upstream classification on the chunk; a differing
/// hint from the capability is logged, not trusted.
fn build_obligation(
    chunk: &ContentChunk,
    seq: u32,
    candidate: ObligationCandidate,
) -> std::result::Result<Obligation, String> {
    let text = candidate.obligation_text.trim();
    if text.is_empty() {
        return Err("obligation_text is empty".to_string());
    }

    if let Some(hint) = candidate.document_type_hint {
        if hint != chunk.document_type {
            debug!(
                chunk_id = %chunk.chunk_id,
                "capability document type hint disagrees with upstream classification; keeping upstream"
            );
        }
    }

    // Undeterminable consumer-duty flag defaults to false, flagged as
    // low-confidence. An absent effective date stays absent.
    let (is_consumer_duty, low_confidence) = match candidate.is_consumer_duty {
        Some(flag) => (flag, false),
        None => (false, true),
    };

    let obligation_id = Uuid::new_v5(
        &OBLIGATION_NAMESPACE,
        format!("{}:{}", chunk.chunk_id, seq).as_bytes(),
    );

    Ok(Obligation {
        obligation_id,
        reference_number: chunk.reference_number.clone(),
        chunk_id: chunk.chunk_id.clone(),
        regulator: chunk.regulator,
        document_type: chunk.document_type,
        obligation_text: text.to_string(),
        effective_date: candidate.effective_date,
        is_consumer_duty,
        low_confidence,
        smf_owner: candidate.owner_hint,
        applicability: candidate.applicability_hint,
        source_url: chunk.source_url.clone(),
    })
}

/// Deterministic built-in capability for local runs: treats sentences
/// containing obligation language ("must", "is required to", "should") as
/// candidates. The production capability is an external service behind the
/// same trait.
pub struct RuleBasedExtraction;

static OBLIGATION_LANGUAGE: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"(?i)\bmust\b|\bis required to\b|\bshould\b").unwrap());

#[async_trait]
impl ExtractionCapability for RuleBasedExtraction {
    async fn extract(
        &self,
        chunk: &ContentChunk,
    ) -> std::result::Result<Vec<ObligationCandidate>, ExtractionError> {
        let candidates = chunk
            .content
            .split_inclusive(['.', '!', '?'])
            .map(str::trim)
            .filter(|sentence| !sentence.is_empty() && OBLIGATION_LANGUAGE.is_match(sentence))
            .map(|sentence| ObligationCandidate {
                obligation_text: sentence.to_string(),
                document_type_hint: None,
                effective_date: None,
                is_consumer_duty: None,
                owner_hint: None,
                applicability_hint: None,
            })
            .collect();
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Regulator;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn chunk(chunk_id: &str) -> ContentChunk {
        ContentChunk {
            chunk_id: chunk_id.to_string(),
            reference_number: "PS23/4".to_string(),
            seq: 0,
            regulator: Regulator::Fca,
            title: "Final rules".to_string(),
            document_type: DocumentType::PolicyStatement,
            publication_date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            source_url: "https://example.org".to_string(),
            content: "Firms must assess fair value.".to_string(),
        }
    }

    fn candidate(text: &str) -> ObligationCandidate {
        ObligationCandidate {
            obligation_text: text.to_string(),
            document_type_hint: None,
            effective_date: None,
            is_consumer_duty: None,
            owner_hint: None,
            applicability_hint: None,
        }
    }

    struct FixedCapability {
        candidates: Vec<ObligationCandidate>,
    }

    #[async_trait]
    impl ExtractionCapability for FixedCapability {
        async fn extract(
            &self,
            _chunk: &ContentChunk,
        ) -> std::result::Result<Vec<ObligationCandidate>, ExtractionError> {
            Ok(self.candidates.clone())
        }
    }

    /// Fails transiently a fixed number of times, then succeeds
    struct FlakyCapability {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ExtractionCapability for FlakyCapability {
        async fn extract(
            &self,
            _chunk: &ContentChunk,
        ) -> std::result::Result<Vec<ObligationCandidate>, ExtractionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(ExtractionError::Transient("rate limited".to_string()))
            } else {
                Ok(vec![candidate("Firms must report quarterly.")])
            }
        }
    }

    fn fast_config() -> ExtractionConfig {
        ExtractionConfig {
            max_in_flight: 2,
            max_retries: 3,
            retry_base_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn maps_chunk_metadata_onto_obligations() {
        let extractor = ObligationExtractor::new(
            Arc::new(FixedCapability {
                candidates: vec![candidate("Firms must assess fair value.")],
            }),
            fast_config(),
        );
        let outcome = extractor.extract_all(&[chunk("PS23/4#0000")]).await;

        assert_eq!(outcome.obligations.len(), 1);
        let obligation = &outcome.obligations[0];
        assert_eq!(obligation.reference_number, "PS23/4");
        assert_eq!(obligation.chunk_id, "PS23/4#0000");
        assert_eq!(obligation.regulator, Regulator::Fca);
        assert_eq!(obligation.document_type, DocumentType::PolicyStatement);
        // Undeterminable consumer-duty flag: default false, low confidence
        assert!(!obligation.is_consumer_duty);
        assert!(obligation.low_confidence);
        assert!(obligation.effective_date.is_none());
    }

    #[tokio::test]
    async fn obligation_ids_are_deterministic() {
        let capability = Arc::new(FixedCapability {
            candidates: vec![candidate("Firms must act."), candidate("Firms must report.")],
        });
        let extractor =
            ObligationExtractor::new(capability.clone(), fast_config());
        let first = extractor.extract_all(&[chunk("PS23/4#0000")]).await;
        let second = ObligationExtractor::new(capability, fast_config())
            .extract_all(&[chunk("PS23/4#0000")])
            .await;

        let first_ids: Vec<_> = first.obligations.iter().map(|o| o.obligation_id).collect();
        let second_ids: Vec<_> = second.obligations.iter().map(|o| o.obligation_id).collect();
        assert_eq!(first_ids, second_ids);
        assert_ne!(first_ids[0], first_ids[1]);
    }

    #[tokio::test]
    async fn empty_text_is_rejected_without_aborting_siblings() {
        let extractor = ObligationExtractor::new(
            Arc::new(FixedCapability {
                candidates: vec![candidate("   "), candidate("Firms must report.")],
            }),
            fast_config(),
        );
        let outcome = extractor.extract_all(&[chunk("PS23/4#0000")]).await;

        assert_eq!(outcome.obligations.len(), 1);
        assert_eq!(outcome.rejects.len(), 1);
        assert_eq!(outcome.rejects[0].candidate_seq, 0);
        // Rejects carry the validation classification from the taxonomy
        assert_eq!(
            outcome.rejects[0].error,
            PipelineError::DataValidation("obligation_text is empty".to_string()).to_string()
        );
    }

    #[tokio::test]
    async fn output_order_follows_document_order_past_the_id_pad() {
        let extractor = ObligationExtractor::new(
            Arc::new(FixedCapability {
                candidates: vec![candidate("Firms must report.")],
            }),
            fast_config(),
        );
        let outcome = extractor
            .extract_all(&[chunk("PS23/4#10000"), chunk("PS23/4#9999")])
            .await;
        let ids: Vec<_> = outcome
            .obligations
            .iter()
            .map(|o| o.chunk_id.as_str())
            .collect();
        assert_eq!(ids, ["PS23/4#9999", "PS23/4#10000"]);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let extractor = ObligationExtractor::new(
            Arc::new(FlakyCapability {
                failures_before_success: 2,
                calls: AtomicU32::new(0),
            }),
            fast_config(),
        );
        let outcome = extractor.extract_all(&[chunk("PS23/4#0000")]).await;
        assert_eq!(outcome.obligations.len(), 1);
        assert!(outcome.chunk_failures.is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_become_a_chunk_failure() {
        let extractor = ObligationExtractor::new(
            Arc::new(FlakyCapability {
                failures_before_success: 10,
                calls: AtomicU32::new(0),
            }),
            fast_config(),
        );
        let outcome = extractor.extract_all(&[chunk("PS23/4#0000")]).await;
        assert!(outcome.obligations.is_empty());
        assert_eq!(outcome.chunk_failures.len(), 1);
        assert_eq!(outcome.chunk_failures[0].chunk_id, "PS23/4#0000");
        // Exhausted retries are recorded as transient in the taxonomy
        assert_eq!(
            outcome.chunk_failures[0].error,
            PipelineError::ExtractionTransient("rate limited".to_string()).to_string()
        );
    }

    #[tokio::test]
    async fn one_chunk_failure_does_not_abort_siblings() {
        struct FailsOnFirstChunk;

        #[async_trait]
        impl ExtractionCapability for FailsOnFirstChunk {
            async fn extract(
                &self,
                chunk: &ContentChunk,
            ) -> std::result::Result<Vec<ObligationCandidate>, ExtractionError> {
                if chunk.chunk_id.ends_with("0000") {
                    Err(ExtractionError::Malformed("not json".to_string()))
                } else {
                    Ok(vec![candidate("Firms must report.")])
                }
            }
        }

        let extractor = ObligationExtractor::new(Arc::new(FailsOnFirstChunk), fast_config());
        let outcome = extractor
            .extract_all(&[chunk("PS23/4#0000"), chunk("PS23/4#0001")])
            .await;
        assert_eq!(outcome.obligations.len(), 1);
        assert_eq!(outcome.chunk_failures.len(), 1);
        // Malformed capability output classifies as a validation failure
        assert_eq!(
            outcome.chunk_failures[0].error,
            PipelineError::DataValidation("not json".to_string()).to_string()
        );
    }

    #[tokio::test]
    async fn rule_based_extraction_finds_obligation_sentences() {
        let mut test_chunk = chunk("PS23/4#0000");
        test_chunk.content =
            "Background about the market. Firms must assess fair value. Nothing else here."
                .to_string();
        let candidates = RuleBasedExtraction.extract(&test_chunk).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].obligation_text, "Firms must assess fair value.");
        assert!(candidates[0].effective_date.is_none());
    }
}
