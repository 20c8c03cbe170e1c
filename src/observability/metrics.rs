//! Metrics for the regulatory pipeline, following standard Prometheus
//! naming conventions. Metric names live in one typed enum so stage code
//! never carries magic strings.

use std::fmt;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Combiner metrics
    CombineUpdatesTotal,
    CombineDuplicateReferences,

    // Chunker metrics
    ChunkerChunksTotal,
    ChunkerEmptyContent,

    // Extraction metrics
    ExtractChunksSuccess,
    ExtractChunksFailed,
    ExtractRetries,
    ExtractCandidatesRejected,
    ExtractObligationsTotal,

    // Scoring metrics
    ScoreObligationsTotal,
    ScoreImpactScore,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::CombineUpdatesTotal => "regmon_combine_updates_total",
            MetricName::CombineDuplicateReferences => "regmon_combine_duplicate_references_total",
            MetricName::ChunkerChunksTotal => "regmon_chunker_chunks_total",
            MetricName::ChunkerEmptyContent => "regmon_chunker_empty_content_total",
            MetricName::ExtractChunksSuccess => "regmon_extract_chunks_success_total",
            MetricName::ExtractChunksFailed => "regmon_extract_chunks_failed_total",
            MetricName::ExtractRetries => "regmon_extract_retries_total",
            MetricName::ExtractCandidatesRejected => "regmon_extract_candidates_rejected_total",
            MetricName::ExtractObligationsTotal => "regmon_extract_obligations_total",
            MetricName::ScoreObligationsTotal => "regmon_score_obligations_total",
            MetricName::ScoreImpactScore => "regmon_score_impact_score",
        }
    }
}

/// Install the Prometheus recorder. Call once at startup when metrics
/// export is enabled; stage helpers are no-ops without a recorder.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    metrics_exporter_prometheus::PrometheusBuilder::new().install()?;
    Ok(())
}

pub mod combine {
    use super::MetricName;
    use metrics::counter;

    pub fn updates_combined(count: u64) {
        counter!(MetricName::CombineUpdatesTotal.as_str()).increment(count);
    }

    pub fn duplicate_reference() {
        counter!(MetricName::CombineDuplicateReferences.as_str()).increment(1);
    }
}

pub mod chunker {
    use super::MetricName;
    use metrics::counter;

    pub fn chunks_produced(count: u64) {
        counter!(MetricName::ChunkerChunksTotal.as_str()).increment(count);
    }

    pub fn empty_content() {
        counter!(MetricName::ChunkerEmptyContent.as_str()).increment(1);
    }
}

pub mod extract {
    use super::MetricName;
    use metrics::counter;

    pub fn chunk_succeeded() {
        counter!(MetricName::ExtractChunksSuccess.as_str()).increment(1);
    }

    pub fn chunk_failed() {
        counter!(MetricName::ExtractChunksFailed.as_str()).increment(1);
    }

    pub fn retry() {
        counter!(MetricName::ExtractRetries.as_str()).increment(1);
    }

    pub fn candidate_rejected() {
        counter!(MetricName::ExtractCandidatesRejected.as_str()).increment(1);
    }

    pub fn obligations_extracted(count: u64) {
        counter!(MetricName::ExtractObligationsTotal.as_str()).increment(count);
    }
}

pub mod score {
    use super::MetricName;
    use metrics::{counter, histogram};

    pub fn obligation_scored(impact_score: u8) {
        counter!(MetricName::ScoreObligationsTotal.as_str()).increment(1);
        histogram!(MetricName::ScoreImpactScore.as_str()).record(impact_score as f64);
    }
}
