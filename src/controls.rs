use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

/// Coverage status of the control(s) mapped to an obligation subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlStatus {
    /// No mapped control exists
    NoControl,
    /// Control exists but is untested or outdated
    Untested,
    /// Control exists with partial coverage
    Partial,
    /// Control exists and is effective
    Effective,
}

/// Subject categories the controls library is keyed by
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ControlSubject {
    ConsumerOutcomes,
    CapitalAdequacy,
    Liquidity,
    StressTesting,
    Reporting,
    Governance,
    OperationalResilience,
    Conduct,
}

impl ControlSubject {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlSubject::ConsumerOutcomes => "consumer-outcomes",
            ControlSubject::CapitalAdequacy => "capital-adequacy",
            ControlSubject::Liquidity => "liquidity",
            ControlSubject::StressTesting => "stress-testing",
            ControlSubject::Reporting => "reporting",
            ControlSubject::Governance => "governance",
            ControlSubject::OperationalResilience => "operational-resilience",
            ControlSubject::Conduct => "conduct",
        }
    }
}

/// Result of the controls-library join for one subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlAssessment {
    pub status: ControlStatus,
    /// Control identifier for traceability, when a control is mapped
    pub control_id: Option<String>,
}

/// Keyword rules mapping obligation text to a control subject. First match
/// wins; order runs from the most specific regulatory language to the most
/// generic.
static SUBJECT_RULES: Lazy<Vec<(Regex, ControlSubject)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(?i)consumer duty|fair value|vulnerable customer|consumer outcome")
                .unwrap(),
            ControlSubject::ConsumerOutcomes,
        ),
        (
            Regex::new(r"(?i)stress[ -]test").unwrap(),
            ControlSubject::StressTesting,
        ),
        (
            Regex::new(r"(?i)capital|solvency|own funds").unwrap(),
            ControlSubject::CapitalAdequacy,
        ),
        (
            Regex::new(r"(?i)liquidity|funding risk").unwrap(),
            ControlSubject::Liquidity,
        ),
        (
            Regex::new(r"(?i)report|regulatory return|submission|notif").unwrap(),
            ControlSubject::Reporting,
        ),
        (
            Regex::new(r"(?i)governance|board|senior management|accountab").unwrap(),
            ControlSubject::Governance,
        ),
        (
            Regex::new(r"(?i)operational resilience|outsourc|incident|business continuity")
                .unwrap(),
            ControlSubject::OperationalResilience,
        ),
    ]
});

/// Deterministic mapping from obligation text to the controls-library key.
/// Falls back to the generic conduct category when no rule matches.
pub fn categorise_subject(obligation_text: &str) -> ControlSubject {
    for (pattern, subject) in SUBJECT_RULES.iter() {
        if pattern.is_match(obligation_text) {
            return *subject;
        }
    }
    ControlSubject::Conduct
}

/// Port for the external controls-library lookup. Queried once per run with
/// the batch of distinct subjects; the snapshot is read-only for the run.
#[async_trait]
pub trait ControlsLibrary: Send + Sync {
    /// Identifier of the loaded snapshot, recorded on every scored obligation
    fn snapshot_id(&self) -> &str;

    /// Batched lookup. A subject with no library entry maps to NoControl;
    /// a library that cannot be queried at all is an error.
    async fn lookup_batch(
        &self,
        subjects: &[ControlSubject],
    ) -> Result<HashMap<ControlSubject, ControlAssessment>>;
}

/// On-disk snapshot shape of the controls library
#[derive(Debug, Deserialize)]
struct ControlsSnapshotFile {
    snapshot_id: String,
    controls: HashMap<ControlSubject, ControlAssessment>,
}

/// Controls library backed by a JSON snapshot loaded once per pipeline run
#[derive(Debug)]
pub struct SnapshotControlsLibrary {
    snapshot_id: String,
    entries: HashMap<ControlSubject, ControlAssessment>,
}

impl SnapshotControlsLibrary {
    /// Load a snapshot from disk. Any failure here is a
    /// ControlDataUnavailable error: control-gap scoring is not defensible
    /// without the join, so there is no silent default.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ControlDataUnavailable(format!(
                "cannot read controls snapshot {}: {}",
                path.display(),
                e
            ))
        })?;
        let file: ControlsSnapshotFile = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::ControlDataUnavailable(format!(
                "cannot parse controls snapshot {}: {}",
                path.display(),
                e
            ))
        })?;
        info!(
            snapshot_id = %file.snapshot_id,
            entries = file.controls.len(),
            "loaded controls library snapshot"
        );
        Ok(Self {
            snapshot_id: file.snapshot_id,
            entries: file.controls,
        })
    }

    #[cfg(test)]
    pub fn from_entries(
        snapshot_id: &str,
        entries: HashMap<ControlSubject, ControlAssessment>,
    ) -> Self {
        Self {
            snapshot_id: snapshot_id.to_string(),
            entries,
        }
    }
}

#[async_trait]
impl ControlsLibrary for SnapshotControlsLibrary {
    fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    async fn lookup_batch(
        &self,
        subjects: &[ControlSubject],
    ) -> Result<HashMap<ControlSubject, ControlAssessment>> {
        let mut out = HashMap::new();
        for subject in subjects {
            let assessment = match self.entries.get(subject) {
                Some(found) => found.clone(),
                None => {
                    debug!(subject = subject.as_str(), "no mapped control for subject");
                    ControlAssessment {
                        status: ControlStatus::NoControl,
                        control_id: None,
                    }
                }
            };
            out.insert(*subject, assessment);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorises_consumer_duty_language() {
        let subject = categorise_subject(
            "Firms must demonstrate fair value under the Consumer Duty outcomes.",
        );
        assert_eq!(subject, ControlSubject::ConsumerOutcomes);
    }

    #[test]
    fn categorises_prudential_language() {
        assert_eq!(
            categorise_subject("Maintain adequate solvency capital requirements."),
            ControlSubject::CapitalAdequacy
        );
        assert_eq!(
            categorise_subject("Annual stress-testing of liquidity buffers."),
            ControlSubject::StressTesting
        );
    }

    #[test]
    fn falls_back_to_conduct() {
        assert_eq!(
            categorise_subject("Firms should treat counterparties honestly."),
            ControlSubject::Conduct
        );
    }

    #[tokio::test]
    async fn unmapped_subject_is_no_control() {
        let library = SnapshotControlsLibrary::from_entries("snap-1", HashMap::new());
        let result = library
            .lookup_batch(&[ControlSubject::Liquidity])
            .await
            .unwrap();
        assert_eq!(
            result[&ControlSubject::Liquidity].status,
            ControlStatus::NoControl
        );
    }

    #[tokio::test]
    async fn mapped_subject_returns_library_entry() {
        let mut entries = HashMap::new();
        entries.insert(
            ControlSubject::Reporting,
            ControlAssessment {
                status: ControlStatus::Partial,
                control_id: Some("CTL-042".to_string()),
            },
        );
        let library = SnapshotControlsLibrary::from_entries("snap-1", entries);
        let result = library
            .lookup_batch(&[ControlSubject::Reporting])
            .await
            .unwrap();
        assert_eq!(result[&ControlSubject::Reporting].status, ControlStatus::Partial);
        assert_eq!(
            result[&ControlSubject::Reporting].control_id.as_deref(),
            Some("CTL-042")
        );
    }

    #[test]
    fn unreadable_snapshot_is_control_data_unavailable() {
        let err =
            SnapshotControlsLibrary::from_json_file(Path::new("/nonexistent/controls.json"))
                .unwrap_err();
        assert!(matches!(
            err,
            crate::error::PipelineError::ControlDataUnavailable(_)
        ));
    }
}
