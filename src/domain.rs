use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// UK regulators whose publications flow through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Regulator {
    Fca,
    Pra,
}

impl Regulator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regulator::Fca => "FCA",
            Regulator::Pra => "PRA",
        }
    }
}

impl std::fmt::Display for Regulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publication classification as assigned upstream by the source readers.
/// Never re-inferred inside the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    /// FCA Handbook rule change
    HandbookRule,
    /// PRA Supervisory Statement
    SupervisoryStatement,
    /// Final rules (FCA PS / PRA PS)
    PolicyStatement,
    /// Dear CEO letter with explicit supervisory expectations
    DearCeoLetter,
    /// Consultation paper (proposed, not yet binding)
    Consultation,
    /// Informational guidance only
    Guidance,
}

/// One regulator publication as fetched by a source reader.
/// Immutable once read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawUpdate {
    /// Unique per regulator, stable identifier (e.g. "PS23/4", "SS1/23")
    pub reference_number: String,
    pub title: String,
    pub document_type: DocumentType,
    pub publication_date: NaiveDate,
    pub source_url: String,
    pub full_content: String,
}

/// A raw update tagged with its regulator of origin. One-to-one with its
/// source RawUpdate; reference numbers are unique across the combined stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedUpdate {
    pub regulator: Regulator,
    pub update: RawUpdate,
}

/// A bounded slice of a combined update's content. Descriptive fields are
/// copied from the parent so downstream stages are self-contained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentChunk {
    /// Deterministic id: parent reference + zero-padded sequence
    pub chunk_id: String,
    /// Foreign key to the parent CombinedUpdate
    pub reference_number: String,
    /// Position of this chunk within the parent document
    pub seq: u32,
    pub regulator: Regulator,
    pub title: String,
    pub document_type: DocumentType,
    pub publication_date: NaiveDate,
    pub source_url: String,
    pub content: String,
}

/// Scope of applicability bands used by the scope sub-scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Applicability {
    /// Applies to all UK insurers
    Universal,
    /// Applies to a single major segment (e.g. life insurers only)
    MajorSegment,
    /// Applies to a narrow product set
    NarrowProduct,
}

/// A discrete compliance duty extracted from one chunk of one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obligation {
    /// Deterministic UUID v5 of the source chunk id + in-chunk sequence
    pub obligation_id: Uuid,
    /// Foreign key to the parent document
    pub reference_number: String,
    /// Chunk this obligation was extracted from, for audit lineage
    pub chunk_id: String,
    pub regulator: Regulator,
    pub document_type: DocumentType,
    pub obligation_text: String,
    /// Absent means absent. Never guessed.
    pub effective_date: Option<NaiveDate>,
    pub is_consumer_duty: bool,
    /// Set when the extraction capability could not determine the
    /// consumer-duty flag and the default (false) was recorded instead
    pub low_confidence: bool,
    /// Accountable Senior Management Function owner, if assigned
    pub smf_owner: Option<String>,
    /// Scope metadata from the extraction capability, if reported
    pub applicability: Option<Applicability>,
    pub source_url: String,
}

/// Prioritization tier derived from the impact score alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionTier {
    /// Informational tracking only
    Monitor,
    /// Review and planning required
    Assess,
    /// Mandatory action with owner and evidence
    ActionRequired,
}

impl ActionTier {
    /// Tier thresholds: <50 monitor, 50-69 assess, >=70 action-required
    pub fn from_score(impact_score: u8) -> Self {
        match impact_score {
            0..=49 => ActionTier::Monitor,
            50..=69 => ActionTier::Assess,
            _ => ActionTier::ActionRequired,
        }
    }
}

/// One scored factor: the bounded value, its weight in the composite, and
/// the rule that produced it. Scores are never emitted without their
/// derivation rationale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorScore {
    /// Bounded to [0, 100]
    pub value: f64,
    /// Fixed weight in the composite score
    pub weight: f64,
    /// The band or rule that fired, for audit traceability
    pub rule: String,
}

/// Full derivation of an impact score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub severity: FactorScore,
    pub scope: FactorScore,
    pub urgency: FactorScore,
    pub control_gap: FactorScore,
    pub risk: FactorScore,
    /// Mapped control identifier from the controls library, when one exists
    pub control_id: Option<String>,
}

/// An obligation with its weighted impact score and derivation. Created once
/// per obligation per scoring run; re-scoring appends a new version rather
/// than mutating history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredObligation {
    pub obligation: Obligation,
    /// Weighted composite, rounded half-up, clamped to [0, 100]
    pub impact_score: u8,
    pub action_tier: ActionTier,
    pub breakdown: ScoreBreakdown,
    /// Controls-library snapshot the control-gap factor was joined against
    pub controls_snapshot: String,
    pub scored_at: DateTime<Utc>,
    /// Monotonic per obligation_id, assigned on append to the store
    pub version: u32,
}
