pub mod factors;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use crate::controls::{categorise_subject, ControlAssessment, ControlsLibrary};
use crate::domain::{ActionTier, Obligation, ScoreBreakdown, ScoredObligation};
use crate::error::{PipelineError, Result};

/// Computes the weighted impact score for each obligation. The controls
/// library is joined once per run (batched over distinct subjects) and the
/// resulting snapshot id is stamped onto every scored obligation.
pub struct ImpactScorer {
    controls: Arc<dyn ControlsLibrary>,
    evaluation_date: NaiveDate,
    scored_at: DateTime<Utc>,
}

impl ImpactScorer {
    pub fn new(controls: Arc<dyn ControlsLibrary>, evaluation_date: NaiveDate) -> Self {
        Self {
            controls,
            evaluation_date,
            scored_at: Utc::now(),
        }
    }

    /// Pin the audit timestamp. Used when the evaluation date is pinned in
    /// configuration so identical re-runs produce byte-identical records.
    pub fn with_scored_at(mut self, scored_at: DateTime<Utc>) -> Self {
        self.scored_at = scored_at;
        self
    }

    /// Score a batch of obligations. Fails the whole run if the controls
    /// library cannot be queried: a control-gap score without the join is
    /// not defensible and is never defaulted.
    pub async fn score_all(&self, obligations: &[Obligation]) -> Result<Vec<ScoredObligation>> {
        if obligations.is_empty() {
            return Ok(Vec::new());
        }

        // One batched join per run, not one lookup per obligation
        let subjects: Vec<_> = obligations
            .iter()
            .map(|o| categorise_subject(&o.obligation_text))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let assessments = self.controls.lookup_batch(&subjects).await?;

        let mut scored = Vec::with_capacity(obligations.len());
        for obligation in obligations {
            let subject = categorise_subject(&obligation.obligation_text);
            let assessment = assessments.get(&subject).ok_or_else(|| {
                PipelineError::ControlDataUnavailable(format!(
                    "controls library returned no assessment for subject {}",
                    subject.as_str()
                ))
            })?;
            scored.push(self.score_one(obligation, assessment));
        }

        info!(
            count = scored.len(),
            snapshot = self.controls.snapshot_id(),
            "scored obligations against controls snapshot"
        );
        Ok(scored)
    }

    fn score_one(&self, obligation: &Obligation, assessment: &ControlAssessment) -> ScoredObligation {
        let severity = factors::severity(obligation.document_type);
        let scope = factors::scope(obligation.applicability);
        let urgency = factors::urgency(
            obligation.document_type,
            obligation.effective_date,
            self.evaluation_date,
        );
        let control_gap = factors::control_gap(assessment);
        let risk = factors::risk(&obligation.obligation_text, obligation.is_consumer_duty);

        let impact_score = combine_factors(&[&severity, &scope, &urgency, &control_gap, &risk]);
        let action_tier = ActionTier::from_score(impact_score);

        crate::observability::metrics::score::obligation_scored(impact_score);

        ScoredObligation {
            obligation: obligation.clone(),
            impact_score,
            action_tier,
            breakdown: ScoreBreakdown {
                severity,
                scope,
                urgency,
                control_gap,
                risk,
                control_id: assessment.control_id.clone(),
            },
            controls_snapshot: self.controls.snapshot_id().to_string(),
            scored_at: self.scored_at,
            // Version is assigned on append to the store
            version: 1,
        }
    }
}

/// Weighted sum of the factor scores, rounded half-up and clamped to
/// [0, 100]. Rounding is pinned to half-up: the documented worked example
/// sums to 86.5 and must score 87.
pub fn combine_factors(factor_scores: &[&crate::domain::FactorScore]) -> u8 {
    let weighted: f64 = factor_scores.iter().map(|f| f.value * f.weight).sum();
    weighted.round().clamp(0.0, 100.0) as u8
}
