use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::controls::{ControlAssessment, ControlStatus};
use crate::domain::{Applicability, DocumentType, FactorScore};

pub const SEVERITY_WEIGHT: f64 = 0.30;
pub const SCOPE_WEIGHT: f64 = 0.20;
pub const URGENCY_WEIGHT: f64 = 0.20;
pub const CONTROL_GAP_WEIGHT: f64 = 0.20;
pub const RISK_WEIGHT: f64 = 0.10;

fn factor(value: f64, weight: f64, rule: &str) -> FactorScore {
    FactorScore {
        value,
        weight,
        rule: rule.to_string(),
    }
}

/// Severity from the instrument type. The classification is taken as
/// assigned upstream and never re-inferred here.
pub fn severity(document_type: DocumentType) -> FactorScore {
    let (value, rule) = match document_type {
        DocumentType::HandbookRule => (95.0, "handbook rule change: binding legal obligation"),
        DocumentType::SupervisoryStatement => {
            (95.0, "supervisory statement requirement: binding legal obligation")
        }
        DocumentType::PolicyStatement => {
            (85.0, "policy statement (final rules): confirmed regulatory expectation")
        }
        DocumentType::DearCeoLetter => {
            (78.0, "Dear CEO letter: supervisory expectation with accountability")
        }
        DocumentType::Consultation => (50.0, "consultation: proposed, not yet binding"),
        DocumentType::Guidance => (30.0, "informational guidance: advisory, no enforcement"),
    };
    factor(value, SEVERITY_WEIGHT, rule)
}

/// Scope from applicability metadata. Missing data scores the narrowest
/// band; the default is conservative, never inferred upward.
pub fn scope(applicability: Option<Applicability>) -> FactorScore {
    let (value, rule) = match applicability {
        Some(Applicability::Universal) => (90.0, "applies to all UK insurers: universal"),
        Some(Applicability::MajorSegment) => (70.0, "single major segment coverage"),
        Some(Applicability::NarrowProduct) => (40.0, "narrow product set: limited scope"),
        None => (40.0, "applicability unknown: conservative default (narrowest band)"),
    };
    factor(value, SCOPE_WEIGHT, rule)
}

/// Urgency from effective-date proximity to the run's evaluation date.
/// An absent date on a consultation means "no binding date yet" (20);
/// absent on anything else is the explicit unknown default (50).
pub fn urgency(
    document_type: DocumentType,
    effective_date: Option<NaiveDate>,
    evaluation_date: NaiveDate,
) -> FactorScore {
    let (value, rule) = match effective_date {
        Some(effective) => {
            let days = (effective - evaluation_date).num_days();
            if days <= 0 {
                (100.0, "already in force: immediate compliance required")
            } else if days <= 90 {
                (80.0, "effective within 3 months: critical timeline")
            } else if days <= 180 {
                (60.0, "effective in 3-6 months: planning window closing")
            } else {
                (30.0, "effective beyond 6 months: adequate planning time")
            }
        }
        None if document_type == DocumentType::Consultation => {
            (20.0, "consultation stage: no binding date")
        }
        None => (50.0, "no effective date: unknown default, not inferred"),
    };
    factor(value, URGENCY_WEIGHT, rule)
}

/// Control gap from the controls-library join. The caller is responsible
/// for having performed the join; there is no default path here.
pub fn control_gap(assessment: &ControlAssessment) -> FactorScore {
    let (value, rule) = match assessment.status {
        ControlStatus::NoControl => (90.0, "no mapped control exists: complete control gap"),
        ControlStatus::Untested => {
            (70.0, "control exists but untested/outdated: unverified effectiveness")
        }
        ControlStatus::Partial => (50.0, "partial control coverage: residual risk remains"),
        ControlStatus::Effective => (20.0, "effective control: adequate coverage"),
    };
    factor(value, CONTROL_GAP_WEIGHT, rule)
}

static CONSUMER_LANGUAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)consumer duty|fair value|vulnerable customer|consumer outcome").unwrap()
});

static PRUDENTIAL_LANGUAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)capital|solvency|liquidity|stress[ -]test").unwrap());

/// Consumer harm / prudential risk from the consumer-duty flag and
/// regulatory language in the obligation text
pub fn risk(obligation_text: &str, is_consumer_duty: bool) -> FactorScore {
    let (value, rule) = if is_consumer_duty || CONSUMER_LANGUAGE.is_match(obligation_text) {
        (90.0, "Consumer Duty language: direct consumer harm potential")
    } else if PRUDENTIAL_LANGUAGE.is_match(obligation_text) {
        (80.0, "prudential language: stability risk")
    } else {
        (50.0, "operational or reporting only: administrative compliance")
    };
    factor(value, RISK_WEIGHT, rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()
    }

    #[test]
    fn severity_bands_follow_instrument_type() {
        assert_eq!(severity(DocumentType::HandbookRule).value, 95.0);
        assert_eq!(severity(DocumentType::SupervisoryStatement).value, 95.0);
        assert_eq!(severity(DocumentType::PolicyStatement).value, 85.0);
        assert_eq!(severity(DocumentType::DearCeoLetter).value, 78.0);
        assert_eq!(severity(DocumentType::Consultation).value, 50.0);
        assert_eq!(severity(DocumentType::Guidance).value, 30.0);
    }

    #[test]
    fn scope_defaults_to_narrowest_band() {
        assert_eq!(scope(Some(Applicability::Universal)).value, 90.0);
        assert_eq!(scope(Some(Applicability::MajorSegment)).value, 70.0);
        assert_eq!(scope(Some(Applicability::NarrowProduct)).value, 40.0);
        let missing = scope(None);
        assert_eq!(missing.value, 40.0);
        assert!(missing.rule.contains("conservative default"));
    }

    #[test]
    fn urgency_bands_by_date_proximity() {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        let urgency_for = |effective| {
            urgency(DocumentType::PolicyStatement, Some(effective), eval_date()).value
        };
        assert_eq!(urgency_for(date(2026, 7, 1)), 100.0); // in force
        assert_eq!(urgency_for(date(2026, 8, 1)), 100.0); // effective today
        assert_eq!(urgency_for(date(2026, 10, 1)), 80.0); // 2 months out
        assert_eq!(urgency_for(date(2026, 12, 15)), 60.0); // ~4.5 months
        assert_eq!(urgency_for(date(2027, 6, 1)), 30.0); // far future
    }

    #[test]
    fn missing_date_on_non_consultation_is_exactly_50() {
        let score = urgency(DocumentType::PolicyStatement, None, eval_date());
        assert_eq!(score.value, 50.0);
        assert!(score.rule.contains("unknown default"));
    }

    #[test]
    fn missing_date_on_consultation_is_20() {
        assert_eq!(urgency(DocumentType::Consultation, None, eval_date()).value, 20.0);
    }

    #[test]
    fn control_gap_bands() {
        let assessment = |status| ControlAssessment {
            status,
            control_id: None,
        };
        assert_eq!(control_gap(&assessment(ControlStatus::NoControl)).value, 90.0);
        assert_eq!(control_gap(&assessment(ControlStatus::Untested)).value, 70.0);
        assert_eq!(control_gap(&assessment(ControlStatus::Partial)).value, 50.0);
        assert_eq!(control_gap(&assessment(ControlStatus::Effective)).value, 20.0);
    }

    #[test]
    fn risk_prefers_consumer_duty_over_prudential() {
        assert_eq!(risk("Fair value assessment of capital products", false).value, 90.0);
        assert_eq!(risk("Maintain solvency coverage ratios", false).value, 80.0);
        assert_eq!(risk("Submit the annual return", false).value, 50.0);
        // Flag wins even without the language
        assert_eq!(risk("Submit the annual return", true).value, 90.0);
    }

    #[test]
    fn every_factor_is_bounded() {
        for doc_type in [
            DocumentType::HandbookRule,
            DocumentType::SupervisoryStatement,
            DocumentType::PolicyStatement,
            DocumentType::DearCeoLetter,
            DocumentType::Consultation,
            DocumentType::Guidance,
        ] {
            let value = severity(doc_type).value;
            assert!((0.0..=100.0).contains(&value));
        }
    }
}
