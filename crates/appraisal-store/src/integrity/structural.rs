use std::collections::HashSet;

use appraisal_types::value::number_at;
use appraisal_types::{CaseRecord, Section};

use crate::error::IntegrityIssue;

use super::Findings;

const CASE_ID_PREFIX: &str = "CASE-";
const VALUATION_AMOUNTS: &[&str] = &["base_price", "final_price", "market_value"];
const FEE_AMOUNTS: &[&str] = &["photography", "photos", "media", "office", "travel", "transport"];

pub(crate) fn check(record: &CaseRecord, findings: &mut Findings) {
    if record.plate().is_none() {
        findings.push(IntegrityIssue::MissingPlate);
    }
    if let Some(case_id) = record.case_id() {
        if !case_id.starts_with(CASE_ID_PREFIX) {
            findings.push(IntegrityIssue::MalformedCaseId {
                case_id: case_id.to_string(),
            });
        }
    }

    check_amounts(&record.valuation, "valuation", VALUATION_AMOUNTS, findings);
    if let Some(fees) = record.financials.get("fees").and_then(|v| v.as_object()) {
        check_amounts(fees, "financials.fees", FEE_AMOUNTS, findings);
    }

    let mut seen = HashSet::new();
    for center in &record.damage_assessment.centers {
        if center.location.trim().is_empty() {
            findings.push(IntegrityIssue::CenterWithoutLocation {
                center_id: center.id.clone(),
            });
        }
        if !center.id.is_empty() && !seen.insert(center.id.as_str()) {
            findings.push(IntegrityIssue::DuplicateCenterId {
                center_id: center.id.clone(),
            });
        }

        let prefix = format!("damageAssessment.{}", center.id);
        let amounts = center
            .parts
            .iter()
            .enumerate()
            .map(|(i, p)| (format!("{prefix}.parts[{i}].unit_price"), p.unit_price))
            .chain(
                center
                    .repairs
                    .iter()
                    .enumerate()
                    .map(|(i, r)| (format!("{prefix}.repairs[{i}].cost"), r.cost)),
            )
            .chain(
                center
                    .works
                    .iter()
                    .enumerate()
                    .map(|(i, w)| (format!("{prefix}.works[{i}].cost"), w.cost)),
            );
        for (path, value) in amounts {
            if value < 0.0 {
                findings.push(IntegrityIssue::NegativeAmount { path, value });
            }
        }
    }
}

fn check_amounts(section: &Section, prefix: &str, keys: &[&str], findings: &mut Findings) {
    for key in keys {
        if let Some(value) = number_at(section, key).filter(|v| *v < 0.0) {
            findings.push(IntegrityIssue::NegativeAmount {
                path: format!("{prefix}.{key}"),
                value,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn run(value: serde_json::Value) -> Findings {
        let record: CaseRecord = serde_json::from_value(value).unwrap();
        let mut findings = Findings::default();
        check(&record, &mut findings);
        findings
    }

    #[test]
    fn malformed_case_id_and_negative_amounts() {
        let findings = run(json!({
            "meta": {"plate": "1", "case_id": "1234"},
            "valuation": {"base_price": -5},
            "financials": {"fees": {"office": "-20"}}
        }));
        assert_eq!(
            findings.errors,
            vec![
                IntegrityIssue::MalformedCaseId {
                    case_id: "1234".into()
                },
                IntegrityIssue::NegativeAmount {
                    path: "valuation.base_price".into(),
                    value: -5.0
                },
                IntegrityIssue::NegativeAmount {
                    path: "financials.fees.office".into(),
                    value: -20.0
                },
            ]
        );
    }

    #[test]
    fn damage_center_shape() {
        let findings = run(json!({
            "meta": {"plate": "1"},
            "damageAssessment": {"centers": [
                {"id": "a", "location": "front"},
                {"id": "a", "location": ""},
                {"id": "b", "location": "rear", "repairs": [{"cost": -1}]}
            ]}
        }));
        assert_eq!(
            findings.errors,
            vec![
                IntegrityIssue::CenterWithoutLocation {
                    center_id: "a".into()
                },
                IntegrityIssue::DuplicateCenterId {
                    center_id: "a".into()
                },
                IntegrityIssue::NegativeAmount {
                    path: "damageAssessment.b.repairs[0].cost".into(),
                    value: -1.0
                },
            ]
        );
    }
}
