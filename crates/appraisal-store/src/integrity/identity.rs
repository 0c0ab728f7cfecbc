use appraisal_types::CaseRecord;
use appraisal_types::value::is_blank;

use crate::error::IntegrityIssue;
use crate::standardize::{normalize_plate, plate_locations, read_location};

use super::Findings;

pub(crate) fn check(record: &CaseRecord, findings: &mut Findings) {
    if let Some(plate) = record.plate() {
        let expected = normalize_plate(plate.into());
        for location in plate_locations().iter().skip(1) {
            let Some(found) = read_location(record, location).filter(|v| !is_blank(v)) else {
                continue;
            };
            let found = normalize_plate(found);
            if found != expected {
                findings.push(IntegrityIssue::PlateDivergence {
                    location: location.to_string(),
                    expected: plate.to_string(),
                    found: found.as_str().map(str::to_string).unwrap_or_else(|| found.to_string()),
                });
            }
        }
    }

    for conflict in &record.system.alias_conflicts {
        findings.push(IntegrityIssue::AliasConflict {
            concept: conflict.concept.clone(),
            winner: conflict.winner.clone(),
            overridden: conflict.overridden.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use appraisal_types::{AliasConflict, AliasValue};
    use serde_json::json;

    use super::*;

    #[test]
    fn formatting_differences_are_not_divergence() {
        let record: CaseRecord = serde_json::from_value(json!({
            "meta": {"plate": "1234567"},
            "vehicle": {"plate_number": "12-345-67"},
            "vehicleDetails": {"plate": "7654321"}
        }))
        .unwrap();
        let mut findings = Findings::default();
        check(&record, &mut findings);
        assert_eq!(
            findings.errors,
            vec![IntegrityIssue::PlateDivergence {
                location: "vehicleDetails.plate".into(),
                expected: "1234567".into(),
                found: "7654321".into(),
            }]
        );
    }

    #[test]
    fn recorded_conflicts_are_warnings() {
        let mut record = CaseRecord::new();
        record.system.alias_conflicts.push(AliasConflict {
            concept: "km".into(),
            winner: "vehicle.km".into(),
            chosen: json!(1),
            overridden: vec![AliasValue {
                location: "vehicle.odo".into(),
                value: json!(2),
            }],
        });
        let mut findings = Findings::default();
        check(&record, &mut findings);
        assert!(findings.errors.is_empty());
        assert_eq!(findings.warnings.len(), 1);
        assert_eq!(findings.warnings[0].to_string(), "km: 1 conflicting value(s) overridden by vehicle.km");
    }
}
