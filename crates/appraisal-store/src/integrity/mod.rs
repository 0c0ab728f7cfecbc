//! Read-only integrity reporting over a case record.
//!
//! Checks are grouped into four sub-modules:
//! - [`structural`]: required fields, id format, negative amounts, damage center shape.
//! - [`identity`]: plate agreement across sections, recorded alias conflicts.
//! - [`partition`]: parts-search selected/unselected partition and summary counters.
//! - [`completeness`]: per-category fill percentage.
//!
//! Each sub-module exposes `check(&CaseRecord, &mut Findings)`. The report
//! never blocks a write; persistence logs what [`validate_shape`] finds and
//! skips stored snapshots with [`shape_violations`].

mod completeness;
mod identity;
mod partition;
mod structural;

use std::collections::BTreeMap;
use std::fmt;

use appraisal_types::CaseRecord;
use serde::{Deserialize, Serialize};

use crate::error::IntegrityIssue;

/// Completeness percentage below which a category is reported.
pub const COMPLETENESS_WARNING_THRESHOLD: f64 = 50.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Vehicle,
    Stakeholders,
    Damage,
    Valuation,
    Financials,
    Documents,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::Vehicle,
        Self::Stakeholders,
        Self::Damage,
        Self::Valuation,
        Self::Financials,
        Self::Documents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vehicle => "vehicle",
            Self::Stakeholders => "stakeholders",
            Self::Damage => "damage",
            Self::Valuation => "valuation",
            Self::Financials => "financials",
            Self::Documents => "documents",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accumulator the sub-module checks write into.
#[derive(Debug, Default)]
pub struct Findings {
    errors: Vec<IntegrityIssue>,
    warnings: Vec<IntegrityIssue>,
    completeness: BTreeMap<Category, f64>,
}

impl Findings {
    pub(crate) fn push(&mut self, issue: IntegrityIssue) {
        if issue.is_error() {
            self.errors.push(issue);
        } else {
            self.warnings.push(issue);
        }
    }

    pub(crate) fn set_completeness(&mut self, category: Category, percent: f64) {
        self.completeness.insert(category, percent);
    }

    fn into_report(self) -> IntegrityReport {
        IntegrityReport {
            errors: self.errors,
            warnings: self.warnings,
            completeness: self.completeness,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntegrityReport {
    pub errors: Vec<IntegrityIssue>,
    pub warnings: Vec<IntegrityIssue>,
    pub completeness: BTreeMap<Category, f64>,
}

impl IntegrityReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn issues(&self) -> impl Iterator<Item = &IntegrityIssue> {
        self.errors.iter().chain(self.warnings.iter())
    }
}

/// Run every check group over the record.
pub fn report(record: &CaseRecord) -> IntegrityReport {
    let mut findings = Findings::default();
    structural::check(record, &mut findings);
    identity::check(record, &mut findings);
    partition::check(record, &mut findings);
    completeness::check(record, &mut findings);
    findings.into_report()
}

/// Structural and partition checks, as run around every save and load.
pub fn validate_shape(record: &CaseRecord) -> Vec<IntegrityIssue> {
    let mut findings = Findings::default();
    structural::check(record, &mut findings);
    partition::check(record, &mut findings);
    findings.into_report().issues().cloned().collect()
}

/// The subset of [`validate_shape`] that marks a stored snapshot as damaged.
pub fn shape_violations(record: &CaseRecord) -> Vec<IntegrityIssue> {
    validate_shape(record)
        .into_iter()
        .filter(IntegrityIssue::invalidates_snapshot)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: serde_json::Value) -> CaseRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn fresh_record_reports_missing_plate_and_empty_categories() {
        let report = report(&CaseRecord::new());
        assert_eq!(report.errors, vec![IntegrityIssue::MissingPlate]);
        assert_eq!(report.warnings.len(), Category::ALL.len());
        assert!(report.completeness.values().all(|p| *p == 0.0));
    }

    #[test]
    fn healthy_record_is_valid() {
        let rec = record(json!({
            "meta": {"plate": "1234567", "case_id": "CASE-1234567"},
            "vehicle": {"plate": "1234567", "manufacturer": "Kia"},
            "damageAssessment": {"centers": [{"id": "a", "location": "front"}]}
        }));
        let report = report(&rec);
        assert!(report.is_valid(), "{:?}", report.errors);
        assert_eq!(report.completeness[&Category::Vehicle], 100.0);
        assert_eq!(report.completeness[&Category::Damage], 100.0);
    }

    #[test]
    fn validate_shape_skips_other_groups() {
        let rec = record(json!({
            "meta": {"plate": "1234567"},
            "vehicle": {"plate": "7654321"}
        }));
        assert!(validate_shape(&rec).is_empty());
        assert!(!report(&rec).is_valid());
    }

    #[test]
    fn only_impossible_findings_damage_a_snapshot() {
        let rec = record(json!({
            "meta": {"case_id": "1234"},
            "damageAssessment": {"centers": [
                {"id": "a", "location": "front"},
                {"id": "a", "location": "rear"}
            ]},
            "partsSearch": {
                "selected": [{"id": "p1", "price": 10}],
                "unselected": [{"id": "p1", "price": 10}],
                "summary": {"selected_count": 1, "estimated_cost": 10}
            }
        }));
        assert_eq!(
            shape_violations(&rec),
            vec![
                IntegrityIssue::DuplicateCenterId {
                    center_id: "a".into()
                },
                IntegrityIssue::PartInBothLists {
                    part_id: "p1".into()
                },
            ]
        );
        assert!(shape_violations(&CaseRecord::new()).is_empty());
    }
}
