use std::collections::HashSet;

use appraisal_calc::round;
use appraisal_types::CaseRecord;

use crate::error::IntegrityIssue;

use super::Findings;

pub(crate) fn check(record: &CaseRecord, findings: &mut Findings) {
    let parts = &record.parts_search;
    let selected: HashSet<&str> = parts.selected.iter().map(|p| p.id.as_str()).collect();
    let mut reported = HashSet::new();
    for part in &parts.unselected {
        if selected.contains(part.id.as_str()) && reported.insert(part.id.as_str()) {
            findings.push(IntegrityIssue::PartInBothLists {
                part_id: part.id.clone(),
            });
        }
    }

    let count = parts.selected.len() as f64;
    if parts.summary.selected_count as f64 != count {
        findings.push(IntegrityIssue::SummaryMismatch {
            field: "selected_count",
            expected: count,
            actual: parts.summary.selected_count as f64,
        });
    }
    let cost = round(parts.selected.iter().map(|p| p.price).sum());
    if parts.summary.estimated_cost != cost {
        findings.push(IntegrityIssue::SummaryMismatch {
            field: "estimated_cost",
            expected: cost,
            actual: parts.summary.estimated_cost,
        });
    }
}

#[cfg(test)]
mod tests {
    use appraisal_types::PartResult;

    use super::*;

    fn part(id: &str, price: f64) -> PartResult {
        PartResult {
            id: id.into(),
            price,
            ..Default::default()
        }
    }

    #[test]
    fn overlap_and_stale_summary_are_reported() {
        let mut record = CaseRecord::new();
        record.parts_search.selected = vec![part("a", 10.0)];
        record.parts_search.unselected = vec![part("a", 10.0), part("b", 1.0)];

        let mut findings = Findings::default();
        check(&record, &mut findings);
        assert_eq!(
            findings.errors,
            vec![IntegrityIssue::PartInBothLists {
                part_id: "a".into()
            }]
        );
        assert_eq!(findings.warnings.len(), 2);
    }

    #[test]
    fn consistent_lists_pass() {
        let mut record = CaseRecord::new();
        record.parts_search.selected = vec![part("a", 10.0)];
        record.parts_search.refresh_summary();
        let mut findings = Findings::default();
        check(&record, &mut findings);
        assert!(findings.errors.is_empty() && findings.warnings.is_empty());
    }
}
