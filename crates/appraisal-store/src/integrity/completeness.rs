use appraisal_calc::round;
use appraisal_types::value::is_blank;
use appraisal_types::{CALCULATIONS_KEY, CaseRecord, Section};

use crate::error::IntegrityIssue;

use super::{COMPLETENESS_WARNING_THRESHOLD, Category, Findings};

pub(crate) fn check(record: &CaseRecord, findings: &mut Findings) {
    for category in Category::ALL {
        let percent = match category {
            Category::Vehicle => filled(&record.vehicle, &[]),
            Category::Stakeholders => filled(&record.stakeholders, &[]),
            Category::Damage => {
                if record.damage_assessment.is_empty() {
                    0.0
                } else {
                    100.0
                }
            }
            Category::Valuation => filled(&record.valuation, &[]),
            Category::Financials => filled(&record.financials, &[CALCULATIONS_KEY]),
            Category::Documents => filled(&record.documents, &[]),
        };
        findings.set_completeness(category, percent);
        if percent < COMPLETENESS_WARNING_THRESHOLD {
            findings.push(IntegrityIssue::LowCompleteness { category, percent });
        }
    }
}

/// Share of populated top-level keys, in percent. An empty section is 0.
fn filled(section: &Section, ignore: &[&str]) -> f64 {
    let values: Vec<_> = section
        .iter()
        .filter(|(key, _)| !ignore.contains(&key.as_str()))
        .map(|(_, value)| value)
        .collect();
    if values.is_empty() {
        return 0.0;
    }
    let populated = values.iter().filter(|v| !is_blank(v)).count();
    round(populated as f64 / values.len() as f64 * 100.0)
}
