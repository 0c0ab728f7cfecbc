//! Section dispatch: structural merge for record sections, domain handlers
//! for the two list sections.

mod damage;
mod parts_search;

use appraisal_types::{CaseRecord, DamageOp, DomainError, SectionName, SectionPayload};
use serde_json::{Map, Value};

use crate::merge::deep_merge;

/// Apply one payload to the record, pushing every written path to `written`.
pub(crate) fn dispatch(
    record: &mut CaseRecord,
    payload: &SectionPayload,
    written: &mut Vec<String>,
) -> Result<(), DomainError> {
    let name = payload.section();
    match payload {
        SectionPayload::DamageAssessment(op) => {
            damage::apply(&mut record.damage_assessment, &mut record.parts_search, op)?;
            written.push(name.to_string());
            if matches!(op, DamageOp::ImportPart { .. }) {
                written.push(SectionName::PartsSearch.to_string());
            }
        }
        SectionPayload::PartsSearch(op) => {
            parts_search::apply(&mut record.parts_search, op);
            written.push(name.to_string());
        }
        SectionPayload::Other { section, patch } => {
            let slot = record
                .extra
                .entry(section.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(target) = slot {
                deep_merge(target, patch, section, written);
            }
        }
        SectionPayload::Meta(patch)
        | SectionPayload::Vehicle(patch)
        | SectionPayload::VehicleDetails(patch)
        | SectionPayload::Stakeholders(patch)
        | SectionPayload::Valuation(patch)
        | SectionPayload::Financials(patch)
        | SectionPayload::Documents(patch)
        | SectionPayload::Invoice(patch)
        | SectionPayload::Estimate(patch) => {
            let prefix = name.to_string();
            let target = record
                .section_mut(&name)
                .ok_or_else(|| DomainError::ReadOnlySection(prefix.clone()))?;
            deep_merge(target, patch, &prefix, written);
        }
    }
    Ok(())
}
