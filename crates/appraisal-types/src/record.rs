use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::calculation::CalculationResult;
use crate::damage::DamageAssessment;
use crate::estimate::Estimate;
use crate::parts_search::PartsSearch;
use crate::pending::PendingUpdate;
use crate::section::SectionName;
use crate::value::{Section, get_path};

/// Record schema version written into `system.version`.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Key under `financials` owned by the calculation engine.
pub const CALCULATIONS_KEY: &str = "calculations";

/// Monotonic counters describing what the store did to this record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditCounters {
    pub updates_applied: u64,
    pub updates_queued: u64,
    pub updates_replayed: u64,
    pub sanitized_fields: u64,
}

/// A value found at one alias location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AliasValue {
    pub location: String,
    pub value: Value,
}

/// Two or more aliases of the same concept held different non-empty values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AliasConflict {
    pub concept: String,
    /// Location whose value won.
    pub winner: String,
    pub chosen: Value,
    pub overridden: Vec<AliasValue>,
}

/// Store-owned bookkeeping. Never writable through an update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSection {
    pub version: String,
    pub update_count: u64,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_backup_at: Option<DateTime<Utc>>,
    /// Leaf path (`section.a.b`) to the `update_count` that last wrote it.
    pub field_writes: BTreeMap<String, u64>,
    pub alias_conflicts: Vec<AliasConflict>,
    pub pending_updates: Vec<PendingUpdate>,
    pub audit: AuditCounters,
}

impl Default for SystemSection {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            update_count: 0,
            last_updated: None,
            last_saved_at: None,
            last_backup_at: None,
            field_writes: BTreeMap::new(),
            alias_conflicts: Vec::new(),
            pending_updates: Vec::new(),
            audit: AuditCounters::default(),
        }
    }
}

/// The root aggregate of one appraisal case.
///
/// Record sections are free-form JSON objects; the two list sections and
/// the system section are typed. Sections this version does not know are
/// carried verbatim in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaseRecord {
    pub meta: Section,
    pub vehicle: Section,
    #[serde(alias = "vehicle_details", alias = "car_details")]
    pub vehicle_details: Section,
    pub stakeholders: Section,
    #[serde(alias = "damage_assessment")]
    pub damage_assessment: DamageAssessment,
    pub valuation: Section,
    pub financials: Section,
    #[serde(alias = "parts_search")]
    pub parts_search: PartsSearch,
    pub documents: Section,
    pub invoice: Section,
    #[serde(alias = "estimate_data")]
    pub estimate: Section,
    pub system: SystemSection,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CaseRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh record for a new case with the given `meta` fields.
    pub fn with_meta(meta: Section) -> Self {
        Self {
            meta,
            ..Self::default()
        }
    }

    /// Borrow a free-form record section. `None` for list, system and
    /// unknown sections.
    pub fn section(&self, name: &SectionName) -> Option<&Section> {
        match name {
            SectionName::Meta => Some(&self.meta),
            SectionName::Vehicle => Some(&self.vehicle),
            SectionName::VehicleDetails => Some(&self.vehicle_details),
            SectionName::Stakeholders => Some(&self.stakeholders),
            SectionName::Valuation => Some(&self.valuation),
            SectionName::Financials => Some(&self.financials),
            SectionName::Documents => Some(&self.documents),
            SectionName::Invoice => Some(&self.invoice),
            SectionName::Estimate => Some(&self.estimate),
            SectionName::DamageAssessment
            | SectionName::PartsSearch
            | SectionName::System
            | SectionName::Other(_) => None,
        }
    }

    pub fn section_mut(&mut self, name: &SectionName) -> Option<&mut Section> {
        match name {
            SectionName::Meta => Some(&mut self.meta),
            SectionName::Vehicle => Some(&mut self.vehicle),
            SectionName::VehicleDetails => Some(&mut self.vehicle_details),
            SectionName::Stakeholders => Some(&mut self.stakeholders),
            SectionName::Valuation => Some(&mut self.valuation),
            SectionName::Financials => Some(&mut self.financials),
            SectionName::Documents => Some(&mut self.documents),
            SectionName::Invoice => Some(&mut self.invoice),
            SectionName::Estimate => Some(&mut self.estimate),
            SectionName::DamageAssessment
            | SectionName::PartsSearch
            | SectionName::System
            | SectionName::Other(_) => None,
        }
    }

    /// Value at a dotted path inside a record section.
    pub fn field(&self, name: &SectionName, path: &str) -> Option<&Value> {
        self.section(name).and_then(|s| get_path(s, path))
    }

    /// The authoritative plate (`meta.plate`), if set.
    pub fn plate(&self) -> Option<&str> {
        self.meta
            .get("plate")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    pub fn case_id(&self) -> Option<&str> {
        self.meta
            .get("case_id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
    }

    /// Last calculation snapshot, if one has been written.
    pub fn calculations(&self) -> Option<CalculationResult> {
        self.financials
            .get(CALCULATIONS_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Typed view of the estimate section; defaults when nothing usable is
    /// stored.
    pub fn estimate(&self) -> Estimate {
        serde_json::from_value(Value::Object(self.estimate.clone())).unwrap_or_default()
    }

    /// JSON value of one section, in its wire shape.
    pub fn section_value(&self, name: &SectionName) -> Option<Value> {
        match name {
            SectionName::DamageAssessment => serde_json::to_value(&self.damage_assessment).ok(),
            SectionName::PartsSearch => serde_json::to_value(&self.parts_search).ok(),
            SectionName::System => serde_json::to_value(&self.system).ok(),
            SectionName::Other(key) => self.extra.get(key).cloned(),
            _ => self.section(name).cloned().map(Value::Object),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn legacy_snake_case_sections_deserialize() {
        let record: CaseRecord = serde_json::from_value(json!({
            "meta": {"plate": "12-345-67", "case_id": "CASE-1"},
            "car_details": {"manufacturer": "Mazda"},
            "damage_assessment": {"damage_blocks": [{"id": "a", "center": "front"}]},
            "levisummary": {"final_price": 1}
        }))
        .unwrap();

        assert_eq!(record.vehicle_details.get("manufacturer"), Some(&json!("Mazda")));
        assert_eq!(record.damage_assessment.centers[0].location, "front");
        assert_eq!(record.extra.get("levisummary"), Some(&json!({"final_price": 1})));
        assert_eq!(record.plate(), Some("12-345-67"));
        assert_eq!(record.case_id(), Some("CASE-1"));
        assert_eq!(record.system.version, SCHEMA_VERSION);
    }

    #[test]
    fn serializes_with_camel_case_sections() {
        let value = serde_json::to_value(CaseRecord::new()).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert!(keys.contains(&"vehicleDetails"));
        assert!(keys.contains(&"damageAssessment"));
        assert!(keys.contains(&"partsSearch"));
    }

    #[test]
    fn round_trips_through_json() {
        let mut record = CaseRecord::new();
        record.meta.insert("plate".into(), json!("1234567"));
        record.extra.insert("custom".into(), json!({"a": [1, 2]}));
        record.system.field_writes.insert("meta.plate".into(), 3);

        let encoded = serde_json::to_string(&record).unwrap();
        let decoded: CaseRecord = serde_json::from_str(&encoded).unwrap();
        similar_asserts::assert_eq!(decoded, record);
    }

    #[test]
    fn section_accessors_cover_record_sections_only() {
        let mut record = CaseRecord::new();
        record
            .section_mut(&SectionName::Valuation)
            .unwrap()
            .insert("base_price".into(), json!(100000));
        assert_eq!(
            record.field(&SectionName::Valuation, "base_price"),
            Some(&json!(100000))
        );
        assert!(record.section(&SectionName::PartsSearch).is_none());
        assert!(record.section(&SectionName::Other("x".into())).is_none());
    }

    #[test]
    fn calculations_are_read_back_from_financials() {
        let mut record = CaseRecord::new();
        assert!(record.calculations().is_none());
        record.financials.insert(
            CALCULATIONS_KEY.into(),
            json!({"total_damage": 1000.0, "vat_rate": 17.0}),
        );
        let calc = record.calculations().unwrap();
        assert_eq!(calc.total_damage, 1000.0);
        assert_eq!(calc.vat_rate, 17.0);
    }

    #[test]
    fn estimate_view_reads_legacy_estimate_data() {
        let record: CaseRecord = serde_json::from_value(json!({
            "estimate_data": {"legal_text": "final", "completed": true}
        }))
        .unwrap();
        let estimate = record.estimate();
        assert_eq!(estimate.legal_text, "final");
        assert!(estimate.completed);
        assert_eq!(CaseRecord::new().estimate(), Estimate::default());
    }
}
