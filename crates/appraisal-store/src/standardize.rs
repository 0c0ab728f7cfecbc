use std::collections::BTreeSet;

use appraisal_types::value::{as_number, is_blank};
use appraisal_types::{AliasConflict, AliasValue, CaseRecord, SectionName, SystemSection};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::StoreConfig;

/// Severity given to damage centers created without one.
pub const DEFAULT_CENTER_SEVERITY: &str = "medium";

/// One concept stored under several historical locations.
struct AliasGroup {
    concept: &'static str,
    /// `section.path` locations; earlier ones win ties.
    locations: &'static [&'static str],
    normalize: fn(Value) -> Value,
}

fn keep(value: Value) -> Value {
    value
}

/// Plate numbers are compared and stored without dashes or whitespace.
pub fn normalize_plate(value: Value) -> Value {
    let raw = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => return other,
    };
    Value::String(
        raw.chars()
            .filter(|c| *c != '-' && !c.is_whitespace())
            .collect(),
    )
}

const ALIAS_GROUPS: &[AliasGroup] = &[
    AliasGroup {
        concept: "plate",
        locations: &[
            "meta.plate",
            "vehicle.plate",
            "vehicle.plate_number",
            "vehicleDetails.plate",
            "vehicleDetails.plate_number",
        ],
        normalize: normalize_plate,
    },
    AliasGroup {
        concept: "km",
        locations: &["vehicle.km", "vehicle.odo", "vehicleDetails.km", "vehicleDetails.odo"],
        normalize: keep,
    },
    AliasGroup {
        concept: "manufacturer",
        locations: &[
            "vehicle.manufacturer",
            "vehicle.make",
            "vehicleDetails.manufacturer",
            "vehicleDetails.make",
        ],
        normalize: keep,
    },
    AliasGroup {
        concept: "ownership_type",
        locations: &[
            "vehicle.ownership_type",
            "vehicle.ownership",
            "vehicleDetails.ownership_type",
            "vehicleDetails.ownership",
        ],
        normalize: keep,
    },
    AliasGroup {
        concept: "drive_type",
        locations: &[
            "vehicle.drive_type",
            "vehicle.drive",
            "vehicleDetails.drive_type",
            "vehicleDetails.drive",
        ],
        normalize: keep,
    },
    AliasGroup {
        concept: "owner_name",
        locations: &["stakeholders.owner.name", "vehicle.owner", "vehicleDetails.owner"],
        normalize: keep,
    },
    AliasGroup {
        concept: "garage_name",
        locations: &[
            "stakeholders.garage.name",
            "vehicle.garage_name",
            "vehicleDetails.garage_name",
        ],
        normalize: keep,
    },
    AliasGroup {
        concept: "insurance_company",
        locations: &[
            "stakeholders.insurance.company",
            "vehicle.insurance_company",
            "vehicleDetails.insurance_company",
        ],
        normalize: keep,
    },
    AliasGroup {
        concept: "damage_date",
        locations: &["meta.damage_date", "vehicle.damage_date", "vehicleDetails.damage_date"],
        normalize: keep,
    },
    AliasGroup {
        concept: "damage_type",
        locations: &["meta.damage_type", "vehicle.damage_type", "vehicleDetails.damage_type"],
        normalize: keep,
    },
    AliasGroup {
        concept: "inspection_location",
        locations: &[
            "meta.inspection_location",
            "meta.location",
            "vehicle.inspection_location",
            "vehicleDetails.inspection_location",
        ],
        normalize: keep,
    },
];

/// Resolves field aliases to one value per concept and back-fills every
/// alias location.
///
/// Non-empty values win over empty ones. Conflicting non-empty values are
/// resolved by recency (`system.field_writes`), then by alias order, and
/// recorded in `system.alias_conflicts`. Running it twice gives the same
/// record as running it once.
#[derive(Debug, Clone)]
pub struct Standardizer {
    max_alias_conflicts: usize,
}

impl Default for Standardizer {
    fn default() -> Self {
        Self {
            max_alias_conflicts: StoreConfig::default().max_alias_conflicts,
        }
    }
}

impl Standardizer {
    pub fn new(max_alias_conflicts: usize) -> Self {
        Self {
            max_alias_conflicts,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.max_alias_conflicts)
    }

    pub fn standardize(&self, mut record: CaseRecord) -> CaseRecord {
        self.apply(&mut record);
        record
    }

    /// Standardize in place; returns the number of conflicts resolved.
    pub fn apply(&self, record: &mut CaseRecord) -> usize {
        let mut conflicts = Vec::new();
        for group in ALIAS_GROUPS {
            resolve_group(record, group, &mut conflicts);
        }
        mirror_vehicle_details(record, &mut conflicts);

        for center in &mut record.damage_assessment.centers {
            if center.severity.trim().is_empty() {
                center.severity = DEFAULT_CENTER_SEVERITY.to_string();
            }
        }

        let resolved = conflicts.len();
        for conflict in conflicts {
            debug!(
                concept = %conflict.concept,
                winner = %conflict.winner,
                overridden = conflict.overridden.len(),
                "alias conflict resolved"
            );
            record_conflict(&mut record.system, conflict, self.max_alias_conflicts);
        }
        resolved
    }
}

/// [`Standardizer::standardize`] with default settings.
pub fn standardize(record: CaseRecord) -> CaseRecord {
    Standardizer::default().standardize(record)
}

fn split_location(location: &str) -> Option<(SectionName, &str)> {
    let (section, path) = location.split_once('.')?;
    Some((SectionName::parse(section), path))
}

fn read(record: &CaseRecord, location: &str) -> Option<Value> {
    let (name, path) = split_location(location)?;
    record.field(&name, path).cloned()
}

/// Write at `location` unless an intermediate on the path is a non-object
/// value, which would be destroyed.
fn write(record: &mut CaseRecord, location: &str, value: Value) -> bool {
    let Some((name, path)) = split_location(location) else {
        return false;
    };
    let Some(section) = record.section_mut(&name) else {
        return false;
    };
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else {
        return false;
    };
    let mut current: &mut Map<String, Value> = section;
    for segment in segments {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match slot {
            Value::Object(map) => map,
            _ => return false,
        };
    }
    current.insert(last.to_string(), value);
    true
}

/// Latest write stamp at `location` or anywhere beneath it.
fn stamp(system: &SystemSection, location: &str) -> u64 {
    let nested = format!("{location}.");
    system
        .field_writes
        .range(location.to_string()..)
        .take_while(|(path, _)| path.as_str() == location || path.starts_with(&nested))
        .map(|(_, seq)| *seq)
        .max()
        .unwrap_or(0)
}

/// Equal as JSON, as numbers, or as trimmed strings.
fn same_value(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.trim() == y.trim(),
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y && !a.is_object() && !b.is_object(),
            _ => false,
        },
    }
}

fn resolve_group(record: &mut CaseRecord, group: &AliasGroup, conflicts: &mut Vec<AliasConflict>) {
    let found: Vec<(usize, &str, Value, u64)> = group
        .locations
        .iter()
        .enumerate()
        .filter_map(|(order, location)| {
            let value = read(record, location).filter(|v| !is_blank(v))?;
            let value = (group.normalize)(value);
            Some((order, *location, value, stamp(&record.system, location)))
        })
        .collect();

    let Some(winner) = found
        .iter()
        .max_by(|a, b| a.3.cmp(&b.3).then(b.0.cmp(&a.0)))
        .cloned()
    else {
        return;
    };
    let (_, winner_location, chosen, _) = winner;

    let overridden: Vec<AliasValue> = found
        .iter()
        .filter(|(_, _, value, _)| !same_value(value, &chosen))
        .map(|(_, location, value, _)| AliasValue {
            location: location.to_string(),
            value: value.clone(),
        })
        .collect();
    if !overridden.is_empty() {
        conflicts.push(AliasConflict {
            concept: group.concept.to_string(),
            winner: winner_location.to_string(),
            chosen: chosen.clone(),
            overridden,
        });
    }

    for location in group.locations {
        if read(record, location).as_ref() != Some(&chosen) {
            write(record, location, chosen.clone());
        }
    }
}

/// Make `vehicle` and `vehicleDetails` carry the same populated keys with
/// identical values.
fn mirror_vehicle_details(record: &mut CaseRecord, conflicts: &mut Vec<AliasConflict>) {
    let keys: BTreeSet<String> = record
        .vehicle
        .keys()
        .chain(record.vehicle_details.keys())
        .cloned()
        .collect();

    for key in keys {
        let primary = record.vehicle.get(&key).filter(|v| !is_blank(v)).cloned();
        let legacy = record
            .vehicle_details
            .get(&key)
            .filter(|v| !is_blank(v))
            .cloned();

        match (primary, legacy) {
            (Some(value), None) => {
                record.vehicle_details.insert(key, value);
            }
            (None, Some(value)) => {
                record.vehicle.insert(key, value);
            }
            (Some(a), Some(b)) if a != b => {
                let vehicle_location = format!("vehicle.{key}");
                let details_location = format!("vehicleDetails.{key}");
                let details_newer = stamp(&record.system, &details_location)
                    > stamp(&record.system, &vehicle_location);
                let (winner, chosen, loser, lost) = if details_newer {
                    (details_location, b, vehicle_location, a)
                } else {
                    (vehicle_location, a, details_location, b)
                };
                if !same_value(&chosen, &lost) {
                    conflicts.push(AliasConflict {
                        concept: key.clone(),
                        winner,
                        chosen: chosen.clone(),
                        overridden: vec![AliasValue {
                            location: loser,
                            value: lost,
                        }],
                    });
                }
                record.vehicle.insert(key.clone(), chosen.clone());
                record.vehicle_details.insert(key, chosen);
            }
            _ => {}
        }
    }
}

/// Same concept, chosen value and overridden values. Locations are ignored:
/// re-applying the same writes in another order moves the winner between
/// aliases without creating a new disagreement.
fn same_conflict(a: &AliasConflict, b: &AliasConflict) -> bool {
    let covers = |x: &[AliasValue], y: &[AliasValue]| {
        x.iter()
            .all(|v| y.iter().any(|w| same_value(&v.value, &w.value)))
    };
    a.concept == b.concept
        && same_value(&a.chosen, &b.chosen)
        && covers(&a.overridden, &b.overridden)
        && covers(&b.overridden, &a.overridden)
}

/// Append unless the same conflict is already recorded; drop the oldest
/// beyond `max`.
fn record_conflict(system: &mut SystemSection, conflict: AliasConflict, max: usize) {
    if max == 0
        || system
            .alias_conflicts
            .iter()
            .any(|known| same_conflict(known, &conflict))
    {
        return;
    }
    system.alias_conflicts.push(conflict);
    let excess = system.alias_conflicts.len().saturating_sub(max);
    if excess > 0 {
        system.alias_conflicts.drain(..excess);
    }
}

/// Every location holding the plate, authoritative one first.
pub fn plate_locations() -> &'static [&'static str] {
    ALIAS_GROUPS[0].locations
}

/// Read the value at an alias location such as `vehicle.plate_number`.
pub fn read_location(record: &CaseRecord, location: &str) -> Option<Value> {
    read(record, location)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> CaseRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn plate_is_normalized_and_backfilled() {
        let out = standardize(record(json!({
            "vehicle": {"plate_number": "12-345 67"}
        })));
        assert_eq!(out.meta["plate"], json!("1234567"));
        assert_eq!(out.vehicle["plate"], json!("1234567"));
        assert_eq!(out.vehicle_details["plate_number"], json!("1234567"));
        assert!(out.system.alias_conflicts.is_empty());
    }

    #[test]
    fn non_empty_wins_over_empty_alias() {
        let out = standardize(record(json!({
            "meta": {"plate": ""},
            "vehicle": {"plate": "7654321", "km": "", "odo": 120000}
        })));
        assert_eq!(out.meta["plate"], json!("7654321"));
        assert_eq!(out.vehicle["km"], json!(120000));
        assert!(out.system.alias_conflicts.is_empty());
    }

    #[test]
    fn most_recent_write_wins_conflicts() {
        let mut input = record(json!({
            "meta": {"plate": "1111111"},
            "vehicle": {"plate": "2222222"}
        }));
        input.system.field_writes.insert("meta.plate".into(), 1);
        input.system.field_writes.insert("vehicle.plate".into(), 2);

        let out = standardize(input);
        assert_eq!(out.meta["plate"], json!("2222222"));
        let conflict = &out.system.alias_conflicts[0];
        assert_eq!(conflict.concept, "plate");
        assert_eq!(conflict.winner, "vehicle.plate");
        assert_eq!(conflict.overridden[0].value, json!("1111111"));
    }

    #[test]
    fn ties_fall_back_to_alias_order() {
        let out = standardize(record(json!({
            "stakeholders": {"garage": {"name": "Alpha"}},
            "vehicle": {"garage_name": "Beta"}
        })));
        assert_eq!(out.vehicle["garage_name"], json!("Alpha"));
        assert_eq!(out.system.alias_conflicts[0].winner, "stakeholders.garage.name");
    }

    #[test]
    fn legacy_scalar_intermediate_is_not_clobbered() {
        let out = standardize(record(json!({
            "stakeholders": {"garage": "Legacy garage"},
            "vehicle": {"garage_name": "Beta"}
        })));
        assert_eq!(out.stakeholders["garage"], json!("Legacy garage"));
    }

    #[test]
    fn vehicle_and_details_mirror_each_other() {
        let mut input = record(json!({
            "vehicle": {"model": "3", "year": 2019},
            "vehicleDetails": {"trim": "Sport", "year": 2018}
        }));
        input.system.field_writes.insert("vehicleDetails.year".into(), 5);
        let out = standardize(input);

        assert_eq!(out.vehicle["trim"], json!("Sport"));
        assert_eq!(out.vehicle_details["model"], json!("3"));
        assert_eq!(out.vehicle["year"], json!(2018));
        assert_eq!(out.vehicle_details["year"], json!(2018));
    }

    #[test]
    fn standardize_is_idempotent() {
        let mut input = record(json!({
            "meta": {"plate": "11-111-11", "location": "Haifa"},
            "vehicle": {"plate": "2222222", "make": "Kia", "odo": "5,000"},
            "vehicleDetails": {"manufacturer": "Hyundai", "km": 4000},
            "stakeholders": {"owner": {"name": "Dana"}},
            "damageAssessment": {"centers": [{"id": "a"}]}
        }));
        input.system.field_writes.insert("vehicleDetails.manufacturer".into(), 3);

        let once = standardize(input);
        let twice = standardize(once.clone());
        similar_asserts::assert_eq!(once, twice);
        assert_eq!(once.damage_assessment.centers[0].severity, "medium");
        assert_eq!(once.vehicle["manufacturer"], json!("Hyundai"));
    }

    #[test]
    fn conflict_log_is_bounded() {
        let standardizer = Standardizer::new(1);
        let mut rec = record(json!({"meta": {"plate": "1"}, "vehicle": {"plate": "2"}}));
        standardizer.apply(&mut rec);
        rec.vehicle.insert("km".into(), json!(1));
        rec.vehicle_details.insert("km".into(), json!(2));
        standardizer.apply(&mut rec);
        assert_eq!(rec.system.alias_conflicts.len(), 1);
        assert_eq!(rec.system.alias_conflicts[0].concept, "km");
    }

    #[test]
    fn mirror_unifies_equal_values_of_different_types() {
        let mut input = record(json!({
            "vehicle": {"year": "2019"},
            "vehicleDetails": {"year": 2019}
        }));
        input.system.field_writes.insert("vehicleDetails.year".into(), 2);
        let out = standardize(input);
        assert_eq!(out.vehicle["year"], json!(2019));
        assert_eq!(out.vehicle_details["year"], json!(2019));
        assert!(out.system.alias_conflicts.is_empty());
    }

    #[test]
    fn same_disagreement_from_another_alias_is_logged_once() {
        let mut rec = record(json!({"meta": {"plate": "1111111"}, "vehicle": {"plate": "2222222"}}));
        rec.system.field_writes.insert("vehicle.plate".into(), 2);
        let standardizer = Standardizer::default();
        standardizer.apply(&mut rec);

        rec.meta.insert("plate".into(), json!("1111111"));
        rec.vehicle_details.insert("plate_number".into(), json!("22-222-22"));
        rec.system.field_writes.insert("meta.plate".into(), 3);
        rec.system.field_writes.insert("vehicleDetails.plate_number".into(), 4);
        standardizer.apply(&mut rec);

        assert_eq!(rec.meta["plate"], json!("2222222"));
        assert_eq!(rec.system.alias_conflicts.len(), 1);
        assert_eq!(rec.system.alias_conflicts[0].winner, "vehicle.plate");
    }
}
