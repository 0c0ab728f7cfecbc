use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::damage::DamageCenter;
use crate::error::DomainError;
use crate::ids::{derive_part_id, new_center_id};
use crate::parts_search::PartResult;
use crate::value::Patch;

/// Named top-level subtree of a case record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SectionName {
    Meta,
    Vehicle,
    VehicleDetails,
    Stakeholders,
    DamageAssessment,
    Valuation,
    Financials,
    PartsSearch,
    Documents,
    Invoice,
    Estimate,
    System,
    /// Section unknown to this version. Merged generically.
    Other(String),
}

impl SectionName {
    /// Canonical wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Meta => "meta",
            Self::Vehicle => "vehicle",
            Self::VehicleDetails => "vehicleDetails",
            Self::Stakeholders => "stakeholders",
            Self::DamageAssessment => "damageAssessment",
            Self::Valuation => "valuation",
            Self::Financials => "financials",
            Self::PartsSearch => "partsSearch",
            Self::Documents => "documents",
            Self::Invoice => "invoice",
            Self::Estimate => "estimate",
            Self::System => "system",
            Self::Other(name) => name,
        }
    }

    /// Resolve a producer-supplied name, accepting legacy snake_case spellings.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "meta" | "case_info" => Self::Meta,
            "vehicle" => Self::Vehicle,
            "vehicleDetails" | "vehicle_details" | "car_details" | "carDetails" => {
                Self::VehicleDetails
            }
            "stakeholders" => Self::Stakeholders,
            "damageAssessment" | "damage_assessment" | "damage_centers" | "damage_blocks" => {
                Self::DamageAssessment
            }
            "valuation" => Self::Valuation,
            "financials" => Self::Financials,
            "partsSearch" | "parts_search" => Self::PartsSearch,
            "documents" => Self::Documents,
            "invoice" => Self::Invoice,
            "estimate" | "estimate_data" => Self::Estimate,
            "system" => Self::System,
            other => Self::Other(other.to_string()),
        }
    }

    /// Sections whose updates feed the legacy flat `car_details` mirror.
    pub fn feeds_legacy_mirror(&self) -> bool {
        matches!(
            self,
            Self::Meta | Self::Vehicle | Self::VehicleDetails | Self::Stakeholders
        )
    }
}

impl From<String> for SectionName {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<SectionName> for String {
    fn from(name: SectionName) -> Self {
        name.as_str().to_string()
    }
}

impl FromStr for SectionName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations on the `damageAssessment` list section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DamageOp {
    /// Replace the center with the same id, or append it.
    UpsertCenter { center: DamageCenter },
    RemoveCenter { id: String },
    /// Replace the whole list.
    ReplaceCenters { centers: Vec<DamageCenter> },
    /// Move a parts-search result into a center's parts and mark it selected.
    ImportPart { center_id: String, part_id: String },
}

/// Operations on the `partsSearch` list section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PartsSearchOp {
    /// Record a search and its hits; new hits land in `unselected`.
    RecordSearch {
        /// Identifies the search so that a replayed update is counted once.
        #[serde(default)]
        search_id: String,
        #[serde(default)]
        query: Value,
        #[serde(default)]
        results: Vec<PartResult>,
    },
    Select { part_ids: Vec<String> },
    Deselect { part_ids: Vec<String> },
    Clear,
}

/// Typed update for one section.
///
/// Record sections carry a structural patch; list sections carry a domain
/// operation. Exhaustive matching on this type is how the pipeline dispatches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "section", content = "payload", rename_all = "camelCase")]
pub enum SectionPayload {
    Meta(Patch),
    Vehicle(Patch),
    VehicleDetails(Patch),
    Stakeholders(Patch),
    Valuation(Patch),
    Financials(Patch),
    Documents(Patch),
    Invoice(Patch),
    Estimate(Patch),
    DamageAssessment(DamageOp),
    PartsSearch(PartsSearchOp),
    Other { section: String, patch: Patch },
}

impl SectionPayload {
    /// The section this payload targets.
    pub fn section(&self) -> SectionName {
        match self {
            Self::Meta(_) => SectionName::Meta,
            Self::Vehicle(_) => SectionName::Vehicle,
            Self::VehicleDetails(_) => SectionName::VehicleDetails,
            Self::Stakeholders(_) => SectionName::Stakeholders,
            Self::Valuation(_) => SectionName::Valuation,
            Self::Financials(_) => SectionName::Financials,
            Self::Documents(_) => SectionName::Documents,
            Self::Invoice(_) => SectionName::Invoice,
            Self::Estimate(_) => SectionName::Estimate,
            Self::DamageAssessment(_) => SectionName::DamageAssessment,
            Self::PartsSearch(_) => SectionName::PartsSearch,
            Self::Other { section, .. } => SectionName::Other(section.clone()),
        }
    }

    /// Build a typed payload from an untyped producer update.
    ///
    /// List sections accept an explicit `{"op": ...}` object or a legacy
    /// shape: a bare array (or `{"centers": [...]}`) replaces the damage
    /// centers, a single center object is upserted, and `{"results": [...]}`
    /// records a parts search. A legacy top-level `fees` section is folded
    /// into `financials.fees`.
    pub fn from_json(section: &str, value: Value) -> Result<Self, DomainError> {
        if section.trim() == "fees" {
            let fees = expect_object("fees", value)?;
            let mut patch = Map::new();
            patch.insert("fees".to_string(), Value::Object(fees));
            return Ok(Self::Financials(patch));
        }

        let name = SectionName::parse(section);
        match name {
            SectionName::Meta => Ok(Self::Meta(expect_object(section, value)?)),
            SectionName::Vehicle => Ok(Self::Vehicle(expect_object(section, value)?)),
            SectionName::VehicleDetails => {
                Ok(Self::VehicleDetails(expect_object(section, value)?))
            }
            SectionName::Stakeholders => Ok(Self::Stakeholders(expect_object(section, value)?)),
            SectionName::Valuation => Ok(Self::Valuation(expect_object(section, value)?)),
            SectionName::Financials => Ok(Self::Financials(expect_object(section, value)?)),
            SectionName::Documents => Ok(Self::Documents(expect_object(section, value)?)),
            SectionName::Invoice => Ok(Self::Invoice(expect_object(section, value)?)),
            SectionName::Estimate => Ok(Self::Estimate(expect_object(section, value)?)),
            SectionName::DamageAssessment => damage_op_from_json(section, value),
            SectionName::PartsSearch => parts_op_from_json(section, value),
            SectionName::System => Err(DomainError::ReadOnlySection(section.to_string())),
            SectionName::Other(name) => Ok(Self::Other {
                patch: expect_object(&name, value)?,
                section: name,
            }),
        }
    }

    /// Fill in ids the producer left out, so that the payload can be applied
    /// locally and replayed later without creating duplicates.
    pub fn assign_missing_ids(&mut self) {
        match self {
            Self::DamageAssessment(DamageOp::UpsertCenter { center }) => {
                if center.id.trim().is_empty() {
                    center.id = new_center_id();
                }
            }
            Self::DamageAssessment(DamageOp::ReplaceCenters { centers }) => {
                for center in centers.iter_mut().filter(|c| c.id.trim().is_empty()) {
                    center.id = new_center_id();
                }
            }
            Self::PartsSearch(PartsSearchOp::RecordSearch {
                search_id, results, ..
            }) => {
                if search_id.trim().is_empty() {
                    *search_id = format!("search-{}", Uuid::new_v4().simple());
                }
                for result in results.iter_mut().filter(|r| r.id.trim().is_empty()) {
                    result.id = derive_part_id(
                        &result.name,
                        &result.part_number,
                        &result.supplier,
                        result.price,
                    );
                }
            }
            _ => {}
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expect_object(section: &str, value: Value) -> Result<Patch, DomainError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DomainError::NotAnObject {
            section: section.to_string(),
            found: json_kind(&other),
        }),
    }
}

fn invalid(section: &str, err: serde_json::Error) -> DomainError {
    DomainError::InvalidPayload {
        section: section.to_string(),
        reason: err.to_string(),
    }
}

fn damage_op_from_json(section: &str, value: Value) -> Result<SectionPayload, DomainError> {
    let op = match value {
        Value::Array(_) => DamageOp::ReplaceCenters {
            centers: serde_json::from_value(value).map_err(|e| invalid(section, e))?,
        },
        Value::Object(ref map) if map.contains_key("op") => {
            serde_json::from_value(value).map_err(|e| invalid(section, e))?
        }
        Value::Object(mut map) => match map.remove("centers") {
            Some(centers @ Value::Array(_)) => DamageOp::ReplaceCenters {
                centers: serde_json::from_value(centers).map_err(|e| invalid(section, e))?,
            },
            _ => DamageOp::UpsertCenter {
                center: serde_json::from_value(Value::Object(map))
                    .map_err(|e| invalid(section, e))?,
            },
        },
        other => {
            return Err(DomainError::NotAnObject {
                section: section.to_string(),
                found: json_kind(&other),
            });
        }
    };
    Ok(SectionPayload::DamageAssessment(op))
}

fn parts_op_from_json(section: &str, value: Value) -> Result<SectionPayload, DomainError> {
    let mut map = expect_object(section, value)?;
    let op = if map.contains_key("op") {
        serde_json::from_value(Value::Object(map)).map_err(|e| invalid(section, e))?
    } else if let Some(results) = map.remove("results") {
        PartsSearchOp::RecordSearch {
            search_id: map
                .remove("search_id")
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            query: map.remove("query").unwrap_or(Value::Null),
            results: serde_json::from_value(results).map_err(|e| invalid(section, e))?,
        }
    } else {
        return Err(DomainError::InvalidPayload {
            section: section.to_string(),
            reason: "expected an `op` or a `results` list".to_string(),
        });
    };
    Ok(SectionPayload::PartsSearch(op))
}
