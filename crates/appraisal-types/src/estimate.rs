use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::value::{lenient_f64, lenient_string};

/// Estimate type used until the assessor picks one (total loss in law).
pub const DEFAULT_ESTIMATE_TYPE: &str = "אובדן_להלכה";

/// Figures behind an estimate: damage base plus VAT.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimateCalculations {
    #[serde(deserialize_with = "lenient_f64")]
    pub base_damage: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub vat_rate: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub vat_amount: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub total_estimate: f64,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "String::is_empty")]
    pub calculated_at: String,
}

/// Which parts of an estimate are ready to be generated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimateValidation {
    pub car_details: bool,
    pub damage_sections: bool,
    pub calculations: bool,
    pub legal_text: bool,
    pub overall: bool,
}

/// Typed view of the `estimate` section.
///
/// Fields this version does not model are kept in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Estimate {
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    pub kind: String,
    #[serde(deserialize_with = "lenient_string")]
    pub legal_text: String,
    #[serde(deserialize_with = "lenient_string")]
    pub notes: String,
    pub calculations: EstimateCalculations,
    pub validation: EstimateValidation,
    pub completed: bool,
    #[serde(deserialize_with = "lenient_string")]
    pub generated_at: String,
    #[serde(deserialize_with = "lenient_string")]
    pub report_url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Estimate {
    fn default() -> Self {
        Self {
            kind: DEFAULT_ESTIMATE_TYPE.to_string(),
            legal_text: String::new(),
            notes: String::new(),
            calculations: EstimateCalculations::default(),
            validation: EstimateValidation::default(),
            completed: false,
            generated_at: String::new(),
            report_url: String::new(),
            extra: Map::new(),
        }
    }
}
