use serde::{Deserialize, Serialize};

use crate::value::{lenient_f64, lenient_opt_f64, lenient_quantity, lenient_string};

/// A replacement part priced into a damage center.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Part {
    pub name: String,
    #[serde(alias = "desc")]
    pub description: String,
    #[serde(alias = "oem_code", deserialize_with = "lenient_string")]
    pub part_number: String,
    #[serde(alias = "price", deserialize_with = "lenient_f64")]
    pub unit_price: f64,
    #[serde(deserialize_with = "lenient_quantity")]
    pub quantity: f64,
    /// Original, aftermarket, used...
    pub source: String,
    /// New, repair, replace...
    pub condition: String,
    pub supplier: String,
    /// Parts-search result id this part was imported from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
}

impl Default for Part {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            part_number: String::new(),
            unit_price: 0.0,
            quantity: 1.0,
            source: String::new(),
            condition: String::new(),
            supplier: String::new(),
            origin_id: None,
        }
    }
}

/// Labour priced into a damage center.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repair {
    pub name: String,
    #[serde(alias = "desc")]
    pub description: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub cost: f64,
    #[serde(
        deserialize_with = "lenient_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub hours: Option<f64>,
}

/// Workshop work item (painting, alignment, calibration...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Work {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(alias = "notes")]
    pub note: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub cost: f64,
    pub required: bool,
}

impl Default for Work {
    fn default() -> Self {
        Self {
            kind: String::new(),
            note: String::new(),
            cost: 0.0,
            required: true,
        }
    }
}

/// One damaged area of the vehicle with its priced line items.
///
/// The three collections are unordered; only their sums matter to the
/// calculation engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageCenter {
    pub id: String,
    #[serde(alias = "center", alias = "zone")]
    pub location: String,
    pub description: String,
    pub severity: String,
    pub parts: Vec<Part>,
    pub repairs: Vec<Repair>,
    pub works: Vec<Work>,
}

/// The `damageAssessment` section: damage centers in display order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageAssessment {
    #[serde(alias = "damage_blocks", alias = "damage_centers")]
    pub centers: Vec<DamageCenter>,
}

impl DamageAssessment {
    pub fn center(&self, id: &str) -> Option<&DamageCenter> {
        self.centers.iter().find(|c| c.id == id)
    }

    pub fn center_mut(&mut self, id: &str) -> Option<&mut DamageCenter> {
        self.centers.iter_mut().find(|c| c.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn legacy_block_shape_deserializes() {
        let center: DamageCenter = serde_json::from_value(json!({
            "id": "dc-1",
            "center": "front",
            "parts": [{"name": "bumper", "desc": "front bumper", "price": "1,200", "oem_code": 5512}],
            "repairs": [{"name": "straighten", "cost": "300", "hours": ""}],
            "works": [{"type": "paint", "notes": "two coats", "cost": 450}]
        }))
        .unwrap();

        assert_eq!(center.location, "front");
        assert_eq!(center.parts[0].description, "front bumper");
        assert_eq!(center.parts[0].unit_price, 1200.0);
        assert_eq!(center.parts[0].quantity, 1.0);
        assert_eq!(center.parts[0].part_number, "5512");
        assert_eq!(center.repairs[0].hours, None);
        assert_eq!(center.works[0].note, "two coats");
        assert!(center.works[0].required);
    }

    #[test]
    fn assessment_lookup_by_id() {
        let mut assessment = DamageAssessment {
            centers: vec![DamageCenter {
                id: "a".into(),
                ..Default::default()
            }],
        };
        assert!(assessment.center("a").is_some());
        assert!(assessment.center("b").is_none());
        assessment.center_mut("a").unwrap().severity = "severe".into();
        assert_eq!(assessment.centers[0].severity, "severe");
    }
}
