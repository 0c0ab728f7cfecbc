//! Levi price-guide report mapped onto the `valuation` section.
//!
//! The raw report is kept under `valuation.levi_report`. Its adjustments are
//! split into vehicle properties (gross value) and usage factors (market
//! value) and written where the calculation engine reads them.

use appraisal_types::value::as_number;
use appraisal_types::{DomainError, Patch};
use serde_json::{Map, Value, json};

/// Source tag on adjustments taken from a Levi report.
pub const LEVI_SOURCE: &str = "levi_ocr";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Group {
    Gross,
    Market,
}

impl Group {
    fn as_str(self) -> &'static str {
        match self {
            Self::Gross => "gross",
            Self::Market => "market",
        }
    }
}

struct LeviAdjustment {
    /// Keys the report may use, first match wins.
    report_keys: &'static [&'static str],
    /// Key under `valuation.adjustments`.
    target: &'static str,
    group: Group,
    description: &'static str,
}

const ADJUSTMENTS: &[LeviAdjustment] = &[
    LeviAdjustment {
        report_keys: &["features"],
        target: "features",
        group: Group::Gross,
        description: "מאפיינים",
    },
    LeviAdjustment {
        report_keys: &["registration"],
        target: "registration",
        group: Group::Gross,
        description: "עליה לכביש",
    },
    LeviAdjustment {
        report_keys: &["km", "mileage"],
        target: "mileage",
        group: Group::Market,
        description: "מס' ק\"מ",
    },
    LeviAdjustment {
        report_keys: &["ownership", "ownership_type"],
        target: "ownership",
        group: Group::Market,
        description: "סוג בעלות",
    },
    LeviAdjustment {
        report_keys: &["owner_count", "owners"],
        target: "owner_count",
        group: Group::Market,
        description: "מספר בעלים",
    },
];

/// One adjustment line. `amount` and `percent` carry the sign the engine
/// applies; `value` is the magnitude shown next to `type`.
fn adjustment_line(mapping: &LeviAdjustment, raw: &Value) -> Value {
    let amount = raw
        .get("value")
        .or_else(|| raw.get("amount"))
        .and_then(as_number)
        .unwrap_or(0.0);
    let percent = raw.get("percent").and_then(as_number).map(|p| {
        if amount < 0.0 {
            -p.abs()
        } else if amount > 0.0 {
            p.abs()
        } else {
            p
        }
    });
    json!({
        "description": mapping.description,
        "type": if amount > 0.0 { "plus" } else { "minus" },
        "amount": amount,
        "value": amount.abs(),
        "percent": percent,
        "category": mapping.target,
        "group": mapping.group.as_str(),
        "source": LEVI_SOURCE,
    })
}

/// Build the `valuation` patch for a Levi report.
pub fn valuation_patch(report: &Value) -> Result<Patch, DomainError> {
    let Value::Object(fields) = report else {
        return Err(DomainError::InvalidPayload {
            section: "valuation".to_string(),
            reason: "Levi report must be an object".to_string(),
        });
    };

    let mut patch = Map::new();
    patch.insert("levi_report".to_string(), report.clone());

    if let Some(Value::Object(raw)) = fields.get("adjustments") {
        let mut adjustments = Map::new();
        for mapping in ADJUSTMENTS {
            let Some(line) = mapping
                .report_keys
                .iter()
                .find_map(|key| raw.get(*key).filter(|v| v.is_object()))
            else {
                continue;
            };
            adjustments.insert(mapping.target.to_string(), adjustment_line(mapping, line));
        }
        if !adjustments.is_empty() {
            patch.insert("adjustments".to_string(), Value::Object(adjustments));
        }
    }

    for key in ["base_price", "final_price"] {
        if let Some(price) = fields.get(key).and_then(as_number).filter(|p| *p > 0.0) {
            patch.insert(key.to_string(), json!(price));
        }
    }
    Ok(patch)
}
