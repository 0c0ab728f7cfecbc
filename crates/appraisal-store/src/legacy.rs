use appraisal_types::value::is_blank;
use appraisal_types::{CaseRecord, Section};
use serde_json::Value;

use crate::standardize::read_location;

/// Flat `car_details` keys and the record locations they are read from,
/// first populated location wins.
const MIRROR_FIELDS: &[(&str, &[&str])] = &[
    ("plate", &["meta.plate"]),
    ("owner", &["stakeholders.owner.name", "vehicle.owner"]),
    ("ownerPhone", &["stakeholders.owner.phone"]),
    ("ownerAddress", &["stakeholders.owner.address"]),
    ("manufacturer", &["vehicle.manufacturer"]),
    ("model", &["vehicle.model"]),
    ("year", &["vehicle.year"]),
    ("trim", &["vehicle.trim"]),
    ("chassis", &["vehicle.chassis"]),
    ("model_code", &["vehicle.model_code"]),
    ("model_type", &["vehicle.model_type"]),
    ("ownership_type", &["vehicle.ownership_type"]),
    ("ownership", &["vehicle.ownership_type"]),
    ("km", &["vehicle.km"]),
    ("odo", &["vehicle.km"]),
    (
        "market_value",
        &[
            "valuation.final_price",
            "vehicle.market_value",
            "financials.calculations.market_value",
        ],
    ),
    ("shaveh_percent", &["valuation.depreciation.global_percent"]),
    ("garageName", &["stakeholders.garage.name"]),
    ("garagePhone", &["stakeholders.garage.phone"]),
    ("garageEmail", &["stakeholders.garage.email"]),
    ("agentName", &["stakeholders.insurance.agent.name"]),
    ("insurance_agent_phone", &["stakeholders.insurance.agent.phone"]),
    ("insurance_agent_email", &["stakeholders.insurance.agent.email"]),
    ("insuranceCompany", &["stakeholders.insurance.company"]),
    ("insuranceEmail", &["stakeholders.insurance.email"]),
    ("damageDate", &["meta.damage_date"]),
    ("damageType", &["meta.damage_type"]),
];

/// Build the read-only flat view consumed by modules that predate the
/// sectioned record. Every key is present; missing values are `""`.
pub fn legacy_mirror(record: &CaseRecord) -> Section {
    MIRROR_FIELDS
        .iter()
        .map(|(key, locations)| {
            let value = locations
                .iter()
                .filter_map(|location| read_location(record, location))
                .find(|v| !is_blank(v))
                .unwrap_or_else(|| Value::String(String::new()));
            (key.to_string(), value)
        })
        .collect()
}
