use appraisal_types::value::is_blank;
use appraisal_types::{CaseRecord, EstimateValidation};

/// Readiness of the estimate: identified vehicle, at least one damage
/// center, a positive total and legal text. `overall` needs all four.
pub fn estimate_validation(record: &CaseRecord) -> EstimateValidation {
    let estimate = record.estimate();
    let manufacturer = [&record.vehicle_details, &record.vehicle]
        .iter()
        .any(|section| section.get("manufacturer").is_some_and(|v| !is_blank(v)));

    let mut validation = EstimateValidation {
        car_details: manufacturer && record.plate().is_some(),
        damage_sections: !record.damage_assessment.centers.is_empty(),
        calculations: estimate.calculations.total_estimate > 0.0,
        legal_text: !estimate.legal_text.trim().is_empty(),
        overall: false,
    };
    validation.overall = validation.car_details
        && validation.damage_sections
        && validation.calculations
        && validation.legal_text;
    validation
}
