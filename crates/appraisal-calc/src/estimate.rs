use appraisal_types::{DamageAssessment, EstimateCalculations};
use tracing::debug;

use crate::engine::{document_total, round, vat_amount};

/// Damage the estimate is based on: an explicit positive figure entered by
/// the assessor, otherwise the sum of all damage center totals.
pub fn estimate_base_damage(damage: &DamageAssessment, explicit: Option<f64>) -> f64 {
    explicit
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(round)
        .unwrap_or_else(|| document_total(damage))
}

/// VAT and grand total over an estimate base. `calculated_at` is left for
/// the caller to stamp.
pub fn estimate_totals(base_damage: f64, vat_rate: f64) -> EstimateCalculations {
    let base_damage = round(base_damage);
    let vat = vat_amount(base_damage, vat_rate);
    let totals = EstimateCalculations {
        base_damage,
        vat_rate,
        vat_amount: vat,
        total_estimate: round(base_damage + vat),
        calculated_at: String::new(),
    };
    debug!(base_damage, vat_rate, total = totals.total_estimate, "estimate totals");
    totals
}

#[cfg(test)]
mod tests {
    use appraisal_types::{DamageCenter, Repair};
    use similar_asserts::assert_eq;

    use super::*;

    fn damage(costs: &[f64]) -> DamageAssessment {
        DamageAssessment {
            centers: costs
                .iter()
                .enumerate()
                .map(|(i, cost)| DamageCenter {
                    id: format!("c{i}"),
                    repairs: vec![Repair {
                        cost: *cost,
                        ..Default::default()
                    }],
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn totals_add_vat_to_the_base() {
        assert_eq!(
            estimate_totals(1000.0, 17.0),
            EstimateCalculations {
                base_damage: 1000.0,
                vat_rate: 17.0,
                vat_amount: 170.0,
                total_estimate: 1170.0,
                calculated_at: String::new(),
            }
        );
        assert_eq!(estimate_totals(0.0, 18.0).total_estimate, 0.0);
    }

    #[test]
    fn base_prefers_explicit_positive_figure() {
        let damage = damage(&[600.0, 400.5]);
        assert_eq!(estimate_base_damage(&damage, None), 1000.5);
        assert_eq!(estimate_base_damage(&damage, Some(0.0)), 1000.5);
        assert_eq!(estimate_base_damage(&damage, Some(f64::NAN)), 1000.5);
        assert_eq!(estimate_base_damage(&damage, Some(750.0)), 750.0);
    }
}
