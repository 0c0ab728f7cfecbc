use appraisal_types::value::{as_number, first_number, get_path};
use appraisal_types::{CalculationResult, CenterTotal, DamageAssessment, DamageCenter, Section};
use serde_json::Value;
use tracing::debug;

/// Round to two decimals, half away from zero.
pub fn round(x: f64) -> f64 {
    if !x.is_finite() {
        return 0.0;
    }
    (x * 100.0).round() / 100.0
}

/// Damage as a percentage of a reference vehicle value. Zero when the
/// reference is not positive.
pub fn damage_percent(total_damage: f64, reference: f64) -> f64 {
    if reference <= 0.0 {
        return 0.0;
    }
    round(total_damage / reference * 100.0)
}

pub fn vat_amount(base: f64, rate: f64) -> f64 {
    round(base * rate / 100.0)
}

pub fn apply_vat(value: f64, rate: f64) -> f64 {
    round(value * (1.0 + rate / 100.0))
}

pub fn depreciation_amount(base: f64, percent: f64) -> f64 {
    round(base * percent / 100.0)
}

/// Market value left after the global depreciation percentage.
pub fn net_value_after_depreciation(market: f64, percent: f64) -> f64 {
    round(market - market * percent / 100.0)
}

/// Assessor fees. Each addend is zero when absent.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Fees {
    pub travel: f64,
    pub media: f64,
    pub office: f64,
}

const TRAVEL_ALIASES: &[&str] = &["travel", "transport", "travel_fee"];
const MEDIA_ALIASES: &[&str] = &["photography", "photos", "media", "photo_fee"];
const OFFICE_ALIASES: &[&str] = &["office", "office_fee"];

impl Fees {
    /// Read fees from a `financials.fees`-shaped object, accepting every
    /// historical field name.
    pub fn from_section(fees: &Section) -> Self {
        Self {
            travel: first_number(fees, TRAVEL_ALIASES).unwrap_or(0.0),
            media: first_number(fees, MEDIA_ALIASES).unwrap_or(0.0),
            office: first_number(fees, OFFICE_ALIASES).unwrap_or(0.0),
        }
    }
}

pub fn fees_subtotal(fees: &Fees) -> f64 {
    round(fees.travel + fees.media + fees.office)
}

pub fn total_compensation(total_damage: f64, depreciation: f64, fees: &Fees) -> f64 {
    round((total_damage - depreciation) + fees_subtotal(fees))
}

/// Per-center sums before rounding into a [`CenterTotal`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CenterBreakdown {
    pub center_id: String,
    pub parts: f64,
    pub repairs: f64,
    pub works: f64,
}

impl CenterBreakdown {
    pub fn of(center: &DamageCenter) -> Self {
        Self {
            center_id: center.id.clone(),
            parts: center
                .parts
                .iter()
                .map(|p| p.unit_price * p.quantity)
                .sum(),
            repairs: center.repairs.iter().map(|r| r.cost).sum(),
            works: center.works.iter().map(|w| w.cost).sum(),
        }
    }

    pub fn total(&self) -> f64 {
        round(self.parts + self.repairs + self.works)
    }
}

pub fn damage_center_total(center: &DamageCenter) -> f64 {
    CenterBreakdown::of(center).total()
}

/// Sum of all center totals.
pub fn document_total(assessment: &DamageAssessment) -> f64 {
    round(assessment.centers.iter().map(damage_center_total).sum())
}

/// One valuation adjustment line.
///
/// A non-zero percentage is applied to the running value; otherwise the
/// fixed amount is added as is.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Adjustment {
    pub percent: Option<f64>,
    pub amount: Option<f64>,
}

impl Adjustment {
    pub fn percent(percent: f64) -> Self {
        Self {
            percent: Some(percent),
            amount: None,
        }
    }

    pub fn fixed(amount: f64) -> Self {
        Self {
            percent: None,
            amount: Some(amount),
        }
    }

    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self {
                percent: map.get("percent").and_then(as_number),
                amount: ["amount", "value", "fixed"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(as_number)),
            },
            _ => Self::default(),
        }
    }

    pub fn applied_to(&self, current: f64) -> f64 {
        match (self.percent, self.amount) {
            (Some(p), _) if p != 0.0 => current * p / 100.0,
            (_, Some(a)) => a,
            _ => 0.0,
        }
    }
}

/// Base price plus the adjustments that depend only on the vehicle itself.
pub fn gross_value(base: f64, registration: &Adjustment, features: &Adjustment) -> f64 {
    round(base + features.applied_to(base) + registration.applied_to(base))
}

/// Gross value after usage adjustments, applied in sequence: ownership
/// type, then mileage, then number of previous owners.
pub fn market_value(
    gross: f64,
    ownership: &Adjustment,
    mileage: &Adjustment,
    owner_count: &Adjustment,
) -> f64 {
    let value = [ownership, mileage, owner_count]
        .into_iter()
        .fold(gross, |current, adj| current + adj.applied_to(current));
    round(value)
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValuationAdjustments {
    pub registration: Adjustment,
    pub features: Adjustment,
    pub ownership: Adjustment,
    pub mileage: Adjustment,
    pub owner_count: Adjustment,
}

impl ValuationAdjustments {
    fn from_section(valuation: &Section) -> Self {
        let adj = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| get_path(valuation, &format!("adjustments.{key}")))
                .map(Adjustment::from_value)
                .unwrap_or_default()
        };
        Self {
            registration: adj(&["registration"]),
            features: adj(&["features"]),
            ownership: adj(&["ownership", "ownership_type"]),
            mileage: adj(&["mileage", "km"]),
            owner_count: adj(&["owner_count", "ownership_history", "owners"]),
        }
    }
}

/// Everything the engine reads, extracted leniently from the record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalculationInputs {
    pub centers: Vec<CenterBreakdown>,
    pub base_price: f64,
    /// Quoted market value; replaces the computed one when positive.
    pub final_price: Option<f64>,
    pub adjustments: ValuationAdjustments,
    pub depreciation_percent: f64,
    /// Explicit depreciation amount; wins over the percentage.
    pub depreciation_amount: Option<f64>,
    pub fees: Fees,
}

impl CalculationInputs {
    pub fn from_sections(
        damage: &DamageAssessment,
        valuation: &Section,
        financials: &Section,
    ) -> Self {
        let fees = financials
            .get("fees")
            .and_then(Value::as_object)
            .map(Fees::from_section)
            .unwrap_or_default();

        Self {
            centers: damage.centers.iter().map(CenterBreakdown::of).collect(),
            base_price: first_number(valuation, &["base_price", "market_value"]).unwrap_or(0.0),
            final_price: first_number(valuation, &["final_price"]).filter(|v| *v > 0.0),
            adjustments: ValuationAdjustments::from_section(valuation),
            depreciation_percent: first_number(
                valuation,
                &["depreciation.global_percent", "depreciation.percent"],
            )
            .unwrap_or(0.0),
            depreciation_amount: first_number(
                valuation,
                &["depreciation.global_amount", "depreciation.amount"],
            ),
            fees,
        }
    }
}

/// Run every derived figure over one set of inputs.
pub fn calculate(inputs: &CalculationInputs, vat_rate: f64) -> CalculationResult {
    let center_totals: Vec<CenterTotal> = inputs
        .centers
        .iter()
        .map(|c| CenterTotal {
            center_id: c.center_id.clone(),
            total: c.total(),
        })
        .collect();
    let total_damage = round(center_totals.iter().map(|c| c.total).sum());

    let adj = &inputs.adjustments;
    let gross = gross_value(inputs.base_price, &adj.registration, &adj.features);
    let market = inputs
        .final_price
        .map(round)
        .unwrap_or_else(|| market_value(gross, &adj.ownership, &adj.mileage, &adj.owner_count));

    let depreciation = inputs
        .depreciation_amount
        .map(round)
        .unwrap_or_else(|| depreciation_amount(market, inputs.depreciation_percent));
    let compensation = total_compensation(total_damage, depreciation, &inputs.fees);

    debug!(
        centers = center_totals.len(),
        total_damage,
        compensation,
        vat_rate,
        "calculation complete"
    );

    CalculationResult {
        parts_total: round(inputs.centers.iter().map(|c| c.parts).sum()),
        repairs_total: round(inputs.centers.iter().map(|c| c.repairs).sum()),
        works_total: round(inputs.centers.iter().map(|c| c.works).sum()),
        center_totals,
        total_damage,
        depreciation,
        fees_subtotal: fees_subtotal(&inputs.fees),
        total_compensation: compensation,
        vat_rate,
        vat_amount: vat_amount(compensation, vat_rate),
        total_with_vat: apply_vat(compensation, vat_rate),
        gross_value: gross,
        market_value: market,
        damage_percent_gross: damage_percent(total_damage, gross),
        damage_percent_market: damage_percent(total_damage, market),
        net_market_value: net_value_after_depreciation(market, inputs.depreciation_percent),
    }
}
