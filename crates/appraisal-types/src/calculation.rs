use serde::{Deserialize, Serialize};

/// Total of one damage center, in display order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CenterTotal {
    pub center_id: String,
    pub total: f64,
}

/// Snapshot of every derived financial figure, written to
/// `financials.calculations` after each update.
///
/// All amounts are rounded to two decimals. Two damage percentages are kept
/// side by side: against the gross vehicle value (base price plus vehicle
/// property adjustments) and against the market value (gross plus usage
/// adjustments, or the quoted final price).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationResult {
    pub center_totals: Vec<CenterTotal>,
    pub parts_total: f64,
    pub repairs_total: f64,
    pub works_total: f64,
    pub total_damage: f64,
    pub depreciation: f64,
    pub fees_subtotal: f64,
    pub total_compensation: f64,
    pub vat_rate: f64,
    pub vat_amount: f64,
    pub total_with_vat: f64,
    pub gross_value: f64,
    pub market_value: f64,
    pub damage_percent_gross: f64,
    pub damage_percent_market: f64,
    pub net_market_value: f64,
}
