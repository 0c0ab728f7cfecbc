mod engine;
mod error;
mod estimate;
mod vat;

pub use engine::{
    Adjustment, CalculationInputs, CenterBreakdown, Fees, ValuationAdjustments, apply_vat,
    calculate, damage_center_total, damage_percent, depreciation_amount, document_total,
    fees_subtotal, gross_value, market_value, net_value_after_depreciation, round,
    total_compensation, vat_amount,
};
pub use error::CalcError;
pub use estimate::{estimate_base_damage, estimate_totals};
pub use vat::{
    DEFAULT_HOST_TIMEOUT, DEFAULT_VAT_RATE, HostContextProvider, HostRateSource,
    PersistedRateProvider, RateProvider, RateSource, RateStore, ResolvedRate, VatRates,
    validate_rate,
};
