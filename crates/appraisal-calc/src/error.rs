use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("VAT rate {0} is outside 0..=100")]
    InvalidRate(f64),
    #[error("failed to persist VAT rate: {0}")]
    RatePersist(String),
}
