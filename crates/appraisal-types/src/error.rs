use thiserror;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("section `{section}` expects an object payload, got {found}")]
    NotAnObject { section: String, found: &'static str },
    #[error("section `{0}` is maintained by the store and cannot be written")]
    ReadOnlySection(String),
    #[error("invalid `{section}` payload: {reason}")]
    InvalidPayload { section: String, reason: String },
}
