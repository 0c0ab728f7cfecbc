use appraisal_calc::CalcError;
use appraisal_types::{DomainError, ErrorKind, Severity, StoreDiagnostic};

use crate::integrity::Category;

/// Describes one finding of the integrity reporter.
#[derive(Clone, Debug, PartialEq)]
pub enum IntegrityIssue {
    /// `meta.plate` is empty.
    MissingPlate,
    /// `meta.case_id` does not start with `CASE-`.
    MalformedCaseId { case_id: String },
    NegativeAmount { path: String, value: f64 },
    CenterWithoutLocation { center_id: String },
    DuplicateCenterId { center_id: String },
    /// An alias location holds a plate other than the authoritative one.
    PlateDivergence {
        location: String,
        expected: String,
        found: String,
    },
    /// The standardizer resolved a conflict between aliases.
    AliasConflict {
        concept: String,
        winner: String,
        overridden: usize,
    },
    /// A part id is both selected and unselected.
    PartInBothLists { part_id: String },
    SummaryMismatch {
        field: &'static str,
        expected: f64,
        actual: f64,
    },
    LowCompleteness { category: Category, percent: f64 },
}

impl IntegrityIssue {
    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingPlate
            | Self::MalformedCaseId { .. }
            | Self::NegativeAmount { .. }
            | Self::CenterWithoutLocation { .. }
            | Self::DuplicateCenterId { .. }
            | Self::PlateDivergence { .. }
            | Self::PartInBothLists { .. } => Severity::Error,
            Self::AliasConflict { .. }
            | Self::SummaryMismatch { .. }
            | Self::LowCompleteness { .. } => Severity::Warning,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity() >= Severity::Error
    }

    /// Findings the pipeline never produces. A stored snapshot carrying one
    /// was not written by a healthy store.
    pub fn invalidates_snapshot(&self) -> bool {
        matches!(
            self,
            Self::DuplicateCenterId { .. } | Self::PartInBothLists { .. }
        )
    }
}

impl std::fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPlate => write!(f, "plate number is required"),
            Self::MalformedCaseId { case_id } => {
                write!(f, "case id '{case_id}' should start with CASE-")
            }
            Self::NegativeAmount { path, value } => {
                write!(f, "negative amount {value} at {path}")
            }
            Self::CenterWithoutLocation { center_id } => {
                write!(f, "damage center {center_id} has no location")
            }
            Self::DuplicateCenterId { center_id } => {
                write!(f, "damage center id {center_id} is used more than once")
            }
            Self::PlateDivergence {
                location,
                expected,
                found,
            } => write!(
                f,
                "plate mismatch at {location}: expected '{expected}', found '{found}'"
            ),
            Self::AliasConflict {
                concept,
                winner,
                overridden,
            } => write!(
                f,
                "{concept}: {overridden} conflicting value(s) overridden by {winner}"
            ),
            Self::PartInBothLists { part_id } => {
                write!(f, "part {part_id} is both selected and unselected")
            }
            Self::SummaryMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "parts summary {field} is {actual}, lists give {expected}"
            ),
            Self::LowCompleteness { category, percent } => {
                write!(f, "{category} section only {percent}% complete")
            }
        }
    }
}

/// Errors raised by a [`crate::KeyValueStore`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O on key `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid storage key `{0}`")]
    InvalidKey(String),
}

/// Errors produced by snapshot persistence.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("read-back of `{key}` did not match the written snapshot (backup restored: {restored})")]
    VerificationFailed { key: String, restored: bool },
}

impl PersistenceError {
    pub fn diagnostic(&self) -> StoreDiagnostic {
        match self {
            Self::VerificationFailed { key, .. } => {
                StoreDiagnostic::new(ErrorKind::Persistence, "snapshot verification failed")
                    .with_severity(Severity::Critical)
                    .with_detail(format!("key={key}"))
            }
            other => StoreDiagnostic::new(ErrorKind::Persistence, "snapshot write failed")
                .with_detail(other.to_string()),
        }
    }
}

/// Errors surfaced by [`crate::CaseStore`] operations other than `apply`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("another update is in flight")]
    Busy,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Calc(#[from] CalcError),
}

impl StoreError {
    pub fn diagnostic(&self) -> StoreDiagnostic {
        match self {
            Self::Busy => StoreDiagnostic::new(ErrorKind::Recursion, "update rejected while busy"),
            Self::Config(msg) => {
                StoreDiagnostic::new_with_detail(ErrorKind::Validation, "invalid configuration", msg)
            }
            Self::Domain(err) => {
                StoreDiagnostic::new_with_detail(ErrorKind::Payload, "invalid payload", err.to_string())
            }
            Self::Persistence(err) => err.diagnostic(),
            Self::Calc(err) => {
                StoreDiagnostic::new_with_detail(ErrorKind::Validation, "invalid rate", err.to_string())
            }
        }
    }
}
