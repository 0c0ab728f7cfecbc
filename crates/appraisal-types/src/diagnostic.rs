use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical category for a store-side problem.
///
/// Coarse-grained on purpose: it drives the recovery policy (queue, restore
/// backup, fall back to a fresh record) and is the dimension used in logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Structural shape issue in a record. Never fatal, surfaced as a warning.
    Validation,
    /// Unsafe content was stripped from an incoming string.
    Sanitization,
    /// Write or read-back verification against a key-value store failed.
    ///
    /// Recoverable: the previous snapshot is restored from the backup slot.
    Persistence,
    /// The identity/session provider reported an invalid session.
    ///
    /// Triggers queueing; the update itself is not lost.
    Session,
    /// A stored snapshot could not be parsed or failed its checksum.
    Corruption,
    /// An update arrived while another one was in flight.
    Recursion,
    /// A payload could not be turned into a typed section update.
    Payload,
}

/// How loudly a diagnostic should be reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    /// Storage-medium failure. The in-memory record stays usable.
    Critical,
}

impl ErrorKind {
    /// Default severity for the kind when the call site has no better idea.
    pub fn default_severity(self) -> Severity {
        match self {
            Self::Validation | Self::Sanitization | Self::Session => Severity::Warning,
            Self::Recursion | Self::Payload | Self::Corruption | Self::Persistence => {
                Severity::Error
            }
        }
    }
}

/// Structured diagnostic produced by the update pipeline and the
/// persistence layer.
///
/// The pipeline never raises across its public boundary; instead it
/// downgrades failures to one of these plus a boolean result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDiagnostic {
    pub kind: ErrorKind,
    pub severity: Severity,
    /// Human-readable summary safe to display in normal logs.
    pub message: String,
    /// Optional low-level detail for triage.
    pub detail: Option<String>,
}

impl StoreDiagnostic {
    /// Creates a diagnostic with the kind's default severity and no detail.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            detail: None,
        }
    }

    /// Creates a diagnostic with all fields in a single call.
    pub fn new_with_detail(
        kind: ErrorKind,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::new(kind, message).with_detail(detail)
    }

    /// Adds or replaces the diagnostic detail. Last value wins.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Overrides the default severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl fmt::Display for StoreDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}: {}", self.kind, self.severity, self.message)?;
        if let Some(ref detail) = self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail_when_present() {
        let diag = StoreDiagnostic::new(ErrorKind::Persistence, "read-back mismatch")
            .with_severity(Severity::Critical)
            .with_detail("key=helper");
        insta::assert_snapshot!(diag.to_string(), @"Persistence/Critical: read-back mismatch (key=helper)");
        assert!(diag.is_critical());
    }

    #[test]
    fn kinds_carry_default_severity() {
        let diag = StoreDiagnostic::new(ErrorKind::Session, "session expired");
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.to_string(), "Session/Warning: session expired");
    }
}
