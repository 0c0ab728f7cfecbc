use std::fmt;

use appraisal_types::{CaseRecord, SectionName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical operation an export is delivered under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportOperation {
    SubmitExpertise,
    SubmitEstimate,
    SubmitFinalReport,
    ExportOnLogout,
}

impl ExportOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmitExpertise => "submit_expertise",
            Self::SubmitEstimate => "submit_estimate",
            Self::SubmitFinalReport => "submit_final_report",
            Self::ExportOnLogout => "export_on_logout",
        }
    }

    /// After a terminal export the case is closed and its storage discarded.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SubmitFinalReport | Self::ExportOnLogout)
    }
}

impl fmt::Display for ExportOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportContent {
    Record(Box<CaseRecord>),
    Section { name: SectionName, value: Value },
}

/// Payload handed to the automation service. Delivery is the caller's job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportSnapshot {
    pub operation: ExportOperation,
    pub case_id: Option<String>,
    pub plate: Option<String>,
    pub exported_at: DateTime<Utc>,
    #[serde(flatten)]
    pub content: ExportContent,
}

impl ExportSnapshot {
    pub(crate) fn record(operation: ExportOperation, record: &CaseRecord) -> Self {
        Self {
            operation,
            case_id: record.case_id().map(str::to_string),
            plate: record.plate().map(str::to_string),
            exported_at: Utc::now(),
            content: ExportContent::Record(Box::new(record.clone())),
        }
    }

    pub(crate) fn section(
        operation: ExportOperation,
        record: &CaseRecord,
        name: SectionName,
    ) -> Option<Self> {
        let value = record.section_value(&name)?;
        Some(Self {
            operation,
            case_id: record.case_id().map(str::to_string),
            plate: record.plate().map(str::to_string),
            exported_at: Utc::now(),
            content: ExportContent::Section { name, value },
        })
    }
}
