use appraisal_types::{CaseRecord, DamageOp, PartsSearchOp, SectionPayload};
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::config::StoreConfig;

const SCRIPT_BLOCK: &str = r"(?is)<script\b.*?</script\s*>";
const JAVASCRIPT_URI: &str = r"(?i)javascript\s*:";
const INLINE_HANDLER: &str = r#"(?i)\bon\w+\s*=\s*['"]"#;
const DANGEROUS_TAGS: &str =
    r"(?i)</?\s*(?:iframe|object|embed|form|input|button|select|textarea)\b[^>]*>";
const SQL_KEYWORDS: &str =
    r"(?i)\b(?:SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|EXEC|UNION|SCRIPT)\b";

/// Strips markup and script vectors from string leaves.
///
/// Each string is cleaned repeatedly until it stops changing or the pass
/// limit is reached, so nested constructs such as `<scr<script></script>ipt>`
/// do not survive a single pass.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    patterns: Vec<Regex>,
    max_passes: usize,
}

impl Sanitizer {
    pub fn new(strip_sql_keywords: bool, max_passes: usize) -> Result<Self, regex::Error> {
        let mut sources = vec![SCRIPT_BLOCK, JAVASCRIPT_URI, INLINE_HANDLER, DANGEROUS_TAGS];
        if strip_sql_keywords {
            sources.push(SQL_KEYWORDS);
        }
        let patterns = sources
            .into_iter()
            .map(Regex::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            max_passes: max_passes.max(1),
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, regex::Error> {
        Self::new(config.strip_sql_keywords, config.max_sanitize_passes)
    }

    /// Clean one string. Returns `None` when nothing was removed.
    pub fn clean_str(&self, input: &str) -> Option<String> {
        let mut current = input.to_string();
        for _ in 0..self.max_passes {
            let mut next = current.clone();
            for pattern in &self.patterns {
                next = pattern.replace_all(&next, "").into_owned();
            }
            if next == current {
                break;
            }
            current = next;
        }
        (current != input).then_some(current)
    }

    /// Clean every string leaf in place; returns the number of altered leaves.
    pub fn sanitize_value(&self, value: &mut Value) -> usize {
        match value {
            Value::String(s) => match self.clean_str(s) {
                Some(cleaned) => {
                    *s = cleaned;
                    1
                }
                None => 0,
            },
            Value::Array(items) => items.iter_mut().map(|v| self.sanitize_value(v)).sum(),
            Value::Object(map) => map.values_mut().map(|v| self.sanitize_value(v)).sum(),
            Value::Null | Value::Bool(_) | Value::Number(_) => 0,
        }
    }

    fn sanitize_str(&self, s: &mut String) -> usize {
        match self.clean_str(s) {
            Some(cleaned) => {
                *s = cleaned;
                1
            }
            None => 0,
        }
    }

    /// Sanitize a typed value through its JSON form. Left untouched when
    /// the cleaned form no longer deserializes.
    fn sanitize_typed<T: Serialize + DeserializeOwned>(&self, item: &mut T) -> usize {
        let Ok(mut value) = serde_json::to_value(&*item) else {
            return 0;
        };
        let altered = self.sanitize_value(&mut value);
        if altered == 0 {
            return 0;
        }
        match serde_json::from_value(value) {
            Ok(cleaned) => {
                *item = cleaned;
                altered
            }
            Err(err) => {
                warn!(error = %err, "sanitized value no longer deserializes; kept original");
                0
            }
        }
    }

    /// Clean the data carried by a payload. Operation tags are not touched.
    pub fn sanitize_payload(&self, payload: &mut SectionPayload) -> usize {
        match payload {
            SectionPayload::Meta(patch)
            | SectionPayload::Vehicle(patch)
            | SectionPayload::VehicleDetails(patch)
            | SectionPayload::Stakeholders(patch)
            | SectionPayload::Valuation(patch)
            | SectionPayload::Financials(patch)
            | SectionPayload::Documents(patch)
            | SectionPayload::Invoice(patch)
            | SectionPayload::Estimate(patch)
            | SectionPayload::Other { patch, .. } => {
                patch.values_mut().map(|v| self.sanitize_value(v)).sum()
            }
            SectionPayload::DamageAssessment(op) => match op {
                DamageOp::UpsertCenter { center } => self.sanitize_typed(center),
                DamageOp::ReplaceCenters { centers } => self.sanitize_typed(centers),
                DamageOp::RemoveCenter { id } => self.sanitize_str(id),
                DamageOp::ImportPart { center_id, part_id } => {
                    self.sanitize_str(center_id) + self.sanitize_str(part_id)
                }
            },
            SectionPayload::PartsSearch(op) => match op {
                PartsSearchOp::RecordSearch {
                    search_id,
                    query,
                    results,
                } => {
                    self.sanitize_str(search_id)
                        + self.sanitize_value(query)
                        + self.sanitize_typed(results)
                }
                PartsSearchOp::Select { part_ids } | PartsSearchOp::Deselect { part_ids } => {
                    part_ids.iter_mut().map(|id| self.sanitize_str(id)).sum()
                }
                PartsSearchOp::Clear => 0,
            },
        }
    }

    /// Clean every data section of a record. The system section is left alone.
    pub fn sanitize_record(&self, record: &mut CaseRecord) -> usize {
        let mut altered = 0;
        for section in [
            &mut record.meta,
            &mut record.vehicle,
            &mut record.vehicle_details,
            &mut record.stakeholders,
            &mut record.valuation,
            &mut record.financials,
            &mut record.documents,
            &mut record.invoice,
            &mut record.estimate,
        ] {
            altered += section
                .values_mut()
                .map(|v| self.sanitize_value(v))
                .sum::<usize>();
        }
        altered += self.sanitize_typed(&mut record.damage_assessment);
        altered += self.sanitize_typed(&mut record.parts_search);
        altered += record
            .extra
            .values_mut()
            .map(|v| self.sanitize_value(v))
            .sum::<usize>();
        altered
    }
}
