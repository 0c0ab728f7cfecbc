mod kv;

pub use kv::{FileStore, KeyValueStore, MemoryStore};

use std::fmt;
use std::sync::Arc;

use appraisal_calc::{CalcError, RateStore};
use appraisal_types::value::as_number;
use appraisal_types::{CaseRecord, ErrorKind, PendingUpdate, Section, StoreDiagnostic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::config::StoreConfig;
use crate::error::PersistenceError;
use crate::integrity::{shape_violations, validate_shape};
use crate::sanitize::Sanitizer;
use crate::standardize::Standardizer;

/// Format tag written into every snapshot envelope.
pub const SNAPSHOT_FORMAT: &str = "appraisal-case/1";

/// Where a snapshot was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Primary,
    Secondary,
    Backup,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Backup => "backup",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadSource {
    Stored(Tier),
    /// Every stored snapshot was unreadable.
    Fresh,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadedSnapshot {
    pub record: CaseRecord,
    pub source: LoadSource,
    /// Corruption found in tiers tried before the one that loaded.
    pub diagnostics: Vec<StoreDiagnostic>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SaveReceipt {
    pub saved_at: DateTime<Utc>,
    pub bytes: usize,
    pub backed_up: bool,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    format: String,
    checksum: String,
    saved_at: DateTime<Utc>,
    record: Value,
}

fn checksum(record: &Value) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_string(record)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

fn encode(record: &CaseRecord, saved_at: DateTime<Utc>) -> Result<String, serde_json::Error> {
    let record = serde_json::to_value(record)?;
    let envelope = Envelope {
        format: SNAPSHOT_FORMAT.to_string(),
        checksum: checksum(&record)?,
        saved_at,
        record,
    };
    serde_json::to_string(&envelope)
}

/// Parse a stored snapshot: an envelope, or a bare legacy record object.
/// The flag tells whether it was an envelope.
fn decode(raw: &str) -> Result<(CaseRecord, bool), String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
    let is_envelope = value.get("format").and_then(Value::as_str) == Some(SNAPSHOT_FORMAT);
    if !is_envelope {
        if !value.is_object() {
            return Err("snapshot is not an object".to_string());
        }
        let record = serde_json::from_value(value).map_err(|e| format!("invalid record: {e}"))?;
        return Ok((record, false));
    }

    let envelope: Envelope =
        serde_json::from_value(value).map_err(|e| format!("invalid envelope: {e}"))?;
    let actual = checksum(&envelope.record).map_err(|e| e.to_string())?;
    if actual != envelope.checksum {
        return Err(format!(
            "checksum mismatch: stored {}, computed {actual}",
            envelope.checksum
        ));
    }
    let record =
        serde_json::from_value(envelope.record).map_err(|e| format!("invalid record: {e}"))?;
    Ok((record, true))
}

/// [`decode`], then reject envelopes whose record breaks an invariant the
/// pipeline keeps. Bare legacy records are taken as they are.
fn decode_checked(raw: &str) -> Result<CaseRecord, String> {
    let (record, enveloped) = decode(raw)?;
    if enveloped {
        let violations = shape_violations(&record);
        if !violations.is_empty() {
            let found: Vec<String> = violations.iter().map(ToString::to_string).collect();
            return Err(format!("invalid shape: {}", found.join("; ")));
        }
    }
    Ok(record)
}

/// When the record last changed: a producer-set `meta.updated_at`, else
/// the time the store saved it.
fn updated_at(record: &CaseRecord) -> Option<DateTime<Utc>> {
    record
        .meta
        .get("updated_at")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
        .map(|at| at.with_timezone(&Utc))
        .or(record.system.last_saved_at)
}

/// A snapshot read from one tier that passed decoding.
struct StoredSnapshot {
    tier: Tier,
    raw: String,
    record: CaseRecord,
}

/// Of two readable current snapshots, the one changed last. Ties go to the
/// primary.
fn most_recent(primary: StoredSnapshot, secondary: StoredSnapshot) -> StoredSnapshot {
    if primary.raw == secondary.raw {
        return primary;
    }
    if updated_at(&secondary.record) > updated_at(&primary.record) {
        info!("secondary snapshot is newer than primary");
        secondary
    } else {
        primary
    }
}

/// Snapshot persistence over a primary and a secondary key-value store.
#[derive(Clone)]
pub struct Persistence {
    primary: Arc<dyn KeyValueStore>,
    secondary: Arc<dyn KeyValueStore>,
    config: StoreConfig,
    standardizer: Standardizer,
    sanitizer: Sanitizer,
}

impl fmt::Debug for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persistence")
            .field("primary_key", &self.config.primary_key)
            .field("secondary_key", &self.config.secondary_key)
            .finish_non_exhaustive()
    }
}

impl Persistence {
    pub fn new(
        config: StoreConfig,
        primary: Arc<dyn KeyValueStore>,
        secondary: Arc<dyn KeyValueStore>,
        sanitizer: Sanitizer,
    ) -> Self {
        Self {
            standardizer: Standardizer::from_config(&config),
            primary,
            secondary,
            config,
            sanitizer,
        }
    }

    fn tier(&self, tier: Tier) -> (&dyn KeyValueStore, &str) {
        match tier {
            Tier::Primary => (self.primary.as_ref(), &self.config.primary_key),
            Tier::Secondary => (self.secondary.as_ref(), &self.config.secondary_key),
            Tier::Backup => (self.secondary.as_ref(), &self.config.backup_key),
        }
    }

    /// Write the record to both stores, keeping the previous primary
    /// snapshot in the backup slot.
    ///
    /// A previous snapshot that does not decode is not rotated, so the
    /// backup slot keeps the last good one. The primary is read back after
    /// writing; on mismatch the previous snapshot is restored and
    /// `VerificationFailed` is returned.
    pub fn save(&self, record: &mut CaseRecord) -> Result<SaveReceipt, PersistenceError> {
        for issue in validate_shape(record) {
            debug!(issue = %issue, "saving record with validation finding");
        }

        let primary_key = &self.config.primary_key;
        let previous = self
            .primary
            .get(primary_key)?
            .filter(|raw| match decode_checked(raw) {
                Ok(_) => true,
                Err(reason) => {
                    warn!(key = %primary_key, reason = %reason, "previous snapshot damaged, backup left as is");
                    false
                }
            });
        let now = Utc::now();
        if let Some(previous) = &previous {
            self.secondary.set(&self.config.backup_key, previous)?;
            record.system.last_backup_at = Some(now);
        }

        record.system.last_saved_at = Some(now);
        let encoded = encode(record, now)?;
        self.primary.set(primary_key, &encoded)?;
        self.secondary.set(&self.config.secondary_key, &encoded)?;

        let read_back = self.primary.get(primary_key)?;
        if read_back.as_deref() != Some(encoded.as_str()) {
            let restored = self.restore(previous.as_deref());
            error!(key = %primary_key, restored, "snapshot read-back mismatch");
            return Err(PersistenceError::VerificationFailed {
                key: primary_key.clone(),
                restored,
            });
        }

        info!(key = %primary_key, bytes = encoded.len(), "snapshot saved");
        Ok(SaveReceipt {
            saved_at: now,
            bytes: encoded.len(),
            backed_up: previous.is_some(),
        })
    }

    /// Put the backed-up snapshot back into both slots. Returns whether the
    /// primary now holds it.
    fn restore(&self, previous: Option<&str>) -> bool {
        let Some(previous) = previous else {
            return false;
        };
        if let Err(err) = self.secondary.set(&self.config.secondary_key, previous) {
            warn!(error = %err, "secondary not restored from backup");
        }
        match self.primary.set(&self.config.primary_key, previous) {
            Ok(()) => self.primary.get(&self.config.primary_key).ok().flatten().as_deref()
                == Some(previous),
            Err(err) => {
                error!(error = %err, "primary not restored from backup");
                false
            }
        }
    }

    /// Load the stored record.
    ///
    /// When both primary and secondary are readable the one changed last
    /// wins; the backup is read only when neither is. The winner is written
    /// back to whichever current tier does not hold it. Unreadable or
    /// damaged tiers are skipped with a corruption diagnostic; if every
    /// stored tier is unusable a fresh record is returned. `Ok(None)` means
    /// nothing was stored at all.
    pub fn load(&self) -> Result<Option<LoadedSnapshot>, PersistenceError> {
        let mut diagnostics = Vec::new();
        let primary = self.read_tier(Tier::Primary, &mut diagnostics);
        let secondary = self.read_tier(Tier::Secondary, &mut diagnostics);
        let chosen = match (primary, secondary) {
            (Some(primary), Some(secondary)) => Some(most_recent(primary, secondary)),
            (Some(found), None) | (None, Some(found)) => Some(found),
            (None, None) => self.read_tier(Tier::Backup, &mut diagnostics),
        };

        let Some(StoredSnapshot {
            tier,
            raw,
            mut record,
        }) = chosen
        else {
            if diagnostics.is_empty() {
                return Ok(None);
            }
            warn!(
                failures = diagnostics.len(),
                "no readable snapshot, starting fresh record"
            );
            return Ok(Some(LoadedSnapshot {
                record: CaseRecord::new(),
                source: LoadSource::Fresh,
                diagnostics,
            }));
        };

        self.sync_current_tiers(tier, &raw)?;
        self.prepare_loaded(&mut record);
        info!(tier = %tier, "snapshot loaded");
        Ok(Some(LoadedSnapshot {
            record,
            source: LoadSource::Stored(tier),
            diagnostics,
        }))
    }

    fn read_tier(
        &self,
        tier: Tier,
        diagnostics: &mut Vec<StoreDiagnostic>,
    ) -> Option<StoredSnapshot> {
        let (store, key) = self.tier(tier);
        let raw = match store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(tier = %tier, key, error = %err, "snapshot tier unavailable");
                diagnostics.push(StoreDiagnostic::new_with_detail(
                    ErrorKind::Persistence,
                    format!("{tier} snapshot unavailable"),
                    err.to_string(),
                ));
                return None;
            }
        };
        match decode_checked(&raw) {
            Ok(record) => Some(StoredSnapshot { tier, raw, record }),
            Err(reason) => {
                warn!(tier = %tier, key, reason = %reason, "snapshot corrupt, skipping");
                diagnostics.push(StoreDiagnostic::new_with_detail(
                    ErrorKind::Corruption,
                    format!("{tier} snapshot unreadable"),
                    reason,
                ));
                None
            }
        }
    }

    /// Copy the loaded snapshot into primary and secondary where they do not
    /// already hold it. Only a primary write failure is an error.
    fn sync_current_tiers(&self, source: Tier, raw: &str) -> Result<(), PersistenceError> {
        for tier in [Tier::Primary, Tier::Secondary] {
            if tier == source {
                continue;
            }
            let (store, key) = self.tier(tier);
            if store.get(key).ok().flatten().as_deref() == Some(raw) {
                continue;
            }
            match store.set(key, raw) {
                Ok(()) => info!(from = %source, to = %tier, "snapshot synced"),
                Err(err) if tier == Tier::Primary => return Err(err.into()),
                Err(err) => warn!(tier = %tier, error = %err, "snapshot not synced"),
            }
        }
        Ok(())
    }

    fn prepare_loaded(&self, record: &mut CaseRecord) {
        self.standardizer.apply(record);
        let altered = self.sanitizer.sanitize_record(record);
        if altered > 0 {
            warn!(fields = altered, "sanitized fields in loaded snapshot");
            record.system.audit.sanitized_fields += altered as u64;
        }
    }

    pub fn save_pending(&self, queue: &[PendingUpdate]) -> Result<(), PersistenceError> {
        let key = &self.config.pending_key;
        if queue.is_empty() {
            self.secondary.remove(key)?;
        } else {
            self.secondary.set(key, &serde_json::to_string(queue)?)?;
        }
        debug!(key = %key, count = queue.len(), "pending queue saved");
        Ok(())
    }

    /// The persisted pending queue. An unreadable queue is dropped with a
    /// warning.
    pub fn load_pending(&self) -> Result<Vec<PendingUpdate>, PersistenceError> {
        let key = &self.config.pending_key;
        let Some(raw) = self.secondary.get(key)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(queue) => Ok(queue),
            Err(err) => {
                warn!(key = %key, error = %err, "pending queue unreadable, discarding");
                Ok(Vec::new())
            }
        }
    }

    pub fn save_mirror(&self, mirror: &Section) -> Result<(), PersistenceError> {
        let encoded = serde_json::to_string(mirror)?;
        self.primary.set(&self.config.mirror_key, &encoded)?;
        Ok(())
    }

    /// Remove every case key from both stores. The VAT rate is kept.
    pub fn clear(&self) -> Result<(), PersistenceError> {
        self.primary.remove(&self.config.primary_key)?;
        self.primary.remove(&self.config.mirror_key)?;
        self.secondary.remove(&self.config.secondary_key)?;
        self.secondary.remove(&self.config.backup_key)?;
        self.secondary.remove(&self.config.pending_key)?;
        info!("case storage cleared");
        Ok(())
    }

    /// Rate slot in the secondary store, for the VAT provider chain.
    pub fn rate_store(&self) -> KvRateStore {
        KvRateStore {
            store: Arc::clone(&self.secondary),
            key: self.config.vat_rate_key.clone(),
        }
    }
}

/// VAT rate persisted as a plain number under one key.
#[derive(Clone)]
pub struct KvRateStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl RateStore for KvRateStore {
    fn load_rate(&self) -> Option<f64> {
        match self.store.get(&self.key) {
            Ok(Some(raw)) => serde_json::from_str::<Value>(&raw)
                .ok()
                .and_then(|v| as_number(&v))
                .or_else(|| as_number(&Value::String(raw))),
            Ok(None) => None,
            Err(err) => {
                warn!(key = %self.key, error = %err, "persisted VAT rate unavailable");
                None
            }
        }
    }

    fn store_rate(&self, rate: f64) -> Result<(), CalcError> {
        self.store
            .set(&self.key, &rate.to_string())
            .map_err(|e| CalcError::RatePersist(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use appraisal_types::SectionPayload;
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::error::StorageError;

    fn persistence(primary: Arc<dyn KeyValueStore>, secondary: Arc<dyn KeyValueStore>) -> Persistence {
        Persistence::new(
            StoreConfig::default(),
            primary,
            secondary,
            Sanitizer::new(false, 4).unwrap(),
        )
    }

    fn stores() -> (Arc<MemoryStore>, Arc<MemoryStore>, Persistence) {
        let primary = Arc::new(MemoryStore::new());
        let secondary = Arc::new(MemoryStore::new());
        let p = persistence(primary.clone(), secondary.clone());
        (primary, secondary, p)
    }

    fn sample() -> CaseRecord {
        let record: CaseRecord = serde_json::from_value(json!({
            "meta": {"plate": "1234567", "case_id": "CASE-1234567"},
            "vehicle": {"plate": "1234567", "manufacturer": "Kia"},
            "vehicleDetails": {"plate": "1234567", "manufacturer": "Kia"},
            "damageAssessment": {"centers": [{"id": "a", "location": "front", "severity": "high"}]}
        }))
        .unwrap();
        Standardizer::default().standardize(record)
    }

    /// Reports success for writes but drops them while `dropping` is set.
    struct DroppingStore {
        inner: MemoryStore,
        dropping: Mutex<bool>,
    }

    impl KeyValueStore for DroppingStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if *self.dropping.lock() {
                return Ok(());
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    #[test_log::test]
    fn save_then_load_round_trips() {
        let (_, secondary, p) = stores();
        let mut record = sample();
        let receipt = p.save(&mut record).unwrap();
        assert!(!receipt.backed_up);
        assert!(secondary.get("helper_data").unwrap().is_some());

        let loaded = p.load().unwrap().unwrap();
        assert_eq!(loaded.source, LoadSource::Stored(Tier::Primary));
        similar_asserts::assert_eq!(loaded.record, record);
    }

    #[test]
    fn second_save_keeps_backup() {
        let (primary, secondary, p) = stores();
        let mut record = sample();
        p.save(&mut record).unwrap();
        let first = primary.get("helper").unwrap();
        record.meta.insert("status".into(), json!("draft"));
        let receipt = p.save(&mut record).unwrap();
        assert!(receipt.backed_up);
        assert_eq!(secondary.get("helper_data_backup").unwrap(), first);
    }

    #[test_log::test]
    fn verification_failure_restores_backup() {
        let primary = Arc::new(DroppingStore {
            inner: MemoryStore::new(),
            dropping: Mutex::new(false),
        });
        let secondary = Arc::new(MemoryStore::new());
        let p = persistence(primary.clone(), secondary.clone());

        let mut record = sample();
        p.save(&mut record).unwrap();
        let good = primary.inner.get("helper").unwrap();

        *primary.dropping.lock() = true;
        record.meta.insert("status".into(), json!("final"));
        let err = p.save(&mut record).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::VerificationFailed { restored: true, .. }
        ));
        assert!(err.diagnostic().is_critical());
        assert_eq!(primary.inner.get("helper").unwrap(), good);
        assert_eq!(secondary.get("helper_data").unwrap(), good);
    }

    #[test_log::test]
    fn corrupt_primary_falls_back_and_migrates() {
        let (primary, _, p) = stores();
        let mut record = sample();
        p.save(&mut record).unwrap();
        primary.set("helper", "{not json").unwrap();

        let loaded = p.load().unwrap().unwrap();
        assert_eq!(loaded.source, LoadSource::Stored(Tier::Secondary));
        assert_eq!(loaded.diagnostics.len(), 1);
        assert_eq!(loaded.diagnostics[0].kind, ErrorKind::Corruption);
        assert_eq!(loaded.record.plate(), Some("1234567"));
        assert!(decode_checked(&primary.get("helper").unwrap().unwrap()).is_ok());
    }

    #[test]
    fn tampered_checksum_is_corruption() {
        let (primary, secondary, p) = stores();
        let mut record = sample();
        p.save(&mut record).unwrap();
        let tampered = primary
            .get("helper")
            .unwrap()
            .unwrap()
            .replace("Kia", "Fiat");
        primary.set("helper", &tampered).unwrap();
        secondary.set("helper_data", &tampered).unwrap();

        let err = decode_checked(&tampered).unwrap_err();
        assert!(err.starts_with("checksum mismatch"), "{err}");
        let loaded = p.load().unwrap().unwrap();
        assert_eq!(loaded.source, LoadSource::Fresh);
        assert_eq!(loaded.record, CaseRecord::new());
    }

    #[test_log::test]
    fn damaged_shape_falls_through_to_secondary() {
        let (primary, _, p) = stores();
        let mut record = sample();
        p.save(&mut record).unwrap();

        let mut damaged = record.clone();
        let center = damaged.damage_assessment.centers[0].clone();
        damaged.damage_assessment.centers.push(center);
        primary.set("helper", &encode(&damaged, Utc::now()).unwrap()).unwrap();

        let loaded = p.load().unwrap().unwrap();
        assert_eq!(loaded.source, LoadSource::Stored(Tier::Secondary));
        assert_eq!(loaded.diagnostics.len(), 1);
        assert_eq!(loaded.diagnostics[0].kind, ErrorKind::Corruption);
        assert_eq!(loaded.record.damage_assessment.centers.len(), 1);
        assert!(decode_checked(&primary.get("helper").unwrap().unwrap()).is_ok());
    }

    #[test_log::test]
    fn damaged_primary_is_not_rotated_into_backup() {
        let (primary, secondary, p) = stores();
        let mut record = sample();
        p.save(&mut record).unwrap();
        p.save(&mut record).unwrap();
        let backup = secondary.get("helper_data_backup").unwrap();
        assert!(backup.is_some());

        primary.set("helper", "{not json").unwrap();
        let receipt = p.save(&mut record).unwrap();
        assert!(!receipt.backed_up);
        assert_eq!(secondary.get("helper_data_backup").unwrap(), backup);
    }

    #[test_log::test]
    fn newer_secondary_wins_and_is_copied_to_primary() {
        let (primary, secondary, p) = stores();
        let mut record = sample();
        p.save(&mut record).unwrap();

        let mut newer = record.clone();
        newer.meta.insert("status".into(), json!("final"));
        newer.meta.insert(
            "updated_at".into(),
            json!((Utc::now() + chrono::Duration::minutes(5)).to_rfc3339()),
        );
        let newer_raw = encode(&newer, Utc::now()).unwrap();
        secondary.set("helper_data", &newer_raw).unwrap();

        let loaded = p.load().unwrap().unwrap();
        assert_eq!(loaded.source, LoadSource::Stored(Tier::Secondary));
        assert_eq!(loaded.record.meta["status"], json!("final"));
        assert_eq!(primary.get("helper").unwrap(), Some(newer_raw));
    }

    #[test_log::test]
    fn older_secondary_is_overwritten_by_primary() {
        let (primary, secondary, p) = stores();
        let mut record = sample();
        p.save(&mut record).unwrap();

        let mut stale = record.clone();
        stale.meta.insert("status".into(), json!("draft"));
        stale
            .meta
            .insert("updated_at".into(), json!("2001-01-01T00:00:00Z"));
        secondary
            .set("helper_data", &encode(&stale, Utc::now()).unwrap())
            .unwrap();

        let loaded = p.load().unwrap().unwrap();
        assert_eq!(loaded.source, LoadSource::Stored(Tier::Primary));
        assert!(loaded.record.meta.get("status").is_none());
        assert_eq!(
            secondary.get("helper_data").unwrap(),
            primary.get("helper").unwrap()
        );
    }

    #[test]
    fn nothing_stored_is_none() {
        let (_, _, p) = stores();
        assert!(p.load().unwrap().is_none());
    }

    #[test]
    fn legacy_bare_record_is_standardized_and_sanitized() {
        let (primary, _, p) = stores();
        primary
            .set(
                "helper",
                &json!({
                    "meta": {"plate": "12-345-67"},
                    "car_details": {"model": "<script>x</script>Rio"}
                })
                .to_string(),
            )
            .unwrap();
        let loaded = p.load().unwrap().unwrap();
        assert_eq!(loaded.record.meta["plate"], json!("1234567"));
        assert_eq!(loaded.record.vehicle["model"], json!("Rio"));
        assert_eq!(loaded.record.system.audit.sanitized_fields, 2);
    }

    #[test]
    fn pending_queue_round_trips_and_clears() {
        let (_, secondary, p) = stores();
        let update = PendingUpdate::new(
            1,
            Some("vehicle-form".into()),
            SectionPayload::from_json("vehicle", json!({"km": 1})).unwrap(),
        );
        p.save_pending(std::slice::from_ref(&update)).unwrap();
        assert_eq!(p.load_pending().unwrap(), vec![update]);

        p.save_pending(&[]).unwrap();
        assert!(secondary.get("helper_pending_updates").unwrap().is_none());

        secondary.set("helper_pending_updates", "[oops").unwrap();
        assert!(p.load_pending().unwrap().is_empty());
    }

    #[test]
    fn clear_keeps_vat_rate() {
        let (primary, secondary, p) = stores();
        let mut record = sample();
        p.save(&mut record).unwrap();
        p.save_mirror(&Section::new()).unwrap();
        p.rate_store().store_rate(17.0).unwrap();

        p.clear().unwrap();
        assert!(primary.is_empty());
        assert_eq!(secondary.len(), 1);
        assert_eq!(p.rate_store().load_rate(), Some(17.0));
    }
}
