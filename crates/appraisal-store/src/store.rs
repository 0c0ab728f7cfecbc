use std::fmt;
use std::sync::Arc;

use appraisal_calc::{
    CalculationInputs, HostRateSource, ResolvedRate, VatRates, calculate, estimate_base_damage,
    estimate_totals,
};
use appraisal_types::value::number_at;
use appraisal_types::{
    CALCULATIONS_KEY, CaseRecord, DomainError, ErrorKind, Estimate, EstimateCalculations,
    EstimateValidation, Patch, Section, SectionName, SectionPayload, StoreDiagnostic,
};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::estimate::estimate_validation;
use crate::export::{ExportOperation, ExportSnapshot};
use crate::guard::RecursionGuard;
use crate::handlers::dispatch;
use crate::integrity::{self, IntegrityReport};
use crate::legacy::legacy_mirror;
use crate::levi;
use crate::persistence::{KeyValueStore, MemoryStore, Persistence};
use crate::queue::PendingQueue;
use crate::sanitize::Sanitizer;
use crate::session::{AlwaysValid, SessionProvider};
use crate::standardize::Standardizer;

/// One section update as submitted by a caller.
#[derive(Clone, Debug, PartialEq)]
pub struct SectionUpdate {
    pub payload: SectionPayload,
    pub source: Option<String>,
}

impl SectionUpdate {
    pub fn new(payload: SectionPayload) -> Self {
        Self {
            payload,
            source: None,
        }
    }

    /// Interpret an untyped payload addressed to `section`.
    pub fn from_json(section: &str, value: Value) -> Result<Self, DomainError> {
        SectionPayload::from_json(section, value).map(Self::new)
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ApplyOutcome {
    Applied,
    /// Applied in memory and held in the pending queue until the session
    /// becomes valid again.
    Queued,
    Rejected(StoreDiagnostic),
}

impl ApplyOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Applied | Self::Queued)
    }
}

/// Running counters for one store instance. Not persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub accepted: u64,
    pub applied: u64,
    pub queued: u64,
    pub replayed: u64,
    pub rejected_busy: u64,
    pub failed: u64,
}

/// Notified after each accepted update, with the store lock released.
///
/// Updates submitted from inside `on_applied` are rejected as re-entrant.
pub trait StoreObserver: Send + Sync {
    fn on_applied(&self, store: &CaseStore, section: &SectionName);
}

impl<F> StoreObserver for F
where
    F: Fn(&CaseStore, &SectionName) + Send + Sync,
{
    fn on_applied(&self, store: &CaseStore, section: &SectionName) {
        self(store, section)
    }
}

#[derive(Debug, Default)]
struct State {
    /// What readers see: the persisted record plus every queued update.
    record: CaseRecord,
    /// The persisted record the queued updates apply on top of. Set while
    /// the queue is non-empty.
    base: Option<CaseRecord>,
    queue: PendingQueue,
    mirror: Section,
}

/// Single-writer store for one appraisal case.
pub struct CaseStore {
    config: StoreConfig,
    guard: RecursionGuard,
    state: Mutex<State>,
    persistence: Persistence,
    sanitizer: Sanitizer,
    standardizer: Standardizer,
    session: Arc<dyn SessionProvider>,
    vat: VatRates,
    observers: RwLock<Vec<Arc<dyn StoreObserver>>>,
    stats: Mutex<StoreStats>,
}

impl fmt::Debug for CaseStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaseStore")
            .field("config", &self.config)
            .field("persistence", &self.persistence)
            .field("vat", &self.vat)
            .field("stats", &*self.stats.lock())
            .finish_non_exhaustive()
    }
}

pub struct CaseStoreBuilder {
    config: StoreConfig,
    primary: Option<Arc<dyn KeyValueStore>>,
    secondary: Option<Arc<dyn KeyValueStore>>,
    session: Arc<dyn SessionProvider>,
    host: Option<Arc<dyn HostRateSource>>,
}

impl CaseStoreBuilder {
    pub fn primary(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.primary = Some(store);
        self
    }

    pub fn secondary(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.secondary = Some(store);
        self
    }

    pub fn session(mut self, session: Arc<dyn SessionProvider>) -> Self {
        self.session = session;
        self
    }

    pub fn host_rate_source(mut self, host: Arc<dyn HostRateSource>) -> Self {
        self.host = Some(host);
        self
    }

    /// Validate the configuration, load the stored record and pending
    /// queue, and wire the VAT provider chain.
    pub fn open(self) -> Result<CaseStore, StoreError> {
        self.config.validate()?;
        let sanitizer =
            Sanitizer::from_config(&self.config).map_err(|err| StoreError::Config(err.to_string()))?;
        let standardizer = Standardizer::from_config(&self.config);
        let primary = self.primary.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let secondary = self
            .secondary
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let persistence =
            Persistence::new(self.config.clone(), primary, secondary, sanitizer.clone());

        let mut vat = VatRates::new(self.config.default_vat_rate);
        if let Some(host) = self.host {
            vat = vat.with_host(host, self.config.host_rate_timeout());
        }
        let vat = vat.with_store(Arc::new(persistence.rate_store()));

        let mut record = match persistence.load()? {
            Some(loaded) => {
                for diagnostic in &loaded.diagnostics {
                    warn!(diagnostic = %diagnostic, "case record load");
                }
                info!(source = ?loaded.source, case_id = loaded.record.case_id(), "case record loaded");
                loaded.record
            }
            None => {
                debug!("no stored case record, starting empty");
                CaseRecord::new()
            }
        };

        let queue = PendingQueue::from_entries(persistence.load_pending()?);
        if !queue.is_empty() {
            info!(pending = queue.len(), "pending updates awaiting a valid session");
        }
        record.system.pending_updates = queue.entries().to_vec();
        let mirror = legacy_mirror(&record);

        let store = CaseStore {
            config: self.config,
            guard: RecursionGuard::new(),
            state: Mutex::new(State {
                record,
                base: None,
                queue,
                mirror,
            }),
            persistence,
            sanitizer,
            standardizer,
            session: self.session,
            vat,
            observers: RwLock::new(Vec::new()),
            stats: Mutex::new(StoreStats::default()),
        };
        {
            let mut state = store.state.lock();
            if !state.queue.is_empty() {
                state.base = Some(state.record.clone());
                store.apply_queue_in_memory(&mut state);
            }
        }
        Ok(store)
    }
}

impl CaseStore {
    pub fn builder(config: StoreConfig) -> CaseStoreBuilder {
        CaseStoreBuilder {
            config,
            primary: None,
            secondary: None,
            session: Arc::new(AlwaysValid),
            host: None,
        }
    }

    pub fn open(
        config: StoreConfig,
        primary: Arc<dyn KeyValueStore>,
        secondary: Arc<dyn KeyValueStore>,
        session: Arc<dyn SessionProvider>,
    ) -> Result<Self, StoreError> {
        Self::builder(config)
            .primary(primary)
            .secondary(secondary)
            .session(session)
            .open()
    }

    /// Apply an untyped update to `section`. Returns whether it was accepted.
    pub fn apply(&self, section: &str, value: Value, source: Option<&str>) -> bool {
        let update = match SectionUpdate::from_json(section, value) {
            Ok(update) => update,
            Err(err) => {
                warn!(section, source, error = %err, "update payload rejected");
                self.stats.lock().failed += 1;
                return false;
            }
        };
        let update = match source {
            Some(source) => update.with_source(source),
            None => update,
        };
        self.apply_update(update).is_accepted()
    }

    pub fn apply_update(&self, mut update: SectionUpdate) -> ApplyOutcome {
        let section = update.payload.section();
        let Some(_token) = self.guard.try_enter() else {
            debug!(section = %section, "update rejected, another update in flight");
            self.stats.lock().rejected_busy += 1;
            return ApplyOutcome::Rejected(StoreError::Busy.diagnostic());
        };
        update.payload.assign_missing_ids();

        let mut state = self.state.lock();
        let (outcome, mut notified) = if self.session.is_session_valid() {
            let replayed = self.replay_locked(&mut state);
            let outcome = if !state.queue.is_empty() {
                // Replay halted; keep FIFO order behind what is still queued.
                self.queue_locked(&mut state, update)
            } else {
                match self.run_pipeline(&mut state, update.payload, update.source.as_deref(), true) {
                    Ok(()) => ApplyOutcome::Applied,
                    Err(diagnostic) => ApplyOutcome::Rejected(diagnostic),
                }
            };
            (outcome, replayed)
        } else {
            (self.queue_locked(&mut state, update), Vec::new())
        };
        drop(state);

        {
            let mut stats = self.stats.lock();
            match &outcome {
                ApplyOutcome::Applied => stats.applied += 1,
                ApplyOutcome::Queued => stats.queued += 1,
                ApplyOutcome::Rejected(_) => stats.failed += 1,
            }
            if outcome.is_accepted() {
                stats.accepted += 1;
            }
        }

        if outcome.is_accepted() {
            notified.push(section);
        }
        self.notify(&notified);
        outcome
    }

    /// Replay queued updates if the session is valid. Returns how many were
    /// applied.
    pub fn flush_pending(&self) -> usize {
        let Some(_token) = self.guard.try_enter() else {
            return 0;
        };
        if !self.session.is_session_valid() {
            return 0;
        }
        let replayed = {
            let mut state = self.state.lock();
            self.replay_locked(&mut state)
        };
        self.notify(&replayed);
        replayed.len()
    }

    /// Sanitize, merge, standardize, recalculate and optionally persist one
    /// payload. The record is left untouched if the payload is rejected.
    fn run_pipeline(
        &self,
        state: &mut State,
        mut payload: SectionPayload,
        source: Option<&str>,
        persist: bool,
    ) -> Result<(), StoreDiagnostic> {
        let section = payload.section();
        let sanitized = self.sanitizer.sanitize_payload(&mut payload);
        if sanitized > 0 {
            warn!(section = %section, source, fields = sanitized, "update sanitized");
        }

        let mut working = state.record.clone();
        let mut written = Vec::new();
        dispatch(&mut working, &payload, &mut written).map_err(|err| {
            warn!(section = %section, source, error = %err, "update rejected by handler");
            StoreError::from(err).diagnostic()
        })?;

        let system = &mut working.system;
        system.update_count += 1;
        let stamp = system.update_count;
        for path in written {
            system.field_writes.insert(path, stamp);
        }
        system.last_updated = Some(Utc::now());
        system.audit.updates_applied += 1;
        system.audit.sanitized_fields += sanitized as u64;

        self.standardizer.apply(&mut working);
        self.recalculate(&mut working);
        state.record = working;
        if section.feeds_legacy_mirror() {
            state.mirror = legacy_mirror(&state.record);
        }
        debug!(section = %section, source, update = stamp, persist, "update applied");

        if !persist {
            return Ok(());
        }
        self.persistence.save(&mut state.record).map_err(|err| {
            error!(section = %section, error = %err, "update applied in memory but not persisted");
            err.diagnostic()
        })?;
        if section.feeds_legacy_mirror() {
            if let Err(err) = self.persistence.save_mirror(&state.mirror) {
                warn!(error = %err, "legacy mirror not written");
            }
        }
        Ok(())
    }

    /// Apply the update in memory and hold it in the durable queue. If the
    /// queue cannot be stored the update is taken back out and rejected.
    fn queue_locked(&self, state: &mut State, mut update: SectionUpdate) -> ApplyOutcome {
        let section = update.payload.section();
        let sanitized = self.sanitizer.sanitize_payload(&mut update.payload);
        let (record_before, mirror_before) = (state.record.clone(), state.mirror.clone());
        if let Err(diagnostic) =
            self.run_pipeline(state, update.payload.clone(), update.source.as_deref(), false)
        {
            return ApplyOutcome::Rejected(diagnostic);
        }

        state.queue.enqueue(update.source, update.payload);
        if let Err(err) = self.persistence.save_pending(state.queue.entries()) {
            let dropped = state.queue.pop_last();
            state.record = record_before;
            state.mirror = mirror_before;
            error!(
                id = ?dropped.map(|entry| entry.id),
                section = %section,
                error = %err,
                "pending queue not persisted, update rejected"
            );
            return ApplyOutcome::Rejected(err.diagnostic());
        }

        let base = state.base.get_or_insert(record_before);
        base.system.audit.updates_queued += 1;
        let system = &mut state.record.system;
        system.audit.updates_queued += 1;
        system.audit.sanitized_fields += sanitized as u64;
        system.pending_updates = state.queue.entries().to_vec();
        if let Some(entry) = state.queue.entries().last() {
            info!(id = %entry.id, sequence = entry.sequence, section = %section, "session invalid, update queued");
        }
        ApplyOutcome::Queued
    }

    /// Run every queued update through the pipeline without persisting, on
    /// top of the current record.
    fn apply_queue_in_memory(&self, state: &mut State) {
        for entry in state.queue.entries().to_vec() {
            if let Err(diagnostic) =
                self.run_pipeline(state, entry.payload, entry.source.as_deref(), false)
            {
                warn!(id = %entry.id, diagnostic = %diagnostic, "queued update left out of the in-memory record");
            }
        }
        state.record.system.pending_updates = state.queue.entries().to_vec();
    }

    /// Drain the pending queue through the full pipeline in FIFO order,
    /// starting from the persisted record rather than the in-memory one.
    /// Entries are put back if storage fails part way; entries the handlers
    /// reject are dropped.
    fn replay_locked(&self, state: &mut State) -> Vec<SectionName> {
        if state.queue.is_empty() {
            return Vec::new();
        }
        let entries = state.queue.drain_ordered();
        if let Some(base) = state.base.take() {
            state.record = base;
            state.mirror = legacy_mirror(&state.record);
        }
        state.record.system.pending_updates.clear();
        info!(count = entries.len(), "replaying pending updates");

        let mut replayed = Vec::new();
        let mut remaining = entries.into_iter();
        while let Some(entry) = remaining.next() {
            let (id, sequence) = (entry.id, entry.sequence);
            let section = entry.payload.section();
            let persisted = state.record.clone();
            match self.run_pipeline(state, entry.payload.clone(), entry.source.as_deref(), true) {
                Ok(()) => {
                    state.record.system.audit.updates_replayed += 1;
                    replayed.push(section);
                }
                Err(diagnostic) if diagnostic.kind == ErrorKind::Persistence => {
                    warn!(%id, sequence, diagnostic = %diagnostic, "replay halted, storage unavailable");
                    let mut rest = vec![entry];
                    rest.extend(remaining.by_ref());
                    state.queue.requeue_front(rest);
                    state.record = persisted.clone();
                    state.base = Some(persisted);
                    self.apply_queue_in_memory(state);
                    state.mirror = legacy_mirror(&state.record);
                    break;
                }
                Err(diagnostic) => {
                    warn!(%id, sequence, diagnostic = %diagnostic, "pending update dropped");
                }
            }
        }

        state.record.system.pending_updates = state.queue.entries().to_vec();
        if let Err(err) = self.persistence.save_pending(state.queue.entries()) {
            error!(error = %err, "pending queue not persisted after replay");
        }
        self.stats.lock().replayed += replayed.len() as u64;
        replayed
    }

    fn recalculate(&self, record: &mut CaseRecord) {
        let inputs = CalculationInputs::from_sections(
            &record.damage_assessment,
            &record.valuation,
            &record.financials,
        );
        let result = calculate(&inputs, self.vat.rate());
        match serde_json::to_value(&result) {
            Ok(value) => {
                record.financials.insert(CALCULATIONS_KEY.to_string(), value);
            }
            Err(err) => warn!(error = %err, "calculation result not stored"),
        }
    }

    fn notify(&self, sections: &[SectionName]) {
        if sections.is_empty() {
            return;
        }
        let observers = self.observers.read().clone();
        for section in sections {
            for observer in &observers {
                observer.on_applied(self, section);
            }
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn StoreObserver>) {
        self.observers.write().push(observer);
    }

    /// Change the VAT rate, recalculate and persist.
    ///
    /// While updates are queued only the persisted record is saved; the
    /// in-memory record is recalculated alongside it.
    pub fn set_vat_rate(&self, rate: f64) -> Result<ResolvedRate, StoreError> {
        let _token = self.guard.try_enter().ok_or(StoreError::Busy)?;
        let resolved = self.vat.set_rate(rate)?;
        let now = Utc::now();
        let mut state = self.state.lock();
        let state = &mut *state;
        self.recalculate(&mut state.record);
        state.record.system.last_updated = Some(now);
        match state.base.as_mut() {
            Some(base) => {
                self.recalculate(base);
                base.system.last_updated = Some(now);
                self.persistence.save(base)?;
            }
            None => {
                self.persistence.save(&mut state.record)?;
            }
        }
        Ok(resolved)
    }

    pub fn vat_rate(&self) -> ResolvedRate {
        self.vat.current()
    }

    pub fn snapshot(&self) -> CaseRecord {
        self.state.lock().record.clone()
    }

    pub fn legacy_mirror(&self) -> Section {
        self.state.lock().mirror.clone()
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn stats(&self) -> StoreStats {
        *self.stats.lock()
    }

    pub fn report(&self) -> IntegrityReport {
        integrity::report(&self.state.lock().record)
    }

    pub fn estimate(&self) -> Estimate {
        self.state.lock().record.estimate()
    }

    /// Merge `patch` into the estimate section and stamp `updated_at`.
    pub fn update_estimate(&self, mut patch: Patch) -> bool {
        patch.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        let update = SectionUpdate::new(SectionPayload::Estimate(patch)).with_source("estimate");
        self.apply_update(update).is_accepted()
    }

    /// Compute base damage, VAT and total for the estimate and store them
    /// under `estimate.calculations`.
    ///
    /// The base is the assessor's explicit `estimate.base_damage` when
    /// positive, otherwise the sum of the damage centers.
    pub fn calculate_estimate_totals(&self) -> Result<EstimateCalculations, StoreDiagnostic> {
        let (explicit, damage) = {
            let state = self.state.lock();
            let record = &state.record;
            (
                number_at(&record.estimate, "base_damage"),
                record.damage_assessment.clone(),
            )
        };
        let base = estimate_base_damage(&damage, explicit);
        let mut totals = estimate_totals(base, self.vat.rate());
        totals.calculated_at = Utc::now().to_rfc3339();

        let mut patch = Patch::new();
        patch.insert("calculations".to_string(), json!(totals));
        self.apply_estimate_patch(patch)?;
        Ok(totals)
    }

    /// Check the estimate is ready to generate and store the result under
    /// `estimate.validation`; `estimate.completed` follows `overall`.
    pub fn validate_estimate(&self) -> Result<EstimateValidation, StoreDiagnostic> {
        let validation = estimate_validation(&self.state.lock().record);
        let mut patch = Patch::new();
        patch.insert("validation".to_string(), json!(validation));
        patch.insert("completed".to_string(), json!(validation.overall));
        self.apply_estimate_patch(patch)?;
        Ok(validation)
    }

    fn apply_estimate_patch(&self, patch: Patch) -> Result<(), StoreDiagnostic> {
        let update = SectionUpdate::new(SectionPayload::Estimate(patch)).with_source("estimate");
        match self.apply_update(update) {
            ApplyOutcome::Rejected(diagnostic) => Err(diagnostic),
            ApplyOutcome::Applied | ApplyOutcome::Queued => Ok(()),
        }
    }

    /// Store a Levi price-guide report and its adjustments in `valuation`,
    /// then recalculate through the normal update path.
    pub fn sync_levi_report(&self, report: Value) -> bool {
        let patch = match levi::valuation_patch(&report) {
            Ok(patch) => patch,
            Err(err) => {
                warn!(error = %err, "Levi report rejected");
                self.stats.lock().failed += 1;
                return false;
            }
        };
        let update =
            SectionUpdate::new(SectionPayload::Valuation(patch)).with_source(levi::LEVI_SOURCE);
        let accepted = self.apply_update(update).is_accepted();
        if accepted {
            info!("Levi report synced into valuation");
        }
        accepted
    }

    fn export_view(&self) -> Option<CaseRecord> {
        let record = self.state.lock().record.clone();
        if record.plate().is_none() {
            debug!("nothing to export, record has no plate");
            return None;
        }
        let mut record = self.standardizer.standardize(record);
        self.sanitizer.sanitize_record(&mut record);
        Some(record)
    }

    /// Full standardized and sanitized record for the automation service.
    pub fn export(&self, operation: ExportOperation) -> Option<ExportSnapshot> {
        let record = self.export_view()?;
        info!(operation = %operation, case_id = record.case_id(), "record exported");
        Some(ExportSnapshot::record(operation, &record))
    }

    pub fn export_section(&self, operation: ExportOperation, section: &str) -> Option<ExportSnapshot> {
        let record = self.export_view()?;
        let name = SectionName::parse(section);
        let snapshot = ExportSnapshot::section(operation, &record, name)?;
        info!(operation = %operation, section, "section exported");
        Some(snapshot)
    }

    /// Discard the current case and start a new one from `meta`.
    pub fn reset_case(&self, meta: Patch) -> Result<(), StoreError> {
        let _token = self.guard.try_enter().ok_or(StoreError::Busy)?;
        let mut meta = Value::Object(meta);
        self.sanitizer.sanitize_value(&mut meta);
        let meta = match meta {
            Value::Object(map) => map,
            _ => Patch::new(),
        };

        let mut record = self.standardizer.standardize(CaseRecord::with_meta(meta));
        self.recalculate(&mut record);
        self.persistence.clear()?;

        let mut state = self.state.lock();
        state.queue.clear();
        state.base = None;
        state.record = record;
        state.mirror = legacy_mirror(&state.record);
        self.persistence.save(&mut state.record)?;
        if let Err(err) = self.persistence.save_mirror(&state.mirror) {
            warn!(error = %err, "legacy mirror not written");
        }
        info!(case_id = state.record.case_id(), "case reset");
        Ok(())
    }

    /// Close the case after a terminal export. Returns `Ok(false)` for
    /// operations that keep the case open.
    pub fn finish_terminal_export(&self, operation: ExportOperation) -> Result<bool, StoreError> {
        if !operation.is_terminal() {
            return Ok(false);
        }
        let _token = self.guard.try_enter().ok_or(StoreError::Busy)?;
        self.persistence.clear()?;
        let mut state = self.state.lock();
        let record = CaseRecord::new();
        *state = State {
            mirror: legacy_mirror(&record),
            record,
            base: None,
            queue: PendingQueue::new(),
        };
        info!(operation = %operation, "case closed after terminal export");
        Ok(true)
    }
}
