use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CalcError;

pub const DEFAULT_VAT_RATE: f64 = 18.0;
pub const DEFAULT_HOST_TIMEOUT: Duration = Duration::from_millis(2000);

/// Where a resolved rate came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Override,
    Host,
    Persisted,
    Default,
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Override => "override",
            Self::Host => "host",
            Self::Persisted => "persisted",
            Self::Default => "default",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRate {
    pub rate: f64,
    pub source: RateSource,
}

pub fn validate_rate(rate: f64) -> Result<f64, CalcError> {
    if rate.is_finite() && (0.0..=100.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(CalcError::InvalidRate(rate))
    }
}

/// One link of the VAT provider chain.
pub trait RateProvider: Send + Sync {
    fn source(&self) -> RateSource;
    /// A rate, or `None` to fall through to the next provider.
    fn rate(&self) -> Option<f64>;
}

/// Host or parent configuration context that may know the current rate.
/// Calls may block; the chain bounds them with a timeout.
pub trait HostRateSource: Send + Sync {
    fn vat_rate(&self) -> Option<f64>;
}

/// Durable slot for an administrator-set rate.
pub trait RateStore: Send + Sync {
    fn load_rate(&self) -> Option<f64>;
    fn store_rate(&self, rate: f64) -> Result<(), CalcError>;
}

struct OverrideProvider(Arc<RwLock<Option<f64>>>);

impl RateProvider for OverrideProvider {
    fn source(&self) -> RateSource {
        RateSource::Override
    }

    fn rate(&self) -> Option<f64> {
        *self.0.read()
    }
}

/// Asks the host on a helper thread and gives up after `timeout`.
pub struct HostContextProvider {
    host: Arc<dyn HostRateSource>,
    timeout: Duration,
}

impl HostContextProvider {
    pub fn new(host: Arc<dyn HostRateSource>, timeout: Duration) -> Self {
        Self { host, timeout }
    }
}

impl RateProvider for HostContextProvider {
    fn source(&self) -> RateSource {
        RateSource::Host
    }

    fn rate(&self) -> Option<f64> {
        let (tx, rx) = mpsc::channel();
        let host = Arc::clone(&self.host);
        thread::spawn(move || {
            // Receiver may be gone after a timeout.
            let _ = tx.send(host.vat_rate());
        });

        match rx.recv_timeout(self.timeout) {
            Ok(rate) => rate.and_then(|r| validate_rate(r).ok()),
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "host VAT rate request timed out"
                );
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("host VAT rate source disconnected");
                None
            }
        }
    }
}

pub struct PersistedRateProvider {
    store: Arc<dyn RateStore>,
}

impl PersistedRateProvider {
    pub fn new(store: Arc<dyn RateStore>) -> Self {
        Self { store }
    }
}

impl RateProvider for PersistedRateProvider {
    fn source(&self) -> RateSource {
        RateSource::Persisted
    }

    fn rate(&self) -> Option<f64> {
        self.store.load_rate().and_then(|r| validate_rate(r).ok())
    }
}

struct DefaultProvider(f64);

impl RateProvider for DefaultProvider {
    fn source(&self) -> RateSource {
        RateSource::Default
    }

    fn rate(&self) -> Option<f64> {
        Some(self.0)
    }
}

/// Cached VAT rate resolved through override, host, persisted, default.
pub struct VatRates {
    override_rate: Arc<RwLock<Option<f64>>>,
    providers: Vec<Box<dyn RateProvider>>,
    store: Option<Arc<dyn RateStore>>,
    cache: Mutex<Option<ResolvedRate>>,
}

impl Default for VatRates {
    fn default() -> Self {
        Self::new(DEFAULT_VAT_RATE)
    }
}

impl VatRates {
    /// Chain of an empty override and the given system default.
    pub fn new(default_rate: f64) -> Self {
        let override_rate = Arc::new(RwLock::new(None));
        let default_rate = validate_rate(default_rate).unwrap_or(DEFAULT_VAT_RATE);
        Self {
            providers: vec![
                Box::new(OverrideProvider(Arc::clone(&override_rate))),
                Box::new(DefaultProvider(default_rate)),
            ],
            override_rate,
            store: None,
            cache: Mutex::new(None),
        }
    }

    /// Insert a host-context provider after the override.
    pub fn with_host(mut self, host: Arc<dyn HostRateSource>, timeout: Duration) -> Self {
        self.insert_before_default(Box::new(HostContextProvider::new(host, timeout)));
        self
    }

    /// Insert a persisted-rate provider just before the default. The same
    /// store receives rates passed to [`VatRates::set_rate`].
    pub fn with_store(mut self, store: Arc<dyn RateStore>) -> Self {
        self.insert_before_default(Box::new(PersistedRateProvider::new(Arc::clone(&store))));
        self.store = Some(store);
        self
    }

    fn insert_before_default(&mut self, provider: Box<dyn RateProvider>) {
        let at = self.providers.len().saturating_sub(1);
        self.providers.insert(at, provider);
        self.cache.get_mut().take();
    }

    /// The cached rate, resolving the chain on first use.
    pub fn current(&self) -> ResolvedRate {
        let mut cache = self.cache.lock();
        if let Some(resolved) = *cache {
            return resolved;
        }
        let resolved = self.resolve();
        *cache = Some(resolved);
        resolved
    }

    pub fn rate(&self) -> f64 {
        self.current().rate
    }

    fn resolve(&self) -> ResolvedRate {
        for provider in &self.providers {
            if let Some(rate) = provider.rate() {
                debug!(rate, source = %provider.source(), "VAT rate resolved");
                return ResolvedRate {
                    rate,
                    source: provider.source(),
                };
            }
        }
        ResolvedRate {
            rate: DEFAULT_VAT_RATE,
            source: RateSource::Default,
        }
    }

    /// Drop the cached rate; the next read walks the chain again.
    pub fn invalidate(&self) {
        self.cache.lock().take();
    }

    /// Set an explicit rate: override, persist and repopulate the cache.
    ///
    /// A persistence failure is logged; the in-memory override still holds.
    pub fn set_rate(&self, rate: f64) -> Result<ResolvedRate, CalcError> {
        let rate = validate_rate(rate)?;
        *self.override_rate.write() = Some(rate);

        if let Some(store) = &self.store {
            if let Err(err) = store.store_rate(rate) {
                warn!(rate, error = %err, "VAT rate not persisted");
            }
        }

        self.invalidate();
        let resolved = self.current();
        info!(rate = resolved.rate, source = %resolved.source, "VAT rate updated");
        Ok(resolved)
    }
}

impl fmt::Debug for VatRates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<RateSource> = self.providers.iter().map(|p| p.source()).collect();
        f.debug_struct("VatRates")
            .field("providers", &sources)
            .field("cache", &*self.cache.lock())
            .finish()
    }
}
