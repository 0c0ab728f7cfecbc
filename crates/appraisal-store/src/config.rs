use std::time::Duration;

use appraisal_calc::validate_rate;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Store configuration: storage keys, VAT defaults and pipeline bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Current snapshot, in the primary store.
    pub primary_key: String,
    /// Durable copy of the snapshot, in the secondary store.
    pub secondary_key: String,
    /// Previous snapshot, in the secondary store.
    pub backup_key: String,
    pub pending_key: String,
    /// Flat legacy mirror, in the primary store.
    pub mirror_key: String,
    pub vat_rate_key: String,
    pub default_vat_rate: f64,
    pub host_rate_timeout_ms: u64,
    pub strip_sql_keywords: bool,
    pub max_alias_conflicts: usize,
    pub max_sanitize_passes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            primary_key: "helper".to_string(),
            secondary_key: "helper_data".to_string(),
            backup_key: "helper_data_backup".to_string(),
            pending_key: "helper_pending_updates".to_string(),
            mirror_key: "car_details".to_string(),
            vat_rate_key: "vat_rate".to_string(),
            default_vat_rate: 18.0,
            host_rate_timeout_ms: 2000,
            strip_sql_keywords: false,
            max_alias_conflicts: 50,
            max_sanitize_passes: 4,
        }
    }
}

impl StoreConfig {
    /// Parse from JSON; absent keys take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, StoreError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        validate_rate(self.default_vat_rate)
            .map_err(|e| StoreError::Config(format!("default_vat_rate: {e}")))?;
        if self.max_sanitize_passes == 0 {
            return Err(StoreError::Config(
                "max_sanitize_passes must be at least 1".to_string(),
            ));
        }
        let keys = [
            &self.primary_key,
            &self.secondary_key,
            &self.backup_key,
            &self.pending_key,
            &self.mirror_key,
            &self.vat_rate_key,
        ];
        if keys.iter().any(|k| k.trim().is_empty()) {
            return Err(StoreError::Config("storage keys must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn host_rate_timeout(&self) -> Duration {
        Duration::from_millis(self.host_rate_timeout_ms)
    }

    pub fn primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = key.into();
        self
    }

    pub fn secondary_key(mut self, key: impl Into<String>) -> Self {
        self.secondary_key = key.into();
        self
    }

    pub fn default_vat_rate(mut self, rate: f64) -> Self {
        self.default_vat_rate = rate;
        self
    }

    pub fn host_rate_timeout_ms(mut self, ms: u64) -> Self {
        self.host_rate_timeout_ms = ms;
        self
    }

    pub fn strip_sql_keywords(mut self, enabled: bool) -> Self {
        self.strip_sql_keywords = enabled;
        self
    }

    pub fn max_alias_conflicts(mut self, max: usize) -> Self {
        self.max_alias_conflicts = max;
        self
    }

    pub fn max_sanitize_passes(mut self, passes: usize) -> Self {
        self.max_sanitize_passes = passes;
        self
    }
}
