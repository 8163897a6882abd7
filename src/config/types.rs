// Configuration type definitions

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::batcher::{
    BatchOptions, DEFAULT_BATCH_DELAY_MS, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_RETRIES,
};
use crate::cache::{
    CacheOptions, DEFAULT_EVICT_BATCH, DEFAULT_MAX_ITEMS, DEFAULT_MAX_PAYLOAD_BYTES,
    DEFAULT_TTL_DAYS, default_cache_dir,
};
use crate::controller::{ControllerOptions, DEFAULT_MIN_SEARCH_LEN};
use crate::debounce::DEFAULT_DEBOUNCE_MS;
use crate::quality::FilterContext;
use crate::store::{
    DEFAULT_MAX_TRANSACTION_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_MS, StoreOptions, default_data_path,
};

/// Autocomplete field configuration section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AutocompleteConfig {
    pub debounce_ms: u64,
    pub min_search_len: usize,
    /// Filter preset applied to suggestion lists
    pub quality: FilterContext,
}

impl Default for AutocompleteConfig {
    fn default() -> Self {
        AutocompleteConfig {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            min_search_len: DEFAULT_MIN_SEARCH_LEN,
            quality: FilterContext::Autocomplete,
        }
    }
}

impl AutocompleteConfig {
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            debounce: Duration::from_millis(self.debounce_ms),
            min_search_len: self.min_search_len,
            actor: None,
        }
    }
}

/// Local cache configuration section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_days: i64,
    pub max_items: usize,
    pub max_payload_bytes: usize,
    pub evict_batch: usize,
    /// Overrides the platform cache directory
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_days: DEFAULT_TTL_DAYS,
            max_items: DEFAULT_MAX_ITEMS,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            evict_batch: DEFAULT_EVICT_BATCH,
            dir: None,
        }
    }
}

impl CacheConfig {
    pub fn options(&self) -> CacheOptions {
        CacheOptions {
            ttl: chrono::Duration::days(self.ttl_days.max(0)),
            max_items: self.max_items,
            max_payload_bytes: self.max_payload_bytes,
            evict_batch: self.evict_batch,
        }
    }

    pub fn resolved_dir(&self) -> Option<PathBuf> {
        self.dir.clone().or_else(default_cache_dir)
    }
}

/// Suggestion store configuration section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub request_timeout_ms: u64,
    pub max_transaction_attempts: u32,
    /// Overrides the platform data file location
    pub data_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_transaction_attempts: DEFAULT_MAX_TRANSACTION_ATTEMPTS,
            data_path: None,
        }
    }
}

impl StoreConfig {
    pub fn options(&self) -> StoreOptions {
        StoreOptions {
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            max_transaction_attempts: self.max_transaction_attempts,
        }
    }

    pub fn resolved_data_path(&self) -> Option<PathBuf> {
        self.data_path.clone().or_else(default_data_path)
    }
}

/// Batched recording configuration section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_batch_size: usize,
    pub batch_delay_ms: u64,
    pub max_retries: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl BatchConfig {
    pub fn options(&self) -> BatchOptions {
        BatchOptions {
            max_batch_size: self.max_batch_size,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            max_retries: self.max_retries,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub autocomplete: AutocompleteConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
