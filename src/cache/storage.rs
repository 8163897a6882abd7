//! Key-value storage behind the suggestion cache
//!
//! Mirrors a browser-style local storage: string keys, string values, and a
//! byte quota that makes writes fail once exceeded.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::CacheError;

const CACHE_DIR: &str = "muster";
const ENTRY_EXT: &str = "json";

pub fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|p| p.join(CACHE_DIR))
}

pub trait CacheStore: Send {
    fn get_item(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Fails with [`CacheError::QuotaExceeded`] when the value does not fit
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), CacheError>;

    fn remove_item(&mut self, key: &str) -> Result<(), CacheError>;

    fn keys(&self) -> Result<Vec<String>, CacheError>;
}

impl<T: CacheStore + ?Sized> CacheStore for Box<T> {
    fn get_item(&self, key: &str) -> Result<Option<String>, CacheError> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), CacheError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<(), CacheError> {
        (**self).remove_item(key)
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        (**self).keys()
    }
}

/// In-memory store with an optional byte quota over keys plus values
#[derive(Debug, Default, Clone)]
pub struct MemoryCacheStore {
    items: HashMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: HashMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn set_quota(&mut self, quota_bytes: Option<usize>) {
        self.quota_bytes = quota_bytes;
    }

    pub fn used_bytes(&self) -> usize {
        self.items.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), CacheError> {
        if let Some(quota) = self.quota_bytes {
            let replaced = self.items.get(key).map_or(0, |old| key.len() + old.len());
            let needed = self.used_bytes() - replaced + key.len() + value.len();
            if needed > quota {
                return Err(CacheError::QuotaExceeded);
            }
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), CacheError> {
        self.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.items.keys().cloned().collect())
    }
}

/// One file per key in a directory, with an optional byte quota
#[derive(Debug, Clone)]
pub struct DirCacheStore {
    dir: PathBuf,
    quota_bytes: Option<usize>,
}

impl DirCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            quota_bytes: None,
        }
    }

    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key.replace(['/', '\\'], "_"), ENTRY_EXT))
    }

    fn used_bytes(&self) -> Result<usize, CacheError> {
        let mut total = 0;
        for key in self.keys()? {
            if let Ok(meta) = fs::metadata(self.file_for(&key)) {
                total += key.len() + meta.len() as usize;
            }
        }
        Ok(total)
    }
}

impl CacheStore for DirCacheStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, CacheError> {
        match fs::read_to_string(self.file_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;
        let file = self.file_for(key);

        if let Some(quota) = self.quota_bytes {
            let replaced = fs::metadata(&file).map_or(0, |m| key.len() + m.len() as usize);
            let needed = self.used_bytes()? - replaced + key.len() + value.len();
            if needed > quota {
                return Err(CacheError::QuotaExceeded);
            }
        }

        fs::write(file, value)?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), CacheError> {
        match fs::remove_file(self.file_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                    return None;
                }
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
            })
            .collect())
    }
}
