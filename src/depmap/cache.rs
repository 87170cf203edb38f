//! Key/value blob storage for derived data.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

use crate::runtime::{Runtime, write_atomic};

/// Opaque-key blob storage with existence check, create, read and delete.
#[cfg_attr(test, mockall::automock)]
pub trait CacheStore: Send + Sync {
    fn exists(&self, key: &str) -> bool;
    fn create(&self, key: &str, contents: &[u8]) -> Result<()>;
    fn read(&self, key: &str) -> Result<String>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// Cache objects stored as `<dir>/<key>.json`.
pub struct FileCacheStore<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    dir: PathBuf,
}

impl<'a, R: Runtime + ?Sized> FileCacheStore<'a, R> {
    pub fn new(runtime: &'a R, dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            dir: dir.into(),
        }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl<R: Runtime + ?Sized> CacheStore for FileCacheStore<'_, R> {
    fn exists(&self, key: &str) -> bool {
        self.runtime.exists(&self.object_path(key))
    }

    fn create(&self, key: &str, contents: &[u8]) -> Result<()> {
        write_atomic(self.runtime, &self.object_path(key), contents)
    }

    fn read(&self, key: &str) -> Result<String> {
        self.runtime.read_to_string(&self.object_path(key))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.object_path(key);
        if self.runtime.exists(&path) {
            self.runtime.remove_file(&path)?;
        }
        Ok(())
    }
}

/// Read a cached value, or build a fresh one if it is missing or unreadable.
///
/// Failures are logged and never propagated; the cache is always regenerable.
pub fn load_or<T, S>(store: &S, key: &str, factory: impl FnOnce() -> T) -> T
where
    T: DeserializeOwned,
    S: CacheStore + ?Sized,
{
    if !store.exists(key) {
        debug!("Cache object '{}' not found, regenerating", key);
        return factory();
    }

    let parsed = store
        .read(key)
        .and_then(|content| serde_json::from_str(&content).context("Malformed cache object"));
    match parsed {
        Ok(value) => value,
        Err(e) => {
            warn!("Discarding cache object '{}': {:#}", key, e);
            factory()
        }
    }
}

/// Serialize `value` into the cache under `key`.
pub fn store_json<T, S>(store: &S, key: &str, value: &T) -> Result<()>
where
    T: Serialize,
    S: CacheStore + ?Sized,
{
    let json = serde_json::to_vec(value).context("Failed to serialize cache object")?;
    store
        .create(key, &json)
        .with_context(|| format!("Failed to write cache object '{}'", key))
}
