use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Removes partially written paths unless the operation succeeds.
///
/// Paths are registered as they are created; dropping the guard without
/// calling [`CleanupGuard::success`] deletes every registered path.
pub struct CleanupGuard<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    paths: Vec<PathBuf>,
}

impl<'a, R: Runtime + ?Sized> CleanupGuard<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self {
            runtime,
            paths: Vec::new(),
        }
    }

    /// Register a path for removal on failure.
    pub fn add(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    /// Stop tracking a path (e.g. it was already cleaned up).
    pub fn remove(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Mark the operation as successful, keeping every registered path.
    pub fn success(mut self) {
        self.paths.clear();
    }
}

impl<R: Runtime + ?Sized> Drop for CleanupGuard<'_, R> {
    fn drop(&mut self) {
        for path in self.paths.drain(..).rev() {
            if !self.runtime.exists(&path) {
                continue;
            }
            debug!("Cleaning up: {:?}", path);
            let result = if self.runtime.is_dir(&path) {
                self.runtime.remove_dir_all(&path)
            } else {
                self.runtime.remove_file(&path)
            };
            if let Err(e) = result {
                warn!("Failed to clean up {:?}: {:#}", path, e);
            }
        }
    }
}
