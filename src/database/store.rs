use anyhow::Context;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use super::InstallDatabase;
use crate::error::DatabaseError;
use crate::runtime::{Runtime, write_atomic};

/// Loads and saves the install database as a JSON file.
pub struct DatabaseStore<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime + ?Sized> DatabaseStore<'a, R> {
    pub fn new(runtime: &'a R, path: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the database. A missing file is an empty database; an unreadable
    /// or corrupt one is logged and replaced by an empty database.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> InstallDatabase {
        if !self.runtime.exists(&self.path) {
            debug!("No install database at {:?}, starting empty", self.path);
            return InstallDatabase::new();
        }

        let content = match self.runtime.read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read install database: {:#}", e);
                return InstallDatabase::new();
            }
        };

        let mut db: InstallDatabase = match serde_json::from_str(&content) {
            Ok(db) => db,
            Err(e) => {
                warn!(
                    "Install database {:?} is corrupt ({}), starting empty",
                    self.path, e
                );
                return InstallDatabase::new();
            }
        };

        let dropped = db.validate();
        if dropped > 0 {
            info!("Dropped {} corrupt record(s) from the install database", dropped);
        }
        debug!("Loaded install database with {} record(s)", db.len());
        db
    }

    /// Persist the database. The previous file stays intact if writing fails.
    #[tracing::instrument(skip(self, db), fields(path = %self.path.display()))]
    pub fn save(&self, db: &InstallDatabase) -> Result<(), DatabaseError> {
        let json = serde_json::to_string_pretty(db)
            .context("Failed to serialize install database")
            .map_err(DatabaseError::Persistence)?;
        write_atomic(self.runtime, &self.path, json.as_bytes())
            .with_context(|| format!("Failed to save install database {:?}", self.path))
            .map_err(DatabaseError::Persistence)?;
        debug!("Saved install database with {} record(s)", db.len());
        Ok(())
    }
}
