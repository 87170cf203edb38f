//! Install database
//!
//! A two-level map `package id -> version -> InstalledPackageInfo` recording
//! the lifecycle state of every installed package version.
//!
//! The database is loaded once per process and mutated in memory; callers
//! save it explicitly through [`DatabaseStore`] after a batch of mutations.
//! A crash between a mutation and the next save loses that batch, while the
//! file on disk keeps the previous self-consistent state. The database is not
//! safe for concurrent mutation; one writer per install root is assumed.

mod info;
mod store;

use log::warn;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use info::{InstallState, InstalledPackageInfo};
pub use store::DatabaseStore;

use crate::error::DatabaseError;
use crate::package::{DependencyReference, PackageMeta, PackageReference, VersionResolver};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallDatabase {
    packages: BTreeMap<String, BTreeMap<String, InstalledPackageInfo>>,
}

impl InstallDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact-match lookup. A record whose metadata disagrees with its key is
    /// treated as absent.
    pub fn get(&self, id: &str, version: &Version) -> Option<&InstalledPackageInfo> {
        self.packages
            .get(id)?
            .get(&version.to_string())
            .filter(|info| info.metadata().is(id, version))
    }

    pub fn get_meta(&self, meta: &PackageMeta) -> Option<&InstalledPackageInfo> {
        self.get(&meta.id, &meta.version)
    }

    pub fn get_reference(&self, reference: &PackageReference) -> Option<&InstalledPackageInfo> {
        self.get(&reference.package_id, &reference.version)
    }

    /// Every recorded version of `id`.
    pub fn versions_of(&self, id: &str) -> Vec<&InstalledPackageInfo> {
        self.packages
            .get(id)
            .map(|versions| versions.values().collect())
            .unwrap_or_default()
    }

    /// Insert or replace the record at `(id, version)`.
    pub fn put(&mut self, info: InstalledPackageInfo) {
        let meta = info.metadata();
        let (id, key) = (meta.id.clone(), meta.version.to_string());
        self.packages.entry(id).or_default().insert(key, info);
    }

    /// Insert a record, failing if one already exists at that key.
    pub fn add(&mut self, info: InstalledPackageInfo) -> Result<(), DatabaseError> {
        if self
            .packages
            .get(&info.metadata().id)
            .is_some_and(|versions| versions.contains_key(&info.metadata().version.to_string()))
        {
            return Err(DatabaseError::AlreadyInstalled(info.reference()));
        }
        self.put(info);
        Ok(())
    }

    /// Remove every version of `id`.
    pub fn remove(&mut self, id: &str) -> Vec<InstalledPackageInfo> {
        self.packages
            .remove(id)
            .map(|versions| versions.into_values().collect())
            .unwrap_or_default()
    }

    /// Remove one version. The (possibly empty) id entry stays until [`maintain`](Self::maintain).
    pub fn remove_version(&mut self, id: &str, version: &Version) -> Option<InstalledPackageInfo> {
        self.packages.get_mut(id)?.remove(&version.to_string())
    }

    /// Prune ids with no versions left. Returns how many were pruned.
    pub fn maintain(&mut self) -> usize {
        let before = self.packages.len();
        self.packages.retain(|_, versions| !versions.is_empty());
        before - self.packages.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &InstalledPackageInfo> {
        self.packages.values().flat_map(|versions| versions.values())
    }

    pub fn enumerate_packages(&self) -> impl Iterator<Item = &PackageMeta> {
        self.entries().map(InstalledPackageInfo::metadata)
    }

    pub fn len(&self) -> usize {
        self.packages.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest installed version satisfying `reference`, in any state.
    pub fn find_satisfying(&self, reference: &DependencyReference) -> Option<&InstalledPackageInfo> {
        let versions = self.packages.get(&reference.package_id)?;
        let best = VersionResolver::best_match(
            versions.values().map(InstalledPackageInfo::metadata),
            &reference.version_range,
        )?;
        self.get_meta(best)
    }

    /// Fail if any installed package falls in one of `candidate`'s declared conflicts.
    ///
    /// A virtual record provided by the candidate itself never conflicts with it.
    pub fn check_conflicts(&self, candidate: &PackageMeta) -> Result<(), DatabaseError> {
        for conflict in &candidate.conflicts_with {
            let Some(versions) = self.packages.get(&conflict.package_id) else {
                continue;
            };
            for info in versions.values() {
                if !conflict.version_range.matches(&info.metadata().version) {
                    continue;
                }
                if info.is_virtual()
                    && info.provided_by().is_some_and(|origin| origin.points_to(candidate))
                {
                    continue;
                }
                return Err(DatabaseError::Conflict {
                    candidate: candidate.reference(),
                    conflicts_with: conflict.clone(),
                    installed: info.reference(),
                });
            }
        }
        Ok(())
    }

    /// Drop records that cannot be trusted: key/identity mismatches and
    /// broken virtual pairings. Returns how many were dropped.
    pub(crate) fn validate(&mut self) -> usize {
        let mut dropped = 0;
        for (id, versions) in self.packages.iter_mut() {
            versions.retain(|key, info| {
                let meta = info.metadata();
                let keyed_right = meta.id == *id && meta.version.to_string() == *key;
                let ok = keyed_right && info.is_consistent();
                if !ok {
                    warn!("Dropping corrupt install record {}/{} ({})", id, key, meta);
                    dropped += 1;
                }
                ok
            });
        }
        self.maintain();
        dropped
    }
}
