//! Dependency mapper
//!
//! Derives forward and reverse dependency edges over the installed package
//! graph, for impact analysis ("what breaks if I remove X"). The map is a
//! cache: it is always rebuilt from the install database and safe to discard.

mod cache;

use log::{debug, warn};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use cache::{CacheStore, FileCacheStore, load_or, store_json};

#[cfg(test)]
pub use cache::MockCacheStore;

use crate::database::InstallDatabase;
use crate::package::{DependencyReference, PackageReference};

/// Cache key of the persisted dependency map.
pub const DEPENDENCY_MAP_KEY: &str = "dependency-map";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyMapEntry {
    pub dependencies: Vec<PackageReference>,
    pub dependents: Vec<PackageReference>,
    pub has_unsatisfied_dependencies: bool,
    /// References no installed package satisfies.
    #[serde(default)]
    pub unmet: Vec<DependencyReference>,
}

/// `package id -> version -> entry` over the installed graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyMap {
    entries: BTreeMap<String, BTreeMap<String, DependencyMapEntry>>,
}

impl DependencyMap {
    /// Rebuild the map from every installed package.
    pub fn build(db: &InstallDatabase) -> Self {
        let mut map = Self::default();

        for meta in db.enumerate_packages() {
            map.entry_mut(&meta.id, &meta.version);

            for reference in &meta.dependencies {
                match db.find_satisfying(reference) {
                    Some(target) => {
                        let target = target.reference();
                        map.entry_mut(&target.package_id, &target.version)
                            .dependents
                            .push(meta.reference());
                        map.entry_mut(&meta.id, &meta.version)
                            .dependencies
                            .push(target);
                    }
                    None => {
                        let entry = map.entry_mut(&meta.id, &meta.version);
                        entry.has_unsatisfied_dependencies = true;
                        entry.unmet.push(reference.clone());
                    }
                }
            }
        }

        debug!("Mapped dependencies of {} installed package(s)", db.len());
        map
    }

    fn entry_mut(&mut self, id: &str, version: &Version) -> &mut DependencyMapEntry {
        self.entries
            .entry(id.to_string())
            .or_default()
            .entry(version.to_string())
            .or_default()
    }

    pub fn entry(&self, id: &str, version: &Version) -> Option<&DependencyMapEntry> {
        self.entries.get(id)?.get(&version.to_string())
    }

    /// Installed packages that depend on exactly `reference`.
    pub fn dependents_of(&self, reference: &PackageReference) -> &[PackageReference] {
        self.entry(&reference.package_id, &reference.version)
            .map(|entry| entry.dependents.as_slice())
            .unwrap_or_default()
    }

    pub fn enumerate_unsatisfied_packages(&self) -> Vec<PackageReference> {
        self.iter()
            .filter(|(_, entry)| entry.has_unsatisfied_dependencies)
            .map(|(reference, _)| reference)
            .collect()
    }

    pub fn unmet_dependencies(&self) -> BTreeMap<PackageReference, Vec<DependencyReference>> {
        self.iter()
            .filter(|(_, entry)| entry.has_unsatisfied_dependencies)
            .map(|(reference, entry)| (reference, entry.unmet.clone()))
            .collect()
    }

    fn iter(&self) -> impl Iterator<Item = (PackageReference, &DependencyMapEntry)> {
        self.entries.iter().flat_map(|(id, versions)| {
            versions.iter().filter_map(move |(version, entry)| {
                let version = Version::parse(version).ok()?;
                Some((PackageReference::new(id.clone(), version), entry))
            })
        })
    }
}

/// Builds dependency maps and keeps the last one in a cache store.
pub struct DependencyMapper<S: CacheStore> {
    store: S,
}

impl<S: CacheStore> DependencyMapper<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Build a fresh map and persist it.
    pub fn map_dependencies(&self, db: &InstallDatabase) -> DependencyMap {
        let map = DependencyMap::build(db);
        self.persist(&map);
        map
    }

    /// The persisted map, or a freshly built one if none is cached.
    pub fn map_dependencies_cached(&self, db: &InstallDatabase) -> DependencyMap {
        let mut regenerated = false;
        let map = load_or(&self.store, DEPENDENCY_MAP_KEY, || {
            regenerated = true;
            DependencyMap::build(db)
        });
        if regenerated {
            self.persist(&map);
        }
        map
    }

    /// Invalidate the persisted map.
    pub fn clear_cache(&self) {
        if let Err(e) = self.store.delete(DEPENDENCY_MAP_KEY) {
            warn!("Failed to clear dependency map cache: {:#}", e);
        }
    }

    fn persist(&self, map: &DependencyMap) {
        if let Err(e) = store_json(&self.store, DEPENDENCY_MAP_KEY, map) {
            warn!("Failed to cache dependency map: {:#}", e);
        }
    }

    pub fn enumerate_unsatisfied_packages(&self, db: &InstallDatabase) -> Vec<PackageReference> {
        self.map_dependencies_cached(db)
            .enumerate_unsatisfied_packages()
    }

    pub fn map_unmet_dependencies(
        &self,
        db: &InstallDatabase,
    ) -> BTreeMap<PackageReference, Vec<DependencyReference>> {
        self.map_dependencies_cached(db).unmet_dependencies()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InstalledPackageInfo;
    use crate::package::PackageMeta;
    use crate::runtime::RealRuntime;
    use tempfile::tempdir;

    fn pkg(id: &str, version: &str, deps: &[(&str, &str)]) -> PackageMeta {
        let mut meta = PackageMeta::new(id, Version::parse(version).unwrap(), "archive", "none");
        meta.dependencies = deps
            .iter()
            .map(|(dep, range)| DependencyReference::new(*dep, range.parse().unwrap()))
            .collect();
        meta
    }

    fn install(db: &mut InstallDatabase, meta: PackageMeta) {
        db.put(InstalledPackageInfo::configured(meta, true));
    }

    fn reference(id: &str, version: &str) -> PackageReference {
        PackageReference::new(id, Version::parse(version).unwrap())
    }

    #[test]
    fn test_edges_point_at_best_installed_version() {
        let mut db = InstallDatabase::new();
        install(&mut db, pkg("app", "1.0.0", &[("lib", ">=1.0.0 <2.0.0")]));
        install(&mut db, pkg("lib", "1.1.0", &[]));
        install(&mut db, pkg("lib", "1.4.0", &[]));
        install(&mut db, pkg("lib", "2.0.0", &[]));

        let map = DependencyMap::build(&db);

        let app = map.entry("app", &Version::new(1, 0, 0)).unwrap();
        assert_eq!(app.dependencies, vec![reference("lib", "1.4.0")]);
        assert!(!app.has_unsatisfied_dependencies);
        assert_eq!(
            map.dependents_of(&reference("lib", "1.4.0")),
            &[reference("app", "1.0.0")]
        );
        assert!(map.dependents_of(&reference("lib", "1.1.0")).is_empty());
        assert!(map.dependents_of(&reference("lib", "2.0.0")).is_empty());
    }

    #[test]
    fn test_unsatisfied_dependencies_are_surfaced() {
        let mut db = InstallDatabase::new();
        install(&mut db, pkg("app", "1.0.0", &[("lib", ">=1.0.0"), ("gone", "*")]));
        install(&mut db, pkg("lib", "1.0.0", &[]));

        let map = DependencyMap::build(&db);

        assert_eq!(
            map.enumerate_unsatisfied_packages(),
            vec![reference("app", "1.0.0")]
        );
        let unmet = map.unmet_dependencies();
        assert_eq!(unmet[&reference("app", "1.0.0")][0].package_id, "gone");
    }

    #[test]
    fn test_cached_map_is_reused_until_cleared() {
        let dir = tempdir().unwrap();
        let mapper = DependencyMapper::new(FileCacheStore::new(&RealRuntime, dir.path()));

        let mut db = InstallDatabase::new();
        install(&mut db, pkg("app", "1.0.0", &[("lib", "*")]));
        install(&mut db, pkg("lib", "1.0.0", &[]));
        mapper.map_dependencies(&db);

        // The cached view does not see the removal until the cache is cleared.
        db.remove("lib");
        assert!(mapper.enumerate_unsatisfied_packages(&db).is_empty());

        mapper.clear_cache();
        assert_eq!(
            mapper.enumerate_unsatisfied_packages(&db),
            vec![reference("app", "1.0.0")]
        );
        assert!(mapper.map_unmet_dependencies(&db).contains_key(&reference("app", "1.0.0")));
    }

    #[test]
    fn test_corrupt_cache_is_rebuilt_and_rewritten() {
        let mut store = MockCacheStore::new();
        store.expect_exists().returning(|_| true);
        store.expect_read().returning(|_| Ok("garbage".to_string()));
        store
            .expect_create()
            .withf(|key, _| key == DEPENDENCY_MAP_KEY)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut db = InstallDatabase::new();
        install(&mut db, pkg("lib", "1.0.0", &[]));

        let map = DependencyMapper::new(store).map_dependencies_cached(&db);
        assert!(map.entry("lib", &Version::new(1, 0, 0)).is_some());
    }
}
