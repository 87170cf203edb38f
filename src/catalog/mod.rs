//! Catalog index abstraction.
//!
//! The catalog is the set of every package version available for install,
//! as opposed to what is currently installed. Indexing and mirror selection
//! live elsewhere; the resolver only needs [`CatalogIndex::lookup`].

mod file;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use file::FileCatalog;

use crate::package::PackageMeta;

/// One published version of a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub metadata: PackageMeta,
    /// Where the artefact for this version can be found.
    pub artefact: String,
}

/// All published versions of one package id, keyed by version string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesInfo {
    pub versions: BTreeMap<String, CatalogEntry>,
}

impl SeriesInfo {
    pub fn candidates(&self) -> impl Iterator<Item = &PackageMeta> {
        self.versions.values().map(|e| &e.metadata)
    }

    /// Find the entry carrying exactly `meta`'s version.
    pub fn entry_for(&self, meta: &PackageMeta) -> Option<&CatalogEntry> {
        self.versions
            .values()
            .find(|e| e.metadata.is(&meta.id, &meta.version))
    }
}

/// Trait for catalog indexes.
#[cfg_attr(test, mockall::automock)]
pub trait CatalogIndex: Send + Sync {
    /// Every known version of `package_id`, or `None` if the id is unknown.
    fn lookup(&self, package_id: &str) -> Option<SeriesInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    #[test]
    fn test_series_entry_for_matches_identity() {
        let mut series = SeriesInfo::default();
        for v in ["1.0.0", "1.1.0"] {
            series.versions.insert(
                v.to_string(),
                CatalogEntry {
                    metadata: PackageMeta::new("lib", Version::parse(v).unwrap(), "archive", "none"),
                    artefact: format!("lib-{}.tar.gz", v),
                },
            );
        }

        let wanted = PackageMeta::new("lib", Version::new(1, 1, 0), "archive", "none");
        assert_eq!(series.entry_for(&wanted).unwrap().artefact, "lib-1.1.0.tar.gz");
        assert_eq!(series.candidates().count(), 2);

        let unknown = PackageMeta::new("lib", Version::new(9, 0, 0), "archive", "none");
        assert!(series.entry_for(&unknown).is_none());
    }
}
