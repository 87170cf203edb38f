use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::{PackageMeta, VersionRange};

/// A requirement on some version of a package, not a pointer to a concrete one.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyReference {
    pub package_id: String,
    pub version_range: VersionRange,
}

impl DependencyReference {
    pub fn new(package_id: impl Into<String>, version_range: VersionRange) -> Self {
        Self {
            package_id: package_id.into(),
            version_range,
        }
    }

    /// Whether `meta` has the referenced id and a version inside the range.
    pub fn is_satisfied_by(&self, meta: &PackageMeta) -> bool {
        meta.id == self.package_id && self.version_range.matches(&meta.version)
    }
}

impl fmt::Display for DependencyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.package_id, self.version_range)
    }
}

/// A pointer to one concrete package version.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageReference {
    pub package_id: String,
    pub version: Version,
}

impl PackageReference {
    pub fn new(package_id: impl Into<String>, version: Version) -> Self {
        Self {
            package_id: package_id.into(),
            version,
        }
    }

    pub fn points_to(&self, meta: &PackageMeta) -> bool {
        meta.is(&self.package_id, &self.version)
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.package_id, self.version)
    }
}

/// A package in an install batch, flagged with whether the user asked for it.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyLeaf {
    pub package: PackageMeta,
    pub is_explicit: bool,
}

impl DependencyLeaf {
    pub fn explicit(package: PackageMeta) -> Self {
        Self {
            package,
            is_explicit: true,
        }
    }

    pub fn transitive(package: PackageMeta) -> Self {
        Self {
            package,
            is_explicit: false,
        }
    }
}

/// A package whose artefact has been fetched and verified, ready to install.
#[derive(Debug, Clone, PartialEq)]
pub struct DueInstallTask {
    pub leaf: DependencyLeaf,
    pub artefact: PathBuf,
}

impl DueInstallTask {
    pub fn new(leaf: DependencyLeaf, artefact: impl Into<PathBuf>) -> Self {
        Self {
            leaf,
            artefact: artefact.into(),
        }
    }

    pub fn meta(&self) -> &PackageMeta {
        &self.leaf.package
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str, version: &str) -> PackageMeta {
        PackageMeta::new(id, Version::parse(version).unwrap(), "archive", "none")
    }

    #[test]
    fn test_points_to_requires_exact_match() {
        let reference = PackageReference::new("lib", Version::new(1, 2, 0));
        assert!(reference.points_to(&meta("lib", "1.2.0")));
        assert!(!reference.points_to(&meta("lib", "1.2.1")));
        assert!(!reference.points_to(&meta("other", "1.2.0")));
    }

    #[test]
    fn test_dependency_reference_satisfaction() {
        let reference = DependencyReference::new("lib", ">=1.0.0 <2.0.0".parse().unwrap());
        assert!(reference.is_satisfied_by(&meta("lib", "1.5.0")));
        assert!(!reference.is_satisfied_by(&meta("lib", "2.0.0")));
        assert!(!reference.is_satisfied_by(&meta("other", "1.5.0")));
    }

    #[test]
    fn test_reference_display() {
        let reference = DependencyReference::new("lib", "^1.2".parse().unwrap());
        assert_eq!(reference.to_string(), "lib (^1.2)");
        assert_eq!(
            PackageReference::new("lib", Version::new(1, 2, 3)).to_string(),
            "lib@1.2.3"
        );
    }

    #[test]
    fn test_leaf_flags() {
        assert!(DependencyLeaf::explicit(meta("a", "1.0.0")).is_explicit);
        assert!(!DependencyLeaf::transitive(meta("a", "1.0.0")).is_explicit);
    }
}
