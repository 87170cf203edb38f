//! Error taxonomy for resolution, the install database and the orchestrator.
//!
//! Every variant renders as a single human-readable line; the underlying
//! cause (if any) is reachable through `std::error::Error::source`.

use semver::Version;
use thiserror::Error;

use crate::package::{DependencyReference, PackageReference};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("No package satisfies {0}")]
    Unsatisfied(DependencyReference),

    #[error("Package depends on itself: {0}")]
    SelfReference(DependencyReference),

    #[error("Circular dependency: {id}@{version} depends back on {referenced_from}")]
    Circular {
        id: String,
        version: Version,
        referenced_from: String,
    },

    #[error("Dependency resolution was cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("{0} is already recorded in the install database")]
    AlreadyInstalled(PackageReference),

    #[error("{candidate} conflicts with installed {installed} (declared conflict: {conflicts_with})")]
    Conflict {
        candidate: PackageReference,
        conflicts_with: DependencyReference,
        installed: PackageReference,
    },

    #[error("Failed to persist install database: {0}")]
    Persistence(#[source] anyhow::Error),
}

/// Which kind of plugin a registry lookup was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    Installer,
    Preprocessor,
    Configurator,
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginKind::Installer => write!(f, "installer"),
            PluginKind::Preprocessor => write!(f, "preprocessor"),
            PluginKind::Configurator => write!(f, "configurator"),
        }
    }
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("{0} is not installed")]
    NotInstalled(PackageReference),

    #[error("No {kind} registered under '{key}' (required by {package})")]
    MissingPluginImplementation {
        kind: PluginKind,
        key: String,
        package: PackageReference,
    },

    #[error("Cannot remove {package}: still required by {}", format_refs(.dependents))]
    HasDependents {
        package: PackageReference,
        dependents: Vec<PackageReference>,
    },

    #[error("Cannot install {first} and {second} together: only one version of {} may be installed", .first.package_id)]
    UnitaryClash {
        first: PackageReference,
        second: PackageReference,
    },

    #[error("{candidate} conflicts with {other} in the same install (declared conflict: {conflicts_with})")]
    ConflictInBatch {
        candidate: PackageReference,
        conflicts_with: DependencyReference,
        other: PackageReference,
    },

    #[error("Failed to expand {package}: {source}")]
    ExpandFailed {
        package: PackageReference,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to preprocess {package}: {source}")]
    PreprocessFailed {
        package: PackageReference,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to configure {package} (left expanded, run reconfigure to retry): {source}")]
    ConfigureFailed {
        package: PackageReference,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to unconfigure {package}: {source}")]
    UnconfigureFailed {
        package: PackageReference,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to remove files of {package}: {source}")]
    RemoveFailed {
        package: PackageReference,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

fn format_refs(refs: &[PackageReference]) -> String {
    refs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
