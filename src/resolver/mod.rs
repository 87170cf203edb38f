//! Dependency resolver
//!
//! Turns a package's declared dependency references into a validated,
//! cycle-free, deduplicated set of catalog packages to install.
//!
//! Version selection is greedy: every reference picks the highest catalog
//! version inside its range, with no backtracking.

mod installed;
mod plan;
mod tree;

use log::debug;

pub use installed::{InstalledIndex, InstalledSnapshot};
pub use plan::plan_install;
pub use tree::{resolve_tree, resolve_tree_background};

use crate::catalog::CatalogIndex;
use crate::error::ResolveError;
use crate::package::{PackageMeta, VersionResolver};

/// Resolve one layer of `meta`'s dependencies against the catalog.
///
/// References already satisfied by an installed package are skipped. A
/// candidate whose own dependencies point straight back at `meta` is
/// rejected as circular.
pub fn resolve_dependencies(
    meta: &PackageMeta,
    catalog: &dyn CatalogIndex,
    installed: &dyn InstalledIndex,
) -> Result<Vec<PackageMeta>, ResolveError> {
    let mut resolved = Vec::with_capacity(meta.dependencies.len());

    for reference in &meta.dependencies {
        if installed.satisfies(reference) {
            debug!("{}: {} is already installed", meta, reference);
            continue;
        }

        if reference.package_id == meta.id {
            return Err(ResolveError::SelfReference(reference.clone()));
        }

        let series = catalog
            .lookup(&reference.package_id)
            .ok_or_else(|| ResolveError::Unsatisfied(reference.clone()))?;
        let candidate = VersionResolver::best_match(series.candidates(), &reference.version_range)
            .ok_or_else(|| ResolveError::Unsatisfied(reference.clone()))?;

        if candidate.depends_on(&meta.id) {
            return Err(ResolveError::Circular {
                id: candidate.id.clone(),
                version: candidate.version.clone(),
                referenced_from: meta.id.clone(),
            });
        }

        debug!("{}: {} resolved to {}", meta, reference, candidate);
        resolved.push(candidate.clone());
    }

    Ok(resolved)
}
