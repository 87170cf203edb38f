use anyhow::{Result, anyhow};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use super::{PackageSpec, load_catalog};
use crate::catalog::CatalogIndex;
use crate::config::InstallPaths;
use crate::database::DatabaseStore;
use crate::package::VersionResolver;
use crate::resolver::{plan_install, resolve_tree};
use crate::runtime::Runtime;

/// Print what installing `spec` would do, without installing anything.
#[tracing::instrument(skip(runtime, install_root, catalog_path))]
pub fn resolve<R: Runtime>(
    runtime: R,
    spec: &str,
    install_root: Option<PathBuf>,
    catalog_path: Option<PathBuf>,
) -> Result<()> {
    let spec: PackageSpec = spec.parse()?;
    let paths = InstallPaths::resolve(&runtime, install_root)?;
    let catalog = load_catalog(&runtime, &paths, catalog_path.as_deref())?;
    let db = DatabaseStore::new(&runtime, paths.database_file()).load();

    let series = catalog
        .lookup(&spec.id)
        .ok_or_else(|| anyhow!("Package '{}' not found in catalog", spec.id))?;
    let target = VersionResolver::best_match(series.candidates(), &spec.range)
        .ok_or_else(|| anyhow!("No version of {} matches {}", spec.id, spec.range))?;

    let closure = resolve_tree(target, &catalog, &db, &CancellationToken::new())?;
    for task in plan_install(target, &closure, &catalog)? {
        let marker = if task.leaf.is_explicit { "*" } else { " " };
        println!("{} {} <- {}", marker, task.meta(), task.artefact.display());
    }
    Ok(())
}
