//! Command-line entry points.
//!
//! Each command resolves the install root, opens what it needs and prints a
//! short human-readable report. Failures are returned to `main`.

use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

use crate::catalog::FileCatalog;
use crate::config::InstallPaths;
use crate::database::InstallDatabase;
use crate::package::{PackageMeta, VersionResolver};
use crate::runtime::Runtime;

mod install;
mod list;
mod reconfigure;
mod remove;
mod resolve;
mod spec;
mod unmet;

pub use install::install;
pub use list::list;
pub use reconfigure::reconfigure;
pub use remove::remove;
pub use resolve::resolve;
pub use spec::PackageSpec;
pub use unmet::unmet;

/// Load the catalog at `explicit`, or `<root>/catalog.json`.
fn load_catalog<R: Runtime + ?Sized>(
    runtime: &R,
    paths: &InstallPaths,
    explicit: Option<&Path>,
) -> Result<FileCatalog> {
    let path: PathBuf = explicit.map_or_else(|| paths.catalog_file(), Path::to_path_buf);
    FileCatalog::load(runtime, &path)
}

/// Pick the installed version of `id` a command should act on.
///
/// Without `version`, the package must have exactly one installed version.
fn select_installed(db: &InstallDatabase, id: &str, version: Option<&str>) -> Result<PackageMeta> {
    let installed = db.versions_of(id);
    if installed.is_empty() {
        bail!("{} is not installed", id);
    }

    let selected = match version {
        Some(version) => {
            let version = VersionResolver::parse(version)?;
            installed
                .into_iter()
                .find(|info| info.metadata().version == version)
                .ok_or_else(|| anyhow::anyhow!("{}@{} is not installed", id, version))?
        }
        None => match installed.as_slice() {
            [only] => *only,
            several => {
                let versions: Vec<String> = several
                    .iter()
                    .map(|info| info.metadata().version.to_string())
                    .collect();
                bail!(
                    "Several versions of {} are installed ({}); pass --version",
                    id,
                    versions.join(", ")
                );
            }
        },
    };
    Ok(selected.metadata().clone())
}
