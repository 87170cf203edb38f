use anyhow::Result;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use super::select_installed;
use crate::config::InstallPaths;
use crate::orchestrator::Orchestrator;
use crate::plugin::PluginRegistry;
use crate::runtime::Runtime;

/// Remove an installed package version.
///
/// Refuses while other installed packages depend on it, unless `force` is set.
#[tracing::instrument(skip(runtime, install_root))]
pub fn remove<R: Runtime + 'static>(
    runtime: R,
    id: &str,
    version: Option<&str>,
    force: bool,
    install_root: Option<PathBuf>,
) -> Result<()> {
    let runtime = Arc::new(runtime);
    let paths = InstallPaths::resolve(runtime.as_ref(), install_root)?;
    let plugins = PluginRegistry::with_builtins(runtime.clone(), &paths);
    let mut orchestrator = Orchestrator::open(runtime.as_ref(), &plugins, &paths);

    let meta = select_installed(orchestrator.database(), id, version)?;
    info!("Removing {}", meta);
    orchestrator.remove(&meta, force)?;
    println!("Removed {}", meta);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DatabaseStore, InstallDatabase, InstalledPackageInfo};
    use crate::error::InstallError;
    use crate::package::{DependencyReference, PackageMeta};
    use crate::runtime::RealRuntime;
    use semver::Version;
    use std::fs;
    use tempfile::tempdir;

    /// Lay out `lib` and `app` (depending on `lib`) as if installed by the `file` installer.
    fn seed(paths: &InstallPaths) {
        let lib = PackageMeta::new("lib", Version::new(1, 0, 0), "file", "none");
        let mut app = PackageMeta::new("app", Version::new(1, 0, 0), "file", "none");
        app.dependencies
            .push(DependencyReference::new("lib", "*".parse().unwrap()));

        let mut db = InstallDatabase::new();
        for meta in [lib, app] {
            let dir = paths.install_dir(&meta.id, &meta.version);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(&meta.id), "x").unwrap();
            db.put(InstalledPackageInfo::configured(meta, true));
        }
        DatabaseStore::new(&RealRuntime, paths.database_file())
            .save(&db)
            .unwrap();
    }

    #[test]
    fn test_remove_refuses_required_package() {
        let dir = tempdir().unwrap();
        let paths = InstallPaths::new(dir.path());
        seed(&paths);

        let err = remove(RealRuntime, "lib", None, false, Some(dir.path().to_path_buf()))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::HasDependents { .. })
        ));
        assert!(paths.install_dir("lib", &Version::new(1, 0, 0)).exists());
    }

    #[test]
    fn test_force_remove_deletes_files() {
        let dir = tempdir().unwrap();
        let paths = InstallPaths::new(dir.path());
        seed(&paths);

        remove(RealRuntime, "lib", None, true, Some(dir.path().to_path_buf())).unwrap();

        assert!(!paths.install_dir("lib", &Version::new(1, 0, 0)).exists());
        let db = DatabaseStore::new(&RealRuntime, paths.database_file()).load();
        assert!(db.versions_of("lib").is_empty());
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_remove_unknown_package() {
        let dir = tempdir().unwrap();
        let err = remove(RealRuntime, "ghost", None, false, Some(dir.path().to_path_buf()))
            .unwrap_err();
        assert_eq!(err.to_string(), "ghost is not installed");
    }
}
