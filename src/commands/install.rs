use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{PackageSpec, load_catalog};
use crate::catalog::CatalogIndex;
use crate::config::InstallPaths;
use crate::database::InstallState;
use crate::orchestrator::Orchestrator;
use crate::package::VersionResolver;
use crate::plugin::PluginRegistry;
use crate::resolver::{InstalledSnapshot, plan_install, resolve_tree_background};
use crate::runtime::Runtime;

/// Install the best catalog match for `spec` together with every missing dependency.
#[tracing::instrument(skip(runtime, install_root, catalog_path))]
pub async fn install<R: Runtime + 'static>(
    runtime: R,
    spec: &str,
    install_root: Option<PathBuf>,
    catalog_path: Option<PathBuf>,
) -> Result<()> {
    let runtime = Arc::new(runtime);
    let spec: PackageSpec = spec.parse()?;
    let paths = InstallPaths::resolve(runtime.as_ref(), install_root)?;
    let catalog = Arc::new(load_catalog(
        runtime.as_ref(),
        &paths,
        catalog_path.as_deref(),
    )?);

    let series = catalog
        .lookup(&spec.id)
        .ok_or_else(|| anyhow!("Package '{}' not found in catalog", spec.id))?;
    let target = VersionResolver::best_match(series.candidates(), &spec.range)
        .cloned()
        .ok_or_else(|| anyhow!("No version of {} matches {}", spec.id, spec.range))?;
    debug!("Selected {} for {}", target, spec.range);

    let plugins = PluginRegistry::with_builtins(runtime.clone(), &paths);
    let mut orchestrator = Orchestrator::open(runtime.as_ref(), &plugins, &paths);

    if let Some(existing) = orchestrator.database().get_meta(&target)
        && existing.state() == InstallState::Configured
    {
        println!("{} is already installed", target);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling dependency resolution");
                cancel.cancel();
            }
        })
    };

    let snapshot = InstalledSnapshot::from(orchestrator.database());
    let catalog_index: Arc<dyn CatalogIndex> = catalog.clone();
    let resolved = resolve_tree_background(target.clone(), catalog_index, snapshot, cancel).await;
    on_interrupt.abort();
    let closure = resolved?;

    let tasks = plan_install(&target, &closure, catalog.as_ref())?;
    info!("Installing {} package(s) for {}", tasks.len(), target);
    orchestrator.bulk_install(&tasks)?;

    if closure.is_empty() {
        println!("Installed {}", target);
    } else {
        let deps: Vec<String> = closure.iter().map(ToString::to_string).collect();
        println!("Installed {} (with {})", target, deps.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseStore;
    use crate::plugin::fixtures::tar_gz;
    use crate::runtime::RealRuntime;
    use semver::Version;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_catalog(root: &Path) {
        let artefacts = root.join("artefacts");
        fs::create_dir_all(&artefacts).unwrap();
        tar_gz(&artefacts.join("app-1.0.0.tar.gz"), &[("bin/app", "#!/bin/sh\n", 0o755)]);
        tar_gz(&artefacts.join("lib-1.2.0.tar.gz"), &[("lib/liblib.so", "elf", 0o644)]);

        let catalog = serde_json::json!({
            "app": { "versions": { "1.0.0": {
                "metadata": {
                    "id": "app", "version": "1.0.0",
                    "dependencies": [{ "package_id": "lib", "version_range": ">=1.0.0 <2.0.0" }],
                    "installer_ref": "archive", "configurator_ref": "none"
                },
                "artefact": "artefacts/app-1.0.0.tar.gz"
            }}},
            "lib": { "versions": { "1.2.0": {
                "metadata": {
                    "id": "lib", "version": "1.2.0",
                    "installer_ref": "archive", "configurator_ref": "none"
                },
                "artefact": "artefacts/lib-1.2.0.tar.gz"
            }}}
        });
        fs::write(root.join("catalog.json"), catalog.to_string()).unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_install_pulls_in_dependencies() {
        let dir = tempdir().unwrap();
        write_catalog(dir.path());

        install(RealRuntime, "app", Some(dir.path().to_path_buf()), None)
            .await
            .unwrap();

        let paths = InstallPaths::new(dir.path());
        assert!(paths.install_dir("app", &Version::new(1, 0, 0)).join("bin/app").is_file());
        assert!(paths.install_dir("lib", &Version::new(1, 2, 0)).join("lib/liblib.so").is_file());

        let db = DatabaseStore::new(&RealRuntime, paths.database_file()).load();
        let lib = db.get("lib", &Version::new(1, 2, 0)).unwrap();
        assert_eq!(lib.state(), InstallState::Configured);
        assert!(!lib.is_explicit());
    }

    #[test_log::test(tokio::test)]
    async fn test_retry_configures_dependencies_left_expanded() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let artefacts = root.join("artefacts");
        fs::create_dir_all(&artefacts).unwrap();
        tar_gz(&artefacts.join("app.tar.gz"), &[("bin/app", "#!/bin/sh\n", 0o755)]);
        tar_gz(&artefacts.join("lib.tar.gz"), &[("lib/liblib.so", "elf", 0o644)]);
        fs::write(artefacts.join("tool.tar.gz"), "truncated download").unwrap();

        let entry = |id: &str, deps: serde_json::Value| {
            serde_json::json!({ "versions": { "1.0.0": {
                "metadata": {
                    "id": id, "version": "1.0.0", "dependencies": deps,
                    "installer_ref": "archive", "configurator_ref": "none"
                },
                "artefact": format!("artefacts/{}.tar.gz", id)
            }}})
        };
        let catalog = serde_json::json!({
            "app": entry("app", serde_json::json!([
                { "package_id": "lib", "version_range": "*" },
                { "package_id": "tool", "version_range": "*" }
            ])),
            "lib": entry("lib", serde_json::json!([])),
            "tool": entry("tool", serde_json::json!([])),
        });
        fs::write(root.join("catalog.json"), catalog.to_string()).unwrap();

        let err = install(RealRuntime, "app", Some(root.to_path_buf()), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("tool@1.0.0"));

        let paths = InstallPaths::new(root);
        let v1 = Version::new(1, 0, 0);
        let db = DatabaseStore::new(&RealRuntime, paths.database_file()).load();
        assert_eq!(db.get("lib", &v1).unwrap().state(), InstallState::Expanded);

        tar_gz(&artefacts.join("tool.tar.gz"), &[("bin/tool", "#!/bin/sh\n", 0o755)]);
        install(RealRuntime, "app", Some(root.to_path_buf()), None)
            .await
            .unwrap();

        let db = DatabaseStore::new(&RealRuntime, paths.database_file()).load();
        for id in ["app", "lib", "tool"] {
            assert_eq!(db.get(id, &v1).unwrap().state(), InstallState::Configured, "{}", id);
        }
        assert!(db.get("app", &v1).unwrap().is_explicit());
        assert!(!db.get("lib", &v1).unwrap().is_explicit());
    }

    #[tokio::test]
    async fn test_install_unknown_package() {
        let dir = tempdir().unwrap();
        write_catalog(dir.path());

        let err = install(RealRuntime, "ghost", Some(dir.path().to_path_buf()), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Package 'ghost' not found in catalog");
    }

    #[tokio::test]
    async fn test_install_unmatched_range() {
        let dir = tempdir().unwrap();
        write_catalog(dir.path());

        let err = install(RealRuntime, "app@>=2.0.0", Some(dir.path().to_path_buf()), None)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("No version of app matches"));
    }
}
