use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use super::select_installed;
use crate::config::InstallPaths;
use crate::orchestrator::Orchestrator;
use crate::plugin::PluginRegistry;
use crate::runtime::Runtime;

/// Re-run the configurator of an installed package version.
#[tracing::instrument(skip(runtime, install_root))]
pub fn reconfigure<R: Runtime + 'static>(
    runtime: R,
    id: &str,
    version: Option<&str>,
    install_root: Option<PathBuf>,
) -> Result<()> {
    let runtime = Arc::new(runtime);
    let paths = InstallPaths::resolve(runtime.as_ref(), install_root)?;
    let plugins = PluginRegistry::with_builtins(runtime.clone(), &paths);
    let mut orchestrator = Orchestrator::open(runtime.as_ref(), &plugins, &paths);

    let meta = select_installed(orchestrator.database(), id, version)?;
    orchestrator.reconfigure(&meta)?;
    println!("Reconfigured {}", meta);
    Ok(())
}
