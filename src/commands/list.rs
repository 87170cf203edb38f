use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::config::InstallPaths;
use crate::database::{DatabaseStore, InstallState, InstalledPackageInfo};
use crate::runtime::Runtime;

/// List all installed packages
#[tracing::instrument(skip(runtime, install_root))]
pub fn list<R: Runtime>(runtime: R, install_root: Option<PathBuf>) -> Result<()> {
    let paths = InstallPaths::resolve(&runtime, install_root)?;
    let db = DatabaseStore::new(&runtime, paths.database_file()).load();

    if db.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    debug!("Found {} package(s)", db.len());
    for info in db.entries() {
        println!("{}", describe(info));
    }
    Ok(())
}

fn describe(info: &InstalledPackageInfo) -> String {
    let meta = info.metadata();
    let mut line = format!("{} {} [{}]", meta.id, meta.version, info.state());
    if let Some(origin) = info.provided_by() {
        line.push_str(&format!(" provided by {}", origin));
    } else if !info.is_explicit() {
        line.push_str(" (dependency)");
    }
    if info.state() == InstallState::Expanded {
        line.push_str(" - not configured, run reconfigure");
    }
    line
}
