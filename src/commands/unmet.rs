use anyhow::Result;
use std::path::PathBuf;

use crate::config::InstallPaths;
use crate::database::DatabaseStore;
use crate::depmap::{DependencyMapper, FileCacheStore};
use crate::runtime::Runtime;

/// Report installed packages whose dependencies are not installed.
#[tracing::instrument(skip(runtime, install_root))]
pub fn unmet<R: Runtime>(runtime: R, install_root: Option<PathBuf>) -> Result<()> {
    let paths = InstallPaths::resolve(&runtime, install_root)?;
    let db = DatabaseStore::new(&runtime, paths.database_file()).load();
    let mapper = DependencyMapper::new(FileCacheStore::new(&runtime, paths.cache_dir()));

    let unmet = mapper.map_unmet_dependencies(&db);
    if unmet.is_empty() {
        println!("All dependencies are satisfied.");
        return Ok(());
    }

    for (package, missing) in unmet {
        let missing: Vec<String> = missing.iter().map(ToString::to_string).collect();
        println!("{} needs {}", package, missing.join(", "));
    }
    Ok(())
}
