//! JSON-file-backed catalog.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{CatalogEntry, CatalogIndex, SeriesInfo};
use crate::runtime::Runtime;

/// A catalog loaded from a single JSON document:
///
/// ```json
/// { "<id>": { "versions": { "<version>": { "metadata": { ... }, "artefact": "<path>" } } } }
/// ```
///
/// Relative artefact paths are resolved against the catalog file's directory.
#[derive(Debug, Clone, Default)]
pub struct FileCatalog {
    series: BTreeMap<String, SeriesInfo>,
}

impl FileCatalog {
    pub fn new(series: BTreeMap<String, SeriesInfo>) -> Self {
        Self { series }
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read catalog {:?}", path))?;
        let mut series: BTreeMap<String, SeriesInfo> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog {:?}", path))?;

        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        for (id, info) in series.iter_mut() {
            info.versions.retain(|key, entry| {
                let consistent = entry.metadata.id == *id && entry.metadata.version.to_string() == *key;
                if !consistent {
                    warn!(
                        "Catalog entry {}/{} carries metadata for {}, skipping",
                        id, key, entry.metadata
                    );
                }
                consistent
            });
            for entry in info.versions.values_mut() {
                entry.artefact = resolve_artefact(&base, &entry.artefact);
            }
        }

        debug!("Loaded catalog with {} package(s)", series.len());
        Ok(Self { series })
    }

    pub fn insert(&mut self, entry: CatalogEntry) {
        self.series
            .entry(entry.metadata.id.clone())
            .or_default()
            .versions
            .insert(entry.metadata.version.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

fn resolve_artefact(base: &Path, artefact: &str) -> String {
    let path = PathBuf::from(artefact);
    if path.is_absolute() {
        artefact.to_string()
    } else {
        base.join(path).to_string_lossy().into_owned()
    }
}

impl CatalogIndex for FileCatalog {
    fn lookup(&self, package_id: &str) -> Option<SeriesInfo> {
        self.series.get(package_id).cloned()
    }
}
