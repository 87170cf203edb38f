use anyhow::{Context, Result, bail};
use glob::{MatchOptions, Pattern};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Configurator;
use crate::package::PackageMeta;
use crate::runtime::{Runtime, relative_symlink_path};

/// Patterns used when a package does not declare `bin` metadata.
const DEFAULT_BIN_PATTERNS: &[&str] = &["bin/*"];

/// Configurator for packages that need no system integration.
pub struct NoopConfigurator;

impl Configurator for NoopConfigurator {
    fn configure(&self, _install_dir: &Path, meta: &PackageMeta) -> Result<()> {
        debug!("Nothing to configure for {}", meta);
        Ok(())
    }

    fn unconfigure(&self, _install_dir: &Path, meta: &PackageMeta) -> Result<()> {
        debug!("Nothing to unconfigure for {}", meta);
        Ok(())
    }
}

/// Links a package's executables into a shared `bin` directory.
///
/// Files are chosen by the glob patterns in the package's `bin` metadata
/// (relative to the install directory), defaulting to `bin/*`. Links are
/// relative, so the install root can be moved as a whole.
pub struct BinLinksConfigurator<R: Runtime> {
    runtime: Arc<R>,
    bin_dir: PathBuf,
}

impl<R: Runtime> BinLinksConfigurator<R> {
    pub fn new(runtime: Arc<R>, bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            bin_dir: bin_dir.into(),
        }
    }

    fn patterns(meta: &PackageMeta) -> Result<Vec<Pattern>> {
        let raw = meta
            .metadata_strings("bin")
            .unwrap_or_else(|| DEFAULT_BIN_PATTERNS.iter().map(|p| p.to_string()).collect());
        raw.iter()
            .map(|p| Pattern::new(p).with_context(|| format!("Invalid bin pattern '{}'", p)))
            .collect()
    }

    /// Every non-directory entry under `dir`, without following directory links.
    fn walk(&self, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
        for entry in self.runtime.read_dir(dir)? {
            if self.runtime.is_dir(&entry) && !self.runtime.is_symlink(&entry) {
                self.walk(&entry, out)?;
            } else {
                out.push(entry);
            }
        }
        Ok(())
    }

    /// Links owned by another package are left alone; stale links of this
    /// package and dangling links are replaced.
    fn link(
        &self,
        target: &Path,
        dest: &Path,
        install_dir: &Path,
        meta: &PackageMeta,
    ) -> Result<()> {
        if self.runtime.is_symlink(dest) {
            if self.runtime.remove_symlink_if_target_under(dest, install_dir)? {
                debug!("Replaced stale link {:?} for {}", dest, meta);
            } else if !self.runtime.exists(dest) {
                warn!("Replacing dangling link {:?} for {}", dest, meta);
                self.runtime.remove_symlink(dest)?;
            } else {
                bail!("{:?} already links outside {:?}", dest, install_dir);
            }
        } else if self.runtime.exists(dest) {
            bail!("{:?} already exists and is not a link", dest);
        }

        match relative_symlink_path(dest, target) {
            Some(relative) => self.runtime.symlink(&relative, dest),
            None => self.runtime.symlink(target, dest),
        }
    }
}

impl<R: Runtime> Configurator for BinLinksConfigurator<R> {
    #[tracing::instrument(skip(self, meta), fields(package = %meta))]
    fn configure(&self, install_dir: &Path, meta: &PackageMeta) -> Result<()> {
        let patterns = Self::patterns(meta)?;
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::default()
        };

        let mut files = Vec::new();
        self.walk(install_dir, &mut files)?;
        let selected: Vec<PathBuf> = files
            .into_iter()
            .filter(|file| {
                file.strip_prefix(install_dir)
                    .is_ok_and(|rel| patterns.iter().any(|p| p.matches_path_with(rel, options)))
            })
            .collect();

        if selected.is_empty() {
            debug!("{} has no files to link", meta);
            return Ok(());
        }

        self.runtime.create_dir_all(&self.bin_dir)?;
        for target in &selected {
            let Some(name) = target.file_name() else {
                continue;
            };
            let dest = self.bin_dir.join(name);
            self.link(target, &dest, install_dir, meta)
                .with_context(|| format!("Failed to link {:?}", dest))?;
            info!("Linked {:?} -> {:?}", dest, target);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, meta), fields(package = %meta))]
    fn unconfigure(&self, install_dir: &Path, meta: &PackageMeta) -> Result<()> {
        if !self.runtime.exists(&self.bin_dir) {
            return Ok(());
        }
        let mut removed = 0;
        for entry in self.runtime.read_dir(&self.bin_dir)? {
            if !self.runtime.is_symlink(&entry) {
                continue;
            }
            if self
                .runtime
                .remove_symlink_if_target_under(&entry, install_dir)?
            {
                removed += 1;
            }
        }
        debug!("Removed {} link(s) of {}", removed, meta);
        Ok(())
    }
}
