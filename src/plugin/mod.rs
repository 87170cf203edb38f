//! Installer, preprocessor and configurator plugins.
//!
//! Packages name their plugins by string key (`installer_ref`,
//! `preprocessor_ref`, `configurator_ref`). The [`PluginRegistry`] maps those
//! keys to implementations and fails fast on unknown keys.
//!
//! # Built-in plugins
//!
//! | Kind | Key | Behaviour |
//! |------|-----|-----------|
//! | installer | `archive` | unpacks `.tar.gz`/`.tgz`/`.zip` |
//! | installer | `file` | copies a single file, marking native executables |
//! | preprocessor | `flatten` | hoists a lone top-level directory |
//! | configurator | `none` | does nothing |
//! | configurator | `bin-links` | links executables into `<root>/bin` |

mod archive;
mod bin_links;
mod file;
mod flatten;

use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub use archive::ArchiveInstaller;
pub use bin_links::{BinLinksConfigurator, NoopConfigurator};
pub use file::FileInstaller;
pub use flatten::FlattenPreprocessor;
#[cfg(test)]
pub(crate) use archive::fixtures;

use crate::config::InstallPaths;
use crate::error::{InstallError, PluginKind};
use crate::package::PackageMeta;
use crate::runtime::Runtime;

/// Places an artefact's files into an install directory and removes them again.
#[cfg_attr(test, mockall::automock)]
pub trait Installer: Send + Sync {
    fn expand(&self, artefact: &Path, target_dir: &Path, meta: &PackageMeta) -> Result<()>;

    /// Remove everything `expand` placed, leaving `target_dir` itself empty.
    fn remove(&self, target_dir: &Path, meta: &PackageMeta) -> Result<()>;
}

/// Transforms staged installer output into the final install directory.
#[cfg_attr(test, mockall::automock)]
pub trait Preprocessor: Send + Sync {
    fn preprocess(&self, staged_dir: &Path, final_dir: &Path, meta: &PackageMeta) -> Result<()>;
}

/// Integrates an installed package with the system, and undoes it.
#[cfg_attr(test, mockall::automock)]
pub trait Configurator: Send + Sync {
    fn configure(&self, install_dir: &Path, meta: &PackageMeta) -> Result<()>;
    fn unconfigure(&self, install_dir: &Path, meta: &PackageMeta) -> Result<()>;
}

/// Plugin implementations keyed by the string refs packages use.
#[derive(Default)]
pub struct PluginRegistry {
    installers: HashMap<String, Arc<dyn Installer>>,
    preprocessors: HashMap<String, Arc<dyn Preprocessor>>,
    configurators: HashMap<String, Arc<dyn Configurator>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in plugin registered.
    pub fn with_builtins<R: Runtime + 'static>(runtime: Arc<R>, paths: &InstallPaths) -> Self {
        let mut registry = Self::new();
        registry.register_installer("archive", Arc::new(ArchiveInstaller::new(runtime.clone())));
        registry.register_installer("file", Arc::new(FileInstaller::new(runtime.clone())));
        registry.register_preprocessor("flatten", Arc::new(FlattenPreprocessor::new(runtime.clone())));
        registry.register_configurator("none", Arc::new(NoopConfigurator));
        registry.register_configurator(
            "bin-links",
            Arc::new(BinLinksConfigurator::new(runtime, paths.bin_dir())),
        );
        registry
    }

    pub fn register_installer(&mut self, key: impl Into<String>, installer: Arc<dyn Installer>) {
        self.installers.insert(key.into(), installer);
    }

    pub fn register_preprocessor(
        &mut self,
        key: impl Into<String>,
        preprocessor: Arc<dyn Preprocessor>,
    ) {
        self.preprocessors.insert(key.into(), preprocessor);
    }

    pub fn register_configurator(
        &mut self,
        key: impl Into<String>,
        configurator: Arc<dyn Configurator>,
    ) {
        self.configurators.insert(key.into(), configurator);
    }

    pub fn installer(&self, meta: &PackageMeta) -> Result<Arc<dyn Installer>, InstallError> {
        lookup(&self.installers, PluginKind::Installer, &meta.installer, meta)
    }

    /// The package's preprocessor, if it names one.
    pub fn preprocessor(
        &self,
        meta: &PackageMeta,
    ) -> Result<Option<Arc<dyn Preprocessor>>, InstallError> {
        meta.preprocessor
            .as_deref()
            .map(|key| lookup(&self.preprocessors, PluginKind::Preprocessor, key, meta))
            .transpose()
    }

    pub fn configurator(&self, meta: &PackageMeta) -> Result<Arc<dyn Configurator>, InstallError> {
        lookup(
            &self.configurators,
            PluginKind::Configurator,
            &meta.configurator,
            meta,
        )
    }
}

fn lookup<T: ?Sized>(
    plugins: &HashMap<String, Arc<T>>,
    kind: PluginKind,
    key: &str,
    meta: &PackageMeta,
) -> Result<Arc<T>, InstallError> {
    plugins
        .get(key)
        .cloned()
        .ok_or_else(|| InstallError::MissingPluginImplementation {
            kind,
            key: key.to_string(),
            package: meta.reference(),
        })
}
