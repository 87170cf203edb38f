//! Installation orchestrator
//!
//! Drives each `(id, version)` through its lifecycle and records every
//! transition in the install database:
//!
//! ```text
//! None --expand--> Expanded --configure(ok)--> Configured
//! Expanded --configure(failure)--> Expanded
//! Configured --unconfigure--> Expanded --remove--> None
//! ```
//!
//! Virtual records are only created by [`Orchestrator::register_virtual`] and
//! never touch an installer or configurator. The database is saved after
//! every transition, so an interrupted operation resumes from the last
//! recorded state.

mod order;

use anyhow::anyhow;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::Path;

use crate::cleanup::CleanupGuard;
use crate::config::InstallPaths;
use crate::database::{DatabaseStore, InstallDatabase, InstallState, InstalledPackageInfo};
use crate::depmap::{DependencyMap, DependencyMapper, FileCacheStore};
use crate::error::{DatabaseError, InstallError};
use crate::package::{
    DependencyLeaf, DependencyReference, DueInstallTask, PackageMeta, PackageReference,
};
use crate::plugin::{Configurator, PluginRegistry};
use crate::runtime::Runtime;

use order::configure_order;

pub struct Orchestrator<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    plugins: &'a PluginRegistry,
    paths: &'a InstallPaths,
    store: DatabaseStore<'a, R>,
    mapper: DependencyMapper<FileCacheStore<'a, R>>,
    db: InstallDatabase,
}

impl<'a, R: Runtime + ?Sized> Orchestrator<'a, R> {
    /// Load the install database under `paths` and get ready to operate on it.
    pub fn open(runtime: &'a R, plugins: &'a PluginRegistry, paths: &'a InstallPaths) -> Self {
        let store = DatabaseStore::new(runtime, paths.database_file());
        let db = store.load();
        Self {
            runtime,
            plugins,
            paths,
            store,
            mapper: DependencyMapper::new(FileCacheStore::new(runtime, paths.cache_dir())),
            db,
        }
    }

    pub fn database(&self) -> &InstallDatabase {
        &self.db
    }

    /// Current dependency map over installed packages.
    pub fn dependency_map(&self) -> DependencyMap {
        self.mapper.map_dependencies_cached(&self.db)
    }

    pub fn unmet_dependencies(&self) -> BTreeMap<PackageReference, Vec<DependencyReference>> {
        self.mapper.map_unmet_dependencies(&self.db)
    }

    /// Install a single, user-requested package.
    pub fn install(&mut self, meta: &PackageMeta, artefact: &Path) -> Result<(), InstallError> {
        let task = DueInstallTask::new(DependencyLeaf::explicit(meta.clone()), artefact);
        self.install_task(&task)
    }

    #[tracing::instrument(skip(self, task), fields(package = %task.meta()))]
    pub fn install_task(&mut self, task: &DueInstallTask) -> Result<(), InstallError> {
        let meta = task.meta();
        self.db.check_conflicts(meta)?;
        self.check_plugins(meta)?;
        self.retire_previous(meta)?;

        self.expand(task)?;
        let result = self.configure(meta);
        self.mapper.clear_cache();
        result
    }

    /// Install a batch: expand every task in the given order, then configure
    /// dependencies before their dependents. Stops at the first failure.
    /// Nothing is touched when the batch holds two versions of a unitary
    /// package or members that conflict with each other.
    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn bulk_install(&mut self, tasks: &[DueInstallTask]) -> Result<(), InstallError> {
        check_batch(tasks)?;
        for task in tasks {
            self.db.check_conflicts(task.meta())?;
            self.check_plugins(task.meta())?;
        }

        let result = self.bulk_install_checked(tasks);
        self.mapper.clear_cache();
        result
    }

    fn bulk_install_checked(&mut self, tasks: &[DueInstallTask]) -> Result<(), InstallError> {
        for task in tasks {
            self.retire_previous(task.meta())?;
            self.expand(task)?;
        }
        for index in configure_order(tasks) {
            self.configure(tasks[index].meta())?;
        }
        info!("Installed {} package(s)", tasks.len());
        Ok(())
    }

    /// Unconfigure and remove an installed package version.
    #[tracing::instrument(skip(self, meta), fields(package = %meta))]
    pub fn uninstall(&mut self, meta: &PackageMeta) -> Result<(), InstallError> {
        let info = self
            .db
            .get_meta(meta)
            .cloned()
            .ok_or_else(|| InstallError::NotInstalled(meta.reference()))?;
        let meta = info.metadata();

        if info.is_virtual() {
            debug!("{} is virtual, dropping its record only", meta);
            return self.forget(meta);
        }

        let installer = self.plugins.installer(meta)?;
        let configurator = self.plugins.configurator(meta)?;
        let install_dir = self.paths.install_dir(&meta.id, &meta.version);

        if info.state() == InstallState::Configured {
            self.unconfigure(meta, &info, configurator.as_ref())?;
        }

        if self.runtime.exists(&install_dir) {
            let remove_failed = |source| InstallError::RemoveFailed {
                package: meta.reference(),
                source,
            };
            installer.remove(&install_dir, meta).map_err(remove_failed)?;
            self.remove_install_dir(&install_dir).map_err(remove_failed)?;
        }

        self.forget(meta)?;
        info!("Uninstalled {}", meta);
        Ok(())
    }

    /// Record `virtual_meta` as provided by `origin`. No files are touched.
    #[tracing::instrument(skip(self, virtual_meta), fields(package = %virtual_meta))]
    pub fn register_virtual(
        &mut self,
        virtual_meta: &PackageMeta,
        origin: PackageReference,
    ) -> Result<(), InstallError> {
        if let Some(existing) = self.db.get_meta(virtual_meta)
            && !existing.is_virtual()
        {
            return Err(DatabaseError::AlreadyInstalled(virtual_meta.reference()).into());
        }

        info!("Registering {} as provided by {}", virtual_meta, origin);
        self.db
            .put(InstalledPackageInfo::virtual_of(virtual_meta.clone(), origin));
        self.checkpoint()?;
        self.mapper.clear_cache();
        Ok(())
    }

    /// Redo the configuration of an installed package without touching its files.
    #[tracing::instrument(skip(self, meta), fields(package = %meta))]
    pub fn reconfigure(&mut self, meta: &PackageMeta) -> Result<(), InstallError> {
        let info = self
            .db
            .get_meta(meta)
            .cloned()
            .ok_or_else(|| InstallError::NotInstalled(meta.reference()))?;
        let meta = info.metadata();

        match info.state() {
            InstallState::Virtual => {
                info!("{} is virtual, nothing to reconfigure", meta);
                Ok(())
            }
            InstallState::Configured => {
                let configurator = self.plugins.configurator(meta)?;
                self.unconfigure(meta, &info, configurator.as_ref())?;
                self.configure(meta)
            }
            InstallState::Expanded | InstallState::None => self.configure(meta),
        }
    }

    /// Uninstall a package version unless other installed packages depend on it.
    #[tracing::instrument(skip(self, meta), fields(package = %meta))]
    pub fn remove(&mut self, meta: &PackageMeta, force: bool) -> Result<(), InstallError> {
        if self.db.get_meta(meta).is_none() {
            return Err(InstallError::NotInstalled(meta.reference()));
        }

        let reference = meta.reference();
        let dependents = self.dependency_map().dependents_of(&reference).to_vec();
        if !dependents.is_empty() {
            if !force {
                return Err(InstallError::HasDependents {
                    package: reference,
                    dependents,
                });
            }
            warn!(
                "Removing {} although {} package(s) depend on it",
                reference,
                dependents.len()
            );
        }

        self.uninstall(meta)?;

        for broken in self.mapper.enumerate_unsatisfied_packages(&self.db) {
            warn!("{} now has unsatisfied dependencies", broken);
        }
        Ok(())
    }

    fn check_plugins(&self, meta: &PackageMeta) -> Result<(), InstallError> {
        self.plugins.installer(meta)?;
        self.plugins.preprocessor(meta)?;
        self.plugins.configurator(meta)?;
        Ok(())
    }

    /// Uninstall whatever must go before `meta` is installed: every version of
    /// a unitary package, or an earlier copy of the same version.
    fn retire_previous(&mut self, meta: &PackageMeta) -> Result<(), InstallError> {
        let previous: Vec<PackageMeta> = self
            .db
            .versions_of(&meta.id)
            .into_iter()
            .map(InstalledPackageInfo::metadata)
            .filter(|installed| meta.unitary || installed.version == meta.version)
            .cloned()
            .collect();

        for old in previous {
            info!("Replacing {} with {}", old, meta);
            self.uninstall(&old)?;
        }
        Ok(())
    }

    /// Place the package's files and record it as expanded. On failure
    /// nothing is recorded and partial output is deleted.
    fn expand(&mut self, task: &DueInstallTask) -> Result<(), InstallError> {
        let meta = task.meta();
        let installer = self.plugins.installer(meta)?;
        let preprocessor = self.plugins.preprocessor(meta)?;
        let install_dir = self.paths.install_dir(&meta.id, &meta.version);
        let expand_failed = |source| InstallError::ExpandFailed {
            package: meta.reference(),
            source,
        };

        let mut cleanup = CleanupGuard::new(self.runtime);
        cleanup.add(&install_dir);
        self.reset_dir(&install_dir).map_err(expand_failed)?;

        match preprocessor {
            None => {
                debug!("Expanding {} into {:?}", meta, install_dir);
                installer
                    .expand(&task.artefact, &install_dir, meta)
                    .map_err(expand_failed)?;
            }
            Some(preprocessor) => {
                let staging_dir = self.paths.staging_dir(&meta.id, &meta.version);
                cleanup.add(&staging_dir);
                self.reset_dir(&staging_dir).map_err(expand_failed)?;

                debug!("Expanding {} into staging {:?}", meta, staging_dir);
                installer
                    .expand(&task.artefact, &staging_dir, meta)
                    .map_err(expand_failed)?;
                preprocessor
                    .preprocess(&staging_dir, &install_dir, meta)
                    .map_err(|source| InstallError::PreprocessFailed {
                        package: meta.reference(),
                        source,
                    })?;

                if let Err(e) = self.runtime.remove_dir_all(&staging_dir) {
                    warn!("Failed to remove staging directory {:?}: {:#}", staging_dir, e);
                }
                cleanup.remove(&staging_dir);
            }
        }

        self.db.put(InstalledPackageInfo::expanded(
            meta.clone(),
            task.leaf.is_explicit,
        ));
        if let Err(e) = self.checkpoint() {
            self.db.remove_version(&meta.id, &meta.version);
            self.db.maintain();
            return Err(e);
        }

        cleanup.success();
        debug!("Expanded {}", meta);
        Ok(())
    }

    /// Run the configurator and record the outcome. A failure leaves the
    /// package recorded as expanded so it can be reconfigured later.
    fn configure(&mut self, meta: &PackageMeta) -> Result<(), InstallError> {
        let explicit = self
            .db
            .get_meta(meta)
            .map(InstalledPackageInfo::is_explicit)
            .ok_or_else(|| InstallError::NotInstalled(meta.reference()))?;
        let configurator = self.plugins.configurator(meta)?;
        let install_dir = self.paths.install_dir(&meta.id, &meta.version);

        match configurator.configure(&install_dir, meta) {
            Ok(()) => {
                self.db
                    .put(InstalledPackageInfo::configured(meta.clone(), explicit));
                self.checkpoint()?;
                info!("Installed {}", meta);
                Ok(())
            }
            Err(source) => {
                self.db
                    .put(InstalledPackageInfo::expanded(meta.clone(), explicit));
                if let Err(e) = self.checkpoint() {
                    warn!("Failed to record {} as expanded: {}", meta, e);
                }
                Err(InstallError::ConfigureFailed {
                    package: meta.reference(),
                    source,
                })
            }
        }
    }

    fn unconfigure(
        &mut self,
        meta: &PackageMeta,
        info: &InstalledPackageInfo,
        configurator: &dyn Configurator,
    ) -> Result<(), InstallError> {
        let install_dir = self.paths.install_dir(&meta.id, &meta.version);
        configurator
            .unconfigure(&install_dir, meta)
            .map_err(|source| InstallError::UnconfigureFailed {
                package: meta.reference(),
                source,
            })?;
        self.db.put(InstalledPackageInfo::expanded(
            meta.clone(),
            info.is_explicit(),
        ));
        self.checkpoint()
    }

    /// Drop the record of one version and persist.
    fn forget(&mut self, meta: &PackageMeta) -> Result<(), InstallError> {
        self.db.remove_version(&meta.id, &meta.version);
        self.db.maintain();
        self.checkpoint()?;
        self.mapper.clear_cache();
        Ok(())
    }

    /// Start from an empty directory at `dir`.
    fn reset_dir(&self, dir: &Path) -> anyhow::Result<()> {
        if self.runtime.exists(dir) {
            warn!("Removing leftover directory {:?}", dir);
            self.runtime.remove_dir_all(dir)?;
        }
        self.runtime.create_dir_all(dir)
    }

    /// Delete an install directory the installer has emptied. Residue left by
    /// the installer is removed recursively, with a warning.
    fn remove_install_dir(&self, dir: &Path) -> anyhow::Result<()> {
        if let Err(e) = self.runtime.remove_dir(dir) {
            warn!(
                "Installer left files in {:?} ({:#}); removing them recursively",
                dir, e
            );
            self.runtime.remove_dir_all(dir).map_err(|retry| {
                anyhow!("{:#} (after non-recursive delete failed: {:#})", retry, e)
            })?;
        }

        // packages/<id> goes away with its last version.
        if let Some(parent) = dir.parent()
            && self.runtime.read_dir(parent).is_ok_and(|rest| rest.is_empty())
            && let Err(e) = self.runtime.remove_dir(parent)
        {
            debug!("Keeping {:?}: {:#}", parent, e);
        }
        Ok(())
    }

    fn checkpoint(&self) -> Result<(), InstallError> {
        self.store.save(&self.db).map_err(InstallError::from)
    }
}

/// Reject batches that could not end up fully installed: two versions of a
/// unitary package, or members that declare a conflict with each other.
fn check_batch(tasks: &[DueInstallTask]) -> Result<(), InstallError> {
    for (i, task) in tasks.iter().enumerate() {
        let meta = task.meta();
        for (j, other) in tasks.iter().enumerate() {
            if i == j {
                continue;
            }
            let other = other.meta();
            if i < j && meta.id == other.id && (meta.unitary || other.unitary) {
                return Err(InstallError::UnitaryClash {
                    first: meta.reference(),
                    second: other.reference(),
                });
            }
            if let Some(conflict) = meta
                .conflicts_with
                .iter()
                .find(|conflict| conflict.is_satisfied_by(other))
            {
                return Err(InstallError::ConflictInBatch {
                    candidate: meta.reference(),
                    conflicts_with: conflict.clone(),
                    other: other.reference(),
                });
            }
        }
    }
    Ok(())
}
