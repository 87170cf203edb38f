use anyhow::{Context, Result};
use log::debug;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Installer;
use crate::package::PackageMeta;
use crate::runtime::{Runtime, clear_dir};

/// Copies a single-file artefact into the install directory.
///
/// The destination name is the package's `file_name` metadata string, or the
/// artefact's own file name. Native executables are made executable.
pub struct FileInstaller<R: Runtime> {
    runtime: Arc<R>,
}

impl<R: Runtime> FileInstaller<R> {
    pub fn new(runtime: Arc<R>) -> Self {
        Self { runtime }
    }

    fn destination(artefact: &Path, target_dir: &Path, meta: &PackageMeta) -> Result<PathBuf> {
        let name = match meta.metadata.get("file_name").and_then(|v| v.as_str()) {
            Some(name) => PathBuf::from(name),
            None => artefact
                .file_name()
                .map(PathBuf::from)
                .with_context(|| format!("Artefact has no file name: {:?}", artefact))?,
        };
        Ok(target_dir.join(name))
    }
}

impl<R: Runtime> Installer for FileInstaller<R> {
    #[tracing::instrument(skip(self, meta), fields(package = %meta))]
    fn expand(&self, artefact: &Path, target_dir: &Path, meta: &PackageMeta) -> Result<()> {
        let dest = Self::destination(artefact, target_dir, meta)?;
        if let Some(parent) = dest.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        self.runtime
            .copy(artefact, &dest)
            .with_context(|| format!("Failed to copy {:?} to {:?}", artefact, dest))?;
        set_executable_if_binary(self.runtime.as_ref(), &dest)
    }

    fn remove(&self, target_dir: &Path, _meta: &PackageMeta) -> Result<()> {
        clear_dir(self.runtime.as_ref(), target_dir)
    }
}

/// Whether `path` is a native executable for this platform.
///
/// Scripts and binaries built for other platforms are not.
#[cfg(unix)]
fn is_native_executable<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> bool {
    let mut buffer = Vec::new();
    match runtime.open(path) {
        Ok(mut file) => {
            if file.read_to_end(&mut buffer).is_err() {
                return false;
            }
        }
        Err(_) => return false,
    }

    match goblin::Object::parse(&buffer) {
        #[cfg(target_os = "linux")]
        Ok(goblin::Object::Elf(_)) => true,
        #[cfg(target_os = "macos")]
        Ok(goblin::Object::Mach(_)) => true,
        _ => false,
    }
}

#[cfg(unix)]
fn set_executable_if_binary<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<()> {
    if is_native_executable(runtime, path) {
        debug!("Setting executable permission on {:?}", path);
        runtime.set_permissions(path, 0o755)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_executable_if_binary<R: Runtime + ?Sized>(_runtime: &R, _path: &Path) -> Result<()> {
    Ok(())
}
