//! Install root resolution and on-disk layout.
//!
//! ```text
//! <root>/
//! ├── installed.json          # install database
//! ├── catalog.json            # default catalog file
//! ├── packages/<id>/<version> # install directories
//! ├── staging/<id>-<version>  # preprocessor input
//! ├── cache/                  # cache store objects (dependency map)
//! └── bin/                    # links created by the bin-links configurator
//! ```

use anyhow::{Context, Result};
use log::debug;
use semver::Version;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Environment variable overriding the install root.
pub const ROOT_ENV: &str = "KILN_ROOT";

/// Paths derived from an install root.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallPaths {
    root: PathBuf,
}

impl InstallPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the install root: explicit value, then `KILN_ROOT`, then the default.
    #[tracing::instrument(skip(runtime))]
    pub fn resolve<R: Runtime + ?Sized>(runtime: &R, explicit: Option<PathBuf>) -> Result<Self> {
        let root = match explicit {
            Some(path) => path,
            None => match runtime.env_var(ROOT_ENV) {
                Ok(value) if !value.is_empty() => PathBuf::from(value),
                _ => default_install_root(runtime)?,
            },
        };
        debug!("Using install root: {}", root.display());
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_file(&self) -> PathBuf {
        self.root.join("installed.json")
    }

    pub fn catalog_file(&self) -> PathBuf {
        self.root.join("catalog.json")
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root.join("packages")
    }

    /// Returns: `<root>/packages/<id>/<version>`
    pub fn install_dir(&self, id: &str, version: &Version) -> PathBuf {
        self.packages_dir().join(id).join(version.to_string())
    }

    /// Returns: `<root>/staging/<id>-<version>`
    pub fn staging_dir(&self, id: &str, version: &Version) -> PathBuf {
        self.root.join("staging").join(format!("{}-{}", id, version))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }
}

/// Get the default installation root directory
#[tracing::instrument(skip(runtime))]
pub fn default_install_root<R: Runtime + ?Sized>(runtime: &R) -> Result<PathBuf> {
    if runtime.is_privileged() {
        Ok(system_install_root())
    } else {
        let home_dir = runtime
            .home_dir()
            .context("Could not find home directory")?;
        Ok(home_dir.join(".kiln"))
    }
}

#[cfg(target_os = "macos")]
fn system_install_root() -> PathBuf {
    PathBuf::from("/opt/kiln")
}

#[cfg(target_os = "windows")]
fn system_install_root() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\kiln")
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn system_install_root() -> PathBuf {
    PathBuf::from("/usr/local/kiln")
}
