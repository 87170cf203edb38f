use crate::database::{InstallDatabase, InstallState, InstalledPackageInfo};
use crate::package::{DependencyReference, PackageMeta};

/// What the resolver needs to know about installed packages.
pub trait InstalledIndex {
    /// Whether a usable installed package satisfies `reference`.
    fn satisfies(&self, reference: &DependencyReference) -> bool;
}

/// Configured and virtual records can be depended on. An expanded record
/// still needs configuring, so the resolver plans it again.
fn is_usable(info: &InstalledPackageInfo) -> bool {
    matches!(info.state(), InstallState::Configured | InstallState::Virtual)
}

impl InstalledIndex for InstallDatabase {
    fn satisfies(&self, reference: &DependencyReference) -> bool {
        self.versions_of(&reference.package_id)
            .into_iter()
            .any(|info| is_usable(info) && reference.is_satisfied_by(info.metadata()))
    }
}

/// Owned copy of the installed package set, for resolving off the caller's thread.
#[derive(Debug, Clone, Default)]
pub struct InstalledSnapshot {
    packages: Vec<PackageMeta>,
}

impl InstalledSnapshot {
    pub fn new(packages: Vec<PackageMeta>) -> Self {
        Self { packages }
    }
}

impl From<&InstallDatabase> for InstalledSnapshot {
    fn from(db: &InstallDatabase) -> Self {
        Self::new(
            db.entries()
                .filter(|info| is_usable(info))
                .map(|info| info.metadata().clone())
                .collect(),
        )
    }
}

impl InstalledIndex for InstalledSnapshot {
    fn satisfies(&self, reference: &DependencyReference) -> bool {
        self.packages.iter().any(|meta| reference.is_satisfied_by(meta))
    }
}
