use serde::{Deserialize, Serialize};
use std::fmt;

use crate::package::{PackageMeta, PackageReference};

/// Lifecycle state of one installed package version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstallState {
    #[default]
    None,
    /// Files are in place; configuration is pending or failed.
    Expanded,
    Configured,
    /// Satisfied by another installed package; owns no files.
    Virtual,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallState::None => write!(f, "none"),
            InstallState::Expanded => write!(f, "expanded"),
            InstallState::Configured => write!(f, "configured"),
            InstallState::Virtual => write!(f, "virtual"),
        }
    }
}

/// Install database record for one package version.
///
/// `state == Virtual` exactly when `provided_by` is set; the constructors
/// are the only way to build a record, and only [`InstalledPackageInfo::virtual_of`]
/// produces that pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledPackageInfo {
    metadata: PackageMeta,
    state: InstallState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provided_by: Option<PackageReference>,
    /// Requested by the user rather than pulled in as a dependency.
    #[serde(default)]
    explicit: bool,
}

impl InstalledPackageInfo {
    pub fn expanded(metadata: PackageMeta, explicit: bool) -> Self {
        Self {
            metadata,
            state: InstallState::Expanded,
            provided_by: None,
            explicit,
        }
    }

    pub fn configured(metadata: PackageMeta, explicit: bool) -> Self {
        Self {
            metadata,
            state: InstallState::Configured,
            provided_by: None,
            explicit,
        }
    }

    pub fn virtual_of(metadata: PackageMeta, origin: PackageReference) -> Self {
        Self {
            metadata,
            state: InstallState::Virtual,
            provided_by: Some(origin),
            explicit: false,
        }
    }

    pub fn metadata(&self) -> &PackageMeta {
        &self.metadata
    }

    pub fn state(&self) -> InstallState {
        self.state
    }

    pub fn provided_by(&self) -> Option<&PackageReference> {
        self.provided_by.as_ref()
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    pub fn is_virtual(&self) -> bool {
        self.state == InstallState::Virtual
    }

    pub fn reference(&self) -> PackageReference {
        self.metadata.reference()
    }

    /// Whether the virtual/provided_by pairing holds.
    pub fn is_consistent(&self) -> bool {
        self.is_virtual() == self.provided_by.is_some()
    }
}
