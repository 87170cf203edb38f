//! Package model
//!
//! Value types describing package identity, version ranges and the pointers
//! between packages used by the resolver, the install database and the
//! orchestrator.

mod meta;
mod reference;
mod version;

pub use meta::PackageMeta;
pub use reference::{DependencyLeaf, DependencyReference, DueInstallTask, PackageReference};
pub use version::{VersionRange, VersionResolver};
