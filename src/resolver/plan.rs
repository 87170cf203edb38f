use std::path::PathBuf;

use crate::catalog::CatalogIndex;
use crate::error::ResolveError;
use crate::package::{
    DependencyLeaf, DependencyReference, DueInstallTask, PackageMeta, VersionRange,
};

/// Turn a resolved closure into install tasks, target first.
///
/// The target is the only explicit leaf. Artefact paths come from the
/// catalog entry of each exact version.
pub fn plan_install(
    target: &PackageMeta,
    closure: &[PackageMeta],
    catalog: &dyn CatalogIndex,
) -> Result<Vec<DueInstallTask>, ResolveError> {
    let leaves = std::iter::once(DependencyLeaf::explicit(target.clone()))
        .chain(closure.iter().cloned().map(DependencyLeaf::transitive));

    leaves
        .map(|leaf| {
            let artefact = artefact_for(&leaf.package, catalog)?;
            Ok(DueInstallTask::new(leaf, artefact))
        })
        .collect()
}

fn artefact_for(meta: &PackageMeta, catalog: &dyn CatalogIndex) -> Result<PathBuf, ResolveError> {
    catalog
        .lookup(&meta.id)
        .and_then(|series| series.entry_for(meta).map(|entry| PathBuf::from(&entry.artefact)))
        .ok_or_else(|| {
            ResolveError::Unsatisfied(DependencyReference::new(
                meta.id.clone(),
                VersionRange::exact(&meta.version),
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::fixtures::{catalog, pkg};

    #[test]
    fn test_target_is_the_only_explicit_task() {
        let target = pkg("app@1.0.0", &[("lib", "*")]);
        let lib = pkg("lib@0.3.0", &[]);
        let catalog = catalog(&[target.clone(), lib.clone()]);

        let tasks = plan_install(&target, &[lib], &catalog).unwrap();

        assert_eq!(tasks.len(), 2);
        assert!(tasks[0].leaf.is_explicit);
        assert_eq!(tasks[0].meta().id, "app");
        assert_eq!(tasks[0].artefact, PathBuf::from("/artefacts/app-1.0.0.tar.gz"));
        assert!(!tasks[1].leaf.is_explicit);
        assert_eq!(tasks[1].artefact, PathBuf::from("/artefacts/lib-0.3.0.tar.gz"));
    }

    #[test]
    fn test_missing_artefact_names_the_exact_version() {
        let target = pkg("app@1.0.0", &[]);
        let err = plan_install(&target, &[], &catalog(&[])).unwrap_err();
        assert_eq!(err.to_string(), "No package satisfies app (=1.0.0)");
    }
}
