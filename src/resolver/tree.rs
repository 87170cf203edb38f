use log::{debug, trace};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{InstalledIndex, InstalledSnapshot, resolve_dependencies};
use crate::catalog::CatalogIndex;
use crate::error::ResolveError;
use crate::package::{PackageMeta, PackageReference};

/// Resolve the full dependency closure of `root`.
///
/// The closure is deduplicated by `(id, version)`, never contains `root`,
/// and is ordered by depth-first discovery, so every package appears before
/// the dependencies it pulled in. Any reference back to an id on the current
/// path from `root` is rejected as circular. `cancel` is checked at every
/// visited node and edge.
pub fn resolve_tree(
    root: &PackageMeta,
    catalog: &dyn CatalogIndex,
    installed: &dyn InstalledIndex,
    cancel: &CancellationToken,
) -> Result<Vec<PackageMeta>, ResolveError> {
    let mut walk = TreeWalk {
        catalog,
        installed,
        cancel,
        path: HashSet::new(),
        seen: HashSet::new(),
        closure: Vec::new(),
    };
    walk.visit(root)?;
    debug!("{} needs {} package(s)", root, walk.closure.len());
    Ok(walk.closure)
}

/// Run [`resolve_tree`] on the blocking thread pool.
pub async fn resolve_tree_background(
    root: PackageMeta,
    catalog: Arc<dyn CatalogIndex>,
    installed: InstalledSnapshot,
    cancel: CancellationToken,
) -> Result<Vec<PackageMeta>, ResolveError> {
    let handle = tokio::task::spawn_blocking(move || {
        resolve_tree(&root, catalog.as_ref(), &installed, &cancel)
    });

    match handle.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(ResolveError::Cancelled),
    }
}

struct TreeWalk<'a> {
    catalog: &'a dyn CatalogIndex,
    installed: &'a dyn InstalledIndex,
    cancel: &'a CancellationToken,
    /// Ids on the stack from the root to the node being visited.
    path: HashSet<String>,
    seen: HashSet<PackageReference>,
    closure: Vec<PackageMeta>,
}

impl TreeWalk<'_> {
    fn visit(&mut self, node: &PackageMeta) -> Result<(), ResolveError> {
        self.check_cancelled()?;
        trace!("Visiting {}", node);
        self.path.insert(node.id.clone());

        for dependency in resolve_dependencies(node, self.catalog, self.installed)? {
            self.check_cancelled()?;

            if let Some(back) = dependency
                .dependencies
                .iter()
                .find(|r| self.path.contains(&r.package_id))
            {
                return Err(ResolveError::Circular {
                    id: dependency.id.clone(),
                    version: dependency.version.clone(),
                    referenced_from: back.package_id.clone(),
                });
            }

            if self.seen.insert(dependency.reference()) {
                self.closure.push(dependency.clone());
                self.visit(&dependency)?;
            }
        }

        self.path.remove(&node.id);
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), ResolveError> {
        if self.cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        Ok(())
    }
}
