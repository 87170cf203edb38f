use anyhow::{Context, Result, bail};
use log::debug;
use std::path::Path;
use std::sync::Arc;

use super::Preprocessor;
use crate::package::PackageMeta;
use crate::runtime::Runtime;

/// Moves staged output into the install directory, hoisting the contents of
/// a lone top-level directory (the usual `tool-1.2.3/` archive prefix).
pub struct FlattenPreprocessor<R: Runtime> {
    runtime: Arc<R>,
}

impl<R: Runtime> FlattenPreprocessor<R> {
    pub fn new(runtime: Arc<R>) -> Self {
        Self { runtime }
    }
}

impl<R: Runtime> Preprocessor for FlattenPreprocessor<R> {
    #[tracing::instrument(skip(self, meta), fields(package = %meta))]
    fn preprocess(&self, staged_dir: &Path, final_dir: &Path, meta: &PackageMeta) -> Result<()> {
        let entries = self
            .runtime
            .read_dir(staged_dir)
            .with_context(|| format!("Failed to read staging directory {:?}", staged_dir))?;

        let source_dir = match entries.as_slice() {
            [] => bail!("Staged output of {} is empty", meta),
            [only] if self.runtime.is_dir(only) && !self.runtime.is_symlink(only) => {
                debug!("Hoisting contents of {:?}", only);
                only.clone()
            }
            _ => staged_dir.to_path_buf(),
        };

        self.runtime.create_dir_all(final_dir)?;
        for item in self.runtime.read_dir(&source_dir)? {
            let Some(name) = item.file_name() else {
                continue;
            };
            let dest = final_dir.join(name);
            self.runtime
                .rename(&item, &dest)
                .with_context(|| format!("Failed to move {:?} into {:?}", item, final_dir))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use semver::Version;
    use std::fs;
    use tempfile::tempdir;

    fn meta() -> PackageMeta {
        PackageMeta::new("tool", Version::new(1, 2, 3), "archive", "none")
    }

    #[test]
    fn test_hoists_single_top_level_directory() {
        let dir = tempdir().unwrap();
        let staged = dir.path().join("staging");
        fs::create_dir_all(staged.join("tool-1.2.3/bin")).unwrap();
        fs::write(staged.join("tool-1.2.3/bin/tool"), "x").unwrap();
        fs::write(staged.join("tool-1.2.3/README"), "y").unwrap();
        let final_dir = dir.path().join("final");

        FlattenPreprocessor::new(Arc::new(RealRuntime))
            .preprocess(&staged, &final_dir, &meta())
            .unwrap();

        assert!(final_dir.join("bin/tool").is_file());
        assert!(final_dir.join("README").is_file());
        assert!(!final_dir.join("tool-1.2.3").exists());
    }

    #[test]
    fn test_multiple_entries_move_as_is() {
        let dir = tempdir().unwrap();
        let staged = dir.path().join("staging");
        fs::create_dir_all(staged.join("bin")).unwrap();
        fs::write(staged.join("LICENSE"), "z").unwrap();
        let final_dir = dir.path().join("final");

        FlattenPreprocessor::new(Arc::new(RealRuntime))
            .preprocess(&staged, &final_dir, &meta())
            .unwrap();

        assert!(final_dir.join("bin").is_dir());
        assert!(final_dir.join("LICENSE").is_file());
    }

    #[test]
    fn test_empty_staging_fails() {
        let dir = tempdir().unwrap();
        let staged = dir.path().join("staging");
        fs::create_dir_all(&staged).unwrap();

        let err = FlattenPreprocessor::new(Arc::new(RealRuntime))
            .preprocess(&staged, &dir.path().join("final"), &meta())
            .unwrap_err();
        assert_eq!(err.to_string(), "Staged output of tool@1.2.3 is empty");
    }
}
