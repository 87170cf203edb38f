//! Lexical path helpers.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Whether `path` lies inside `dir`, compared component by component after
/// normalization, so `/kiln/packages/../etc` is not under `/kiln/packages`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    normalize_path(path).starts_with(normalize_path(dir))
}

/// Relative path from the directory holding `from_link` to `to_target`.
///
/// A link at `/kiln/bin/tool` pointing to `/kiln/packages/tool/1.0.0/bin/tool`
/// becomes `../packages/tool/1.0.0/bin/tool`, so the whole root stays relocatable.
///
/// Returns `None` if no relative path exists (e.g. different drives on Windows).
pub fn relative_symlink_path(from_link: &Path, to_target: &Path) -> Option<PathBuf> {
    let from_dir = from_link.parent()?;
    let result = pathdiff::diff_paths(to_target, from_dir)?;
    if result.is_absolute() {
        return None;
    }
    Some(result)
}
