use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use log::{debug, warn};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use super::Installer;
use crate::package::PackageMeta;
use crate::runtime::{Runtime, clear_dir};

/// Supported archive formats, detected from the artefact's file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    fn detect(path: &Path) -> Option<Self> {
        let name = path.to_string_lossy().to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else if name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else {
            None
        }
    }
}

/// Unpacks `.tar.gz`/`.tgz`/`.zip` artefacts into the target directory.
pub struct ArchiveInstaller<R: Runtime> {
    runtime: Arc<R>,
}

impl<R: Runtime> ArchiveInstaller<R> {
    pub fn new(runtime: Arc<R>) -> Self {
        Self { runtime }
    }

    fn extract_tar_gz(&self, artefact: &Path, target_dir: &Path) -> Result<()> {
        let file = self.runtime.open(artefact)?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));

        let entries = archive
            .entries()
            .with_context(|| format!("Failed to read archive {:?}", artefact))?;
        for entry in entries {
            let mut entry = entry.with_context(|| format!("Corrupt entry in {:?}", artefact))?;
            let raw_path = entry.path()?.into_owned();
            let Some(relative) = enclosed(&raw_path) else {
                debug!("Skipping entry outside the archive root: {:?}", raw_path);
                continue;
            };
            self.refuse_symlinked_path(target_dir, &relative)?;
            let full_path = target_dir.join(&relative);
            let header = entry.header();

            match header.entry_type() {
                tar::EntryType::Directory => self.runtime.create_dir_all(&full_path)?,
                tar::EntryType::Regular | tar::EntryType::Continuous => {
                    let mode = header.mode().ok();
                    self.ensure_parent(&full_path)?;
                    let mut dest = self.runtime.create_file(&full_path)?;
                    std::io::copy(&mut entry, &mut dest)
                        .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                    drop(dest);
                    if let Some(mode) = mode {
                        self.apply_mode(&full_path, mode);
                    }
                }
                tar::EntryType::Symlink => {
                    let Some(link_target) = entry.link_name()?.map(|p| p.into_owned()) else {
                        continue;
                    };
                    if !link_stays_inside(&relative, &link_target) {
                        warn!(
                            "Skipping link {:?} -> {:?}: it points outside the install directory",
                            relative, link_target
                        );
                        continue;
                    }
                    self.ensure_parent(&full_path)?;
                    self.runtime.symlink(&link_target, &full_path)?;
                }
                other => debug!("Skipping {:?} entry {:?}", other, raw_path),
            }
        }
        Ok(())
    }

    fn extract_zip(&self, artefact: &Path, target_dir: &Path) -> Result<()> {
        // The zip reader needs Read + Seek; Runtime::open only gives Read.
        let mut buffer = Vec::new();
        self.runtime
            .open(artefact)?
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read archive {:?}", artefact))?;
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(buffer))
            .with_context(|| format!("Failed to parse ZIP archive {:?}", artefact))?;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .with_context(|| format!("Failed to read ZIP entry {}", i))?;
            let Some(relative) = entry.enclosed_name() else {
                debug!("Skipping entry with invalid path: {}", entry.name());
                continue;
            };
            let full_path = target_dir.join(relative);

            if entry.is_dir() {
                self.runtime.create_dir_all(&full_path)?;
                continue;
            }
            self.ensure_parent(&full_path)?;
            let mut dest = self.runtime.create_file(&full_path)?;
            std::io::copy(&mut entry, &mut dest)
                .with_context(|| format!("Failed to extract file {:?}", full_path))?;
            drop(dest);
            if let Some(mode) = entry.unix_mode() {
                self.apply_mode(&full_path, mode);
            }
        }
        Ok(())
    }

    /// Fail when `relative` passes through, or lands on, a link created by an
    /// earlier entry.
    fn refuse_symlinked_path(&self, target_dir: &Path, relative: &Path) -> Result<()> {
        let mut current = target_dir.to_path_buf();
        for component in relative.components() {
            current.push(component);
            if self.runtime.is_symlink(&current) {
                bail!("Archive entry {:?} would be written through link {:?}", relative, current);
            }
        }
        Ok(())
    }

    fn ensure_parent(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        Ok(())
    }

    fn apply_mode(&self, path: &Path, mode: u32) {
        if let Err(e) = self.runtime.set_permissions(path, mode & 0o7777) {
            debug!("Failed to set permissions on {:?}: {}", path, e);
        }
    }
}

impl<R: Runtime> Installer for ArchiveInstaller<R> {
    #[tracing::instrument(skip(self, meta), fields(package = %meta))]
    fn expand(&self, artefact: &Path, target_dir: &Path, meta: &PackageMeta) -> Result<()> {
        let format = ArchiveFormat::detect(artefact)
            .with_context(|| format!("Unsupported archive format: {}", artefact.display()))?;
        debug!("Extracting {:?} ({:?}) into {:?}", artefact, format, target_dir);

        self.runtime.create_dir_all(target_dir)?;
        match format {
            ArchiveFormat::TarGz => self.extract_tar_gz(artefact, target_dir),
            ArchiveFormat::Zip => self.extract_zip(artefact, target_dir),
        }
    }

    fn remove(&self, target_dir: &Path, meta: &PackageMeta) -> Result<()> {
        if !self.runtime.exists(target_dir) {
            bail!("Install directory of {} is missing: {:?}", meta, target_dir);
        }
        clear_dir(self.runtime.as_ref(), target_dir)
    }
}

/// Strip `.` components and reject paths that escape the archive root.
fn enclosed(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}

/// Whether a link stored at `link` (relative to the archive root) resolves to
/// a path inside the root, judged on path components alone.
fn link_stays_inside(link: &Path, target: &Path) -> bool {
    let mut depth = link.components().count().saturating_sub(1);
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(up) => depth = up,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

#[cfg(test)]
pub(crate) mod fixtures {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;

    /// Write a `.tar.gz` holding `(path, content, mode)` entries.
    pub fn tar_gz(path: &Path, files: &[(&str, &str, u32)]) {
        let file = File::create(path).unwrap();
        let mut tar = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, content, mode) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(name).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            tar.append(&header, content.as_bytes()).unwrap();
        }
        tar.into_inner().unwrap().finish().unwrap();
    }

    pub fn zip(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
}
