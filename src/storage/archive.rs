//! Archive packaging
//!
//! `ArchiveWriter` bundles finished files into one container; the production
//! implementation writes a ZIP with the `zip` crate.

use crate::core::error::AppError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One packaged archive
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveArtifact {
    /// Path of the written archive
    pub path: PathBuf,
    /// Entry names, in the order they were written
    pub entries: Vec<String>,
}

impl ArchiveArtifact {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// File name of the archive itself, for `Content-Disposition`.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive.zip".to_string())
    }
}

/// Writes one container file from a list of local files.
#[async_trait]
pub trait ArchiveWriter: Send + Sync {
    /// Package `paths` into `dest`. Paths that no longer exist are skipped.
    async fn package(&self, paths: &[PathBuf], dest: &Path) -> Result<ArchiveArtifact, AppError>;
}

/// ZIP archive writer.
///
/// Entries are stored, not deflated: MP3 does not compress further and
/// storing keeps packaging I/O-bound.
#[derive(Debug, Clone)]
pub struct ZipArchiveWriter {
    compression: CompressionMethod,
}

impl Default for ZipArchiveWriter {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Stored,
        }
    }
}

impl ZipArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArchiveWriter for ZipArchiveWriter {
    async fn package(&self, paths: &[PathBuf], dest: &Path) -> Result<ArchiveArtifact, AppError> {
        let paths = paths.to_vec();
        let dest = dest.to_path_buf();
        let compression = self.compression;

        tokio::task::spawn_blocking(move || write_zip(&paths, &dest, compression)).await?
    }
}

/// Base name for `path`, made unique against `taken`.
///
/// `Song.mp3`, `Song (2).mp3`, `Song (3).mp3`, ...
pub fn unique_entry_name(path: &Path, taken: &HashSet<String>) -> String {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());

    if !taken.contains(&base) {
        return base;
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    (2..)
        .map(|n| match ext {
            Some(ref ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        })
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(base)
}

fn write_zip(paths: &[PathBuf], dest: &Path, compression: CompressionMethod) -> Result<ArchiveArtifact, AppError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(dest)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(compression)
        .large_file(true);

    let mut seen_paths: HashSet<PathBuf> = HashSet::new();
    let mut taken: HashSet<String> = HashSet::new();
    let mut entries = Vec::with_capacity(paths.len());

    for path in paths {
        if !path.is_file() {
            log::warn!("Skipping {}: file no longer exists", path.display());
            continue;
        }
        if !seen_paths.insert(path.clone()) {
            log::warn!("Skipping {}: already packaged", path.display());
            continue;
        }

        let name = unique_entry_name(path, &taken);
        let mut input = File::open(path)?;
        zip.start_file(name.as_str(), options)?;
        std::io::copy(&mut input, &mut zip)?;

        log::debug!("Packaged {} as {}", path.display(), name);
        taken.insert(name.clone());
        entries.push(name);
    }

    let mut writer = zip.finish()?;
    writer.flush()?;

    Ok(ArchiveArtifact {
        path: dest.to_path_buf(),
        entries,
    })
}
