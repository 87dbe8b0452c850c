//! Per-batch scratch directories
//!
//! Every batch gets `<work_root>/<uuid>/`. The `JobDir` guard owns it and
//! removes it on drop, so a batch never observes another batch's files and
//! nothing survives the request. Directories left behind by a crash are
//! removed by `cleanup_stale_jobs` at startup.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Owned scratch directory of one batch. Removed when dropped.
#[derive(Debug)]
pub struct JobDir {
    id: Uuid,
    path: PathBuf,
}

impl JobDir {
    /// Create a fresh uniquely-named directory under `work_root`.
    pub fn create(work_root: &Path) -> std::io::Result<Self> {
        let id = Uuid::new_v4();
        let path = work_root.join(id.to_string());
        std::fs::create_dir_all(&path)?;
        log::debug!("Created job directory {}", path.display());
        Ok(Self { id, path })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory for the `index`-th item of the batch: `items/000`, `items/001`, ...
    pub fn slot_dir(&self, index: usize) -> PathBuf {
        self.path.join("items").join(format!("{:03}", index))
    }
}

impl Drop for JobDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => log::debug!("Removed job directory {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove job directory {}: {}", self.path.display(), e),
        }
    }
}

/// Remove job directories under `work_root` older than `max_age`.
///
/// Returns how many were removed. A missing `work_root` is not an error.
pub fn cleanup_stale_jobs(work_root: &Path, max_age: Duration) -> std::io::Result<usize> {
    let entries = match std::fs::read_dir(work_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let now = SystemTime::now();
    let mut removed = 0;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        // Only touch directories this service created.
        let is_job = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| Uuid::parse_str(n).is_ok());
        if !is_job {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();

        if age >= max_age {
            match std::fs::remove_dir_all(&path) {
                Ok(()) => {
                    log::info!("Removed stale job directory {}", path.display());
                    removed += 1;
                }
                Err(e) => log::warn!("Failed to remove stale job directory {}: {}", path.display(), e),
            }
        }
    }

    Ok(removed)
}
