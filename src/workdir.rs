//! Per-request working directories.
//!
//! Every request gets its own `job_<id>` directory under the configured work
//! root, so concurrent requests never share a `.tex`, `.aux` or `.pdf`. The
//! directory is created exclusively by [`tempfile`] and removed when the
//! [`WorkDir`] guard drops, on success, error and panic alike, unless it was
//! created with `retain = true`.

use crate::error::TailorError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

const PREFIX: &str = "job_";

/// Length of the random part of the directory name, which is the job id.
const JOB_ID_LEN: usize = 12;

/// Scoped working directory for one tailoring request.
#[derive(Debug)]
pub struct WorkDir {
    job_id: String,
    path: PathBuf,
    /// `None` once the directory has been kept.
    dir: Option<TempDir>,
}

impl WorkDir {
    /// Create `root/job_<id>` with a fresh 12-character identifier.
    ///
    /// The work root itself is created if missing. The job directory never
    /// pre-exists: a name collision makes `tempfile` pick another name.
    pub fn create(root: &Path, retain: bool) -> Result<Self, TailorError> {
        std::fs::create_dir_all(root).map_err(|e| TailorError::io(root, e))?;
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .rand_bytes(JOB_ID_LEN)
            .tempdir_in(root)
            .map_err(|e| TailorError::io(root, e))?;

        let path = dir.path().to_path_buf();
        let job_id = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(PREFIX))
            .unwrap_or_default()
            .to_string();

        let dir = if retain {
            // Kept from the start so a panic mid-pipeline leaves it in place too.
            let _ = dir.keep();
            None
        } else {
            Some(dir)
        };
        debug!(path = %path.display(), retain, "working directory created");
        Ok(Self { job_id, path, dir })
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn retain(&self) -> bool {
        self.dir.is_none()
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        match self.dir.take() {
            None => info!(path = %self.path.display(), "keeping working directory"),
            Some(dir) => match dir.close() {
                Ok(()) => debug!(path = %self.path.display(), "working directory removed"),
                Err(e) => warn!(
                    path = %self.path.display(),
                    "failed to remove working directory: {}", e
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_are_short_and_distinct() {
        let root = tempfile::tempdir().unwrap();
        let a = WorkDir::create(root.path(), false).unwrap();
        let b = WorkDir::create(root.path(), false).unwrap();
        assert_eq!(a.job_id().len(), JOB_ID_LEN);
        assert!(a.job_id().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a.job_id(), b.job_id());
    }

    #[test]
    fn removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let wd = WorkDir::create(root.path(), false).unwrap();
            std::fs::write(wd.path().join("tailored.aux"), "x").unwrap();
            assert!(wd.path().ends_with(format!("job_{}", wd.job_id())));
            assert!(!wd.retain());
            wd.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn retained_when_requested() {
        let root = tempfile::tempdir().unwrap();
        let wd = WorkDir::create(root.path(), true).unwrap();
        assert!(wd.retain());
        let path = wd.path().to_path_buf();
        drop(wd);
        assert!(path.is_dir());
    }

    #[test]
    fn removed_when_a_panic_unwinds() {
        let root = tempfile::tempdir().unwrap();
        let root_path = root.path().to_path_buf();
        let result = std::panic::catch_unwind(move || {
            let _wd = WorkDir::create(&root_path, false).unwrap();
            panic!("stage blew up");
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn concurrent_requests_get_separate_directories() {
        let root = tempfile::tempdir().unwrap();
        let a = WorkDir::create(root.path(), false).unwrap();
        let b = WorkDir::create(root.path(), false).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn missing_work_root_is_created() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a/b");
        let wd = WorkDir::create(&nested, false).unwrap();
        assert!(wd.path().starts_with(&nested));
        assert!(wd.path().is_dir());
    }

    #[test]
    fn existing_directories_are_never_reused() {
        let root = tempfile::tempdir().unwrap();
        for i in 0..32 {
            std::fs::create_dir(root.path().join(format!("job_taken{i:07}"))).unwrap();
        }
        let wd = WorkDir::create(root.path(), false).unwrap();
        assert_eq!(std::fs::read_dir(wd.path()).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 33);
    }
}
