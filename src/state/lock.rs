// ABOUTME: Exclusive apply lock over the state directory.
// ABOUTME: Atomic file creation with holder info stored inside the lock file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::StateError;

const LOCK_FILENAME: &str = "apply.lock";

/// Information about who holds the apply lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// Project the apply is converging.
    pub project: String,
}

impl LockInfo {
    /// Create lock info for the current process.
    pub fn new(project: &str) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
            project: project.to_string(),
        }
    }

    /// A lock older than an hour is assumed abandoned.
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.acquired_at;
        age.num_hours() >= 1
    }
}

/// A held apply lock, removed on release or drop.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Acquire the apply lock for a state directory.
    ///
    /// Uses `create_new` for atomic acquisition (no TOCTOU race).
    /// Stale locks (> 1 hour) are auto-broken with a warning; `force`
    /// breaks any lock.
    pub fn acquire(state_dir: &Path, project: &str, force: bool) -> Result<Self, StateError> {
        let path = state_dir.join(LOCK_FILENAME);

        match Self::try_create(&path, project) {
            Ok(lock) => return Ok(lock),
            Err(e) if e.kind() != std::io::ErrorKind::AlreadyExists => {
                return Err(StateError::Lock(format!(
                    "failed to create {}: {e}",
                    path.display()
                )));
            }
            Err(_) => {}
        }

        // Lock file exists. Decide whether it may be broken.
        if !Self::should_break(&path, force)? {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| StateError::Lock(format!("failed to read lock info: {e}")))?;
            let existing: LockInfo = serde_json::from_str(&content)
                .map_err(|e| StateError::Lock(format!("failed to parse lock info: {e}")))?;
            return Err(StateError::LockHeld {
                holder: existing.holder,
                pid: existing.pid,
                since: existing.acquired_at,
            });
        }

        tracing::debug!("removing stale or forced lock at {}", path.display());
        let _ = std::fs::remove_file(&path);

        Self::try_create(&path, project).map_err(|e| {
            StateError::Lock(format!("lock re-acquired by another process: {e}"))
        })
    }

    fn try_create(path: &Path, project: &str) -> Result<Self, std::io::Error> {
        let info = LockInfo::new(project);
        let json = serde_json::to_string(&info).expect("lock info serializes");

        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        Ok(Self {
            path: path.to_path_buf(),
            released: false,
        })
    }

    /// Whether an existing lock should be broken (stale, forced, or
    /// unreadable).
    fn should_break(path: &Path, force: bool) -> Result<bool, StateError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => {
                tracing::warn!("lock info unreadable, breaking lock");
                return Ok(true);
            }
        };

        match serde_json::from_str::<LockInfo>(&content) {
            Ok(existing) => {
                if force {
                    tracing::warn!(
                        "breaking lock held by {} (pid {}) since {}",
                        existing.holder,
                        existing.pid,
                        existing.acquired_at
                    );
                    Ok(true)
                } else if existing.is_stale() {
                    tracing::warn!(
                        "auto-breaking stale lock held by {} (pid {}) since {}",
                        existing.holder,
                        existing.pid,
                        existing.acquired_at
                    );
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Err(_) => {
                tracing::warn!("lock info corrupted, breaking lock");
                Ok(true)
            }
        }
    }

    /// Release the lock explicitly.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if !self.released {
            self.released = true;
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!("failed to remove lock file {}: {e}", self.path.display());
            }
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        self.remove();
    }
}
