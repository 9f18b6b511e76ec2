//! Project Locking
//!
//! Exclusive, reentrant-by-owner locks keyed by project path. A lock is
//! held both in an in-process registry (exclusivity between concurrent
//! stage invocations in one process) and as a JSON marker file inside
//! the project's state directory (exclusivity across processes). The
//! marker carries owner pid, hostname, and acquisition time for
//! diagnostics.
//!
//! Stale recovery: a marker older than `LockConfig::stale_after` (or one
//! that cannot be parsed) is treated as abandoned by a crashed process
//! and reclaimed. Within the staleness window, contention surfaces as
//! `ResourceBusy`.

use crate::config::{LockConfig, PROJECT_STATE_DIR};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const LOCK_FILE: &str = ".lock";

/// On-disk lock marker.
#[derive(Debug, Serialize, Deserialize)]
struct LockMarker {
    pid: u32,
    hostname: String,
    owner: u64,
    acquired_at: String,
}

impl LockMarker {
    fn new(owner: u64) -> Self {
        Self {
            pid: std::process::id(),
            hostname: hostname(),
            owner,
            acquired_at: Utc::now().to_rfc3339(),
        }
    }

    fn age(&self) -> Option<chrono::Duration> {
        DateTime::parse_from_rfc3339(&self.acquired_at)
            .ok()
            .map(|t| Utc::now().signed_duration_since(t.with_timezone(&Utc)))
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

struct Held {
    owner: u64,
    depth: u32,
}

struct LockState {
    config: LockConfig,
    held: Mutex<HashMap<PathBuf, Held>>,
}

/// Acquires and releases project locks.
pub struct LockManager {
    state: Arc<LockState>,
}

/// An exclusively held lock on a project path.
///
/// Released explicitly by the locker interceptor's after-hook; dropping
/// an unreleased handle releases as a backstop.
pub struct LockHandle {
    state: Arc<LockState>,
    path: PathBuf,
    owner: u64,
    released: bool,
}

impl LockHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.state.release(&self.path, self.owner);
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        self.release_once();
    }
}

enum Attempt {
    Acquired,
    Busy(String),
}

impl LockManager {
    pub fn new(config: LockConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(LockState {
                config,
                held: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Acquire the lock for `project_path` on behalf of `owner`.
    ///
    /// Re-acquiring with the same owner succeeds and nests; a different
    /// owner gets `ResourceBusy` (or a bounded cooperative wait when
    /// `LockConfig::wait` is set).
    pub async fn acquire(&self, project_path: &Path, owner: u64) -> Result<LockHandle, CoreError> {
        let key = dunce::canonicalize(project_path).unwrap_or_else(|_| project_path.to_path_buf());
        let started = Instant::now();
        loop {
            match self.state.try_acquire(&key, owner)? {
                Attempt::Acquired => {
                    debug!(path = %key.display(), owner, "lock acquired");
                    return Ok(LockHandle {
                        state: Arc::clone(&self.state),
                        path: key,
                        owner,
                        released: false,
                    });
                }
                Attempt::Busy(who) => {
                    if !self.state.config.wait
                        || started.elapsed() >= self.state.config.wait_timeout()
                    {
                        return Err(CoreError::ResourceBusy(who));
                    }
                    debug!(path = %key.display(), "lock busy, waiting");
                    tokio::time::sleep(self.state.config.poll_interval()).await;
                }
            }
        }
    }
}

impl LockState {
    fn try_acquire(&self, key: &Path, owner: u64) -> Result<Attempt, CoreError> {
        let mut held = self.held.lock();

        if let Some(entry) = held.get_mut(key) {
            if entry.owner == owner {
                entry.depth += 1;
                return Ok(Attempt::Acquired);
            }
            return Ok(Attempt::Busy(format!(
                "another operation in this process holds the lock for {}",
                key.display()
            )));
        }

        let marker_path = marker_path(key);
        if let Some(parent) = marker_path.parent() {
            fs::create_dir_all(parent).map_err(|e| CoreError::Store(e.into()))?;
        }

        match create_marker(&marker_path, owner) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                match read_marker(&marker_path) {
                    Some(marker) if !self.is_stale(&marker) => {
                        return Ok(Attempt::Busy(format!(
                            "locked by pid {} on {} since {}",
                            marker.pid, marker.hostname, marker.acquired_at
                        )));
                    }
                    _ => {
                        // Abandoned or unreadable marker: reclaim.
                        warn!(path = %marker_path.display(), "reclaiming stale lock marker");
                        let _ = fs::remove_file(&marker_path);
                        create_marker(&marker_path, owner)
                            .map_err(|e| CoreError::Store(e.into()))?;
                    }
                }
            }
            Err(e) => return Err(CoreError::Store(e.into())),
        }

        held.insert(key.to_path_buf(), Held { owner, depth: 1 });
        Ok(Attempt::Acquired)
    }

    fn is_stale(&self, marker: &LockMarker) -> bool {
        match marker.age() {
            // A future-dated marker (clock skew) is not evidence of a
            // crash; only age past the threshold is.
            Some(age) => age
                .to_std()
                .map(|a| a > self.config.stale_after())
                .unwrap_or(false),
            // Unreadable timestamp: the marker is corrupt, reclaim it.
            None => true,
        }
    }

    fn release(&self, key: &Path, owner: u64) {
        let mut held = self.held.lock();
        match held.get_mut(key) {
            Some(entry) if entry.owner == owner => {
                entry.depth -= 1;
                if entry.depth == 0 {
                    held.remove(key);
                    if let Err(e) = fs::remove_file(marker_path(key)) {
                        warn!(path = %key.display(), "failed to remove lock marker: {}", e);
                    }
                    debug!(path = %key.display(), owner, "lock released");
                }
            }
            _ => warn!(path = %key.display(), owner, "release for a lock not held by this owner"),
        }
    }
}

fn marker_path(project: &Path) -> PathBuf {
    project.join(PROJECT_STATE_DIR).join(LOCK_FILE)
}

fn create_marker(path: &Path, owner: u64) -> std::io::Result<()> {
    let file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    serde_json::to_writer_pretty(file, &LockMarker::new(owner))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

fn read_marker(path: &Path) -> Option<LockMarker> {
    let bytes = fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager() -> Arc<LockManager> {
        LockManager::new(LockConfig::default())
    }

    #[tokio::test]
    async fn second_owner_is_busy_until_release() {
        let dir = TempDir::new().unwrap();
        let locks = manager();

        let first = locks.acquire(dir.path(), 1).await.unwrap();
        let busy = locks.acquire(dir.path(), 2).await;
        assert!(matches!(busy, Err(CoreError::ResourceBusy(_))));

        first.release();
        let second = locks.acquire(dir.path(), 2).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn reentrant_acquire_nests_and_keeps_marker() {
        let dir = TempDir::new().unwrap();
        let locks = manager();
        let marker = marker_path(&dunce::canonicalize(dir.path()).unwrap());

        let outer = locks.acquire(dir.path(), 7).await.unwrap();
        let inner = locks.acquire(dir.path(), 7).await.unwrap();

        inner.release();
        assert!(marker.exists(), "marker must survive inner release");
        outer.release();
        assert!(!marker.exists(), "marker removed at depth zero");
    }

    #[tokio::test]
    async fn lock_is_visible_across_manager_instances() {
        let dir = TempDir::new().unwrap();
        let first_process = manager();
        let second_process = manager();

        let _held = first_process.acquire(dir.path(), 1).await.unwrap();
        let busy = second_process.acquire(dir.path(), 1).await;
        assert!(
            matches!(busy, Err(CoreError::ResourceBusy(_))),
            "marker file must block a fresh manager"
        );
    }

    #[tokio::test]
    async fn stale_marker_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let state_dir = dir.path().join(PROJECT_STATE_DIR);
        fs::create_dir_all(&state_dir).unwrap();
        let old = LockMarker {
            pid: 99999,
            hostname: "elsewhere".to_string(),
            owner: 42,
            acquired_at: (Utc::now() - chrono::Duration::hours(3)).to_rfc3339(),
        };
        fs::write(
            state_dir.join(LOCK_FILE),
            serde_json::to_vec(&old).unwrap(),
        )
        .unwrap();

        let locks = manager();
        let handle = locks.acquire(dir.path(), 1).await;
        assert!(handle.is_ok(), "stale marker should be reclaimed");
    }

    #[tokio::test]
    async fn fresh_marker_from_another_process_is_honored() {
        let dir = TempDir::new().unwrap();
        let state_dir = dir.path().join(PROJECT_STATE_DIR);
        fs::create_dir_all(&state_dir).unwrap();
        let recent = LockMarker {
            pid: 99999,
            hostname: "elsewhere".to_string(),
            owner: 42,
            acquired_at: Utc::now().to_rfc3339(),
        };
        fs::write(
            state_dir.join(LOCK_FILE),
            serde_json::to_vec(&recent).unwrap(),
        )
        .unwrap();

        let locks = manager();
        let busy = locks.acquire(dir.path(), 1).await;
        assert!(matches!(busy, Err(CoreError::ResourceBusy(_))));
    }

    #[tokio::test]
    async fn dropping_a_handle_releases_the_lock() {
        let dir = TempDir::new().unwrap();
        let locks = manager();

        {
            let _handle = locks.acquire(dir.path(), 1).await.unwrap();
        }
        let again = locks.acquire(dir.path(), 2).await;
        assert!(again.is_ok());
    }
}
