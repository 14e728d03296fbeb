//! ---
//! fl_section: "01-core-functionality"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Shared primitives and utilities for the faultline toolkit."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Advisory lock files guarding read-modify-write cycles on shared files
//! (the history store and the dependency manifest).

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(300);

/// Exclusive advisory lock held for as long as the value lives.
///
/// The lock is a sibling `<file>.lock` created with `create_new`, so cooperating
/// writers serialize while manual editors are never blocked.
#[derive(Debug)]
pub struct AdvisoryLock {
    path: PathBuf,
}

impl AdvisoryLock {
    /// Lock path used for `target`.
    pub fn lock_path_for(target: &Path) -> PathBuf {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        target.with_file_name(name)
    }

    /// Acquire the lock for `target`, waiting up to `timeout`.
    pub fn acquire(target: &Path, timeout: Duration) -> io::Result<Self> {
        Self::acquire_with_staleness(target, timeout, DEFAULT_STALE_AFTER)
    }

    /// Acquire the lock, breaking lock files older than `stale_after`.
    pub fn acquire_with_staleness(
        target: &Path,
        timeout: Duration,
        stale_after: Duration,
    ) -> io::Result<Self> {
        let path = Self::lock_path_for(target);
        let deadline = Instant::now() + timeout;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    debug!(lock = %path.display(), "advisory lock acquired");
                    return Ok(Self { path });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    if is_stale(&path, stale_after) {
                        warn!(lock = %path.display(), "breaking stale advisory lock");
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("timed out waiting for lock {}", path.display()),
                        ));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Path of the lock file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %err, "failed to release advisory lock");
        }
    }
}

fn is_stale(path: &Path, stale_after: Duration) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > stale_after)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_writer_times_out_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("requirements.txt");
        let first = AdvisoryLock::acquire(&target, Duration::from_millis(50)).unwrap();
        assert!(first.path().ends_with("requirements.txt.lock"));

        let err = AdvisoryLock::acquire(&target, Duration::from_millis(60)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        drop(first);
        let again = AdvisoryLock::acquire(&target, Duration::from_millis(50)).unwrap();
        drop(again);
        assert!(!AdvisoryLock::lock_path_for(&target).exists());
    }

    #[test]
    fn stale_locks_are_broken() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("history.jsonl");
        fs::write(AdvisoryLock::lock_path_for(&target), "999999\n").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let lock =
            AdvisoryLock::acquire_with_staleness(&target, Duration::from_millis(10), Duration::from_millis(1))
                .unwrap();
        drop(lock);
    }
}
