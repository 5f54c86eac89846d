//! Mutual exclusion for sweep invocations.
//!
//! Acquisition is always non-blocking: a held lock means another sweep is
//! running, and the correct reaction is to skip the cycle, not to wait. The
//! next cycle picks up the same due work.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use thiserror::Error;

/// Lock error.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Holds a sweep lock; released on drop.
///
/// Drop-based release guarantees the lock is freed even when a sweep errors
/// or panics partway through.
pub struct SweepGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SweepGuard {
    fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for SweepGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for SweepGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SweepGuard").finish_non_exhaustive()
    }
}

/// Named, non-blocking mutual exclusion between sweeps.
pub trait SweepLock: Send + Sync {
    /// Attempt to take the lock without waiting.
    ///
    /// `Ok(None)` means another sweep holds it.
    fn try_acquire(&self) -> Result<Option<SweepGuard>, LockError>;
}

/// Named lock scoped to the current process.
///
/// Sufficient when the deployment guarantees a single scheduler replica;
/// cross-host exclusion needs [`FileSweepLock`] or an external lock service.
#[derive(Debug, Clone)]
pub struct InProcessSweepLock {
    name: String,
}

static HELD_NAMES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

fn held_names() -> &'static Mutex<HashSet<String>> {
    HELD_NAMES.get_or_init(|| Mutex::new(HashSet::new()))
}

impl InProcessSweepLock {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SweepLock for InProcessSweepLock {
    fn try_acquire(&self) -> Result<Option<SweepGuard>, LockError> {
        let mut held = held_names().lock().unwrap();
        if !held.insert(self.name.clone()) {
            return Ok(None);
        }
        let name = self.name.clone();
        Ok(Some(SweepGuard::new(move || {
            held_names().lock().unwrap().remove(&name);
        })))
    }
}

/// Advisory cross-process lock backed by exclusive file creation.
///
/// The file records the holder's pid and is removed when the guard drops. A
/// crash between acquire and release leaves a stale lock file behind;
/// operators remove it by hand.
#[derive(Debug, Clone)]
pub struct FileSweepLock {
    path: PathBuf,
}

impl FileSweepLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl SweepLock for FileSweepLock {
    fn try_acquire(&self) -> Result<Option<SweepGuard>, LockError> {
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                let _ = write!(file, "{}", std::process::id());
                let path = self.path.clone();
                Ok(Some(SweepGuard::new(move || {
                    let _ = fs::remove_file(&path);
                })))
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(LockError::Io(e)),
        }
    }
}
