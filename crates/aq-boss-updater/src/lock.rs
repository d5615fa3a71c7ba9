// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! System-wide exclusivity for the USB install transaction
//!
//! Non-blocking `flock` on a well-known path. The lock lives as long as the
//! token and is released on drop, whatever path the caller leaves through.
//! The file itself is left in place: unlinking it would let a late opener
//! lock an orphaned inode while a newcomer locks a fresh one.

use crate::error::{Result, UpdaterError};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct LockToken {
    _lock: Flock<File>,
    path: PathBuf,
}

impl std::fmt::Debug for LockToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockToken").field("path", &self.path).finish()
    }
}

impl LockToken {
    /// `Ok(None)` when another process holds the lock
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        let mut lock = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => lock,
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => return Ok(None),
            Err((_, errno)) => {
                return Err(UpdaterError::Lock(format!(
                    "flock {} failed: {errno}",
                    path.display()
                )));
            }
        };

        lock.set_len(0)?;
        write!(lock, "{}", std::process::id())?;
        lock.flush()?;

        Ok(Some(Self {
            _lock: lock,
            path: path.to_path_buf(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockToken {
    fn drop(&mut self) {
        tracing::info!("Checkpoint 9: Releasing lock {}", self.path.display());
    }
}
