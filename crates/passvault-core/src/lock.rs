//! Exclusive lock over a vault root
//!
//! Every multi-step vault operation (backup then overwrite, decrypt then
//! compare then write) holds this lock for its whole duration. The lock is
//! a `flock(2)` on `<root>/.lock` and is released when the guard drops.

use crate::paths::VaultPaths;
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;

/// Held lock; dropping it releases the vault
#[derive(Debug)]
pub struct VaultLock {
    file: File,
}

impl VaultLock {
    /// Block until the vault is ours
    pub fn acquire(paths: &VaultPaths) -> Result<Self> {
        let file = open_lock_file(paths)?;
        flock(&file, libc::LOCK_EX)
            .with_context(|| format!("Failed to lock {}", paths.lock_file().display()))?;
        tracing::debug!(root = %paths.root().display(), "vault locked");
        Ok(Self { file })
    }

    /// Take the lock only if nobody else holds it
    pub fn try_acquire(paths: &VaultPaths) -> Result<Option<Self>> {
        let file = open_lock_file(paths)?;
        match flock(&file, libc::LOCK_EX | libc::LOCK_NB) {
            Ok(()) => Ok(Some(Self { file })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to lock {}", paths.lock_file().display())),
        }
    }
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        // Closing the descriptor would release it too
        let _ = flock(&self.file, libc::LOCK_UN);
    }
}

fn open_lock_file(paths: &VaultPaths) -> Result<File> {
    fs::create_dir_all(paths.root())
        .with_context(|| format!("Failed to create vault root: {}", paths.root().display()))?;

    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(paths.lock_file())
        .with_context(|| format!("Failed to open {}", paths.lock_file().display()))
}

fn flock(file: &File, operation: libc::c_int) -> io::Result<()> {
    // SAFETY: the descriptor is owned by `file` and stays open for the call
    let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
