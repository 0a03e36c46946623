//! Store - one encrypted passcode per environment
//!
//! `data/<env>` holds the current passcode. Overwriting it first copies the
//! old ciphertext to `data/<env>.<timestamp>`; backups are never pruned or
//! overwritten.

use crate::error::VaultError;
use crate::keys::KeyPair;
use crate::passcode;
use crate::session::Authorization;
use anyhow::{bail, Context, Result};
use passvault_core::{Timestamp, VaultPaths};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Outcome of setting an environment
#[derive(Debug, Clone)]
pub struct Updated {
    /// New plaintext passcode, shown once
    pub passcode: String,
    /// Where the previous ciphertext was copied, if there was one
    pub backup: Option<PathBuf>,
}

/// Result of a bulk read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Name and plaintext of every file that decrypted, sorted by name
    pub secrets: Vec<(String, String)>,
    /// Files under `data/` that could not be decrypted
    pub skipped: Vec<String>,
}

pub struct SecretStore {
    paths: VaultPaths,
}

impl SecretStore {
    pub fn new(paths: &VaultPaths) -> Self {
        Self {
            paths: paths.clone(),
        }
    }

    /// Decrypt the current passcode of `environment`
    pub fn get(&self, _auth: &Authorization, keys: &KeyPair, environment: &str) -> Result<String> {
        validate_environment(environment)?;

        let path = self.paths.secret(environment);
        if !path.is_file() {
            bail!(VaultError::EnvironmentNotFound(environment.to_string()));
        }

        tracing::debug!(environment, "reading secret");
        keys.decrypt_file(&path)
    }

    /// Decrypt every file under `data/`, backups included, sorted by name.
    ///
    /// Files that fail to decrypt are left out of `secrets` and named in
    /// `skipped`.
    pub fn get_all(&self, auth: &Authorization, keys: &KeyPair) -> Result<Listing> {
        let mut listing = Listing::default();
        for name in self.list()? {
            match self.get(auth, keys, &name) {
                Ok(value) => listing.secrets.push((name, value)),
                Err(e) => {
                    tracing::warn!(environment = %name, "skipping: {:#}", e);
                    listing.skipped.push(name);
                }
            }
        }
        Ok(listing)
    }

    /// Names of every file under `data/`, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let data_dir = self.paths.data_dir();
        if !data_dir.exists() {
            return Ok(vec![]);
        }

        let mut names = vec![];
        for entry in fs::read_dir(&data_dir)
            .with_context(|| format!("Failed to read {}", data_dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            names.push(entry.file_name().to_string_lossy().to_string());
        }

        names.sort();
        Ok(names)
    }

    /// Replace the passcode of `environment` with a fresh one
    pub fn set(&self, auth: &Authorization, keys: &KeyPair, environment: &str) -> Result<Updated> {
        self.set_at(auth, keys, environment, &Timestamp::now())
    }

    pub fn set_at(
        &self,
        _auth: &Authorization,
        keys: &KeyPair,
        environment: &str,
        now: &Timestamp,
    ) -> Result<Updated> {
        validate_environment(environment)?;

        let data_dir = self.paths.data_dir();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;

        let path = self.paths.secret(environment);
        let backup = if path.exists() {
            let backup = self.paths.backup(environment, now);
            write_backup(&path, &backup)?;
            tracing::info!(environment, backup = %backup.display(), "backed up previous passcode");
            Some(backup)
        } else {
            None
        };

        // Only generate once the old ciphertext is safe
        let passcode = passcode::generate()?;
        let ciphertext = keys.encrypt(passcode.as_bytes())?;
        fs::write(&path, ciphertext)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::info!(environment, "passcode updated");
        Ok(Updated { passcode, backup })
    }
}

/// Copy `path` to a backup file that must not exist yet
fn write_backup(path: &Path, backup: &Path) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let mut file = match OpenOptions::new().write(true).create_new(true).open(backup) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            bail!(VaultError::BackupExists(backup.display().to_string()))
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to create {}", backup.display()))
        }
    };

    file.write_all(&bytes)
        .with_context(|| format!("Failed to write {}", backup.display()))?;
    Ok(())
}

/// Environment names become file names under `data/`.
///
/// Only ASCII letters, digits, `_`, `-` and `.` are allowed, and a leading
/// `.` is refused, which rules out `..`, hidden files and any separator.
pub fn validate_environment(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!(VaultError::InvalidEnvironment("name cannot be empty".to_string()));
    }

    if name.starts_with('.') {
        bail!(VaultError::InvalidEnvironment(format!(
            "'{}' cannot start with '.'",
            name
        )));
    }

    if let Some(c) = name
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '_' | '-' | '.'))
    {
        bail!(VaultError::InvalidEnvironment(format!(
            "invalid character {:?} in '{}'",
            c, name
        )));
    }

    Ok(())
}
