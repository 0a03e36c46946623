//! Standard paths used by passvault

use crate::timestamp::Timestamp;
use std::path::{Path, PathBuf};

/// Standard user-level paths
pub struct Paths {
    /// Config directory (~/.config/passvault)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("passvault");

        Self { config }
    }

    /// Default configuration file
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.yaml")
    }
}

/// File layout inside a single vault root.
///
/// Every component receives one of these instead of resolving names
/// against the working directory.
#[derive(Debug, Clone)]
pub struct VaultPaths {
    root: PathBuf,
}

impl VaultPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// PEM-encoded public key
    pub fn public_key(&self) -> PathBuf {
        self.root.join("data.public")
    }

    /// PEM-encoded private key
    pub fn private_key(&self) -> PathBuf {
        self.root.join("data.private")
    }

    /// Encrypted session PIN
    pub fn session_pin(&self) -> PathBuf {
        self.root.join("session.pin")
    }

    /// Encrypted session expiry
    pub fn session(&self) -> PathBuf {
        self.root.join("session")
    }

    /// Directory holding one file per environment
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Advisory lock file, kept outside `data/`
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(".lock")
    }

    /// Current secret for an environment
    pub fn secret(&self, environment: &str) -> PathBuf {
        self.data_dir().join(environment)
    }

    /// Backup name for an environment taken at `at`
    pub fn backup(&self, environment: &str, at: &Timestamp) -> PathBuf {
        self.data_dir().join(format!("{}.{}", environment, at))
    }
}
