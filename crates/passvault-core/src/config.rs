//! passvault configuration
//!
//! Configuration file: ~/.config/passvault/config.yaml
//!
//! ```yaml
//! root: /home/me/vault
//! key_bits: 2048
//! session_ttl_secs: 300
//! ```
//!
//! Every field is optional. A missing file means defaults.

use crate::paths::Paths;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Smallest RSA modulus passvault will generate
pub const MIN_KEY_BITS: usize = 512;

/// Vault configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Vault root directory
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// RSA modulus size for newly generated keys
    #[serde(default = "default_key_bits")]
    pub key_bits: usize,

    /// How long a session stays open after the PIN is presented
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: i64,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_key_bits() -> usize {
    2048
}

fn default_session_ttl() -> i64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            key_bits: default_key_bits(),
            session_ttl_secs: default_session_ttl(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Paths::new().config_file())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            let config: Self = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {:?}", path))?;
            tracing::debug!(path = %path.display(), "loaded config");
            config
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Same configuration rooted somewhere else
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.key_bits < MIN_KEY_BITS {
            bail!(
                "key_bits must be at least {} (got {})",
                MIN_KEY_BITS,
                self.key_bits
            );
        }
        if self.session_ttl_secs <= 0 {
            bail!("session_ttl_secs must be positive (got {})", self.session_ttl_secs);
        }
        Ok(())
    }
}
