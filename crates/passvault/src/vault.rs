//! Vault - the handle the CLI talks to
//!
//! Bundles one vault root with its key, session and secret managers. Every
//! public operation locks the root, loads (or creates) the keypair, and only
//! then touches session or secret files, so two invocations against the
//! same root never interleave.

use crate::keys::{KeyManager, KeyPair};
use crate::session::{SessionManager, SessionState};
use crate::store::{Listing, SecretStore, Updated};
use anyhow::Result;
use passvault_core::{Config, Timestamp, VaultLock, VaultPaths};
use std::path::Path;

pub struct Vault {
    paths: VaultPaths,
    keys: KeyManager,
    sessions: SessionManager,
    store: SecretStore,
}

impl Vault {
    /// Open the vault described by `config`. Nothing is created yet.
    pub fn new(config: &Config) -> Self {
        let paths = VaultPaths::new(&config.root);
        Self {
            keys: KeyManager::new(&paths, config.key_bits),
            sessions: SessionManager::new(&paths, config.session_ttl_secs),
            store: SecretStore::new(&paths),
            paths,
        }
    }

    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    /// Run `f` with the vault locked and its keys loaded
    fn locked<T>(&self, f: impl FnOnce(&KeyPair) -> Result<T>) -> Result<T> {
        let _lock = VaultLock::acquire(&self.paths)?;
        let keys = self.keys.load_or_create()?;
        f(&keys)
    }

    pub fn set_pin(&self, pin: &str) -> Result<()> {
        self.locked(|keys| self.sessions.set_pin(keys, pin))
    }

    pub fn start_session(&self, pin: &str) -> Result<Timestamp> {
        self.locked(|keys| self.sessions.start_session(keys, pin))
    }

    pub fn session_state(&self) -> Result<SessionState> {
        self.locked(|keys| self.sessions.state(keys))
    }

    /// Current passcode of one environment
    pub fn get_secret(&self, environment: &str) -> Result<String> {
        self.locked(|keys| {
            let auth = self.sessions.check_authorized(keys)?;
            self.store.get(&auth, keys, environment)
        })
    }

    /// Every environment and backup, labeled by file name
    pub fn get_all(&self) -> Result<Listing> {
        self.locked(|keys| {
            let auth = self.sessions.check_authorized(keys)?;
            self.store.get_all(&auth, keys)
        })
    }

    /// New passcode for `environment`, backing up the old one
    pub fn set_secret(&self, environment: &str) -> Result<Updated> {
        self.locked(|keys| {
            let auth = self.sessions.check_authorized(keys)?;
            self.store.set(&auth, keys, environment)
        })
    }
}
