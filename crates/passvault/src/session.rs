//! Session - PIN setup and time-boxed access
//!
//! Two encrypted files drive the state machine:
//! - `session.pin` holds the PIN
//! - `session` holds the instant the current session expires
//!
//! ```text
//! NoPinSet --set_pin--> PinSet --start_session--> Active --(time)--> Expired
//!                                   ^                                   |
//!                                   +-----------start_session-----------+
//! ```
//!
//! An expired token is left where it is; every check re-reads it and
//! compares against the clock. Nothing here renews a session implicitly.
//!
//! None of these methods lock the vault. `Vault` takes the lock around them.

use crate::error::VaultError;
use crate::keys::KeyPair;
use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDateTime};
use passvault_core::{Timestamp, VaultPaths};
use std::fs;
use std::path::Path;

/// Proof that the session was open when it was checked.
///
/// Only `SessionManager` can make one, and store operations demand one.
#[derive(Debug, Clone)]
pub struct Authorization {
    expires: Timestamp,
}

impl Authorization {
    pub fn expires(&self) -> &Timestamp {
        &self.expires
    }
}

/// Where the session state machine currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NoPinSet,
    /// PIN exists, no session was ever started
    PinSet,
    Active { expires: Timestamp },
    Expired { expired_at: Timestamp },
}

/// A PIN is one or more ASCII digits
pub fn is_pin(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

pub struct SessionManager {
    paths: VaultPaths,
    ttl_secs: i64,
}

impl SessionManager {
    pub fn new(paths: &VaultPaths, ttl_secs: i64) -> Self {
        Self {
            paths: paths.clone(),
            ttl_secs,
        }
    }

    /// Store a new PIN, replacing any previous one
    pub fn set_pin(&self, keys: &KeyPair, pin: &str) -> Result<()> {
        if !is_pin(pin) {
            bail!(VaultError::InvalidArgument(
                "the session pin must be numeric".to_string()
            ));
        }

        write_encrypted(keys, &self.paths.session_pin(), pin)?;

        let data_dir = self.paths.data_dir();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;

        tracing::info!("session pin set");
        Ok(())
    }

    /// Open a session if `pin` matches, returning its expiry
    pub fn start_session(&self, keys: &KeyPair, pin: &str) -> Result<Timestamp> {
        self.start_session_at(keys, pin, Local::now().naive_local())
    }

    pub fn start_session_at(
        &self,
        keys: &KeyPair,
        pin: &str,
        now: NaiveDateTime,
    ) -> Result<Timestamp> {
        let pin_path = self.paths.session_pin();
        if !pin_path.exists() {
            bail!(VaultError::SessionPinMissing);
        }

        let stored = keys.decrypt_file(&pin_path)?;
        if stored != pin {
            tracing::warn!("session pin mismatch");
            bail!(VaultError::PinMismatch);
        }

        let expires = Timestamp::after(now, self.ttl_secs);
        write_encrypted(keys, &self.paths.session(), expires.as_str())?;

        tracing::info!(%expires, "session started");
        Ok(expires)
    }

    /// Succeeds while the session token is present and unexpired
    pub fn check_authorized(&self, keys: &KeyPair) -> Result<Authorization> {
        self.check_authorized_at(keys, Local::now().naive_local())
    }

    pub fn check_authorized_at(&self, keys: &KeyPair, now: NaiveDateTime) -> Result<Authorization> {
        let expires = match self.read_token(keys)? {
            Some(expires) => expires,
            None => bail!(VaultError::SessionMissing),
        };

        // Equal to the expiry is still inside the window
        if Timestamp::from_datetime(now) > expires {
            bail!(VaultError::SessionExpired(expires.to_string()));
        }

        Ok(Authorization { expires })
    }

    pub fn state(&self, keys: &KeyPair) -> Result<SessionState> {
        self.state_at(keys, Local::now().naive_local())
    }

    pub fn state_at(&self, keys: &KeyPair, now: NaiveDateTime) -> Result<SessionState> {
        if !self.paths.session_pin().exists() {
            return Ok(SessionState::NoPinSet);
        }

        let state = match self.read_token(keys)? {
            None => SessionState::PinSet,
            Some(expires) if Timestamp::from_datetime(now) > expires => {
                SessionState::Expired { expired_at: expires }
            }
            Some(expires) => SessionState::Active { expires },
        };
        Ok(state)
    }

    fn read_token(&self, keys: &KeyPair) -> Result<Option<Timestamp>> {
        let path = self.paths.session();
        if !path.exists() {
            return Ok(None);
        }

        let raw = keys.decrypt_file(&path)?;
        match Timestamp::parse(&raw) {
            Some(expires) => Ok(Some(expires)),
            None => bail!(VaultError::Decryption(
                "session token is not a timestamp".to_string()
            )),
        }
    }
}

fn write_encrypted(keys: &KeyPair, path: &Path, plaintext: &str) -> Result<()> {
    let ciphertext = keys.encrypt(plaintext.as_bytes())?;
    fs::write(path, ciphertext).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), "wrote ciphertext");
    Ok(())
}
