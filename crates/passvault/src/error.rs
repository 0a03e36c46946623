//! Vault error taxonomy
//!
//! Library functions return `anyhow::Result` and raise these with `bail!`;
//! callers that care about the kind downcast.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to load key: {0}")]
    KeyLoad(String),

    #[error("Failed to write key: {0}")]
    KeyWrite(String),

    #[error("No session pin set - create one first (see option -p)")]
    SessionPinMissing,

    #[error("Invalid session pin")]
    PinMismatch,

    #[error("No session - start one first (see options -p and -s)")]
    SessionMissing,

    #[error("Session timed out at {0}")]
    SessionExpired(String),

    #[error("Environment not found: {0}")]
    EnvironmentNotFound(String),

    #[error("Invalid environment name: {0}")]
    InvalidEnvironment(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("No valid passcode after {0} attempts")]
    GenerationExhausted(usize),

    #[error("Backup already exists: {0}")]
    BackupExists(String),
}

/// The `VaultError` behind an `anyhow::Error`, if there is one
pub fn kind(err: &anyhow::Error) -> Option<&VaultError> {
    err.downcast_ref::<VaultError>()
}
