//! passvault core - shared plumbing for the passvault tools
//!
//! Everything here is independent of the cryptography: where the vault
//! lives on disk, how it is configured, how instants are written down, and
//! how concurrent invocations are kept out of each other's way.

pub mod config;
pub mod lock;
pub mod paths;
pub mod timestamp;

pub use config::Config;
pub use lock::VaultLock;
pub use paths::{Paths, VaultPaths};
pub use timestamp::Timestamp;
