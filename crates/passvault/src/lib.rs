//! passvault - PIN-gated local passcode vault
//!
//! "One passcode per environment, never on disk in the clear."
//!
//! passvault generates passcodes that follow a fixed composition rule and
//! keeps one per named environment, RSA-encrypted, next to the keypair that
//! protects them. Reading or changing a passcode needs an open session,
//! started by presenting a numeric PIN and lasting five minutes.
//!
//! Layout of a vault root:
//! - `data.public`, `data.private` - PEM keypair
//! - `session.pin` - encrypted PIN
//! - `session` - encrypted session expiry (`YYYYMMDDHHMMSS`)
//! - `data/<env>` - encrypted passcode
//! - `data/<env>.<timestamp>` - backup taken before an overwrite

pub mod error;
pub mod keys;
pub mod passcode;
pub mod session;
pub mod store;
pub mod vault;

pub use error::VaultError;
pub use keys::{KeyManager, KeyPair};
pub use session::{Authorization, SessionManager, SessionState};
pub use store::{Listing, SecretStore, Updated};
pub use vault::Vault;
