//! Keys - the RSA keypair every ciphertext in the vault is bound to
//!
//! The pair lives next to the vault as two PKCS#1 PEM files, `data.public`
//! and `data.private`. It is generated lazily the first time something
//! needs it and never rotated: once either file is gone or replaced, every
//! existing ciphertext is unreadable.
//!
//! Ciphertexts are raw RSA PKCS#1 v1.5 blocks with no framing.

use crate::error::VaultError;
use anyhow::{bail, Result};
use passvault_core::config::MIN_KEY_BITS;
use passvault_core::VaultPaths;
use rand::rngs::OsRng;
use rsa::pkcs1::{
    DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding,
};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use std::fs::{self, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Loaded keypair
#[derive(Clone)]
pub struct KeyPair {
    public: RsaPublicKey,
    private: RsaPrivateKey,
}

impl KeyPair {
    /// Fresh keypair from OS entropy
    pub fn generate(bits: usize) -> Result<Self> {
        if bits < MIN_KEY_BITS {
            bail!(VaultError::InvalidArgument(format!(
                "key size must be at least {} bits (got {})",
                MIN_KEY_BITS, bits
            )));
        }

        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| VaultError::KeyWrite(format!("key generation failed: {}", e)))?;
        let public = RsaPublicKey::from(&private);

        Ok(Self { public, private })
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Encrypt under the public key
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = self
            .public
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
            .map_err(|e| VaultError::Encryption(e.to_string()))?;
        Ok(ciphertext)
    }

    /// Decrypt with the private key
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        // rsa's errors say which padding check failed; that stays inside
        let plaintext = self
            .private
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|_| VaultError::Decryption("ciphertext does not match this vault's key".into()))?;
        Ok(plaintext)
    }

    /// Decrypt and require UTF-8
    pub fn decrypt_string(&self, ciphertext: &[u8]) -> Result<String> {
        let plaintext = self.decrypt(ciphertext)?;
        String::from_utf8(plaintext)
            .map_err(|_| VaultError::Decryption("plaintext is not valid UTF-8".into()).into())
    }

    /// Read a ciphertext file and decrypt it to a string
    pub fn decrypt_file(&self, path: &Path) -> Result<String> {
        let ciphertext = fs::read(path)?;
        self.decrypt_string(&ciphertext)
    }
}

/// Owns the on-disk keypair of one vault root
pub struct KeyManager {
    public_path: PathBuf,
    private_path: PathBuf,
    bits: usize,
}

impl KeyManager {
    pub fn new(paths: &VaultPaths, bits: usize) -> Self {
        Self {
            public_path: paths.public_key(),
            private_path: paths.private_key(),
            bits,
        }
    }

    /// Load the keypair, generating it if neither file exists yet.
    ///
    /// A lone key file is an error rather than a reason to regenerate:
    /// replacing the survivor would orphan every ciphertext in the vault.
    pub fn load_or_create(&self) -> Result<KeyPair> {
        match (self.public_path.exists(), self.private_path.exists()) {
            (true, true) => self.load(),
            (false, false) => self.create(),
            (true, false) => bail!(VaultError::KeyLoad(format!(
                "{} is missing but {} exists",
                self.private_path.display(),
                self.public_path.display()
            ))),
            (false, true) => bail!(VaultError::KeyLoad(format!(
                "{} is missing but {} exists",
                self.public_path.display(),
                self.private_path.display()
            ))),
        }
    }

    fn load(&self) -> Result<KeyPair> {
        tracing::debug!(path = %self.private_path.display(), "loading keypair");

        let public_pem = read_pem(&self.public_path)?;
        let private_pem = read_pem(&self.private_path)?;

        let public = RsaPublicKey::from_pkcs1_pem(&public_pem).map_err(|e| {
            VaultError::KeyLoad(format!("{}: {}", self.public_path.display(), e))
        })?;
        let private = RsaPrivateKey::from_pkcs1_pem(&private_pem).map_err(|e| {
            VaultError::KeyLoad(format!("{}: {}", self.private_path.display(), e))
        })?;

        if RsaPublicKey::from(&private) != public {
            bail!(VaultError::KeyLoad(
                "public and private key files do not belong together".to_string()
            ));
        }

        Ok(KeyPair { public, private })
    }

    fn create(&self) -> Result<KeyPair> {
        tracing::info!(bits = self.bits, "generating new keypair");

        let pair = KeyPair::generate(self.bits)?;

        let public_pem = pair
            .public
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| VaultError::KeyWrite(e.to_string()))?;
        let private_pem = pair
            .private
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| VaultError::KeyWrite(e.to_string()))?;

        write_key(&self.public_path, public_pem.as_bytes(), 0o644)?;
        write_key(&self.private_path, private_pem.as_bytes(), 0o600)?;

        Ok(pair)
    }
}

fn read_pem(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| VaultError::KeyLoad(format!("{}: {}", path.display(), e)).into())
}

fn write_key(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let written = fs::write(path, contents)
        .and_then(|()| fs::set_permissions(path, Permissions::from_mode(mode)));

    if let Err(e) = written {
        bail!(VaultError::KeyWrite(format!("{}: {}", path.display(), e)));
    }
    Ok(())
}
