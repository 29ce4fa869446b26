//! Credential codec for pre-authenticated builder images
//!
//! A pre-built image carries a long-lived platform token as ciphertext so the token does
//! not sit in plaintext in the image layer history. Keys are derived with
//! PBKDF2-HMAC-SHA256 over a fixed salt and iteration count, so the same passphrase
//! produces the same key at image build time and at deploy time.
//!
//! Tokens are Fernet (AES-128-CBC with an HMAC-SHA256 tag), the format the published
//! builder images were baked with, so tampering or a wrong passphrase fails closed.
//!
//! This is obfuscation, not secrecy. Anyone with a shell inside a running builder
//! container holds both the ciphertext and the passphrase, and can recover the token.
//! Protecting against that is out of scope for this module.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use fernet::Fernet;
use secrecy::{ExposeSecret, Secret, SecretString};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

pub const DEFAULT_PASSPHRASE: &str = "getmethatdawg-deploy-key-v1";
pub const KDF_SALT: &[u8] = b"getmethatdawg-salt";
pub const KDF_ITERATIONS: u32 = 100_000;

/// Ciphertext file a builder image exports into the attempt workspace
pub const CREDENTIAL_FILE: &str = ".credential.enc";

/// Version, timestamp, IV, one cipher block and the HMAC tag
const MIN_TOKEN_LEN: usize = 1 + 8 + 16 + 16 + 32;

#[derive(Debug, Error)]
pub enum DecryptionError {
    #[error("Credential ciphertext is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Credential ciphertext is truncated ({0} bytes)")]
    Truncated(usize),

    #[error("Credential could not be decrypted: wrong passphrase or tampered ciphertext")]
    Authentication,

    #[error("Decrypted credential is not valid UTF-8")]
    NotUtf8,
}

#[derive(Debug, Error)]
#[error("Credential encryption failed")]
pub struct EncryptionError;

/// Fernet key text: URL-safe base64 of the 32-byte PBKDF2 output
fn derive_key(passphrase: &str) -> String {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), KDF_SALT, KDF_ITERATIONS, &mut key);
    URL_SAFE.encode(key)
}

fn cipher(passphrase: &str) -> Option<Fernet> {
    Fernet::new(&derive_key(passphrase))
}

pub fn encrypt(token: &[u8], passphrase: &str) -> Result<String, EncryptionError> {
    let fernet = cipher(passphrase).ok_or(EncryptionError)?;
    Ok(fernet.encrypt(token))
}

pub fn decrypt(ciphertext: &str, passphrase: &str) -> Result<Vec<u8>, DecryptionError> {
    let ciphertext = ciphertext.trim();
    let raw = URL_SAFE.decode(ciphertext)?;
    if raw.len() < MIN_TOKEN_LEN {
        return Err(DecryptionError::Truncated(raw.len()));
    }

    let fernet = cipher(passphrase).ok_or(DecryptionError::Authentication)?;
    fernet
        .decrypt(ciphertext)
        .map_err(|_| DecryptionError::Authentication)
}

/// Deployment credential held in memory for the lifetime of one attempt
///
/// `Debug` never prints the token.
pub struct DeployCredential {
    token: SecretString,
}

impl DeployCredential {
    pub fn new(token: String) -> Self {
        Self {
            token: Secret::new(token),
        }
    }

    /// Decrypts exported ciphertext into a credential
    pub fn from_ciphertext(ciphertext: &str, passphrase: &str) -> Result<Self, DecryptionError> {
        let plaintext = decrypt(ciphertext, passphrase)?;
        let token = String::from_utf8(plaintext).map_err(|_| DecryptionError::NotUtf8)?;
        Ok(Self::new(token.trim().to_string()))
    }

    pub fn expose(&self) -> &str {
        self.token.expose_secret()
    }
}

impl fmt::Debug for DeployCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeployCredential([REDACTED])")
    }
}
