//! Sealed secrets: at-rest encryption for edge shared secrets.
//!
//! XChaCha20-Poly1305 under a 32-byte master key. Fixed layout:
//!
//! | Offset | Size | Field                   |
//! |--------|------|-------------------------|
//! | 0      | 1    | version (0x01)          |
//! | 1      | 24   | nonce                   |
//! | 25     | N    | ciphertext + 16-byte tag|

use std::fmt;

use chacha20poly1305::aead::Aead;
use chacha20poly1305::{KeyInit, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::decode_base64url;

/// Required master key length in bytes.
pub const MASTER_KEY_LEN: usize = 32;

const VERSION: u8 = 0x01;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + NONCE_LEN;

/// Errors from sealing or opening a secret.
#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("master key must be {MASTER_KEY_LEN} bytes")]
    InvalidKeyLength,
    #[error("master key is not valid base64url")]
    InvalidKeyEncoding,
    #[error("sealed secret is truncated")]
    Truncated,
    #[error("unsupported sealed secret version")]
    UnsupportedVersion,
    #[error("sealed secret could not be decrypted")]
    Decrypt,
    #[error("secret could not be encrypted")]
    Encrypt,
}

/// Encrypts and decrypts credential secrets with the deployment master key.
pub struct SecretSealer {
    cipher: XChaCha20Poly1305,
}

impl fmt::Debug for SecretSealer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretSealer").finish_non_exhaustive()
    }
}

impl SecretSealer {
    /// Create a sealer from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SealError::InvalidKeyLength`] unless the key is exactly 32 bytes.
    pub fn new(master_key: &[u8]) -> Result<Self, SealError> {
        if master_key.len() != MASTER_KEY_LEN {
            return Err(SealError::InvalidKeyLength);
        }
        let cipher =
            XChaCha20Poly1305::new_from_slice(master_key).map_err(|_| SealError::InvalidKeyLength)?;
        Ok(Self { cipher })
    }

    /// Create a sealer from a base64url-encoded key (the configuration format).
    ///
    /// # Errors
    ///
    /// Returns [`SealError::InvalidKeyEncoding`] or [`SealError::InvalidKeyLength`].
    pub fn from_base64url(encoded: &str) -> Result<Self, SealError> {
        let key = Zeroizing::new(
            decode_base64url(encoded.trim()).map_err(|_| SealError::InvalidKeyEncoding)?,
        );
        Self::new(&key)
    }

    /// Encrypt a secret under a fresh random nonce.
    ///
    /// # Errors
    ///
    /// Returns [`SealError::Encrypt`] if the AEAD refuses the input.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| SealError::Encrypt)?;

        let mut sealed = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        sealed.push(VERSION);
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypt a sealed secret. The plaintext is wiped when dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob is malformed, was sealed under another key,
    /// or has been tampered with.
    pub fn open(&self, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>, SealError> {
        if sealed.len() < HEADER_LEN + TAG_LEN {
            return Err(SealError::Truncated);
        }
        if sealed[0] != VERSION {
            return Err(SealError::UnsupportedVersion);
        }
        let nonce = XNonce::from_slice(&sealed[1..HEADER_LEN]);
        self.cipher
            .decrypt(nonce, &sealed[HEADER_LEN..])
            .map(Zeroizing::new)
            .map_err(|_| SealError::Decrypt)
    }
}
