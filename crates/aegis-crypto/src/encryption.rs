//! Key derivation and authenticated encryption.
//!
//! A single system secret is expanded with HKDF-SHA256 into independent keys
//! for cookie signing, cookie encryption and at-rest sealing of private key
//! material. The sealing format is `nonce || ciphertext` with a random
//! 96-bit nonce per message.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;

/// Minimum length of the configured system secret in bytes.
pub const MIN_SECRET_LEN: usize = 32;

const NONCE_LEN: usize = 12;

/// Errors raised by key derivation and sealing.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The configured system secret is too short.
    #[error("system secret must be at least {MIN_SECRET_LEN} bytes, got {0}")]
    WeakSecret(usize),

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    Derivation(String),

    /// Decryption failed (wrong key or corrupted data).
    #[error("unable to decrypt data: wrong key or corrupted ciphertext")]
    Decrypt,

    /// Encryption failed.
    #[error("unable to encrypt data")]
    Encrypt,
}

/// Keys derived from the system secret.
///
/// Each key uses a distinct HKDF info string, so compromising one derived
/// key does not reveal the others or the secret itself.
pub struct KeyRing {
    csrf_cookie_key: [u8; 64],
    session_cookie_key: [u8; 64],
    sealing_key: [u8; 32],
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing").finish_non_exhaustive()
    }
}

impl KeyRing {
    /// Derives the full key ring from the system secret.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::WeakSecret`] if the secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn derive(secret: &[u8]) -> Result<Self, CryptoError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(CryptoError::WeakSecret(secret.len()));
        }

        let hk = Hkdf::<Sha256>::new(None, secret);

        let mut csrf_cookie_key = [0u8; 64];
        hk.expand(b"aegis/csrf-cookie", &mut csrf_cookie_key)
            .map_err(|e| CryptoError::Derivation(e.to_string()))?;

        let mut session_cookie_key = [0u8; 64];
        hk.expand(b"aegis/session-cookie", &mut session_cookie_key)
            .map_err(|e| CryptoError::Derivation(e.to_string()))?;

        let mut sealing_key = [0u8; 32];
        hk.expand(b"aegis/data-sealing", &mut sealing_key)
            .map_err(|e| CryptoError::Derivation(e.to_string()))?;

        Ok(Self {
            csrf_cookie_key,
            session_cookie_key,
            sealing_key,
        })
    }

    /// Returns the 64-byte key for signing CSRF cookies.
    #[must_use]
    pub const fn csrf_cookie_key(&self) -> &[u8; 64] {
        &self.csrf_cookie_key
    }

    /// Returns the 64-byte key for encrypting the session cookie.
    #[must_use]
    pub const fn session_cookie_key(&self) -> &[u8; 64] {
        &self.session_cookie_key
    }

    /// Returns a sealer bound to the derived at-rest encryption key.
    #[must_use]
    pub fn sealer(&self) -> Sealer {
        Sealer::new(&self.sealing_key)
    }
}

/// AES-256-GCM authenticated encryption for data at rest.
pub struct Sealer {
    cipher: Aes256Gcm,
}

impl Sealer {
    /// Creates a sealer from a 32-byte key.
    #[must_use]
    pub fn new(key: &[u8; 32]) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        Self { cipher }
    }

    /// Encrypts `plaintext`, returning `nonce || ciphertext`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encrypt`] if encryption fails.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypts data produced by [`Sealer::seal`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Decrypt`] if the data is too short, was sealed
    /// with a different key, or has been tampered with.
    pub fn open(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data.len() <= NONCE_LEN {
            return Err(CryptoError::Decrypt);
        }

        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decrypt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_rejects_short_secret() {
        let err = KeyRing::derive(b"too-short").unwrap_err();
        assert!(matches!(err, CryptoError::WeakSecret(9)));
    }

    #[test]
    fn derived_keys_are_independent() {
        let ring = KeyRing::derive(&[7u8; 32]).unwrap();
        assert_ne!(ring.csrf_cookie_key(), ring.session_cookie_key());
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = KeyRing::derive(&[1u8; 32]).unwrap();
        let b = KeyRing::derive(&[1u8; 32]).unwrap();
        assert_eq!(a.csrf_cookie_key(), b.csrf_cookie_key());
        assert_eq!(a.session_cookie_key(), b.session_cookie_key());
    }

    #[test]
    fn seal_open_round_trip() {
        let ring = KeyRing::derive(&[2u8; 32]).unwrap();
        let sealer = ring.sealer();

        let sealed = sealer.seal(b"private key material").unwrap();
        assert_ne!(&sealed[NONCE_LEN..], b"private key material".as_slice());

        let opened = sealer.open(&sealed).unwrap();
        assert_eq!(opened, b"private key material");
    }

    #[test]
    fn open_fails_with_wrong_key() {
        let sealed = KeyRing::derive(&[3u8; 32])
            .unwrap()
            .sealer()
            .seal(b"secret")
            .unwrap();

        let other = KeyRing::derive(&[4u8; 32]).unwrap().sealer();
        assert!(matches!(other.open(&sealed), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn open_fails_on_tampered_ciphertext() {
        let ring = KeyRing::derive(&[5u8; 32]).unwrap();
        let sealer = ring.sealer();

        let mut sealed = sealer.seal(b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;

        assert!(matches!(sealer.open(&sealed), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn open_fails_on_truncated_input() {
        let ring = KeyRing::derive(&[6u8; 32]).unwrap();
        assert!(matches!(
            ring.sealer().open(&[0u8; 8]),
            Err(CryptoError::Decrypt)
        ));
    }
}
