//! AEAD: AES-128-GCM
//!
//! One `Cipher` owns one 16-byte key. Each call builds its own GCM context
//! and, on encryption, draws a fresh 12-byte nonce; callers never supply
//! nonces.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Nonce,
};
use getrandom::getrandom;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::envelope::AesEncryptedData;
use crate::error::{CryptoError, Result};
use crate::wire::{AES_KEY_BYTES, NONCE_BYTES};

/// Generate a random 12-byte nonce. Used during encryption only.
fn nonce() -> Result<[u8; NONCE_BYTES]> {
    let mut n = [0u8; NONCE_BYTES];
    getrandom(&mut n).map_err(|_| CryptoError::CryptoOperationFailed("nonce generation"))?;
    Ok(n)
}

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Cipher {
    key: [u8; AES_KEY_BYTES],
}

impl Cipher {
    /// Fresh random key from the OS RNG.
    pub fn new_random_key() -> Result<Self> {
        let mut key = [0u8; AES_KEY_BYTES];
        getrandom(&mut key).map_err(|_| CryptoError::CryptoOperationFailed("key generation"))?;
        Ok(Self { key })
    }

    /// Copies `key`; later changes to the caller's buffer do not affect the cipher.
    pub fn from_key(key: &[u8]) -> Result<Self> {
        let key: [u8; AES_KEY_BYTES] = key
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
        Ok(Self { key })
    }

    /// Defensive copy of the key, wiped when dropped.
    pub fn key_bytes(&self) -> Zeroizing<[u8; AES_KEY_BYTES]> {
        Zeroizing::new(self.key)
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<AesEncryptedData> {
        let n = nonce()?;
        self.encrypt_with_nonce(n, plaintext)
    }

    /// Fails with `AuthenticationFailed` if the tag does not verify.
    pub fn decrypt(&self, data: &AesEncryptedData) -> Result<Vec<u8>> {
        let cipher = Aes128Gcm::new_from_slice(&self.key)
            .map_err(|_| CryptoError::InvalidKeyLength(self.key.len()))?;
        cipher
            .decrypt(Nonce::from_slice(data.nonce()), data.ciphertext())
            .map_err(|_| CryptoError::AuthenticationFailed)
    }

    #[cfg(any(test, feature = "kat"))]
    #[doc(hidden)]
    pub fn encrypt_kat(&self, nonce: [u8; NONCE_BYTES], plaintext: &[u8]) -> Result<AesEncryptedData> {
        self.encrypt_with_nonce(nonce, plaintext)
    }

    fn encrypt_with_nonce(&self, nonce: [u8; NONCE_BYTES], plaintext: &[u8]) -> Result<AesEncryptedData> {
        let cipher = Aes128Gcm::new_from_slice(&self.key)
            .map_err(|_| CryptoError::InvalidKeyLength(self.key.len()))?;
        let ct = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::CryptoOperationFailed("aes-gcm encrypt"))?;
        AesEncryptedData::new(nonce, ct)
    }
}

impl core::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Cipher { key: <redacted> }")
    }
}
