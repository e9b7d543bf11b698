//! Encrypted-data envelopes: the two record types a container carries.

use crate::error::{CryptoError, Result};
use crate::hash::Fingerprint;
use crate::wire::{
    encode_u32, DataType, AEAD_TAG_BYTES, NONCE_BYTES, RSA_MODULUS_BYTES,
};

// ---------------------------------------------------------------------------
// RSA-wrapped symmetric key
// ---------------------------------------------------------------------------

/// AES key wrapped for one recipient, tagged with that recipient's fingerprint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RsaEncryptedData {
    ciphertext: Vec<u8>,
    fingerprint: Fingerprint,
}

impl RsaEncryptedData {
    /// `ciphertext` must be exactly one RSA-4096 block.
    pub fn new(ciphertext: Vec<u8>, fingerprint: Fingerprint) -> Result<Self> {
        if ciphertext.len() != RSA_MODULUS_BYTES {
            return Err(CryptoError::InvalidEnvelope(
                "RSA encrypted data must be 512 bytes",
            ));
        }
        Ok(Self { ciphertext, fingerprint })
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// `RSA_ENCRYPTED_DATA || fp[64] || u32 len || ct`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(DataType::RsaEncryptedData.as_byte());
        out.extend_from_slice(self.fingerprint.as_bytes());
        out.extend_from_slice(&encode_u32(self.ciphertext.len() as u32));
        out.extend_from_slice(&self.ciphertext);
    }
}

// ---------------------------------------------------------------------------
// AES-GCM ciphertext
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AesEncryptedData {
    nonce: [u8; NONCE_BYTES],
    ciphertext: Vec<u8>,
}

impl AesEncryptedData {
    /// `ciphertext` includes the 16-byte GCM tag, so anything shorter is rejected.
    pub fn new(nonce: [u8; NONCE_BYTES], ciphertext: Vec<u8>) -> Result<Self> {
        if ciphertext.len() < AEAD_TAG_BYTES {
            return Err(CryptoError::InvalidEnvelope(
                "AES ciphertext shorter than the GCM tag",
            ));
        }
        Ok(Self { nonce, ciphertext })
    }

    pub fn nonce(&self) -> &[u8; NONCE_BYTES] {
        &self.nonce
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// `AES_ENCRYPTED_DATA || nonce[12] || u32 len || ct`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(DataType::AesEncryptedData.as_byte());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&encode_u32(self.ciphertext.len() as u32));
        out.extend_from_slice(&self.ciphertext);
    }
}
