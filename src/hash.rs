//! Key fingerprints: SHA3-512 over the encoded public key followed by the
//! key's salt.
//!
//! fingerprint = SHA3-512(update(spki_der); update(salt))
//!
//! The order is fixed. Creation, save and lookup must all hash the same
//! way or keys silently stop resolving.

use core::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha3::{Digest, Sha3_512};
use subtle::ConstantTimeEq;

use crate::wire::FINGERPRINT_BYTES;

/// A key's identity reference throughout the protocol.
#[derive(Clone, Copy, Eq)]
pub struct Fingerprint([u8; FINGERPRINT_BYTES]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; FINGERPRINT_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_BYTES] {
        &self.0
    }

    /// Standard base64; the registry key format.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// First 8 base64 characters, for display when the key is unknown.
    pub fn short(&self) -> String {
        let mut s = self.to_base64();
        s.truncate(8);
        s
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl core::hash::Hash for Fingerprint {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

pub fn fingerprint(public_key_bytes: &[u8], salt: &[u8]) -> Fingerprint {
    let mut hasher = Sha3_512::new();
    hasher.update(public_key_bytes);
    hasher.update(salt);
    let mut out = [0u8; FINGERPRINT_BYTES];
    out.copy_from_slice(&hasher.finalize());
    Fingerprint(out)
}
