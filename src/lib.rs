//! # CryptUI envelope
//!
//! Hybrid file encryption for several recipients at once, with a sender
//! signature.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cryptui_envelope::{decrypt_file, AsymmetricKey, DecryptOutcome, KeyPair, KeyStore};
//!
//! let alice = Arc::new(KeyPair::generate("alice", "")?);
//! let bob = Arc::new(KeyPair::generate("bob", "laptop")?);
//!
//! let sealed = cryptui_envelope::encode(&alice, &[AsymmetricKey::from(bob.public_key())], b"secret")?;
//!
//! let store = KeyStore::new();
//! store.add_key_pair(bob);
//! store.add_public_key(Arc::new(alice.public_key()));
//!
//! let report = decrypt_file(&sealed, &store)?;
//! if let DecryptOutcome::Decrypted { plaintext, verification, .. } = report.outcome {
//!     assert_eq!(plaintext, b"secret");
//!     assert!(verification.is_verified());
//! }
//! # Ok::<(), cryptui_envelope::CryptoError>(())
//! ```
//!
//! ## Construction
//!
//! - **Key wrap**: RSA-4096 OAEP (SHA3-512, MGF1-SHA3-512), one record per recipient
//! - **Payload**: AES-128-GCM over `signature || plaintext`
//! - **Signature**: RSASSA-PSS (SHA-512) over the plaintext and the ordered
//!   recipient fingerprints
//! - **Identity**: SHA3-512 of the public key DER and a per-key 128-byte salt
//!
//! ## What's NOT Provided
//!
//! - Compression
//! - Streaming encryption
//! - Key revocation or expiry

#![deny(unsafe_code)]

mod aead;
mod container;
mod envelope;
mod error;
mod hash;
mod keys;
mod registry;

// Wire module is public for the CLI inspect command and the fuzz target,
// but is not considered stable API.
#[doc(hidden)]
pub mod wire;

use std::fs;
use std::path::{Path, PathBuf};

pub use aead::Cipher;
pub use container::{encode, Container, ContainerSummary, Decrypted, Verification};
pub use envelope::{AesEncryptedData, RsaEncryptedData};
pub use error::{CryptoError, Result, WireError};
pub use hash::{fingerprint, Fingerprint};
pub use keys::{default_name, AsymmetricKey, KeyPair, PublicKey, Signature};
pub use registry::KeyStore;

/// Raw decrypt result of a parsed container, before verification.
pub use container::DecryptOutcome as ContainerOutcome;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Extension appended to sealed files.
pub const SEALED_EXTENSION: &str = "asc";

// ---------------------------------------------------------------------------
// File-level operations
// ---------------------------------------------------------------------------

/// What `decrypt_file` found.
#[derive(Debug)]
pub struct DecryptReport {
    pub outcome: DecryptOutcome,
}

#[derive(Debug)]
pub enum DecryptOutcome {
    /// None of the recipient records belongs to a key pair in the store.
    NoMatchingKey,
    Decrypted {
        plaintext: Vec<u8>,
        sender: Fingerprint,
        verification: Verification,
    },
}

/// Read `path` and seal it for `recipients`, signed by `signer`.
pub fn encrypt_file(
    path: impl AsRef<Path>,
    recipients: &[AsymmetricKey],
    signer: &KeyPair,
) -> Result<Vec<u8>> {
    if recipients.is_empty() {
        return Err(CryptoError::NoRecipients);
    }
    let plaintext = zeroize::Zeroizing::new(fs::read(path.as_ref())?);
    encode(signer, recipients, &plaintext)
}

/// Parse, decrypt and verify a sealed file in one pass.
pub fn decrypt_file(bytes: &[u8], store: &KeyStore) -> Result<DecryptReport> {
    let container = Container::parse(bytes)?;
    let outcome = match container.decrypt(store)? {
        ContainerOutcome::NoMatchingKey => DecryptOutcome::NoMatchingKey,
        ContainerOutcome::Decrypted(d) => {
            let verification = d.verify(&container, store)?;
            DecryptOutcome::Decrypted {
                plaintext: d.into_plaintext(),
                sender: *container.sender(),
                verification,
            }
        }
    };
    Ok(DecryptReport { outcome })
}

/// Parse a key file; a private key inside makes it a key pair.
pub fn import_key(bytes: &[u8]) -> Result<AsymmetricKey> {
    AsymmetricKey::deserialize(bytes)
}

/// Public-only key file for sharing.
pub fn export_public_key(kp: &KeyPair) -> Vec<u8> {
    kp.public_key().serialize()
}

/// `<path>.asc`
pub fn sealed_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".");
    s.push(SEALED_EXTENSION);
    PathBuf::from(s)
}

/// Strip a trailing `.asc`; otherwise append `.dec` so the input is never
/// overwritten.
pub fn opened_path(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == SEALED_EXTENSION => path.with_extension(""),
        _ => {
            let mut s = path.as_os_str().to_os_string();
            s.push(".dec");
            PathBuf::from(s)
        }
    }
}

// ---------------------------------------------------------------------------
// Shared test keys
// ---------------------------------------------------------------------------
