//! Error types for the key directory and CLI.

use std::fmt;
use std::path::PathBuf;

use cryptui_envelope::CryptoError;

#[derive(Debug)]
pub enum KeystoreError {
    Io { path: PathBuf, source: std::io::Error },
    Crypto(CryptoError),
    Config(String),
    /// Nothing in the registry matched the given name or fingerprint prefix.
    KeyNotFound(String),
    AmbiguousKey { query: String, matches: usize },
    /// A key with the private half was required.
    NotAKeyPair(String),
    /// Background key generation panicked or was cancelled.
    Join(String),
}

impl fmt::Display for KeystoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            Self::Crypto(e) => write!(f, "{}", e),
            Self::Config(msg) => write!(f, "config error: {}", msg),
            Self::KeyNotFound(q) => write!(f, "no key matches '{}'", q),
            Self::AmbiguousKey { query, matches } => {
                write!(f, "'{}' matches {} keys; use a longer fingerprint prefix", query, matches)
            }
            Self::NotAKeyPair(q) => write!(f, "key '{}' has no private key", q),
            Self::Join(msg) => write!(f, "background task failed: {}", msg),
        }
    }
}

impl std::error::Error for KeystoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Crypto(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CryptoError> for KeystoreError {
    fn from(e: CryptoError) -> Self {
        Self::Crypto(e)
    }
}

impl From<tokio::task::JoinError> for KeystoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Join(e.to_string())
    }
}

pub(crate) trait IoContext<T> {
    fn at(self, path: &std::path::Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: &std::path::Path) -> Result<T> {
        self.map_err(|source| KeystoreError::Io { path: path.to_path_buf(), source })
    }
}

pub type Result<T> = std::result::Result<T, KeystoreError>;
