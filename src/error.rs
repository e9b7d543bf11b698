//! Error types for the envelope core.
//!
//! Messages never carry key material. Expected outcomes (no usable private
//! key, unknown sender, bad signature) are result variants in `container`,
//! not errors.

use core::fmt;

// ---------------------------------------------------------------------------
// Wire-level parse errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// Fewer bytes remained than the field requires.
    TruncatedInput,
    /// Tag byte matches no `DataType`.
    UnknownTag(u8),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TruncatedInput => write!(f, "truncated input"),
            Self::UnknownTag(b) => write!(f, "unknown tag 0x{:02X}", b),
        }
    }
}

impl std::error::Error for WireError {}

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum CryptoError {
    /// Low-level parse failure outside a key file or container.
    MalformedInput(WireError),
    /// Key file could not be parsed or its key material is unusable.
    MalformedKeyFile(String),
    /// Container could not be parsed.
    MalformedContainer(String),
    /// Symmetric key is not exactly 16 bytes.
    InvalidKeyLength(usize),
    /// AES-GCM tag did not verify: file corrupted or tampered.
    AuthenticationFailed,
    /// RSA unwrap failed (padding mismatch, wrong key, corrupted ciphertext).
    DecryptionFailed,
    /// RSA key generation failed.
    KeyGeneration,
    /// Input exceeds the RSA-OAEP capacity.
    PlaintextTooLarge { len: usize, max: usize },
    /// Encryption requested with an empty recipient list.
    NoRecipients,
    /// An envelope value violated its length invariant.
    InvalidEnvelope(&'static str),
    /// Underlying cipher/signature engine failure.
    CryptoOperationFailed(&'static str),
    Io(std::io::Error),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedInput(e) => write!(f, "malformed input: {}", e),
            Self::MalformedKeyFile(msg) => write!(f, "not a valid key file: {}", msg),
            Self::MalformedContainer(msg) => write!(f, "not a valid container: {}", msg),
            Self::InvalidKeyLength(len) => {
                write!(f, "invalid AES key length: {} bytes (expected 16)", len)
            }
            Self::AuthenticationFailed => write!(f, "authentication failed: file corrupted or tampered"),
            Self::DecryptionFailed => write!(f, "decryption failed"),
            Self::KeyGeneration => write!(f, "key generation failed"),
            Self::PlaintextTooLarge { len, max } => {
                write!(f, "plaintext too large: {} bytes exceeds maximum {} bytes", len, max)
            }
            Self::NoRecipients => write!(f, "at least one recipient is required"),
            Self::InvalidEnvelope(msg) => write!(f, "invalid envelope: {}", msg),
            Self::CryptoOperationFailed(op) => write!(f, "crypto operation failed: {}", op),
            Self::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for CryptoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MalformedInput(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WireError> for CryptoError {
    fn from(e: WireError) -> Self {
        Self::MalformedInput(e)
    }
}

impl From<std::io::Error> for CryptoError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl CryptoError {
    /// True for failures caused by the input bytes rather than the caller or
    /// the crypto engine.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::MalformedInput(_) | Self::MalformedKeyFile(_) | Self::MalformedContainer(_)
        )
    }
}

pub type Result<T> = core::result::Result<T, CryptoError>;
