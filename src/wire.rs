//! Binary primitives shared by the key file and container formats.
//!
//! Every field in a stream is introduced by a one-byte `DataType` tag.
//! Integers are u32 big-endian. There is no magic number, version byte or
//! overall length prefix; parsing runs until end of input and an unknown
//! tag ends it with an error.
//!
//! Key file:
//!   OBJECT_NAME len[1] name || DESCRIPTION_SHORT len[1] comment ||
//!   PRIVATE_KEY len[4] pkcs8 || PUBLIC_KEY len[4] spki || salt[128]
//!
//! Container:
//!   SENDER_HASH fp[64] || (RSA_ENCRYPTED_DATA fp[64] len[4] ct[512])+ ||
//!   AES_ENCRYPTED_DATA nonce[12] len[4] ct[len]

use core::convert::TryFrom;
use core::fmt;

use crate::error::WireError;

// ---------------------------------------------------------------------------
// Component sizes
// ---------------------------------------------------------------------------

pub const U32_BYTES: usize = 4;

/// SHA3-512 fingerprint size.
pub const FINGERPRINT_BYTES: usize = 64;

/// Per-key random salt appended after the public key.
pub const SALT_BYTES: usize = 128;

/// RSA-4096 modulus size: every OAEP ciphertext and PSS signature is this long.
pub const RSA_KEY_BITS: usize = 4096;
pub const RSA_MODULUS_BYTES: usize = RSA_KEY_BITS / 8; // 512
pub const SIGNATURE_BYTES: usize = RSA_MODULUS_BYTES;

/// OAEP capacity with SHA3-512: k - 2*hLen - 2
pub const OAEP_MAX_PLAINTEXT_BYTES: usize = RSA_MODULUS_BYTES - 2 * 64 - 2; // 382

pub const AES_KEY_BYTES: usize = 16;
pub const NONCE_BYTES: usize = 12;
pub const AEAD_TAG_BYTES: usize = 16;

/// Names and comments are stored with a one-byte length and cut at 127 bytes.
pub const MAX_LABEL_BYTES: usize = 127;

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Field discriminant. Values are fixed by existing files on disk.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    PrivateKey = 1,
    PublicKey = 2,
    ObjectName = 3,
    DescriptionShort = 4,
    AesEncryptedData = 5,
    RsaEncryptedData = 6,
    /// Reserved, never written.
    AesKey = 7,
    /// Reserved for an external compression step, never written.
    Gzip = 8,
    SenderHash = 9,
}

impl DataType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DataType {
    type Error = WireError;

    fn try_from(b: u8) -> Result<Self, WireError> {
        match b {
            1 => Ok(Self::PrivateKey),
            2 => Ok(Self::PublicKey),
            3 => Ok(Self::ObjectName),
            4 => Ok(Self::DescriptionShort),
            5 => Ok(Self::AesEncryptedData),
            6 => Ok(Self::RsaEncryptedData),
            7 => Ok(Self::AesKey),
            8 => Ok(Self::Gzip),
            9 => Ok(Self::SenderHash),
            other => Err(WireError::UnknownTag(other)),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PrivateKey => "PRIVATE_KEY",
            Self::PublicKey => "PUBLIC_KEY",
            Self::ObjectName => "OBJECT_NAME",
            Self::DescriptionShort => "DESCRIPTION_SHORT",
            Self::AesEncryptedData => "AES_ENCRYPTED_DATA",
            Self::RsaEncryptedData => "RSA_ENCRYPTED_DATA",
            Self::AesKey => "AES_KEY",
            Self::Gzip => "GZIP",
            Self::SenderHash => "SENDER_HASH",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Integers
// ---------------------------------------------------------------------------

pub fn encode_u32(n: u32) -> [u8; U32_BYTES] {
    n.to_be_bytes()
}

pub fn decode_u32(bytes: &[u8]) -> Result<u32, WireError> {
    let head: [u8; U32_BYTES] = bytes
        .get(..U32_BYTES)
        .and_then(|s| s.try_into().ok())
        .ok_or(WireError::TruncatedInput)?;
    Ok(u32::from_be_bytes(head))
}

/// Append `tag || u32 len || bytes`.
pub fn push_len_prefixed(out: &mut Vec<u8>, tag: DataType, bytes: &[u8]) {
    out.push(tag.as_byte());
    out.extend_from_slice(&encode_u32(bytes.len() as u32));
    out.extend_from_slice(bytes);
}

/// Append `tag || u8 len || utf8`, cut at `MAX_LABEL_BYTES`.
pub fn push_label(out: &mut Vec<u8>, tag: DataType, label: &str) {
    let bytes = label.as_bytes();
    let len = bytes.len().min(MAX_LABEL_BYTES);
    out.push(tag.as_byte());
    out.push(len as u8);
    out.extend_from_slice(&bytes[..len]);
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Bounds-checked cursor over a fully-read buffer.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if n > self.remaining() {
            return Err(WireError::TruncatedInput);
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let s = self.read_exact(N)?;
        s.try_into().map_err(|_| WireError::TruncatedInput)
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.read_exact(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        decode_u32(self.read_exact(U32_BYTES)?)
    }

    pub fn read_tag(&mut self) -> Result<DataType, WireError> {
        DataType::try_from(self.read_u8()?)
    }

    /// `u32 len || bytes`
    pub fn read_len_prefixed(&mut self) -> Result<&'a [u8], WireError> {
        let len = self.read_u32()? as usize;
        self.read_exact(len)
    }

    /// `u8 len || utf8`. Invalid UTF-8 (e.g. a name cut mid-character) is
    /// replaced rather than rejected.
    pub fn read_label(&mut self) -> Result<String, WireError> {
        let len = self.read_u8()? as usize;
        let bytes = self.read_exact(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}
