//! Asymmetric key objects: RSA-4096 key pairs and public-key-only keys.
//!
//! Key serialization (see `wire`):
//!   PublicKey = OBJECT_NAME || PUBLIC_KEY spki_der || salt[128]
//!   KeyPair   = OBJECT_NAME || DESCRIPTION_SHORT || PRIVATE_KEY pkcs8_der
//!               || PUBLIC_KEY spki_der || salt[128]
//!
//! Wrapping: RSA-OAEP with SHA3-512 and MGF1(SHA3-512).
//! Signatures: RSASSA-PSS with SHA-512, MGF1(SHA-512), 64-byte salt, over
//! update(data); update(recipient_binding).

use core::fmt;
use std::sync::Arc;

use rand_core::{OsRng, RngCore};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pss, RsaPrivateKey, RsaPublicKey};
use sha2::Sha512;
use sha3::{Digest, Sha3_512};
use zeroize::Zeroizing;

use crate::envelope::RsaEncryptedData;
use crate::error::{CryptoError, Result};
use crate::hash::{fingerprint, Fingerprint};
use crate::wire::{
    push_label, push_len_prefixed, DataType, Reader, OAEP_MAX_PLAINTEXT_BYTES, RSA_KEY_BITS,
    RSA_MODULUS_BYTES, SALT_BYTES, SIGNATURE_BYTES,
};

pub type Signature = [u8; SIGNATURE_BYTES];

/// Default name: the first 16 base64 characters of the fingerprint.
pub fn default_name(fp: &Fingerprint) -> String {
    let mut s = fp.to_base64();
    s.truncate(16);
    s
}

fn resolve_name(name: Option<String>, fp: &Fingerprint) -> String {
    match name {
        Some(n) if !n.is_empty() => n,
        _ => default_name(fp),
    }
}

fn signed_digest(data: &[u8], recipient_binding: &[u8]) -> Vec<u8> {
    let mut hasher = Sha512::new();
    hasher.update(data);
    hasher.update(recipient_binding);
    hasher.finalize().to_vec()
}

fn malformed(msg: impl Into<String>) -> CryptoError {
    CryptoError::MalformedKeyFile(msg.into())
}

// ---------------------------------------------------------------------------
// Public key
// ---------------------------------------------------------------------------

/// RSA public key with its salt. Can encrypt and verify.
#[derive(Clone)]
pub struct PublicKey {
    name: String,
    key: RsaPublicKey,
    /// SPKI DER exactly as hashed into the fingerprint.
    der: Vec<u8>,
    salt: [u8; SALT_BYTES],
    fingerprint: Fingerprint,
}

impl PublicKey {
    fn from_parts(
        name: Option<String>,
        key: RsaPublicKey,
        der: Vec<u8>,
        salt: [u8; SALT_BYTES],
    ) -> Result<Self> {
        if key.size() != RSA_MODULUS_BYTES {
            return Err(malformed(format!(
                "expected a {}-bit key, found {} bits",
                RSA_KEY_BITS,
                key.size() * 8
            )));
        }
        let fingerprint = fingerprint(&der, &salt);
        let name = resolve_name(name, &fingerprint);
        Ok(Self { name, key, der, salt, fingerprint })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn salt(&self) -> &[u8; SALT_BYTES] {
        &self.salt
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Wrap `data` for this key. At most 382 bytes.
    pub fn encrypt(&self, data: &[u8]) -> Result<RsaEncryptedData> {
        if data.len() > OAEP_MAX_PLAINTEXT_BYTES {
            return Err(CryptoError::PlaintextTooLarge {
                len: data.len(),
                max: OAEP_MAX_PLAINTEXT_BYTES,
            });
        }
        let ct = self
            .key
            .encrypt(&mut OsRng, Oaep::new::<Sha3_512>(), data)
            .map_err(|_| CryptoError::CryptoOperationFailed("rsa-oaep encrypt"))?;
        RsaEncryptedData::new(ct, self.fingerprint)
    }

    /// `Ok(false)` when the signature does not match; `Err` only when the
    /// engine itself fails.
    pub fn verify(&self, signature: &[u8], data: &[u8], recipient_binding: &[u8]) -> Result<bool> {
        if signature.len() != SIGNATURE_BYTES {
            return Ok(false);
        }
        let hashed = signed_digest(data, recipient_binding);
        match self.key.verify(Pss::new::<Sha512>(), &hashed, signature) {
            Ok(()) => Ok(true),
            Err(rsa::Error::Verification) => Ok(false),
            Err(_) => Err(CryptoError::CryptoOperationFailed("rsa-pss verify")),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.name.len() + 5 + self.der.len() + SALT_BYTES);
        push_label(&mut out, DataType::ObjectName, &self.name);
        push_len_prefixed(&mut out, DataType::PublicKey, &self.der);
        out.extend_from_slice(&self.salt);
        out
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("name", &self.name)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Key pair
// ---------------------------------------------------------------------------

/// RSA private + public key. Can additionally decrypt and sign.
#[derive(Clone)]
pub struct KeyPair {
    comment: String,
    private_key: RsaPrivateKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh 4096-bit key pair (e = 65537) and salt.
    ///
    /// Blocks for hundreds of milliseconds up to a few seconds.
    pub fn generate(name: &str, comment: &str) -> Result<Self> {
        let private_key =
            RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS).map_err(|_| CryptoError::KeyGeneration)?;
        let mut salt = [0u8; SALT_BYTES];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|_| CryptoError::KeyGeneration)?;
        let der = private_key
            .to_public_key()
            .to_public_key_der()
            .map_err(|_| CryptoError::KeyGeneration)?
            .into_vec();
        let kp = Self::from_parts(Some(name.to_string()), comment.to_string(), private_key, der, salt)
            .map_err(|_| CryptoError::KeyGeneration)?;
        tracing::debug!(name = %kp.name(), fingerprint = %kp.fingerprint().short(), "generated key pair");
        Ok(kp)
    }

    fn from_parts(
        name: Option<String>,
        comment: String,
        private_key: RsaPrivateKey,
        public_der: Vec<u8>,
        salt: [u8; SALT_BYTES],
    ) -> Result<Self> {
        let key = RsaPublicKey::from_public_key_der(&public_der)
            .map_err(|_| malformed("undecodable public key"))?;
        if private_key.to_public_key() != key {
            return Err(malformed("private key does not match public key"));
        }
        let public = PublicKey::from_parts(name, key, public_der, salt)?;
        Ok(Self { comment, private_key, public })
    }

    pub fn name(&self) -> &str {
        self.public.name()
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        self.public.fingerprint()
    }

    /// Public-only projection; same key bytes and salt, so same fingerprint.
    pub fn public_key(&self) -> PublicKey {
        self.public.clone()
    }

    pub fn encrypt(&self, data: &[u8]) -> Result<RsaEncryptedData> {
        self.public.encrypt(data)
    }

    pub fn decrypt(&self, data: &RsaEncryptedData) -> Result<Zeroizing<Vec<u8>>> {
        self.private_key
            .decrypt_blinded(&mut OsRng, Oaep::new::<Sha3_512>(), data.ciphertext())
            .map(Zeroizing::new)
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    pub fn sign(&self, data: &[u8], recipient_binding: &[u8]) -> Result<Signature> {
        let hashed = signed_digest(data, recipient_binding);
        let sig = self
            .private_key
            .sign_with_rng(&mut OsRng, Pss::new::<Sha512>(), &hashed)
            .map_err(|_| CryptoError::CryptoOperationFailed("rsa-pss sign"))?;
        sig.as_slice()
            .try_into()
            .map_err(|_| CryptoError::CryptoOperationFailed("rsa-pss signature length"))
    }

    pub fn verify(&self, signature: &[u8], data: &[u8], recipient_binding: &[u8]) -> Result<bool> {
        self.public.verify(signature, data, recipient_binding)
    }

    /// Full key file including the private key.
    pub fn serialize(&self) -> Result<Zeroizing<Vec<u8>>> {
        let pkcs8 = self
            .private_key
            .to_pkcs8_der()
            .map_err(|_| CryptoError::CryptoOperationFailed("pkcs8 encode"))?;
        let mut out = Zeroizing::new(Vec::new());
        push_label(&mut out, DataType::ObjectName, self.name());
        push_label(&mut out, DataType::DescriptionShort, &self.comment);
        push_len_prefixed(&mut out, DataType::PrivateKey, pkcs8.as_bytes());
        push_len_prefixed(&mut out, DataType::PublicKey, self.public.der());
        out.extend_from_slice(self.public.salt());
        Ok(out)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("name", &self.name())
            .field("comment", &self.comment)
            .field("fingerprint", self.fingerprint())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Either variant
// ---------------------------------------------------------------------------

/// Any key object. Cloning is cheap.
#[derive(Clone, Debug)]
pub enum AsymmetricKey {
    KeyPair(Arc<KeyPair>),
    PublicOnly(Arc<PublicKey>),
}

impl AsymmetricKey {
    /// Parse a key file. A `PRIVATE_KEY` record makes it a key pair.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let mut name = None;
        let mut comment = None;
        let mut private_der: Option<&[u8]> = None;
        let mut public: Option<(&[u8], [u8; SALT_BYTES])> = None;

        let wire = |e: crate::error::WireError| malformed(e.to_string());

        while !r.is_empty() {
            let tag = r.read_tag().map_err(wire)?;
            match tag {
                DataType::ObjectName if name.is_none() => name = Some(r.read_label().map_err(wire)?),
                DataType::DescriptionShort if comment.is_none() => {
                    comment = Some(r.read_label().map_err(wire)?)
                }
                DataType::PrivateKey if private_der.is_none() => {
                    private_der = Some(r.read_len_prefixed().map_err(wire)?)
                }
                DataType::PublicKey if public.is_none() => {
                    let der = r.read_len_prefixed().map_err(wire)?;
                    let salt = r.read_array::<SALT_BYTES>().map_err(wire)?;
                    public = Some((der, salt));
                }
                other => {
                    return Err(malformed(format!(
                        "unexpected {} record at offset {}",
                        other,
                        r.position() - 1
                    )))
                }
            }
        }

        let (public_der, salt) = public.ok_or_else(|| malformed("missing public key"))?;

        match private_der {
            Some(der) => {
                let private_key = RsaPrivateKey::from_pkcs8_der(der)
                    .map_err(|_| malformed("undecodable private key"))?;
                let kp = KeyPair::from_parts(
                    name,
                    comment.unwrap_or_default(),
                    private_key,
                    public_der.to_vec(),
                    salt,
                )?;
                Ok(Self::KeyPair(Arc::new(kp)))
            }
            None => {
                let key = RsaPublicKey::from_public_key_der(public_der)
                    .map_err(|_| malformed("undecodable public key"))?;
                let pk = PublicKey::from_parts(name, key, public_der.to_vec(), salt)?;
                Ok(Self::PublicOnly(Arc::new(pk)))
            }
        }
    }

    /// Key file bytes: with the private key for a pair, public-only otherwise.
    pub fn serialize(&self) -> Result<Zeroizing<Vec<u8>>> {
        match self {
            Self::KeyPair(kp) => kp.serialize(),
            Self::PublicOnly(pk) => Ok(Zeroizing::new(pk.serialize())),
        }
    }

    fn public(&self) -> &PublicKey {
        match self {
            Self::KeyPair(kp) => &kp.public,
            Self::PublicOnly(pk) => pk,
        }
    }

    pub fn name(&self) -> &str {
        self.public().name()
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        self.public().fingerprint()
    }

    pub fn as_key_pair(&self) -> Option<&Arc<KeyPair>> {
        match self {
            Self::KeyPair(kp) => Some(kp),
            Self::PublicOnly(_) => None,
        }
    }

    pub fn is_key_pair(&self) -> bool {
        matches!(self, Self::KeyPair(_))
    }

    pub fn encrypt(&self, data: &[u8]) -> Result<RsaEncryptedData> {
        self.public().encrypt(data)
    }

    pub fn verify(&self, signature: &[u8], data: &[u8], recipient_binding: &[u8]) -> Result<bool> {
        self.public().verify(signature, data, recipient_binding)
    }

    /// `"name - comment"`, or just the name when there is no comment.
    pub fn label(&self) -> String {
        match self {
            Self::KeyPair(kp) if !kp.comment().is_empty() => {
                format!("{} - {}", kp.name(), kp.comment())
            }
            _ => self.name().to_string(),
        }
    }
}

impl From<KeyPair> for AsymmetricKey {
    fn from(kp: KeyPair) -> Self {
        Self::KeyPair(Arc::new(kp))
    }
}

impl From<PublicKey> for AsymmetricKey {
    fn from(pk: PublicKey) -> Self {
        Self::PublicOnly(Arc::new(pk))
    }
}

impl From<Arc<KeyPair>> for AsymmetricKey {
    fn from(kp: Arc<KeyPair>) -> Self {
        Self::KeyPair(kp)
    }
}

impl From<Arc<PublicKey>> for AsymmetricKey {
    fn from(pk: Arc<PublicKey>) -> Self {
        Self::PublicOnly(pk)
    }
}

impl fmt::Display for AsymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
