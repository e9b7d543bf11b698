//! Signed multi-recipient container.
//!
//!   SENDER_HASH fp[64]
//!   RSA_ENCRYPTED_DATA fp[64] len[4] ct[512]      (once per recipient)
//!   AES_ENCRYPTED_DATA nonce[12] len[4] ct[len]
//!
//! The AES payload decrypts to `signature[512] || plaintext`. The signature
//! covers the plaintext followed by the recipient binding: every recipient
//! fingerprint concatenated in file order. Reordering, adding or dropping a
//! recipient record therefore breaks verification.
//!
//! A container is parsed once, decrypted at most once, then verified at most
//! once. Nothing is retried.

use core::fmt;

use zeroize::Zeroizing;

use crate::aead::Cipher;
use crate::envelope::{AesEncryptedData, RsaEncryptedData};
use crate::error::{CryptoError, Result};
use crate::hash::Fingerprint;
use crate::keys::{AsymmetricKey, KeyPair, Signature};
use crate::registry::KeyStore;
use crate::wire::{
    DataType, Reader, FINGERPRINT_BYTES, NONCE_BYTES, SIGNATURE_BYTES,
};

fn malformed(msg: impl Into<String>) -> CryptoError {
    CryptoError::MalformedContainer(msg.into())
}

fn binding_of<'a>(fps: impl Iterator<Item = &'a Fingerprint>) -> Vec<u8> {
    let mut binding = Vec::new();
    for fp in fps {
        binding.extend_from_slice(fp.as_bytes());
    }
    binding
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Seal `plaintext` for `recipients`, signed by `signer`.
pub fn encode(signer: &KeyPair, recipients: &[AsymmetricKey], plaintext: &[u8]) -> Result<Vec<u8>> {
    if recipients.is_empty() {
        return Err(CryptoError::NoRecipients);
    }

    let cipher = Cipher::new_random_key()?;
    let binding = binding_of(recipients.iter().map(AsymmetricKey::fingerprint));
    let signature = signer.sign(plaintext, &binding)?;

    let mut payload = Zeroizing::new(Vec::with_capacity(SIGNATURE_BYTES + plaintext.len()));
    payload.extend_from_slice(&signature);
    payload.extend_from_slice(plaintext);

    let key = cipher.key_bytes();
    let wrapped = recipients
        .iter()
        .map(|r| r.encrypt(&key[..]))
        .collect::<Result<Vec<_>>>()?;
    let sealed = cipher.encrypt(&payload)?;

    let mut out = Vec::with_capacity(
        1 + FINGERPRINT_BYTES
            + wrapped.len() * (1 + FINGERPRINT_BYTES + 4 + SIGNATURE_BYTES)
            + 1
            + NONCE_BYTES
            + 4
            + sealed.ciphertext().len(),
    );
    out.push(DataType::SenderHash.as_byte());
    out.extend_from_slice(signer.fingerprint().as_bytes());
    for w in &wrapped {
        w.write_to(&mut out);
    }
    sealed.write_to(&mut out);

    tracing::debug!(
        sender = %signer.fingerprint().short(),
        recipients = recipients.len(),
        bytes = out.len(),
        "encoded container"
    );
    Ok(out)
}

// ---------------------------------------------------------------------------
// Parsed container
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Container {
    sender: Fingerprint,
    recipients: Vec<RsaEncryptedData>,
    payload: AesEncryptedData,
}

/// Result of a decrypt attempt. Not finding a key is an outcome, not an error.
#[derive(Debug)]
pub enum DecryptOutcome {
    NoMatchingKey,
    Decrypted(Decrypted),
}

pub struct Decrypted {
    signature: Signature,
    plaintext: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verification {
    Verified,
    UnknownSender,
    SignatureMismatch,
}

impl Verification {
    pub fn is_verified(self) -> bool {
        self == Self::Verified
    }
}

impl Container {
    /// Strict parse. Any structural problem is `MalformedContainer`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let mut sender = None;
        let mut recipients = Vec::new();
        let mut payload = None;

        let wire = |e: crate::error::WireError| malformed(e.to_string());

        while !r.is_empty() {
            let offset = r.position();
            match r.read_tag().map_err(wire)? {
                DataType::SenderHash => {
                    if sender.is_some() {
                        return Err(malformed("duplicate sender hash"));
                    }
                    sender = Some(Fingerprint::from_bytes(r.read_array().map_err(wire)?));
                }
                DataType::RsaEncryptedData => {
                    let fp = Fingerprint::from_bytes(r.read_array().map_err(wire)?);
                    let ct = r.read_len_prefixed().map_err(wire)?;
                    let rec = RsaEncryptedData::new(ct.to_vec(), fp)
                        .map_err(|_| malformed(format!("RSA record at offset {} is {} bytes", offset, ct.len())))?;
                    recipients.push(rec);
                }
                DataType::AesEncryptedData => {
                    if payload.is_some() {
                        return Err(malformed("duplicate AES record"));
                    }
                    let nonce = r.read_array::<NONCE_BYTES>().map_err(wire)?;
                    let ct = r.read_len_prefixed().map_err(wire)?;
                    let rec = AesEncryptedData::new(nonce, ct.to_vec())
                        .map_err(|_| malformed("AES record shorter than the GCM tag"))?;
                    payload = Some(rec);
                }
                other => {
                    return Err(malformed(format!("unexpected {} record at offset {}", other, offset)));
                }
            }
        }

        let sender = sender.ok_or_else(|| malformed("missing sender hash"))?;
        let payload = payload.ok_or_else(|| malformed("missing AES record"))?;
        if recipients.is_empty() {
            return Err(malformed("no recipients"));
        }

        tracing::debug!(sender = %sender.short(), recipients = recipients.len(), "parsed container");
        Ok(Self { sender, recipients, payload })
    }

    pub fn sender(&self) -> &Fingerprint {
        &self.sender
    }

    pub fn recipients(&self) -> &[RsaEncryptedData] {
        &self.recipients
    }

    pub fn payload(&self) -> &AesEncryptedData {
        &self.payload
    }

    /// Recipient fingerprints in file order, as signed.
    pub fn recipient_binding(&self) -> Vec<u8> {
        binding_of(self.recipients.iter().map(RsaEncryptedData::fingerprint))
    }

    /// Unwrap with the first recipient record the store holds a key pair for.
    pub fn decrypt(&self, store: &KeyStore) -> Result<DecryptOutcome> {
        let found = self
            .recipients
            .iter()
            .find_map(|rec| store.lookup_for_decrypt(rec.fingerprint()).map(|kp| (rec, kp)));
        let Some((record, kp)) = found else {
            tracing::debug!(records = self.recipients.len(), "no matching key for container");
            return Ok(DecryptOutcome::NoMatchingKey);
        };

        let key = kp.decrypt(record).map_err(|e| {
            tracing::warn!(key = %kp.fingerprint().short(), "unwrapping container key failed");
            e
        })?;
        let cipher = Cipher::from_key(&key).map_err(|_| {
            tracing::warn!(len = key.len(), "unwrapped key has the wrong length");
            CryptoError::DecryptionFailed
        })?;
        let blob = Zeroizing::new(cipher.decrypt(&self.payload).map_err(|e| {
            tracing::warn!("container payload failed authentication");
            e
        })?);

        if blob.len() < SIGNATURE_BYTES {
            return Err(malformed("payload shorter than the signature"));
        }
        let (sig, plaintext) = blob.split_at(SIGNATURE_BYTES);
        let signature: Signature = sig
            .try_into()
            .map_err(|_| malformed("payload shorter than the signature"))?;

        tracing::debug!(key = %kp.fingerprint().short(), bytes = plaintext.len(), "decrypted container");
        Ok(DecryptOutcome::Decrypted(Decrypted {
            signature,
            plaintext: plaintext.to_vec(),
        }))
    }

    pub fn summary(&self, store: &KeyStore) -> ContainerSummary {
        let describe = |fp: &Fingerprint| {
            store
                .lookup_for_verify(fp)
                .map(|k| k.label())
                .unwrap_or_else(|| fp.short())
        };
        ContainerSummary {
            recipients: self.recipients.iter().map(|r| describe(r.fingerprint())).collect(),
            sender: describe(&self.sender),
            decryptable: self
                .recipients
                .iter()
                .any(|r| store.lookup_for_decrypt(r.fingerprint()).is_some()),
        }
    }
}

impl Decrypted {
    pub fn plaintext(&self) -> &[u8] {
        &self.plaintext
    }

    pub fn into_plaintext(self) -> Vec<u8> {
        self.plaintext
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Check the signature against the sender recorded in `container`.
    pub fn verify(&self, container: &Container, store: &KeyStore) -> Result<Verification> {
        let Some(sender) = store.lookup_for_verify(container.sender()) else {
            tracing::debug!(sender = %container.sender().short(), "sender unknown");
            return Ok(Verification::UnknownSender);
        };
        let binding = container.recipient_binding();
        if sender.verify(&self.signature, &self.plaintext, &binding)? {
            Ok(Verification::Verified)
        } else {
            tracing::warn!(sender = %container.sender().short(), "container signature mismatch");
            Ok(Verification::SignatureMismatch)
        }
    }
}

impl fmt::Debug for Decrypted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decrypted")
            .field("plaintext_len", &self.plaintext.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Human-readable view: names when known, short fingerprints otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerSummary {
    pub recipients: Vec<String>,
    pub sender: String,
    pub decryptable: bool,
}

impl fmt::Display for ContainerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Encrypted for:")?;
        for r in &self.recipients {
            writeln!(f, "  {}", r)?;
        }
        writeln!(f, "Signed by:")?;
        write!(f, "  {}", self.sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::wire::{encode_u32, push_len_prefixed};
    use std::sync::Arc;

    fn store_with(pairs: &[Arc<KeyPair>]) -> KeyStore {
        let store = KeyStore::new();
        for kp in pairs {
            store.add_key_pair(Arc::clone(kp));
        }
        store
    }

    fn decrypted(outcome: DecryptOutcome) -> Decrypted {
        match outcome {
            DecryptOutcome::Decrypted(d) => d,
            DecryptOutcome::NoMatchingKey => panic!("expected a matching key"),
        }
    }

    /// Hand-built container wrapping `aes_key` for `kp`, signed as `kp`.
    fn raw_container(kp: &KeyPair, aes_key: &[u8], payload: &[u8]) -> Vec<u8> {
        let mut out = vec![DataType::SenderHash.as_byte()];
        out.extend_from_slice(kp.fingerprint().as_bytes());
        kp.encrypt(aes_key).unwrap().write_to(&mut out);
        // Payload key is always the first 16 bytes, whatever was wrapped.
        let cipher = Cipher::from_key(&aes_key[..16]).unwrap();
        cipher.encrypt(payload).unwrap().write_to(&mut out);
        out
    }

    #[test]
    fn test_encode_decrypt_verify() {
        let alice = fixtures::test_pair();
        let bob = fixtures::second_pair();
        let bytes = encode(&alice, &[AsymmetricKey::from(bob.public_key())], b"hello bob").unwrap();

        let store = store_with(&[Arc::clone(&bob)]);
        store.add_public_key(Arc::new(alice.public_key()));

        let container = Container::parse(&bytes).unwrap();
        assert_eq!(container.sender(), alice.fingerprint());
        assert_eq!(container.recipients().len(), 1);

        let d = decrypted(container.decrypt(&store).unwrap());
        assert_eq!(d.plaintext(), b"hello bob");
        assert_eq!(d.verify(&container, &store).unwrap(), Verification::Verified);
    }

    #[test]
    fn test_layout() {
        let alice = fixtures::test_pair();
        let bytes = encode(&alice, &[AsymmetricKey::from(Arc::clone(&alice))], b"").unwrap();
        assert_eq!(bytes[0], 9);
        assert_eq!(&bytes[1..65], alice.fingerprint().as_bytes());
        assert_eq!(bytes[65], 6);
        assert_eq!(&bytes[66..130], alice.fingerprint().as_bytes());
        assert_eq!(&bytes[130..134], &encode_u32(512));
        let aes = 134 + 512;
        assert_eq!(bytes[aes], 5);
        // signature + GCM tag, empty plaintext
        assert_eq!(&bytes[aes + 13..aes + 17], &encode_u32(512 + 16));
        assert_eq!(bytes.len(), aes + 17 + 528);
    }

    #[test]
    fn test_no_recipients() {
        let alice = fixtures::test_pair();
        assert!(matches!(encode(&alice, &[], b"x"), Err(CryptoError::NoRecipients)));
    }

    #[test]
    fn test_no_matching_key() {
        let alice = fixtures::test_pair();
        let bob = fixtures::second_pair();
        let bytes = encode(&alice, &[AsymmetricKey::from(bob.public_key())], b"x").unwrap();
        let store = store_with(&[Arc::clone(&alice)]);
        let container = Container::parse(&bytes).unwrap();
        assert!(matches!(container.decrypt(&store).unwrap(), DecryptOutcome::NoMatchingKey));
        assert!(!container.summary(&store).decryptable);
    }

    #[test]
    fn test_unknown_sender() {
        let alice = fixtures::test_pair();
        let bob = fixtures::second_pair();
        let bytes = encode(&alice, &[AsymmetricKey::from(bob.public_key())], b"x").unwrap();
        let store = store_with(&[Arc::clone(&bob)]);
        let container = Container::parse(&bytes).unwrap();
        let d = decrypted(container.decrypt(&store).unwrap());
        assert_eq!(d.plaintext(), b"x");
        assert_eq!(d.verify(&container, &store).unwrap(), Verification::UnknownSender);
    }

    #[test]
    fn test_reordered_recipients_fail_verification() {
        let alice = fixtures::test_pair();
        let bob = fixtures::second_pair();
        let recipients = [AsymmetricKey::from(bob.public_key()), AsymmetricKey::from(alice.public_key())];
        let bytes = encode(&alice, &recipients, b"ordered").unwrap();

        // Swap the two 581-byte RSA records.
        let rec = 1 + 64 + 4 + 512;
        let first = 65..65 + rec;
        let second = 65 + rec..65 + 2 * rec;
        let mut swapped = bytes[..65].to_vec();
        swapped.extend_from_slice(&bytes[second.clone()]);
        swapped.extend_from_slice(&bytes[first]);
        swapped.extend_from_slice(&bytes[second.end..]);

        let store = store_with(&[Arc::clone(&alice), Arc::clone(&bob)]);
        let container = Container::parse(&swapped).unwrap();
        let d = decrypted(container.decrypt(&store).unwrap());
        assert_eq!(d.plaintext(), b"ordered");
        assert_eq!(d.verify(&container, &store).unwrap(), Verification::SignatureMismatch);
    }

    #[test]
    fn test_tampered_payload() {
        let alice = fixtures::test_pair();
        let mut bytes = encode(&alice, &[AsymmetricKey::from(Arc::clone(&alice))], b"payload").unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let store = store_with(&[Arc::clone(&alice)]);
        let container = Container::parse(&bytes).unwrap();
        assert!(matches!(container.decrypt(&store), Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn test_tampered_rsa_record() {
        let alice = fixtures::test_pair();
        let bytes = encode(&alice, &[AsymmetricKey::from(Arc::clone(&alice))], b"payload").unwrap();
        let store = store_with(&[Arc::clone(&alice)]);

        let mut fp_flip = bytes.clone();
        fp_flip[70] ^= 0x01;
        let container = Container::parse(&fp_flip).unwrap();
        assert!(matches!(container.decrypt(&store).unwrap(), DecryptOutcome::NoMatchingKey));

        let mut ct_flip = bytes;
        ct_flip[300] ^= 0x01;
        let container = Container::parse(&ct_flip).unwrap();
        assert!(matches!(container.decrypt(&store), Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_wrong_unwrapped_key_length() {
        let alice = fixtures::test_pair();
        let bytes = raw_container(&alice, &[7u8; 32], &[0u8; 600]);
        let store = store_with(&[Arc::clone(&alice)]);
        let container = Container::parse(&bytes).unwrap();
        assert!(matches!(container.decrypt(&store), Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_payload_shorter_than_signature() {
        let alice = fixtures::test_pair();
        let bytes = raw_container(&alice, &[7u8; 16], &[0u8; 100]);
        let store = store_with(&[Arc::clone(&alice)]);
        let container = Container::parse(&bytes).unwrap();
        assert!(matches!(container.decrypt(&store), Err(CryptoError::MalformedContainer(_))));
    }

    #[test]
    fn test_parse_rejects_structure_errors() {
        let fp = [1u8; 64];
        let sender = |out: &mut Vec<u8>| {
            out.push(DataType::SenderHash.as_byte());
            out.extend_from_slice(&fp);
        };
        let rsa = |out: &mut Vec<u8>, len: usize| {
            out.push(DataType::RsaEncryptedData.as_byte());
            out.extend_from_slice(&fp);
            out.extend_from_slice(&encode_u32(len as u32));
            out.extend(std::iter::repeat(0u8).take(len));
        };
        let aes = |out: &mut Vec<u8>| {
            out.push(DataType::AesEncryptedData.as_byte());
            out.extend_from_slice(&[0u8; 12]);
            out.extend_from_slice(&encode_u32(16));
            out.extend_from_slice(&[0u8; 16]);
        };

        let mut ok = Vec::new();
        sender(&mut ok);
        rsa(&mut ok, 512);
        aes(&mut ok);
        assert!(Container::parse(&ok).is_ok());

        let mut cases: Vec<(&str, Vec<u8>)> = Vec::new();

        let mut v = Vec::new();
        rsa(&mut v, 512);
        aes(&mut v);
        cases.push(("missing sender", v));

        let mut v = Vec::new();
        sender(&mut v);
        sender(&mut v);
        rsa(&mut v, 512);
        aes(&mut v);
        cases.push(("duplicate sender", v));

        let mut v = Vec::new();
        sender(&mut v);
        rsa(&mut v, 512);
        cases.push(("missing aes", v));

        let mut v = ok.clone();
        aes(&mut v);
        cases.push(("duplicate aes", v));

        let mut v = Vec::new();
        sender(&mut v);
        aes(&mut v);
        cases.push(("no recipients", v));

        let mut v = Vec::new();
        sender(&mut v);
        rsa(&mut v, 256);
        aes(&mut v);
        cases.push(("short rsa", v));

        let mut v = ok.clone();
        v.push(0xEE);
        cases.push(("unknown tag", v));

        let mut v = ok.clone();
        push_len_prefixed(&mut v, DataType::PublicKey, &[1, 2, 3]);
        cases.push(("misplaced tag", v));

        cases.push(("truncated", ok[..ok.len() - 1].to_vec()));
        cases.push(("empty", Vec::new()));

        for (what, bytes) in cases {
            assert!(
                matches!(Container::parse(&bytes), Err(CryptoError::MalformedContainer(_))),
                "{}",
                what
            );
        }
    }

    #[test]
    fn test_summary() {
        let alice = fixtures::test_pair();
        let bob = fixtures::second_pair();
        let recipients = [AsymmetricKey::from(bob.public_key()), AsymmetricKey::from(Arc::clone(&alice))];
        let bytes = encode(&alice, &recipients, b"x").unwrap();
        let container = Container::parse(&bytes).unwrap();

        let store = store_with(&[Arc::clone(&alice)]);
        let summary = container.summary(&store);
        assert_eq!(summary.recipients, vec![bob.fingerprint().short(), "Test - Test".to_string()]);
        assert_eq!(summary.sender, "Test - Test");
        assert!(summary.decryptable);

        let text = summary.to_string();
        assert!(text.starts_with("Encrypted for:\n"));
        assert!(text.contains("Signed by:\n  Test - Test"));
    }
}
