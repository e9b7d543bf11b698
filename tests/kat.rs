//! Known answers and format-level tests that need no RSA key generation.

use cryptui_envelope::wire::{
    self, DataType, Reader, AEAD_TAG_BYTES, FINGERPRINT_BYTES, MAX_LABEL_BYTES, NONCE_BYTES,
    OAEP_MAX_PLAINTEXT_BYTES, RSA_MODULUS_BYTES, SALT_BYTES, SIGNATURE_BYTES,
};
use cryptui_envelope::{
    fingerprint, import_key, AesEncryptedData, Cipher, Container, CryptoError, WireError,
};
use proptest::prelude::*;

const AES_KEY: &str = "7860e0e22d3075569aca23f3b4ee4225";
const AES_NONCE: &str = "76fa22fa6de90727e704e163";
const AES_TEST_CT: &str = "94923162d22559202f2c9291e63d621924009429052a08";

#[test]
fn test_wire_constants() {
    assert_eq!(FINGERPRINT_BYTES, 64);
    assert_eq!(SALT_BYTES, 128);
    assert_eq!(RSA_MODULUS_BYTES, 512);
    assert_eq!(SIGNATURE_BYTES, 512);
    assert_eq!(OAEP_MAX_PLAINTEXT_BYTES, 382);
    assert_eq!(NONCE_BYTES, 12);
    assert_eq!(AEAD_TAG_BYTES, 16);
    assert_eq!(MAX_LABEL_BYTES, 127);
}

#[test]
fn test_tag_values() {
    let expected = [
        (DataType::PrivateKey, 1),
        (DataType::PublicKey, 2),
        (DataType::ObjectName, 3),
        (DataType::DescriptionShort, 4),
        (DataType::AesEncryptedData, 5),
        (DataType::RsaEncryptedData, 6),
        (DataType::AesKey, 7),
        (DataType::Gzip, 8),
        (DataType::SenderHash, 9),
    ];
    for (tag, byte) in expected {
        assert_eq!(tag.as_byte(), byte);
    }
}

#[test]
fn test_aes_golden_decrypt() {
    let cipher = Cipher::from_key(&hex::decode(AES_KEY).unwrap()).unwrap();
    let nonce: [u8; NONCE_BYTES] = hex::decode(AES_NONCE).unwrap().try_into().unwrap();
    let data = AesEncryptedData::new(nonce, hex::decode(AES_TEST_CT).unwrap()).unwrap();
    assert_eq!(cipher.decrypt(&data).unwrap(), b"AESTest");
}

#[test]
fn test_aes_golden_record_bytes() {
    let nonce: [u8; NONCE_BYTES] = hex::decode(AES_NONCE).unwrap().try_into().unwrap();
    let data = AesEncryptedData::new(nonce, hex::decode(AES_TEST_CT).unwrap()).unwrap();
    let mut out = Vec::new();
    data.write_to(&mut out);
    assert_eq!(
        hex::encode(&out),
        format!("05{}00000017{}", AES_NONCE, AES_TEST_CT)
    );
}

#[test]
fn test_aes_golden_tamper() {
    let cipher = Cipher::from_key(&hex::decode(AES_KEY).unwrap()).unwrap();
    let nonce: [u8; NONCE_BYTES] = hex::decode(AES_NONCE).unwrap().try_into().unwrap();
    let mut ct = hex::decode(AES_TEST_CT).unwrap();
    ct[3] ^= 0x04;
    let data = AesEncryptedData::new(nonce, ct).unwrap();
    assert!(matches!(cipher.decrypt(&data), Err(CryptoError::AuthenticationFailed)));
}

#[test]
fn test_fingerprint_kat() {
    // SHA3-512("abc"), fed in two updates
    let fp = fingerprint(b"a", b"bc");
    assert_eq!(
        hex::encode(fp.as_bytes()),
        "b751850b1a57168a5693cd924b6b096e08f621827444f70d884f5d0240d2712e\
         10e116e9192af3c91a7ec57647e3934057340b4cf408d5a56592f8274eec53f0"
    );
    assert_eq!(
        fp.to_base64(),
        "t1GFCxpXFopWk82SS2sJbgj2IYJ0RPcNiE9dAkDScS4Q4RbpGSrzyRp+xXZH45NAVzQLTPQI1aVlkvgnTuxT8A=="
    );
    assert_eq!(fp.short(), "t1GFCxpX");
}

#[test]
fn test_key_file_without_key_rejected() {
    let mut bytes = Vec::new();
    wire::push_label(&mut bytes, DataType::ObjectName, "lonely");
    wire::push_label(&mut bytes, DataType::DescriptionShort, "no key here");
    assert!(matches!(import_key(&bytes), Err(CryptoError::MalformedKeyFile(_))));
}

#[test]
fn test_key_file_garbage_der_rejected() {
    let mut bytes = Vec::new();
    wire::push_label(&mut bytes, DataType::ObjectName, "junk");
    wire::push_len_prefixed(&mut bytes, DataType::PublicKey, &[0x30, 0x03, 0x02, 0x01, 0x00]);
    bytes.extend_from_slice(&[0u8; SALT_BYTES]);
    assert!(matches!(import_key(&bytes), Err(CryptoError::MalformedKeyFile(_))));
}

#[test]
fn test_reader_errors() {
    let bytes = [DataType::SenderHash.as_byte(), 1, 2];
    let mut r = Reader::new(&bytes);
    assert_eq!(r.read_tag().unwrap(), DataType::SenderHash);
    assert_eq!(r.read_array::<FINGERPRINT_BYTES>(), Err(WireError::TruncatedInput));
    assert_eq!(wire::decode_u32(&[0, 0, 1]), Err(WireError::TruncatedInput));
}

#[test]
fn test_gzip_tag_not_accepted_in_container() {
    let bytes = [DataType::Gzip.as_byte(), 0, 0, 0, 0];
    assert!(matches!(Container::parse(&bytes), Err(CryptoError::MalformedContainer(_))));
}

proptest! {
    #[test]
    fn container_parse_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..2048)) {
        if let Err(e) = Container::parse(&bytes) {
            prop_assert!(e.is_malformed());
        }
    }

    #[test]
    fn container_parse_tag_prefixed_never_panics(
        tag in 1u8..=9,
        len in any::<u32>(),
        tail in proptest::collection::vec(any::<u8>(), 0..700),
    ) {
        let mut bytes = vec![DataType::SenderHash.as_byte()];
        bytes.extend_from_slice(&[0u8; FINGERPRINT_BYTES]);
        bytes.push(tag);
        bytes.extend_from_slice(&[0u8; FINGERPRINT_BYTES]);
        bytes.extend_from_slice(&wire::encode_u32(len));
        bytes.extend_from_slice(&tail);
        let _ = Container::parse(&bytes);
    }

    #[test]
    fn key_import_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..1024)) {
        prop_assert!(import_key(&bytes).is_err());
    }
}
