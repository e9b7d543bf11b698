#![no_main]

use std::sync::Arc;

use cryptui_envelope::{AsymmetricKey, KeyPair, KeyStore};
use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;

static STORE: Lazy<(KeyStore, Vec<u8>)> = Lazy::new(|| {
    let kp = Arc::new(KeyPair::generate("fuzz", "").expect("keygen"));
    let seed = cryptui_envelope::encode(&kp, &[AsymmetricKey::from(Arc::clone(&kp))], b"seed")
        .expect("encode");
    let store = KeyStore::new();
    store.add_key_pair(kp);
    (store, seed)
});

fuzz_target!(|data: &[u8]| {
    let (store, seed) = &*STORE;

    // Splice fuzz bytes over a valid container so the RSA and AES paths get
    // exercised, not just the parser.
    let mut input = seed.clone();
    if let Some((&pos, rest)) = data.split_first() {
        let start = (pos as usize * input.len()) / 256;
        for (dst, src) in input[start..].iter_mut().zip(rest) {
            *dst ^= *src;
        }
    }

    let _ = cryptui_envelope::decrypt_file(&input, store);
});
