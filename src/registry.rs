//! In-memory key registry.
//!
//! Two maps keyed by the raw fingerprint bytes: keys that can decrypt (pairs
//! only) and keys that can encrypt or verify (any key). The base64 form is
//! used only for text lookup in [`KeyStore::find`]. A key pair always lands in
//! both under one write guard, so readers never see it in only one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::hash::Fingerprint;
use crate::keys::{AsymmetricKey, KeyPair, PublicKey};

#[derive(Default)]
struct Maps {
    key_pairs: HashMap<Fingerprint, Arc<KeyPair>>,
    public_keys: HashMap<Fingerprint, AsymmetricKey>,
}

/// Explicit registry context. Share it by reference or inside an `Arc`.
#[derive(Default)]
pub struct KeyStore {
    maps: RwLock<Maps>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock only means a writer panicked between two inserts into
    // plain HashMaps; the maps themselves are still valid.
    fn read(&self) -> RwLockReadGuard<'_, Maps> {
        self.maps.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Maps> {
        self.maps.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_key_pair(&self, kp: Arc<KeyPair>) {
        let fp = *kp.fingerprint();
        tracing::debug!(name = %kp.name(), fingerprint = %fp.short(), "registered key pair");
        let mut maps = self.write();
        maps.public_keys.insert(fp, AsymmetricKey::KeyPair(Arc::clone(&kp)));
        maps.key_pairs.insert(fp, kp);
    }

    /// Encrypt/verify map only. Does not downgrade a known key pair.
    pub fn add_public_key(&self, pk: Arc<PublicKey>) {
        let fp = *pk.fingerprint();
        let mut maps = self.write();
        if maps.key_pairs.contains_key(&fp) {
            return;
        }
        tracing::debug!(name = %pk.name(), fingerprint = %fp.short(), "registered public key");
        maps.public_keys.insert(fp, AsymmetricKey::PublicOnly(pk));
    }

    pub fn add(&self, key: AsymmetricKey) {
        match key {
            AsymmetricKey::KeyPair(kp) => self.add_key_pair(kp),
            AsymmetricKey::PublicOnly(pk) => self.add_public_key(pk),
        }
    }

    pub fn lookup_for_decrypt(&self, fp: &Fingerprint) -> Option<Arc<KeyPair>> {
        self.read().key_pairs.get(fp).cloned()
    }

    pub fn lookup_for_verify(&self, fp: &Fingerprint) -> Option<AsymmetricKey> {
        self.read().public_keys.get(fp).cloned()
    }

    /// Keys whose base64 fingerprint starts with `prefix`, or whose name is
    /// exactly `prefix`.
    pub fn find(&self, prefix: &str) -> Vec<AsymmetricKey> {
        let mut found: Vec<AsymmetricKey> = self
            .read()
            .public_keys
            .values()
            .filter(|k| k.name() == prefix || k.fingerprint().to_base64().starts_with(prefix))
            .cloned()
            .collect();
        sort_by_name(&mut found);
        found
    }

    pub fn key_pairs(&self) -> Vec<Arc<KeyPair>> {
        let mut out: Vec<Arc<KeyPair>> = self.read().key_pairs.values().cloned().collect();
        out.sort_by(|a, b| {
            a.name()
                .cmp(b.name())
                .then_with(|| a.fingerprint().as_bytes().cmp(b.fingerprint().as_bytes()))
        });
        out
    }

    /// Every key, pairs included.
    pub fn public_keys(&self) -> Vec<AsymmetricKey> {
        let mut out: Vec<AsymmetricKey> = self.read().public_keys.values().cloned().collect();
        sort_by_name(&mut out);
        out
    }

    pub fn len(&self) -> usize {
        self.read().public_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sort_by_name(keys: &mut [AsymmetricKey]) {
    keys.sort_by(|a, b| {
        a.name()
            .cmp(b.name())
            .then_with(|| a.fingerprint().as_bytes().cmp(b.fingerprint().as_bytes()))
    });
}

impl core::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let maps = self.read();
        f.debug_struct("KeyStore")
            .field("key_pairs", &maps.key_pairs.len())
            .field("public_keys", &maps.public_keys.len())
            .finish()
    }
}
