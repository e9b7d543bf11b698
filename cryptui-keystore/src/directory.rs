//! On-disk key directory: one `<hex(fp[..8])>.key` file per key.
//!
//! Files hold the binary key format from `cryptui_envelope`. Key pairs are
//! written with mode 0600 on Unix. Loading never fails on a single bad
//! file; it is logged and listed in the `LoadReport` instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cryptui_envelope::{import_key, AsymmetricKey, Fingerprint, KeyPair, KeyStore};

use tokio::io::AsyncWriteExt;

use crate::error::{IoContext, KeystoreError, Result};

pub const KEY_EXTENSION: &str = "key";

/// Outcome of scanning a key directory.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<(PathBuf, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyDirectory {
    dir: PathBuf,
}

impl KeyDirectory {
    /// Open `dir`, creating it if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.at(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn key_path(&self, fp: &Fingerprint) -> PathBuf {
        self.dir
            .join(format!("{}.{}", hex::encode(&fp.as_bytes()[..8]), KEY_EXTENSION))
    }

    /// Register every readable `*.key` file with `store`.
    pub async fn load_into(&self, store: &KeyStore) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        let mut entries = tokio::fs::read_dir(&self.dir).await.at(&self.dir)?;
        while let Some(entry) = entries.next_entry().await.at(&self.dir)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(KEY_EXTENSION) {
                continue;
            }
            let bytes = match tokio::fs::read(&path).await {
                Ok(b) => zeroize::Zeroizing::new(b),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable key file");
                    report.skipped.push((path, e.to_string()));
                    continue;
                }
            };
            match import_key(&bytes) {
                Ok(key) => {
                    tracing::debug!(path = %path.display(), name = %key.name(), "loaded key");
                    store.add(key);
                    report.loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping malformed key file");
                    report.skipped.push((path, e.to_string()));
                }
            }
        }
        tracing::info!(
            dir = %self.dir.display(),
            loaded = report.loaded,
            skipped = report.skipped.len(),
            "key directory loaded"
        );
        Ok(report)
    }

    /// Write `key` to its file, replacing any previous copy. A public-only
    /// key never replaces a file that holds the matching key pair.
    pub async fn store(&self, key: &AsymmetricKey) -> Result<PathBuf> {
        let path = self.key_path(key.fingerprint());
        if !key.is_key_pair() && self.holds_key_pair(&path, key.fingerprint()).await {
            tracing::debug!(path = %path.display(), "key pair already on disk, public key not written");
            return Ok(path);
        }
        let bytes = key.serialize()?;

        // Atomic write: write to temp, then rename
        let tmp = path.with_extension("tmp");
        match tokio::fs::remove_file(&tmp).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(KeystoreError::Io { path: tmp, source: e }),
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        // Private key files are created with mode 0600 (Unix only)
        #[cfg(unix)]
        {
            if key.is_key_pair() {
                options.mode(0o600);
            }
        }
        let mut file = options.open(&tmp).await.at(&tmp)?;
        file.write_all(&bytes[..]).await.at(&tmp)?;
        file.sync_all().await.at(&tmp)?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await.at(&path)?;
        tracing::debug!(path = %path.display(), name = %key.name(), "stored key");
        Ok(path)
    }

    async fn holds_key_pair(&self, path: &Path, fp: &Fingerprint) -> bool {
        let Ok(bytes) = tokio::fs::read(path).await else {
            return false;
        };
        let bytes = zeroize::Zeroizing::new(bytes);
        matches!(import_key(&bytes), Ok(existing) if existing.is_key_pair() && existing.fingerprint() == fp)
    }

    /// Generate a key pair off the async runtime, save it and register it.
    pub async fn generate(&self, store: &KeyStore, name: &str, comment: &str) -> Result<Arc<KeyPair>> {
        let (name, comment) = (name.to_string(), comment.to_string());
        let kp = tokio::task::spawn_blocking(move || KeyPair::generate(&name, &comment)).await??;
        let kp = Arc::new(kp);
        self.store(&AsymmetricKey::from(Arc::clone(&kp))).await?;
        store.add_key_pair(Arc::clone(&kp));
        tracing::info!(name = %kp.name(), fingerprint = %kp.fingerprint().short(), "generated key pair");
        Ok(kp)
    }

    /// Parse a key file's bytes, save a copy and register it.
    pub async fn import(&self, store: &KeyStore, bytes: &[u8]) -> Result<AsymmetricKey> {
        let key = import_key(bytes)?;
        if !key.is_key_pair() {
            if let Some(kp) = store.lookup_for_decrypt(key.fingerprint()) {
                tracing::info!(name = %kp.name(), "public key matches a known key pair, keeping the pair");
                return Ok(AsymmetricKey::KeyPair(kp));
            }
        }
        self.store(&key).await?;
        store.add(key.clone());
        tracing::info!(name = %key.name(), private = key.is_key_pair(), "imported key");
        Ok(key)
    }

    /// Public-only key file bytes for the key `query` resolves to.
    pub fn export_public(&self, store: &KeyStore, query: &str) -> Result<Vec<u8>> {
        let key = resolve(store, query)?;
        Ok(match &key {
            AsymmetricKey::KeyPair(kp) => kp.public_key().serialize(),
            AsymmetricKey::PublicOnly(pk) => pk.serialize(),
        })
    }
}

/// Exactly one key by name or base64 fingerprint prefix.
pub fn resolve(store: &KeyStore, query: &str) -> Result<AsymmetricKey> {
    if query.is_empty() {
        return Err(KeystoreError::KeyNotFound(String::new()));
    }
    let mut found = store.find(query);
    match found.len() {
        0 => Err(KeystoreError::KeyNotFound(query.to_string())),
        1 => Ok(found.remove(0)),
        n => Err(KeystoreError::AmbiguousKey { query: query.to_string(), matches: n }),
    }
}

/// Like `resolve`, but the key must hold a private half.
pub fn resolve_key_pair(store: &KeyStore, query: &str) -> Result<Arc<KeyPair>> {
    match resolve(store, query)? {
        AsymmetricKey::KeyPair(kp) => Ok(kp),
        AsymmetricKey::PublicOnly(_) => Err(KeystoreError::NotAKeyPair(query.to_string())),
    }
}
