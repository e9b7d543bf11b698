//! # CryptUI Keystore
//!
//! Persistent key directory and configuration for `cryptui-envelope`.
//!
//! Keys live as individual `*.key` files in one directory. At startup the
//! directory is loaded into an in-memory [`KeyStore`]; generation and import
//! write the file first, then register the key.
//!
//! ## Quick Start
//!
//! ```ignore
//! use cryptui_keystore::*;
//! use cryptui_envelope::KeyStore;
//!
//! # tokio_test::block_on(async {
//! let cfg = Config::load()?;
//! let dir = KeyDirectory::open(&cfg.key_dir).await?;
//! let store = KeyStore::new();
//! let report = dir.load_into(&store).await?;
//!
//! let alice = dir.generate(&store, "alice", "work laptop").await?;
//! let exported = dir.export_public(&store, "alice")?;
//! # });
//! ```

pub mod config;
pub mod directory;
pub mod error;

pub use config::{Config, LogFormat};
pub use cryptui_envelope::KeyStore;
pub use directory::{resolve, resolve_key_pair, KeyDirectory, LoadReport, KEY_EXTENSION};
pub use error::{KeystoreError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use cryptui_envelope::{AsymmetricKey, KeyPair};
    use std::sync::{Arc, OnceLock};

    fn shared_pair() -> Arc<KeyPair> {
        static KEY: OnceLock<Arc<KeyPair>> = OnceLock::new();
        Arc::clone(KEY.get_or_init(|| Arc::new(KeyPair::generate("shared", "fixture").unwrap())))
    }

    async fn test_dir() -> (tempfile::TempDir, KeyDirectory) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = KeyDirectory::open(tmp.path().join("key")).await.unwrap();
        (tmp, dir)
    }

    // === Generation ===

    #[tokio::test]
    async fn test_generate_stores_and_registers() {
        let (_tmp, dir) = test_dir().await;
        let store = KeyStore::new();
        let kp = dir.generate(&store, "alice", "work").await.unwrap();

        assert_eq!(kp.name(), "alice");
        assert!(store.lookup_for_decrypt(kp.fingerprint()).is_some());
        assert!(dir.key_path(kp.fingerprint()).exists());

        let reloaded = KeyStore::new();
        let report = dir.load_into(&reloaded).await.unwrap();
        assert_eq!(report.loaded, 1);
        assert!(report.skipped.is_empty());
        assert!(reloaded.lookup_for_decrypt(kp.fingerprint()).is_some());
    }

    // === Storage ===

    #[tokio::test]
    async fn test_key_file_name() {
        let (_tmp, dir) = test_dir().await;
        let kp = shared_pair();
        let path = dir.store(&AsymmetricKey::from(Arc::clone(&kp))).await.unwrap();

        let expected = format!("{}.key", hex::encode(&kp.fingerprint().as_bytes()[..8]));
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), expected);
        assert!(!path.with_extension("tmp").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_private_key_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, dir) = test_dir().await;
        let kp = shared_pair();
        // A stale temp file with open permissions must not leak its mode.
        let path = dir.key_path(kp.fingerprint());
        let stale = path.with_extension("tmp");
        std::fs::write(&stale, b"stale").unwrap();
        std::fs::set_permissions(&stale, std::fs::Permissions::from_mode(0o644)).unwrap();

        let private = dir.store(&AsymmetricKey::from(Arc::clone(&kp))).await.unwrap();
        let mode = std::fs::metadata(&private).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn test_load_skips_malformed_files() {
        let (_tmp, dir) = test_dir().await;
        let kp = shared_pair();
        dir.store(&AsymmetricKey::from(kp.public_key())).await.unwrap();

        tokio::fs::write(dir.path().join("garbage.key"), b"\x03\x02hi").await.unwrap();
        tokio::fs::write(dir.path().join("empty.key"), b"").await.unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), b"ignored").await.unwrap();

        let store = KeyStore::new();
        let report = dir.load_into(&store).await.unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped.len(), 2);
        assert!(store.lookup_for_verify(kp.fingerprint()).is_some());
        assert!(store.lookup_for_decrypt(kp.fingerprint()).is_none());
    }

    // === Import / export ===

    #[tokio::test]
    async fn test_import_and_export_public() {
        let (_tmp, dir) = test_dir().await;
        let store = KeyStore::new();
        let kp = shared_pair();

        let key_file = AsymmetricKey::from(Arc::clone(&kp)).serialize().unwrap();
        let imported = dir.import(&store, &key_file).await.unwrap();
        assert!(imported.is_key_pair());
        assert!(dir.key_path(kp.fingerprint()).exists());

        let exported = dir.export_public(&store, "shared").unwrap();
        let public = cryptui_envelope::import_key(&exported).unwrap();
        assert!(!public.is_key_pair());
        assert_eq!(public.fingerprint(), kp.fingerprint());
    }

    #[tokio::test]
    async fn test_reimported_public_key_keeps_private_file() {
        let (_tmp, dir) = test_dir().await;
        let store = KeyStore::new();
        let kp = dir.generate(&store, "alice", "").await.unwrap();

        let exported = dir.export_public(&store, "alice").unwrap();
        let imported = dir.import(&store, &exported).await.unwrap();
        assert!(imported.is_key_pair());

        let restarted = KeyStore::new();
        dir.load_into(&restarted).await.unwrap();
        assert!(restarted.lookup_for_decrypt(kp.fingerprint()).is_some());
    }

    #[tokio::test]
    async fn test_store_public_over_pair_file_is_noop() {
        let (_tmp, dir) = test_dir().await;
        let kp = shared_pair();
        let path = dir.store(&AsymmetricKey::from(Arc::clone(&kp))).await.unwrap();
        let before = tokio::fs::read(&path).await.unwrap();

        let again = dir.store(&AsymmetricKey::from(kp.public_key())).await.unwrap();
        assert_eq!(again, path);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), before);

        let store = KeyStore::new();
        dir.load_into(&store).await.unwrap();
        assert!(store.lookup_for_decrypt(kp.fingerprint()).is_some());
    }

    #[tokio::test]
    async fn test_pair_replaces_public_file() {
        let (_tmp, dir) = test_dir().await;
        let kp = shared_pair();
        dir.store(&AsymmetricKey::from(kp.public_key())).await.unwrap();
        dir.store(&AsymmetricKey::from(Arc::clone(&kp))).await.unwrap();

        let store = KeyStore::new();
        dir.load_into(&store).await.unwrap();
        assert!(store.lookup_for_decrypt(kp.fingerprint()).is_some());
    }

    #[tokio::test]
    async fn test_import_rejects_garbage() {
        let (_tmp, dir) = test_dir().await;
        let store = KeyStore::new();
        let err = dir.import(&store, b"not a key").await.unwrap_err();
        assert!(matches!(err, KeystoreError::Crypto(_)));
        assert!(store.is_empty());
    }

    // === Configuration ===

    #[tokio::test]
    async fn test_select_key_saves_default_signer() {
        let tmp = tempfile::tempdir().unwrap();
        let store = KeyStore::new();
        let kp = shared_pair();
        store.add_key_pair(Arc::clone(&kp));

        let mut cfg = Config::default();
        let selected = cfg.select_key(&store, "shared").unwrap();
        assert!(Arc::ptr_eq(&selected, &kp));

        let path = tmp.path().join("cryptui.json");
        cfg.save(&path).unwrap();
        let reloaded = Config::from_file(&path).unwrap();
        let query = reloaded.selected_key.unwrap();
        assert_eq!(query, kp.fingerprint().to_base64());
        assert!(resolve_key_pair(&store, &query).is_ok());
    }

    #[tokio::test]
    async fn test_select_key_rejects_public_only() {
        let store = KeyStore::new();
        store.add_public_key(Arc::new(shared_pair().public_key()));
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.select_key(&store, "shared"),
            Err(KeystoreError::NotAKeyPair(_))
        ));
        assert!(cfg.selected_key.is_none());
    }

    // === Resolution ===

    #[tokio::test]
    async fn test_resolve() {
        let store = KeyStore::new();
        let kp = shared_pair();
        store.add_key_pair(Arc::clone(&kp));

        let b64 = kp.fingerprint().to_base64();
        assert!(resolve(&store, &b64[..6]).is_ok());
        assert!(resolve(&store, "shared").is_ok());
        assert!(resolve_key_pair(&store, "shared").is_ok());
        assert!(matches!(resolve(&store, "nobody"), Err(KeystoreError::KeyNotFound(_))));
        assert!(matches!(resolve(&store, ""), Err(KeystoreError::KeyNotFound(_))));

        let public_only = KeyStore::new();
        public_only.add_public_key(Arc::new(kp.public_key()));
        assert!(matches!(
            resolve_key_pair(&public_only, "shared"),
            Err(KeystoreError::NotAKeyPair(_))
        ));
    }
}
