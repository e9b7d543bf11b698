//! User configuration: a JSON file plus environment overrides.
//!
//! Resolution order, later wins:
//!   1. built-in defaults
//!   2. the JSON file named by `CRYPTUI_CONFIG`, if set
//!   3. `CRYPTUI_KEY_DIR`, `CRYPTUI_LOG_FORMAT`

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use cryptui_envelope::{KeyPair, KeyStore};
use serde::{Deserialize, Serialize};

use crate::directory::resolve_key_pair;
use crate::error::{IoContext, KeystoreError, Result};

pub const CONFIG_ENV: &str = "CRYPTUI_CONFIG";
pub const KEY_DIR_ENV: &str = "CRYPTUI_KEY_DIR";
pub const LOG_FORMAT_ENV: &str = "CRYPTUI_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = KeystoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(KeystoreError::Config(format!("unknown log format '{}'", other))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `*.key` files.
    pub key_dir: PathBuf,
    pub log_format: LogFormat,
    /// Signer used by `seal` when `--signer` is not given: a name or
    /// fingerprint prefix.
    pub selected_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_dir: PathBuf::from("key"),
            log_format: LogFormat::Pretty,
            selected_key: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_with(|name| std::env::var(name).ok())
    }

    /// Same as `load`, reading variables through `env`.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = match env(CONFIG_ENV).filter(|p| !p.trim().is_empty()) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        if let Some(dir) = env(KEY_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            cfg.key_dir = PathBuf::from(dir);
        }
        if let Some(format) = env(LOG_FORMAT_ENV) {
            cfg.log_format = format.parse()?;
        }
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).at(path)?;
        serde_json::from_str(&data)
            .map_err(|e| KeystoreError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Path of the config file named by `CRYPTUI_CONFIG`, if any.
    pub fn file_path() -> Option<PathBuf> {
        std::env::var(CONFIG_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    }

    /// Resolve `query` to a key pair and record its full fingerprint as the
    /// default signer.
    pub fn select_key(&mut self, store: &KeyStore, query: &str) -> Result<Arc<KeyPair>> {
        let kp = resolve_key_pair(store, query)?;
        self.selected_key = Some(kp.fingerprint().to_base64());
        Ok(kp)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| KeystoreError::Config(format!("serialize: {}", e)))?;
        // Atomic write: write to temp, then rename
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json).at(&tmp)?;
        std::fs::rename(&tmp, path).at(path)?;
        Ok(())
    }
}
