//! File-based configuration blob store
//!
//! One JSON file per key under a base directory, holding a flat string map.
//! Used by the command-line flow to persist small records between runs; the
//! browser pipeline never touches it.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A named configuration blob: flat string-to-string mapping.
pub type StoredConfig = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// No blob has been saved under this key.
    #[error("no stored configuration named {0:?}")]
    NotFound(String),

    #[error("store io failed: {0}")]
    Io(#[from] io::Error),

    #[error("stored configuration is not valid json: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn load(&self, key: &str) -> Result<StoredConfig, StoreError> {
        let path = self.dir.join(key);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    /// Creates the backing directory if absent; overwrites any prior value.
    pub fn save(&self, key: &str, config: &StoredConfig) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let raw = serde_json::to_string(config)?;
        std::fs::write(self.dir.join(key), raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        assert!(matches!(
            store.load("missing"),
            Err(StoreError::NotFound(key)) if key == "missing"
        ));
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        // A nested directory that does not exist yet.
        let store = ConfigStore::new(dir.path().join("store"));

        let mut config = StoredConfig::new();
        config.insert("a".to_string(), "1".to_string());
        store.save("k", &config).unwrap();
        assert_eq!(store.load("k").unwrap(), config);
    }

    #[test]
    fn save_overwrites_prior_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());

        let mut first = StoredConfig::new();
        first.insert("a".to_string(), "1".to_string());
        store.save("k", &first).unwrap();

        let mut second = StoredConfig::new();
        second.insert("b".to_string(), "2".to_string());
        store.save("k", &second).unwrap();

        assert_eq!(store.load("k").unwrap(), second);
    }

    #[test]
    fn garbage_on_disk_is_malformed_not_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        std::fs::write(dir.path().join("k"), b"{{nope").unwrap();
        assert!(matches!(store.load("k"), Err(StoreError::Malformed(_))));
    }
}
