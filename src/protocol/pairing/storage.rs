//! Persistent storage for MRP pairing credentials.

use std::collections::HashMap;

use crate::types::Credentials;

/// Abstract storage interface for pairing credentials, keyed by device
/// identifier.
pub trait PairingStorage: Send + Sync {
    /// Load credentials for a device.
    fn load(&self, device_id: &str) -> Option<Credentials>;

    /// Save credentials for a device.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    fn save(&mut self, device_id: &str, credentials: &Credentials) -> Result<(), StorageError>;

    /// Remove credentials for a device.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    fn remove(&mut self, device_id: &str) -> Result<(), StorageError>;

    /// List all stored device IDs.
    fn list_devices(&self) -> Vec<String>;
}

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record did not parse as a `Credentials` string.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// No backing store is configured (transient pairing only).
    #[error("storage not available")]
    NotAvailable,
}

/// In-memory pairing storage (non-persistent).
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, Credentials>,
}

impl MemoryStorage {
    /// Create a new in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PairingStorage for MemoryStorage {
    fn load(&self, device_id: &str) -> Option<Credentials> {
        self.entries.get(device_id).cloned()
    }

    fn save(&mut self, device_id: &str, credentials: &Credentials) -> Result<(), StorageError> {
        self.entries.insert(device_id.to_string(), credentials.clone());
        Ok(())
    }

    fn remove(&mut self, device_id: &str) -> Result<(), StorageError> {
        self.entries.remove(device_id);
        Ok(())
    }

    fn list_devices(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// File-based pairing storage.
///
/// Persists as a line-oriented text file: one `device_id<TAB>credentials`
/// pair per line, where `credentials` is the canonical colon-hex
/// `Credentials` string. Kept deliberately simple rather than JSON, since
/// the wire-level `Credentials` representation is already a flat string.
pub struct FileStorage {
    path: std::path::PathBuf,
    cache: HashMap<String, Credentials>,
}

impl FileStorage {
    /// Create file storage at the given path, loading any existing entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// existing file cannot be read/parsed.
    pub fn new(path: impl AsRef<std::path::Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let cache = Self::load_all(&path)?;

        Ok(Self { path, cache })
    }

    fn load_all(path: &std::path::Path) -> Result<HashMap<String, Credentials>, StorageError> {
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let content = std::fs::read_to_string(path)?;
        let mut entries = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (device_id, creds) = line
                .split_once('\t')
                .ok_or_else(|| StorageError::Serialization("malformed storage line".to_string()))?;
            let credentials = Credentials::parse(creds)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            entries.insert(device_id.to_string(), credentials);
        }
        Ok(entries)
    }

    fn save_all(&self) -> Result<(), StorageError> {
        let mut content = String::new();
        for (device_id, credentials) in &self.cache {
            content.push_str(device_id);
            content.push('\t');
            content.push_str(&credentials.to_string());
            content.push('\n');
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl PairingStorage for FileStorage {
    fn load(&self, device_id: &str) -> Option<Credentials> {
        self.cache.get(device_id).cloned()
    }

    fn save(&mut self, device_id: &str, credentials: &Credentials) -> Result<(), StorageError> {
        self.cache.insert(device_id.to_string(), credentials.clone());
        self.save_all()
    }

    fn remove(&mut self, device_id: &str) -> Result<(), StorageError> {
        self.cache.remove(device_id);
        self.save_all()
    }

    fn list_devices(&self) -> Vec<String> {
        self.cache.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_credentials() -> Credentials {
        Credentials {
            ltpk: [9u8; 32],
            ltsk: [8u8; 32],
            atv_id: vec![1, 2, 3],
            client_id: vec![4, 5, 6],
        }
    }

    #[test]
    fn memory_storage_round_trips() {
        let mut storage = MemoryStorage::new();
        let creds = sample_credentials();
        storage.save("device-1", &creds).unwrap();
        assert_eq!(storage.load("device-1"), Some(creds));
        assert_eq!(storage.list_devices(), vec!["device-1".to_string()]);
        storage.remove("device-1").unwrap();
        assert_eq!(storage.load("device-1"), None);
    }

    #[test]
    fn file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairings.tsv");
        let creds = sample_credentials();

        {
            let mut storage = FileStorage::new(&path).unwrap();
            storage.save("device-1", &creds).unwrap();
        }

        let reloaded = FileStorage::new(&path).unwrap();
        assert_eq!(reloaded.load("device-1"), Some(creds));
    }
}
