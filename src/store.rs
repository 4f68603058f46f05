//! Persistence for completed transfers: payload files on disk plus a JSON
//! index of transfer metadata

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One file inside a transfer, as reported to the download page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
}

/// One completed server-side grouping of uploaded files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: String,
    /// Name of the payload on disk (the zip name for multi-file transfers)
    pub stored_name: String,
    pub files: Vec<StoredFile>,
    pub recipient_email: String,
    pub sender_email: String,
    pub is_archive: bool,
    pub created_at: String,
}

/// Disk layout: `{root}/transfers.json` for the index, `{root}/{id}/{stored_name}`
/// for each payload.
pub struct TransferStore {
    root: PathBuf,
    index: Mutex<HashMap<String, TransferRecord>>,
}

impl TransferStore {
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create data directory at {}", root.display()))?;

        let index_path = root.join("transfers.json");
        let index = if index_path.exists() {
            let content = std::fs::read_to_string(&index_path)
                .with_context(|| format!("Failed to read transfer index at {}", index_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse transfer index at {}", index_path.display()))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            root: root.to_path_buf(),
            index: Mutex::new(index),
        })
    }

    /// Directory the payload of a (possibly not yet recorded) transfer lives in
    pub fn transfer_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    pub fn payload_path(&self, record: &TransferRecord) -> PathBuf {
        self.transfer_dir(&record.id).join(&record.stored_name)
    }

    /// Record a transfer and persist the index
    pub fn insert(&self, record: TransferRecord) -> Result<()> {
        let mut index = self.index.lock().unwrap_or_else(|e| e.into_inner());
        index.insert(record.id.clone(), record);
        self.persist(&index)
    }

    pub fn get(&self, id: &str) -> Option<TransferRecord> {
        let index = self.index.lock().unwrap_or_else(|e| e.into_inner());
        index.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        let index = self.index.lock().unwrap_or_else(|e| e.into_inner());
        index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, index: &HashMap<String, TransferRecord>) -> Result<()> {
        let index_path = self.root.join("transfers.json");
        let content = serde_json::to_string_pretty(index)
            .context("Failed to serialize transfer index")?;
        std::fs::write(&index_path, content)
            .with_context(|| format!("Failed to write transfer index at {}", index_path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(id: &str) -> TransferRecord {
        TransferRecord {
            id: id.to_string(),
            stored_name: "a.txt".to_string(),
            files: vec![StoredFile { name: "a.txt".to_string(), size: 10 }],
            recipient_email: "to@example.com".to_string(),
            sender_email: "from@example.com".to_string(),
            is_archive: false,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = TransferStore::open(dir.path()).unwrap();

        store.insert(sample_record("t1")).unwrap();
        let record = store.get("t1").unwrap();
        assert_eq!(record.stored_name, "a.txt");
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = TransferStore::open(dir.path()).unwrap();
            store.insert(sample_record("t1")).unwrap();
            store.insert(sample_record("t2")).unwrap();
        }

        let reopened = TransferStore::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.get("t2").is_some());
    }

    #[test]
    fn test_payload_path_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = TransferStore::open(dir.path()).unwrap();
        let record = sample_record("t1");
        assert_eq!(store.payload_path(&record), dir.path().join("t1").join("a.txt"));
    }
}
