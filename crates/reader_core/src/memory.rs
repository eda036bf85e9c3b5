//! crates/reader_core/src/memory.rs
//!
//! In-memory implementations of the persistence ports, for tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ports::{Dataset, LocalStore, PortError, PortResult, RemoteDocument, RemoteStore};

fn poisoned() -> PortError {
    PortError::Unexpected("in-memory store lock poisoned".to_string())
}

#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A remote document store held in memory. It can be told to refuse writes.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    documents: Mutex<HashMap<Dataset, RemoteDocument>>,
    refuse_writes: Mutex<bool>,
}

impl MemoryRemoteStore {
    pub fn with_document(dataset: Dataset, document: RemoteDocument) -> Self {
        let store = Self::default();
        if let Ok(mut documents) = store.documents.lock() {
            documents.insert(dataset, document);
        }
        store
    }

    pub fn insert(&self, dataset: Dataset, document: RemoteDocument) {
        if let Ok(mut documents) = self.documents.lock() {
            documents.insert(dataset, document);
        }
    }

    pub fn document(&self, dataset: Dataset) -> Option<RemoteDocument> {
        self.documents.lock().ok()?.get(&dataset).cloned()
    }

    pub fn refuse_writes(&self, refuse: bool) {
        if let Ok(mut flag) = self.refuse_writes.lock() {
            *flag = refuse;
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn load(&self, dataset: Dataset) -> PortResult<Option<RemoteDocument>> {
        let documents = self.documents.lock().map_err(|_| poisoned())?;
        Ok(documents.get(&dataset).cloned())
    }

    async fn save(&self, dataset: Dataset, document: &RemoteDocument) -> PortResult<bool> {
        if *self.refuse_writes.lock().map_err(|_| poisoned())? {
            return Ok(false);
        }
        let mut documents = self.documents.lock().map_err(|_| poisoned())?;
        documents.insert(dataset, document.clone());
        Ok(true)
    }
}
