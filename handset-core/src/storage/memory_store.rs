//! In-memory store implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use super::kv_store::KvStore;
use crate::error::{HandsetError, HandsetResult};

/// Simple in-memory document store.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with initial documents.
    pub fn with_documents<I, K, V>(documents: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let documents = documents
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            documents: RwLock::new(documents),
        }
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.documents.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> HandsetResult<()> {
        let mut documents = self
            .documents
            .write()
            .map_err(|_| HandsetError::LockPoisoned)?;
        documents.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> bool {
        match self.documents.write() {
            Ok(mut documents) => documents.remove(key).is_some(),
            Err(_) => false,
        }
    }

    fn keys(&self) -> Vec<String> {
        match self.documents.read() {
            Ok(documents) => documents.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}
