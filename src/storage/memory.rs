//! In-process state store.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::ratelimit::{CounterRecord, StateStore};

/// A [`StateStore`] that keeps records in a concurrent hash map.
///
/// Useful for tests and for running a single instance without Redis.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, CounterRecord>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<CounterRecord, StoreError> {
        self.records
            .get(key)
            .map(|record| record.value().clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn save(&self, record: &CounterRecord) -> Result<(), StoreError> {
        self.records.insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.records.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.records.remove(key);
        Ok(())
    }
}
