//! State store capability used by the decision engine and the sweeper.

use async_trait::async_trait;

use super::state::CounterRecord;
use crate::error::StoreError;

/// Key-value persistence for counter records, keyed by identity.
///
/// Implementations must tolerate concurrent calls for different keys and
/// from the cleanup sweeper without corrupting unrelated records.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the record for `key`; [`StoreError::NotFound`] when absent.
    async fn get(&self, key: &str) -> Result<CounterRecord, StoreError>;

    /// Store `record` under `record.key`, replacing any previous value.
    async fn save(&self, record: &CounterRecord) -> Result<(), StoreError>;

    /// All keys currently stored.
    async fn list_keys(&self) -> Result<Vec<String>, StoreError>;

    /// Remove the record for `key`.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
