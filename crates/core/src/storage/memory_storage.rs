use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Storage, StorageError, StorageResult};

/// In-memory storage implementation, used by tests and short-lived setups
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    /// In-memory data store
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let mut store = self.data.write().await;
        store.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let store = self.data.read().await;
        store
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let mut store = self.data.write().await;
        store.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let store = self.data.read().await;
        Ok(store.contains_key(key))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let store = self.data.read().await;
        let keys = store
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JsonStorage;
    use std::collections::HashMap;

    #[tokio::test]
    async fn basic_operations() {
        let storage = MemoryStorage::new();

        storage.put("ledger/accounts/acct-1", b"{}").await.unwrap();
        let data = storage.get("ledger/accounts/acct-1").await.unwrap();
        assert_eq!(data, b"{}");

        // Overwrite
        storage
            .put("ledger/accounts/acct-1", b"{\"balance\":3}")
            .await
            .unwrap();
        let data = storage.get("ledger/accounts/acct-1").await.unwrap();
        assert_eq!(data, b"{\"balance\":3}");

        // List by prefix
        storage.put("ledger/accounts/acct-2", b"{}").await.unwrap();
        storage.put("trading/offers/offer-1", b"{}").await.unwrap();
        let keys = storage.list("ledger/accounts/").await.unwrap();
        assert_eq!(keys.len(), 2);

        // Exists and delete
        assert!(storage.exists("ledger/accounts/acct-1").await.unwrap());
        storage.delete("ledger/accounts/acct-1").await.unwrap();
        assert!(!storage.exists("ledger/accounts/acct-1").await.unwrap());
        assert!(storage.get("ledger/accounts/acct-1").await.is_err());
    }

    #[tokio::test]
    async fn json_round_trip() {
        let storage = MemoryStorage::new();

        let value = HashMap::from([("employer-1".to_string(), 10.0_f64)]);
        storage.put_json("balances", &value).await.unwrap();

        let retrieved: HashMap<String, f64> = storage.get_json("balances").await.unwrap();
        assert_eq!(retrieved, value);
    }
}
