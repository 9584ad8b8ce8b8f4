//! Key-value store abstraction

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use thiserror::Error;

use crate::aws::SignRequestError;

/// Hash key attribute
pub const HASH_KEY: &str = "tenant_id";
/// Range key attribute
pub const RANGE_KEY: &str = "id";
/// Attribute holding the serialized document
pub const SOURCE_ATTRIBUTE: &str = "_source";

/// An attribute value in DynamoDB JSON form (`{"S": "..."}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
}

impl AttributeValue {
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }
}

/// A stored item or a key
pub type Item = HashMap<String, AttributeValue>;

/// Build the composite key of an item
pub fn item_key(tenant_id: &str, id: &str) -> Item {
    HashMap::from([
        (HASH_KEY.to_string(), AttributeValue::S(tenant_id.to_string())),
        (RANGE_KEY.to_string(), AttributeValue::S(id.to_string())),
    ])
}

/// Key-value store errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KvStoreError {
    #[error("Table not found: {0}")]
    ResourceNotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{code}: {message}")]
    Service { code: String, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Request signing failed: {0}")]
    Signing(#[from] SignRequestError),

    #[error("{0}")]
    Denied(String),
}

/// Item-level operations of a distributed key-value store (Object Safe)
#[async_trait]
pub trait KeyValueStore: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Insert or replace an item
    async fn put_item(&self, table: &str, item: Item) -> Result<(), KvStoreError>;

    /// Strongly consistent point read
    async fn get_item(&self, table: &str, key: Item) -> Result<Option<Item>, KvStoreError>;

    /// Remove an item; removing a missing item succeeds
    async fn delete_item(&self, table: &str, key: Item) -> Result<(), KvStoreError>;
}

fn composite_key(item: &Item) -> Result<(String, String), KvStoreError> {
    let part = |name: &str| {
        item.get(name)
            .and_then(AttributeValue::as_s)
            .map(str::to_string)
            .ok_or_else(|| KvStoreError::InvalidKey(format!("missing string attribute {}", name)))
    };
    Ok((part(HASH_KEY)?, part(RANGE_KEY)?))
}

/// In-process tables, created on first write
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    tables: RwLock<HashMap<String, HashMap<(String, String), Item>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items in `table`
    pub fn len(&self, table: &str) -> usize {
        self.tables.read().get(table).map(HashMap::len).unwrap_or(0)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<(), KvStoreError> {
        let key = composite_key(&item)?;
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .insert(key, item);
        Ok(())
    }

    async fn get_item(&self, table: &str, key: Item) -> Result<Option<Item>, KvStoreError> {
        let key = composite_key(&key)?;
        Ok(self
            .tables
            .read()
            .get(table)
            .and_then(|items| items.get(&key))
            .cloned())
    }

    async fn delete_item(&self, table: &str, key: Item) -> Result<(), KvStoreError> {
        let key = composite_key(&key)?;
        if let Some(items) = self.tables.write().get_mut(table) {
            items.remove(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_value_wire_form() {
        let item = item_key("t1", "abc");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["tenant_id"], serde_json::json!({ "S": "t1" }));
        assert_eq!(json["id"], serde_json::json!({ "S": "abc" }));
        let back: Item = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[tokio::test]
    async fn test_memory_store_keys_by_tenant_and_id() {
        let store = MemoryKeyValueStore::new();
        let mut first = item_key("t1", "x");
        first.insert(SOURCE_ATTRIBUTE.into(), AttributeValue::S("{\"v\":1}".into()));
        let mut second = item_key("t2", "x");
        second.insert(SOURCE_ATTRIBUTE.into(), AttributeValue::S("{\"v\":2}".into()));

        store.put_item("agents", first.clone()).await.unwrap();
        store.put_item("agents", second).await.unwrap();
        assert_eq!(store.len("agents"), 2);

        let fetched = store.get_item("agents", item_key("t1", "x")).await.unwrap();
        assert_eq!(fetched, Some(first));

        store.delete_item("agents", item_key("t1", "x")).await.unwrap();
        store.delete_item("agents", item_key("t1", "x")).await.unwrap();
        assert!(store.get_item("agents", item_key("t1", "x")).await.unwrap().is_none());
        assert_eq!(store.len("agents"), 1);
    }

    #[tokio::test]
    async fn test_memory_store_rejects_keyless_items() {
        let store = MemoryKeyValueStore::new();
        let err = store.put_item("agents", Item::new()).await.unwrap_err();
        assert!(matches!(err, KvStoreError::InvalidKey(_)));
        assert!(store.get_item("missing", item_key("t", "i")).await.unwrap().is_none());
    }
}
