//! In-memory document store

use crate::error::{Error, Result};
use crate::store::Store;

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Thread-safe in-memory [`Store`]
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn create(&self, collection: &str, document_id: Option<&str>, data: Value) -> Result<String> {
        if !data.is_object() {
            return Err(Error::Store("document data must be a mapping".to_string()));
        }

        let mut collections = self
            .collections
            .write()
            .map_err(|_| Error::Store("store lock poisoned".to_string()))?;
        let documents = collections.entry(collection.to_string()).or_default();

        let id = match document_id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        documents.insert(id.clone(), data);
        Ok(id)
    }

    fn read(&self, collection: &str, document_id: &str) -> Result<Option<Value>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| Error::Store("store lock poisoned".to_string()))?;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(document_id))
            .cloned())
    }

    fn read_all(&self, collection: &str) -> Result<Value> {
        let collections = self
            .collections
            .read()
            .map_err(|_| Error::Store("store lock poisoned".to_string()))?;
        let map = collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect::<serde_json::Map<_, _>>()
            })
            .unwrap_or_default();
        Ok(Value::Object(map))
    }

    fn update(
        &self,
        collection: &str,
        document_id: &str,
        data: Value,
        merge: bool,
    ) -> Result<bool> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| Error::Store("store lock poisoned".to_string()))?;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let Some(existing) = documents.get_mut(document_id) else {
            return Ok(false);
        };

        if merge {
            if let (Value::Object(existing), Value::Object(incoming)) = (existing, data) {
                for (key, value) in incoming {
                    existing.insert(key, value);
                }
                return Ok(true);
            }
            return Err(Error::Store(
                "merge update requires mapping documents".to_string(),
            ));
        }

        documents.insert(document_id.to_string(), data);
        Ok(true)
    }

    fn delete(&self, collection: &str, document_id: &str) -> Result<bool> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| Error::Store("store lock poisoned".to_string()))?;
        Ok(collections
            .get_mut(collection)
            .map(|documents| documents.remove(document_id).is_some())
            .unwrap_or(false))
    }

    fn query(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Value>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| Error::Store("store lock poisoned".to_string()))?;
        Ok(collections
            .get(collection)
            .map(|documents| {
                documents
                    .values()
                    .filter(|doc| doc.get(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list(&self, collection: &str) -> Result<Vec<Value>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| Error::Store("store lock poisoned".to_string()))?;
        Ok(collections
            .get(collection)
            .map(|documents| documents.values().cloned().collect())
            .unwrap_or_default())
    }
}
