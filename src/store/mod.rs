//! Persistent-store collaborator interface
//!
//! The dispatcher owns a store behind this trait: documents as JSON values,
//! keyed by collection and document id. A real database adapter implements
//! the same trait out of tree; [`MemoryStore`] is the in-tree default and
//! the test double.
//!
//! Methods are synchronous by design — adapters talk to blocking drivers —
//! and the dispatcher offloads calls to the blocking worker pool so a slow
//! store cannot stall the command socket.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use serde_json::Value;

/// Document store keyed by collection and document id
pub trait Store: Send + Sync {
    /// Insert a document; allocates an id when none is given. Returns the
    /// document id.
    fn create(&self, collection: &str, document_id: Option<&str>, data: Value) -> Result<String>;

    /// Fetch one document, or `None` when absent
    fn read(&self, collection: &str, document_id: &str) -> Result<Option<Value>>;

    /// Fetch a whole collection keyed by document id
    fn read_all(&self, collection: &str) -> Result<Value>;

    /// Update a document. `merge` folds top-level fields into the existing
    /// document; otherwise the document is replaced. Returns `false` when
    /// the document does not exist.
    fn update(&self, collection: &str, document_id: &str, data: Value, merge: bool)
        -> Result<bool>;

    /// Delete a document. Returns `false` when it did not exist.
    fn delete(&self, collection: &str, document_id: &str) -> Result<bool>;

    /// Documents whose top-level `field` equals `value`
    fn query(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Value>>;

    /// All documents in a collection
    fn list(&self, collection: &str) -> Result<Vec<Value>>;
}
