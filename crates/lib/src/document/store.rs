//! An in-process registry of documents keyed by id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::{Document, DocumentError};
use crate::Result;
use crate::clock::{Clock, system_clock};
use crate::crdt::{List, Map, SharedType, Text};
use crate::operation::Operation;

/// Holds documents by id and wires shared types into them.
///
/// Every document and shared type the store creates uses the store's clock.
/// Lookups by id return [`DocumentError::DocumentNotFound`] for unknown ids.
#[derive(Debug)]
pub struct DocumentStore {
    clock: Arc<dyn Clock>,
    documents: RwLock<HashMap<String, Arc<Document>>>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Create a document with a fresh id and store it.
    pub fn create(&self) -> Arc<Document> {
        let doc = Arc::new(Document::with_clock(Arc::clone(&self.clock)));
        self.documents
            .write()
            .insert(doc.id().to_string(), Arc::clone(&doc));
        info!(document_id = %doc.id(), "Created document");
        doc
    }

    /// Store an existing document under its own id, replacing any document
    /// already stored there.
    pub fn insert(&self, doc: Document) -> Arc<Document> {
        let doc = Arc::new(doc);
        self.documents
            .write()
            .insert(doc.id().to_string(), Arc::clone(&doc));
        doc
    }

    pub fn get(&self, id: &str) -> Option<Arc<Document>> {
        self.documents.read().get(id).cloned()
    }

    fn document(&self, id: &str) -> Result<Arc<Document>> {
        self.get(id).ok_or_else(|| {
            DocumentError::DocumentNotFound { id: id.to_string() }.into()
        })
    }

    /// The document stored under `id`, creating an empty one with that id if
    /// none exists.
    pub fn get_or_create(&self, id: &str) -> Arc<Document> {
        if let Some(doc) = self.get(id) {
            return doc;
        }
        let mut documents = self.documents.write();
        Arc::clone(documents.entry(id.to_string()).or_insert_with(|| {
            info!(document_id = %id, "Created document");
            Arc::new(Document::with_id(id, Arc::clone(&self.clock)))
        }))
    }

    /// Drop a document. Returns false if nothing was stored under `id`.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.documents.write().remove(id).is_some();
        if removed {
            info!(document_id = %id, "Removed document");
        }
        removed
    }

    /// Stored document ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.documents.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Register a new, empty text under `name` in the given document.
    pub fn create_text(&self, document_id: &str, name: &str) -> Result<Arc<SharedType>> {
        self.register(document_id, name, Text::with_clock(Arc::clone(&self.clock)))
    }

    /// Register a new, empty list under `name` in the given document.
    pub fn create_list(&self, document_id: &str, name: &str) -> Result<Arc<SharedType>> {
        self.register(document_id, name, List::with_clock(Arc::clone(&self.clock)))
    }

    /// Register a new, empty map under `name` in the given document.
    pub fn create_map(&self, document_id: &str, name: &str) -> Result<Arc<SharedType>> {
        self.register(document_id, name, Map::with_clock(Arc::clone(&self.clock)))
    }

    fn register(
        &self,
        document_id: &str,
        name: &str,
        shared: impl Into<SharedType>,
    ) -> Result<Arc<SharedType>> {
        let doc = self.document(document_id)?;
        let shared = doc.register(name, shared);
        info!(
            document_id = %document_id,
            name = %name,
            kind = %shared.kind(),
            shared_type_id = %shared.id(),
            "Registered shared type"
        );
        Ok(shared)
    }

    /// The shared type bound to `name` in the given document.
    pub fn shared_type(&self, document_id: &str, name: &str) -> Result<Arc<SharedType>> {
        let doc = self.document(document_id)?;
        doc.get(name).ok_or_else(|| {
            DocumentError::SharedTypeNotFound {
                document_id: document_id.to_string(),
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Route an operation into the given document.
    pub fn apply_operation(&self, document_id: &str, op: Operation) -> Result<()> {
        self.document(document_id)?.apply_operation(op);
        Ok(())
    }

    /// Merge the source document into the target document. The source is
    /// left unchanged.
    pub fn merge_documents(&self, source_id: &str, target_id: &str) -> Result<()> {
        let source = self.document(source_id)?;
        let target = self.document(target_id)?;
        target.merge(&source);
        info!(source_id = %source_id, target_id = %target_id, "Merged documents");
        Ok(())
    }
}
