//! In-memory store of analyzed documents, keyed by display name.
//!
//! Two documents with the same name do not overwrite each other: the later
//! one is stored as `name (2)`, then `name (3)`, and so on.

use crate::types::{AnalysisResult, DocumentResults};

#[derive(Debug, Default)]
pub struct ResultCache {
    documents: Vec<DocumentResults>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document's results and return the name it was stored under.
    pub fn insert(&mut self, name: &str, results: Vec<AnalysisResult>) -> String {
        let stored_name = self.unique_name(name);
        if stored_name != name {
            tracing::debug!("Document name {name:?} already cached, storing as {stored_name:?}");
        }
        self.documents
            .push(DocumentResults::new(stored_name.clone(), results));
        stored_name
    }

    pub fn get(&self, name: &str) -> Option<&DocumentResults> {
        self.documents.iter().find(|d| d.name == name)
    }

    /// Documents in insertion order.
    pub fn documents(&self) -> &[DocumentResults] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn clear(&mut self) {
        self.documents.clear();
    }

    fn unique_name(&self, name: &str) -> String {
        if self.get(name).is_none() {
            return name.to_string();
        }
        (2..)
            .map(|n| format!("{name} ({n})"))
            .find(|candidate| self.get(candidate).is_none())
            .unwrap_or_else(|| name.to_string())
    }
}
