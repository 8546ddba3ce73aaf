//! Cross-document lookup.

use indexmap::IndexMap;

use crate::error::ResolutionError;
use crate::model::Document;
use crate::reference::{AsyncApiReference, ComponentKey};
use crate::resolve::resolve_local;

/// A set of documents addressable by resource name (file name or URL).
pub trait Workspace {
    fn document(&self, resource: &str) -> Option<&Document>;

    /// Bind an external reference to a component of another document.
    fn resolve(&self, reference: &AsyncApiReference) -> Result<ComponentKey, ResolutionError> {
        let Some(resource) = reference.external_resource.as_deref() else {
            return Err(ResolutionError::Unsupported {
                pointer: reference.pointer(),
            });
        };
        let document = self
            .document(resource)
            .ok_or_else(|| ResolutionError::UnknownDocument {
                resource: resource.to_string(),
            })?;
        let key = resolve_local(&reference.localized(), document)?;
        Ok(ComponentKey {
            document: Some(resource.to_string()),
            ..key
        })
    }
}

/// Documents held in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkspace {
    documents: IndexMap<String, Document>,
}

impl InMemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the document for `resource`.
    pub fn insert(&mut self, resource: impl Into<String>, document: Document) -> Option<Document> {
        self.documents.insert(resource.into(), document)
    }

    pub fn get(&self, resource: &str) -> Option<&Document> {
        self.documents.get(resource)
    }

    pub fn get_mut(&mut self, resource: &str) -> Option<&mut Document> {
        self.documents.get_mut(resource)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Workspace for InMemoryWorkspace {
    fn document(&self, resource: &str) -> Option<&Document> {
        self.get(resource)
    }
}
