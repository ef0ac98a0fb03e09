//! Content relationship fields

use serde_json::Value;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use super::ResolveContext;
use crate::maps::{DocumentKey, DocumentMap, ResolvedDocument};
use crate::registry::{DocumentLookup, StagedDocumentId};
use crate::shape;
use crate::types::{LinkType, RemoteDocument};

/// Deferred document reference
///
/// Evaluated against the staging index at resolution time, so it can name a
/// document that is registered after the relationship itself.
pub type DocumentThunk =
    Arc<dyn Fn(&dyn DocumentLookup) -> Option<DocumentReference> + Send + Sync>;

/// Anything a content relationship can point at
#[derive(Clone)]
pub enum DocumentReference {
    /// Document registered in this migration
    Staged(StagedDocumentId),
    /// Document fetched from the content API (this or another repository)
    Document(Box<RemoteDocument>),
    /// Remote id, or the original id of a document copied from elsewhere
    Id(String),
    /// Filled content relationship value
    Link(Value),
    /// Reference computed at resolution time
    Lazy(DocumentThunk),
}

impl DocumentReference {
    pub fn id(id: impl Into<String>) -> Self {
        DocumentReference::Id(id.into())
    }

    pub fn lazy<F>(thunk: F) -> Self
    where
        F: Fn(&dyn DocumentLookup) -> Option<DocumentReference> + Send + Sync + 'static,
    {
        DocumentReference::Lazy(Arc::new(thunk))
    }

    /// Key to look the target up with, evaluating thunks
    pub fn key(&self, lookup: &dyn DocumentLookup) -> Option<DocumentKey> {
        match self {
            DocumentReference::Staged(id) => Some(DocumentKey::Staged(*id)),
            DocumentReference::Document(document) => Some(DocumentKey::Id(document.id.clone())),
            DocumentReference::Id(id) => Some(DocumentKey::Id(id.clone())),
            DocumentReference::Link(link) => {
                if shape::link_type(link) != Some(LinkType::Document) {
                    return None;
                }
                shape::non_empty_str_member(link, "id").map(|id| DocumentKey::Id(id.to_string()))
            }
            DocumentReference::Lazy(thunk) => match thunk(lookup) {
                // Nested thunks are not followed
                Some(DocumentReference::Lazy(_)) | None => None,
                Some(inner) => inner.key(lookup),
            },
        }
    }

    /// Look the target up in the document map
    pub fn resolve<'m>(
        &self,
        lookup: &dyn DocumentLookup,
        documents: &'m DocumentMap,
    ) -> Option<&'m ResolvedDocument> {
        self.key(lookup).and_then(|key| documents.get(&key))
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            DocumentReference::Staged(id) => format!("staged document #{}", id.index()),
            DocumentReference::Document(document) => format!("document {}", document.id),
            DocumentReference::Id(id) => format!("document {}", id),
            DocumentReference::Link(link) => format!(
                "document {}",
                shape::str_member(link, "id").unwrap_or("<none>")
            ),
            DocumentReference::Lazy(_) => "deferred document".to_string(),
        }
    }
}

impl fmt::Debug for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentReference::Staged(id) => f.debug_tuple("Staged").field(id).finish(),
            DocumentReference::Document(document) => {
                f.debug_tuple("Document").field(&document.id).finish()
            }
            DocumentReference::Id(id) => f.debug_tuple("Id").field(id).finish(),
            DocumentReference::Link(link) => f.debug_tuple("Link").field(link).finish(),
            DocumentReference::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

impl From<StagedDocumentId> for DocumentReference {
    fn from(id: StagedDocumentId) -> Self {
        DocumentReference::Staged(id)
    }
}

impl From<RemoteDocument> for DocumentReference {
    fn from(document: RemoteDocument) -> Self {
        DocumentReference::Document(Box::new(document))
    }
}

impl From<Value> for DocumentReference {
    fn from(link: Value) -> Self {
        DocumentReference::Link(link)
    }
}

/// Content relationship field
#[derive(Debug, Clone)]
pub struct MigrationContentRelationship {
    target: DocumentReference,
    text: Option<String>,
    resolved: OnceLock<Value>,
}

impl MigrationContentRelationship {
    /// Display text falls back to the `text` member of a link target
    pub fn new(target: impl Into<DocumentReference>, text: Option<String>) -> Self {
        let target = target.into();
        let text = text.filter(|t| !t.is_empty()).or_else(|| match &target {
            DocumentReference::Link(link) => {
                shape::non_empty_str_member(link, "text").map(str::to_string)
            }
            _ => None,
        });
        Self {
            target,
            text,
            resolved: OnceLock::new(),
        }
    }

    pub fn target(&self) -> &DocumentReference {
        &self.target
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Link value the relationship was built from
    pub fn initial(&self) -> Option<&Value> {
        match &self.target {
            DocumentReference::Link(link) => Some(link),
            _ => None,
        }
    }

    pub fn resolve(&self, ctx: &ResolveContext<'_>) {
        if self.resolved.get().is_some() {
            return;
        }
        match self.target.resolve(ctx.lookup, ctx.documents) {
            Some(document) => {
                let _ = self
                    .resolved
                    .set(document.to_relationship(self.text.as_deref()));
            }
            None => debug!(reference = %self.target.describe(), "Relationship target not found"),
        }
    }

    pub fn resolved(&self) -> Option<&Value> {
        self.resolved.get()
    }
}
