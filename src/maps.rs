//! Lookup tables built by the asset and document phases
//!
//! Both maps are filled incrementally while assets and document shells are
//! created, then only read while documents are patched.

use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::registry::StagedDocumentId;
use crate::types::{Asset, CreatedDocument, RemoteDocument};

/// Asset config id (or remote asset id) to remote asset
#[derive(Debug, Clone, Default)]
pub struct AssetMap {
    inner: HashMap<String, Asset>,
}

impl AssetMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, asset: Asset) {
        self.inner.insert(key.into(), asset);
    }

    pub fn get(&self, key: &str) -> Option<&Asset> {
        self.inner.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Key under which a document can be found
///
/// Remote ids and ids from a foreign repository share the `Id` namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentKey {
    /// Handle returned by document registration
    Staged(StagedDocumentId),
    /// Remote id, or the original id of a document copied from elsewhere
    Id(String),
}

/// Identity of a document that exists remotely
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDocument {
    pub id: String,
    pub uid: Option<String>,
    pub doc_type: String,
    pub tags: Vec<String>,
    pub lang: String,
}

impl ResolvedDocument {
    pub fn from_remote(document: &RemoteDocument) -> Self {
        Self {
            id: document.id.clone(),
            uid: document.uid.clone(),
            doc_type: document.doc_type.clone(),
            tags: document.tags.clone(),
            lang: document.lang.clone(),
        }
    }

    /// Identity of a just-created document shell
    pub fn from_created(
        created: &CreatedDocument,
        uid: Option<String>,
        doc_type: &str,
        tags: &[String],
        lang: &str,
    ) -> Self {
        Self {
            id: created.id.clone(),
            uid: created.uid.clone().or(uid),
            doc_type: created.doc_type.clone().unwrap_or_else(|| doc_type.to_string()),
            tags: tags.to_vec(),
            lang: created.lang.clone().unwrap_or_else(|| lang.to_string()),
        }
    }

    /// Filled content relationship pointing at this document
    pub fn to_relationship(&self, text: Option<&str>) -> Value {
        let mut link = Map::new();
        link.insert("link_type".into(), json!("Document"));
        link.insert("id".into(), json!(self.id));
        if let Some(uid) = &self.uid {
            link.insert("uid".into(), json!(uid));
        }
        link.insert("type".into(), json!(self.doc_type));
        link.insert("tags".into(), json!(self.tags));
        link.insert("lang".into(), json!(self.lang));
        link.insert("isBroken".into(), json!(false));
        if let Some(text) = text {
            link.insert("text".into(), json!(text));
        }
        Value::Object(link)
    }
}

/// Multi-keyed document lookup
#[derive(Debug, Clone, Default)]
pub struct DocumentMap {
    inner: HashMap<DocumentKey, ResolvedDocument>,
}

impl DocumentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: DocumentKey, document: ResolvedDocument) {
        self.inner.insert(key, document);
    }

    /// Insert the same document under several keys
    pub fn insert_all(
        &mut self,
        keys: impl IntoIterator<Item = DocumentKey>,
        document: &ResolvedDocument,
    ) {
        for key in keys {
            self.inner.insert(key, document.clone());
        }
    }

    pub fn get(&self, key: &DocumentKey) -> Option<&ResolvedDocument> {
        self.inner.get(key)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&ResolvedDocument> {
        self.inner.get(&DocumentKey::Id(id.to_string()))
    }

    pub fn get_staged(&self, staged: StagedDocumentId) -> Option<&ResolvedDocument> {
        self.inner.get(&DocumentKey::Staged(staged))
    }

    pub fn contains(&self, key: &DocumentKey) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(id: &str) -> ResolvedDocument {
        ResolvedDocument {
            id: id.into(),
            uid: Some("home".into()),
            doc_type: "page".into(),
            tags: vec!["t1".into()],
            lang: "en-us".into(),
        }
    }

    #[test]
    fn test_relationship_shape() {
        let link = resolved("X1").to_relationship(Some("Go home"));
        assert_eq!(
            link,
            json!({
                "link_type": "Document",
                "id": "X1",
                "uid": "home",
                "type": "page",
                "tags": ["t1"],
                "lang": "en-us",
                "isBroken": false,
                "text": "Go home"
            })
        );
    }

    #[test]
    fn test_insert_all_keys() {
        let mut map = DocumentMap::new();
        let staged = StagedDocumentId::new(0);
        map.insert_all(
            [DocumentKey::Staged(staged), DocumentKey::Id("orig".into())],
            &resolved("new"),
        );

        assert_eq!(map.get_staged(staged).unwrap().id, "new");
        assert_eq!(map.get_by_id("orig").unwrap().id, "new");
        assert!(map.get_by_id("new").is_none());
    }
}
