//! Document content trees
//!
//! Staged document data is plain JSON interleaved with lazy fields. An
//! unresolved field serializes as absent: its object key is omitted, and an
//! array slot holding one becomes `null`.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::field::{
    FieldRef, MigrationContentRelationship, MigrationField, MigrationImage, MigrationLinkToMedia,
    MigrationRtImageNode,
};

/// A node of a document's content tree
#[derive(Debug, Clone)]
pub enum ContentNode {
    /// Raw JSON, copied through patching
    Json(Value),
    /// Lazy field
    Field(FieldRef),
    Array(Vec<ContentNode>),
    Object(BTreeMap<String, ContentNode>),
}

impl Default for ContentNode {
    fn default() -> Self {
        ContentNode::Object(BTreeMap::new())
    }
}

impl ContentNode {
    /// Object node from key/value pairs
    pub fn object<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ContentNode>,
    {
        ContentNode::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Array node
    pub fn array<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ContentNode>,
    {
        ContentNode::Array(items.into_iter().map(Into::into).collect())
    }

    /// Member of an object node
    ///
    /// Raw JSON objects are not indexed; only structured nodes are.
    pub fn get(&self, key: &str) -> Option<&ContentNode> {
        match self {
            ContentNode::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Element of an array node
    pub fn at(&self, index: usize) -> Option<&ContentNode> {
        match self {
            ContentNode::Array(items) => items.get(index),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldRef> {
        match self {
            ContentNode::Field(field) => Some(field),
            _ => None,
        }
    }

    /// Every field in the tree, depth-first in key order
    pub fn fields(&self) -> Vec<FieldRef> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields(&self, out: &mut Vec<FieldRef>) {
        match self {
            ContentNode::Json(_) => {}
            ContentNode::Field(field) => out.push(field.clone()),
            ContentNode::Array(items) => items.iter().for_each(|item| item.collect_fields(out)),
            ContentNode::Object(map) => map.values().for_each(|item| item.collect_fields(out)),
        }
    }

    /// Current JSON view, `None` for an unresolved field
    pub fn to_json(&self) -> Option<Value> {
        match self {
            ContentNode::Json(value) => Some(value.clone()),
            ContentNode::Field(field) => field.resolved().cloned(),
            ContentNode::Array(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| item.to_json().unwrap_or(Value::Null))
                    .collect(),
            )),
            ContentNode::Object(map) => Some(Value::Object(
                map.iter()
                    .filter_map(|(key, item)| item.to_json().map(|value| (key.clone(), value)))
                    .collect::<Map<_, _>>(),
            )),
        }
    }
}

impl Serialize for ContentNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<Value> for ContentNode {
    fn from(value: Value) -> Self {
        ContentNode::Json(value)
    }
}

impl From<FieldRef> for ContentNode {
    fn from(field: FieldRef) -> Self {
        ContentNode::Field(field)
    }
}

impl From<MigrationField> for ContentNode {
    fn from(field: MigrationField) -> Self {
        ContentNode::Field(FieldRef::new(field))
    }
}

impl From<MigrationImage> for ContentNode {
    fn from(field: MigrationImage) -> Self {
        MigrationField::Image(field).into()
    }
}

impl From<MigrationLinkToMedia> for ContentNode {
    fn from(field: MigrationLinkToMedia) -> Self {
        MigrationField::LinkToMedia(field).into()
    }
}

impl From<MigrationRtImageNode> for ContentNode {
    fn from(field: MigrationRtImageNode) -> Self {
        MigrationField::RichTextImageNode(field).into()
    }
}

impl From<MigrationContentRelationship> for ContentNode {
    fn from(field: MigrationContentRelationship) -> Self {
        MigrationField::ContentRelationship(field).into()
    }
}

impl From<Vec<ContentNode>> for ContentNode {
    fn from(items: Vec<ContentNode>) -> Self {
        ContentNode::Array(items)
    }
}

impl From<BTreeMap<String, ContentNode>> for ContentNode {
    fn from(map: BTreeMap<String, ContentNode>) -> Self {
        ContentNode::Object(map)
    }
}

impl From<&str> for ContentNode {
    fn from(value: &str) -> Self {
        ContentNode::Json(Value::String(value.to_string()))
    }
}

impl From<String> for ContentNode {
    fn from(value: String) -> Self {
        ContentNode::Json(Value::String(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::DocumentReference;
    use serde_json::json;

    fn unresolved() -> ContentNode {
        MigrationContentRelationship::new(DocumentReference::id("missing"), None).into()
    }

    #[test]
    fn test_unresolved_field_omitted_from_object() {
        let node = ContentNode::object([
            ("title", ContentNode::from("Hello")),
            ("link", unresolved()),
        ]);
        assert_eq!(serde_json::to_value(&node).unwrap(), json!({ "title": "Hello" }));
    }

    #[test]
    fn test_unresolved_field_is_null_in_array() {
        let node = ContentNode::array([ContentNode::from(json!(1)), unresolved()]);
        assert_eq!(node.to_json(), Some(json!([1, null])));
    }

    #[test]
    fn test_fields_collects_nested() {
        let node = ContentNode::object([
            ("a", unresolved()),
            ("group", ContentNode::array([ContentNode::object([("b", unresolved())])])),
        ]);
        assert_eq!(node.fields().len(), 2);
    }
}
