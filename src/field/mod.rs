//! Lazy fields: references that can only be finalized once a remote id exists
//!
//! A field keeps the value it was created from (its *initial* value, e.g. an
//! image's crop rectangle and alt text) and gains a *resolved* value once
//! [`MigrationField::resolve`] finds its target in the [`AssetMap`] or
//! [`DocumentMap`]. Resolution runs once; later calls are no-ops.
//!
//! Fields never depend on other fields of the same document, so a single
//! pass after the asset and document phases resolves everything.

pub mod image;
pub mod relationship;

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::ops::Deref;
use std::sync::Arc;

use crate::maps::{AssetMap, DocumentMap};
use crate::registry::DocumentLookup;

pub use image::{MigrationImage, MigrationLinkToMedia, MigrationRtImageNode};
pub use relationship::{DocumentReference, DocumentThunk, MigrationContentRelationship};

/// Everything a field needs to resolve itself
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub assets: &'a AssetMap,
    pub documents: &'a DocumentMap,
    /// Staging index, handed to relationship thunks
    pub lookup: &'a dyn DocumentLookup,
}

impl<'a> ResolveContext<'a> {
    pub fn new(
        assets: &'a AssetMap,
        documents: &'a DocumentMap,
        lookup: &'a dyn DocumentLookup,
    ) -> Self {
        Self {
            assets,
            documents,
            lookup,
        }
    }
}

/// Field variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Image,
    LinkToMedia,
    RichTextImageNode,
    ContentRelationship,
}

/// A lazy field
#[derive(Debug, Clone)]
pub enum MigrationField {
    Image(MigrationImage),
    LinkToMedia(MigrationLinkToMedia),
    RichTextImageNode(MigrationRtImageNode),
    ContentRelationship(MigrationContentRelationship),
}

impl MigrationField {
    pub fn kind(&self) -> FieldKind {
        match self {
            MigrationField::Image(_) => FieldKind::Image,
            MigrationField::LinkToMedia(_) => FieldKind::LinkToMedia,
            MigrationField::RichTextImageNode(_) => FieldKind::RichTextImageNode,
            MigrationField::ContentRelationship(_) => FieldKind::ContentRelationship,
        }
    }

    /// Resolve against the maps; no-op once resolved
    pub fn resolve(&self, ctx: &ResolveContext<'_>) {
        match self {
            MigrationField::Image(field) => field.resolve(ctx),
            MigrationField::LinkToMedia(field) => field.resolve(ctx),
            MigrationField::RichTextImageNode(field) => field.resolve(ctx),
            MigrationField::ContentRelationship(field) => field.resolve(ctx),
        }
    }

    /// Final value, absent until resolution succeeds
    pub fn resolved(&self) -> Option<&Value> {
        match self {
            MigrationField::Image(field) => field.resolved(),
            MigrationField::LinkToMedia(field) => field.resolved(),
            MigrationField::RichTextImageNode(field) => field.resolved(),
            MigrationField::ContentRelationship(field) => field.resolved(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved().is_some()
    }

    /// Value the field was built from, if any
    pub fn initial(&self) -> Option<&Value> {
        match self {
            MigrationField::Image(field) => field.initial(),
            MigrationField::LinkToMedia(_) => None,
            MigrationField::RichTextImageNode(field) => field.image().initial(),
            MigrationField::ContentRelationship(field) => field.initial(),
        }
    }

    /// Asset config id for asset-backed fields
    pub fn asset_id(&self) -> Option<&str> {
        match self {
            MigrationField::Image(field) => Some(field.config_id()),
            MigrationField::LinkToMedia(field) => Some(field.config_id()),
            MigrationField::RichTextImageNode(field) => Some(field.image().config_id()),
            MigrationField::ContentRelationship(_) => None,
        }
    }

    /// Placeholder used when the field stays unresolved
    ///
    /// `None` means the field is dropped from its parent entirely.
    pub fn degraded(&self) -> Option<Value> {
        match self {
            MigrationField::Image(_) => Some(empty_image()),
            MigrationField::LinkToMedia(field) => Some(empty_link(field.text())),
            MigrationField::RichTextImageNode(_) => None,
            MigrationField::ContentRelationship(field) => Some(empty_link(field.text())),
        }
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            MigrationField::ContentRelationship(field) => field.target().describe(),
            _ => format!("asset {}", self.asset_id().unwrap_or_default()),
        }
    }
}

/// Shared handle to a field
///
/// The same field is reachable from a document's content tree and from its
/// dependency list, so resolving through either is visible through both.
#[derive(Debug, Clone)]
pub struct FieldRef(Arc<MigrationField>);

impl FieldRef {
    pub fn new(field: MigrationField) -> Self {
        Self(Arc::new(field))
    }

    /// Whether two handles point at the same field
    pub fn ptr_eq(a: &FieldRef, b: &FieldRef) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl Deref for FieldRef {
    type Target = MigrationField;

    fn deref(&self) -> &MigrationField {
        &self.0
    }
}

impl From<MigrationField> for FieldRef {
    fn from(field: MigrationField) -> Self {
        FieldRef::new(field)
    }
}

impl Serialize for FieldRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.resolved().serialize(serializer)
    }
}

/// Empty image placeholder
pub fn empty_image() -> Value {
    json!({})
}

/// Empty link placeholder, keeping its display text
pub fn empty_link(text: Option<&str>) -> Value {
    let mut link = Map::new();
    link.insert("link_type".into(), json!("Any"));
    if let Some(text) = text {
        link.insert("text".into(), json!(text));
    }
    Value::Object(link)
}
