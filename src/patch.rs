//! Document data patching
//!
//! Produces the final payload for a document update: resolved fields are
//! substituted, raw references copied from another repository are mapped to
//! their new ids, and anything that cannot be resolved degrades to an empty
//! value instead of failing the run.
//!
//! | Unresolved | Becomes |
//! |------------|---------|
//! | Link (document or media) | `{"link_type": "Any"}`, keeping `text` |
//! | Image | `{}` |
//! | Rich-text image node | dropped from its array |

use serde_json::{Map, Value};
use tracing::warn;

use crate::content::ContentNode;
use crate::field::image::{image_from_asset, media_link};
use crate::field::{empty_image, empty_link, FieldKind, FieldRef, ResolveContext};
use crate::shape::{self, Shape};
use crate::types::LinkType;

/// Patched payload for a document's `data`
pub fn patch_document_data(data: &ContentNode, ctx: &ResolveContext<'_>) -> Value {
    match patch_node(data, ctx) {
        Some(value @ Value::Object(_)) => value,
        _ => Value::Object(Map::new()),
    }
}

/// Patch one node; `None` drops it from its parent
pub fn patch_node(node: &ContentNode, ctx: &ResolveContext<'_>) -> Option<Value> {
    match node {
        ContentNode::Json(value) => patch_json(value, ctx),
        ContentNode::Field(field) => patch_field(field, ctx),
        ContentNode::Array(items) => Some(Value::Array(
            items.iter().filter_map(|item| patch_node(item, ctx)).collect(),
        )),
        ContentNode::Object(map) => Some(Value::Object(
            map.iter()
                .filter_map(|(key, item)| patch_node(item, ctx).map(|value| (key.clone(), value)))
                .collect(),
        )),
    }
}

/// Patch a link node, `None` when it does not resolve to a target
pub(crate) fn patch_link(node: &ContentNode, ctx: &ResolveContext<'_>) -> Option<Value> {
    let value = match node {
        ContentNode::Field(field) => {
            field.resolve(ctx);
            field.resolved().cloned()
        }
        other => patch_node(other, ctx),
    }?;
    (shape::link_type(&value) != Some(LinkType::Any)).then_some(value)
}

fn patch_field(field: &FieldRef, ctx: &ResolveContext<'_>) -> Option<Value> {
    field.resolve(ctx);
    if let Some(value) = field.resolved() {
        return Some(value.clone());
    }
    warn!(
        kind = ?field.kind(),
        reference = %field.describe(),
        "Unresolved reference, degrading to empty value"
    );
    field.degraded()
}

/// Patch raw JSON, mapping foreign ids through the lookup maps
pub fn patch_json(value: &Value, ctx: &ResolveContext<'_>) -> Option<Value> {
    if let Some(link_type) = shape::link_type(value) {
        return Some(patch_raw_link(value, link_type, ctx));
    }
    match shape::classify(value) {
        Shape::RichTextImageNode => patch_raw_rt_image(value, ctx),
        Shape::Image => Some(patch_raw_image(value, ctx)),
        Shape::Document => {
            let id = shape::str_member(value, "id").unwrap_or_default();
            Some(match ctx.documents.get_by_id(id) {
                Some(document) => document.to_relationship(None),
                None => degrade(FieldKind::ContentRelationship, id, empty_link(None)),
            })
        }
        Shape::Array => Some(Value::Array(
            value
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|item| patch_json(item, ctx))
                .collect(),
        )),
        Shape::Object if shape::is_embed_node(value) => Some(value.clone()),
        Shape::Object => Some(Value::Object(
            value
                .as_object()
                .into_iter()
                .flatten()
                .filter_map(|(key, item)| patch_json(item, ctx).map(|value| (key.clone(), value)))
                .collect(),
        )),
        // Link shapes were handled above
        Shape::LinkToMedia | Shape::ContentRelationship | Shape::Primitive => Some(value.clone()),
    }
}

fn patch_raw_link(value: &Value, link_type: LinkType, ctx: &ResolveContext<'_>) -> Value {
    let text = shape::non_empty_str_member(value, "text");
    let Some(id) = shape::non_empty_str_member(value, "id") else {
        return value.clone();
    };
    match link_type {
        LinkType::Document => match ctx.documents.get_by_id(id) {
            Some(document) => document.to_relationship(text),
            None => degrade(FieldKind::ContentRelationship, id, empty_link(text)),
        },
        LinkType::Media => match ctx.assets.get(id) {
            Some(asset) => media_link(asset, text),
            None => degrade(FieldKind::LinkToMedia, id, empty_link(text)),
        },
        LinkType::Web | LinkType::Any => value.clone(),
    }
}

fn patch_raw_image(value: &Value, ctx: &ResolveContext<'_>) -> Value {
    let id = shape::str_member(value, "id").unwrap_or_default();
    let Some(asset) = ctx.assets.get(id) else {
        return degrade(FieldKind::Image, id, empty_image());
    };

    let mut image = image_from_asset(asset, Some(value), None, None);
    if let Value::Object(map) = &mut image {
        for (name, thumb) in shape::image_thumbnails(value) {
            let thumb_asset = shape::str_member(thumb, "id")
                .and_then(|thumb_id| ctx.assets.get(thumb_id))
                .unwrap_or(asset);
            map.insert(
                name.clone(),
                image_from_asset(thumb_asset, Some(thumb), None, None),
            );
        }
    }
    image
}

fn patch_raw_rt_image(value: &Value, ctx: &ResolveContext<'_>) -> Option<Value> {
    let id = shape::str_member(value, "id").unwrap_or_default();
    let Some(asset) = ctx.assets.get(id) else {
        warn!(asset_id = %id, "Rich-text image asset missing, dropping node");
        return None;
    };

    let mut node = image_from_asset(asset, Some(value), None, None);
    if let Value::Object(map) = &mut node {
        map.insert("type".into(), Value::String("image".into()));
        let link = value
            .get("linkTo")
            .and_then(|link| patch_json(link, ctx))
            .filter(|link| link.is_object() && shape::link_type(link) != Some(LinkType::Any));
        if let Some(link) = link {
            map.insert("linkTo".into(), link);
        }
    }
    Some(node)
}

fn degrade(kind: FieldKind, id: &str, placeholder: Value) -> Value {
    warn!(kind = ?kind, reference = %id, "Unresolved reference, degrading to empty value");
    placeholder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{DocumentReference, MigrationContentRelationship, MigrationImage};
    use crate::maps::{AssetMap, DocumentKey, DocumentMap, ResolvedDocument};
    use crate::registry::Migration;
    use crate::types::Asset;
    use serde_json::json;

    fn asset(id: &str) -> Asset {
        Asset {
            id: id.into(),
            url: format!("https://cdn.example.io/repo/{}.png", id),
            filename: format!("{}.png", id),
            extension: None,
            size: 1,
            kind: "image".into(),
            width: Some(4),
            height: Some(3),
            notes: None,
            credits: None,
            alt: None,
            tags: Vec::new(),
            created_at: None,
            last_modified: None,
        }
    }

    fn document(id: &str) -> ResolvedDocument {
        ResolvedDocument {
            id: id.into(),
            uid: Some("u".into()),
            doc_type: "page".into(),
            tags: Vec::new(),
            lang: "en-us".into(),
        }
    }

    struct Fixture {
        assets: AssetMap,
        documents: DocumentMap,
        migration: Migration,
    }

    impl Fixture {
        fn new() -> Self {
            let mut assets = AssetMap::new();
            assets.insert("old-img", asset("new-img"));
            assets.insert("old-file", asset("new-file"));
            let mut documents = DocumentMap::new();
            documents.insert(DocumentKey::Id("old-doc".into()), document("new-doc"));
            Self {
                assets,
                documents,
                migration: Migration::new(),
            }
        }

        fn ctx(&self) -> ResolveContext<'_> {
            ResolveContext::new(&self.assets, &self.documents, &self.migration)
        }
    }

    #[test]
    fn test_raw_links_mapped() {
        let fixture = Fixture::new();
        let data = json!({
            "doc": { "link_type": "Document", "id": "old-doc", "text": "go" },
            "file": { "link_type": "Media", "id": "old-file", "url": "https://x.io/f" },
            "web": { "link_type": "Web", "url": "https://example.org", "target": "_blank" },
            "empty": { "link_type": "Any" }
        });

        let patched = patch_json(&data, &fixture.ctx()).unwrap();

        assert_eq!(patched["doc"]["id"], "new-doc");
        assert_eq!(patched["doc"]["text"], "go");
        assert_eq!(patched["file"], json!({ "link_type": "Media", "id": "new-file" }));
        assert_eq!(patched["web"], data["web"]);
        assert_eq!(patched["empty"], data["empty"]);
    }

    #[test]
    fn test_hyperlink_spans_use_link_rules() {
        let fixture = Fixture::new();
        let data = json!({
            "body": [{
                "type": "paragraph",
                "text": "one two three",
                "spans": [
                    { "type": "strong", "start": 0, "end": 3 },
                    { "type": "hyperlink", "start": 0, "end": 3,
                      "data": { "link_type": "Document", "id": "old-doc" } },
                    { "type": "hyperlink", "start": 4, "end": 7,
                      "data": { "link_type": "Document", "id": "gone" } },
                    { "type": "hyperlink", "start": 8, "end": 13,
                      "data": { "link_type": "Web", "url": "https://example.org" } }
                ]
            }]
        });

        let patched = patch_json(&data, &fixture.ctx()).unwrap();
        let spans = &patched["body"][0]["spans"];

        assert_eq!(spans[0], data["body"][0]["spans"][0]);
        assert_eq!(spans[1]["data"]["id"], "new-doc");
        assert_eq!(spans[1]["start"], 0);
        assert_eq!(spans[2]["data"], json!({ "link_type": "Any" }));
        assert_eq!(spans[2]["end"], 7);
        assert_eq!(spans[3], data["body"][0]["spans"][3]);
    }

    #[test]
    fn test_missing_targets_degrade() {
        let fixture = Fixture::new();
        let data = json!({
            "doc": { "link_type": "Document", "id": "gone", "text": "keep me" },
            "img": { "id": "gone", "url": "https://x.io/i.png", "dimensions": { "width": 1, "height": 1 } },
            "body": [
                { "type": "image", "id": "gone", "url": "https://x.io/i.png", "dimensions": {} },
                { "type": "paragraph", "text": "still here", "spans": [] }
            ]
        });

        let patched = patch_json(&data, &fixture.ctx()).unwrap();

        assert_eq!(patched["doc"], json!({ "link_type": "Any", "text": "keep me" }));
        assert_eq!(patched["img"], json!({}));
        assert_eq!(patched["body"].as_array().unwrap().len(), 1);
        assert_eq!(patched["body"][0]["type"], "paragraph");
    }

    #[test]
    fn test_raw_image_thumbnails_fall_back_to_parent() {
        let fixture = Fixture::new();
        let data = json!({
            "id": "old-img",
            "url": "https://x.io/i.png?w=10",
            "dimensions": { "width": 1, "height": 1 },
            "mobile": { "id": "unknown", "url": "https://x.io/m.png", "dimensions": { "width": 1, "height": 1 } }
        });

        let patched = patch_json(&data, &fixture.ctx()).unwrap();

        assert_eq!(patched["id"], "new-img");
        assert_eq!(patched["url"], "https://cdn.example.io/repo/new-img.png?w=10");
        assert_eq!(patched["mobile"]["id"], "new-img");
    }

    #[test]
    fn test_embed_verbatim() {
        let fixture = Fixture::new();
        let embed = json!({
            "type": "embed",
            "oembed": { "embed_url": "https://video.io/1", "html": "<iframe></iframe>", "type": "video" }
        });
        assert_eq!(patch_json(&embed, &fixture.ctx()), Some(embed));
    }

    #[test]
    fn test_field_nodes_resolved_and_degraded() {
        let fixture = Fixture::new();
        let data = ContentNode::object([
            ("hero", ContentNode::from(MigrationImage::new("old-img", None))),
            ("broken_image", ContentNode::from(MigrationImage::new("nope", None))),
            (
                "link",
                ContentNode::from(MigrationContentRelationship::new(
                    DocumentReference::id("old-doc"),
                    None,
                )),
            ),
            (
                "broken_link",
                ContentNode::from(MigrationContentRelationship::new(
                    DocumentReference::id("nope"),
                    Some("label".into()),
                )),
            ),
            (
                "body",
                ContentNode::array([
                    ContentNode::from(MigrationImage::new("nope", None).as_rt_image_node(None)),
                    ContentNode::from(json!({ "type": "paragraph", "text": "x", "spans": [] })),
                ]),
            ),
        ]);

        let patched = patch_document_data(&data, &fixture.ctx());

        assert_eq!(patched["hero"]["id"], "new-img");
        assert_eq!(patched["broken_image"], json!({}));
        assert_eq!(patched["link"]["id"], "new-doc");
        assert_eq!(patched["broken_link"], json!({ "link_type": "Any", "text": "label" }));
        assert_eq!(patched["body"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_non_object_data_becomes_empty_object() {
        let fixture = Fixture::new();
        let data = ContentNode::from(json!("not an object"));
        assert_eq!(patch_document_data(&data, &fixture.ctx()), json!({}));
    }
}
