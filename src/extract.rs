//! Dependency extraction
//!
//! Walks a document's content tree at registration time. Filled asset and
//! document references found in raw JSON are registered and replaced with
//! lazy fields; every field in the result is listed as a dependency so the
//! update phase can resolve them before patching.
//!
//! Raw values are classified with [`shape::classify`]. Rich-text embed nodes
//! are kept verbatim without descending into their `oembed` payload.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::asset::{AssetInput, AssetMetadata, AssetTable};
use crate::content::ContentNode;
use crate::error::Result;
use crate::field::{
    DocumentReference, FieldRef, MigrationContentRelationship, MigrationField, MigrationImage,
};
use crate::registry::register_asset;
use crate::shape::{self, Shape};
use crate::types::{LinkType, RemoteDocument};

/// Content tree with fields substituted, plus the fields it holds
#[derive(Debug)]
pub struct Extraction {
    pub data: ContentNode,
    pub dependencies: Vec<FieldRef>,
}

/// Extract lazy fields from `data`, staging any assets they reference
pub fn extract_dependencies(data: ContentNode, assets: &mut AssetTable) -> Result<Extraction> {
    let mut extractor = Extractor {
        assets,
        dependencies: Vec::new(),
    };
    let data = extractor.node(data)?;
    Ok(Extraction {
        data,
        dependencies: extractor.dependencies,
    })
}

struct Extractor<'a> {
    assets: &'a mut AssetTable,
    dependencies: Vec<FieldRef>,
}

impl Extractor<'_> {
    fn node(&mut self, node: ContentNode) -> Result<ContentNode> {
        match node {
            ContentNode::Json(value) => self.json(value),
            ContentNode::Field(field) => Ok(self.push(field)),
            ContentNode::Array(items) => Ok(ContentNode::Array(
                items
                    .into_iter()
                    .map(|item| self.node(item))
                    .collect::<Result<_>>()?,
            )),
            ContentNode::Object(map) => Ok(ContentNode::Object(
                map.into_iter()
                    .map(|(key, item)| Ok((key, self.node(item)?)))
                    .collect::<Result<_>>()?,
            )),
        }
    }

    fn json(&mut self, value: Value) -> Result<ContentNode> {
        match shape::classify(&value) {
            Shape::LinkToMedia => {
                let text = shape::non_empty_str_member(&value, "text").map(str::to_string);
                let image = self.asset(value)?;
                Ok(self.field(MigrationField::LinkToMedia(image.as_link_to_media(text))))
            }
            Shape::RichTextImageNode => {
                let link_to = match value.get("linkTo") {
                    Some(link) if is_meaningful_link(link) => Some(self.json(link.clone())?),
                    _ => None,
                };
                let image = self.image(value)?;
                Ok(self.field(MigrationField::RichTextImageNode(
                    image.as_rt_image_node(link_to),
                )))
            }
            Shape::Image => {
                let image = self.image(value)?;
                Ok(self.field(MigrationField::Image(image)))
            }
            Shape::ContentRelationship => Ok(self.field(MigrationField::ContentRelationship(
                MigrationContentRelationship::new(DocumentReference::Link(value), None),
            ))),
            Shape::Document => match serde_json::from_value::<RemoteDocument>(value.clone()) {
                Ok(document) => Ok(self.field(MigrationField::ContentRelationship(
                    MigrationContentRelationship::new(document, None),
                ))),
                Err(_) => self.object(value),
            },
            Shape::Array => match value {
                Value::Array(items) => Ok(ContentNode::Array(
                    items
                        .into_iter()
                        .map(|item| self.json(item))
                        .collect::<Result<_>>()?,
                )),
                other => Ok(ContentNode::Json(other)),
            },
            Shape::Object if shape::is_embed_node(&value) => Ok(ContentNode::Json(value)),
            Shape::Object => self.object(value),
            Shape::Primitive => Ok(ContentNode::Json(value)),
        }
    }

    fn object(&mut self, value: Value) -> Result<ContentNode> {
        match value {
            Value::Object(map) => Ok(ContentNode::Object(
                map.into_iter()
                    .map(|(key, item)| Ok((key, self.json(item)?)))
                    .collect::<Result<BTreeMap<_, _>>>()?,
            )),
            other => Ok(ContentNode::Json(other)),
        }
    }

    /// Register a filled image and its named thumbnails
    fn image(&mut self, value: Value) -> Result<MigrationImage> {
        let thumbnails: Vec<(String, Value)> = shape::image_thumbnails(&value)
            .map(|(name, thumb)| (name.clone(), thumb.clone()))
            .collect();
        let mut image = self.asset(value)?;
        for (name, thumb) in thumbnails {
            let thumbnail = self.asset(thumb)?;
            image.add_thumbnail(name, thumbnail);
        }
        Ok(image)
    }

    fn asset(&mut self, value: Value) -> Result<MigrationImage> {
        register_asset(
            self.assets,
            AssetInput::Field(value),
            None,
            AssetMetadata::default(),
        )
    }

    fn field(&mut self, field: MigrationField) -> ContentNode {
        self.push(FieldRef::new(field))
    }

    fn push(&mut self, field: FieldRef) -> ContentNode {
        self.dependencies.push(field.clone());
        ContentNode::Field(field)
    }
}

/// Whether a rich-text image link carries a target
fn is_meaningful_link(link: &Value) -> bool {
    match shape::link_type(link) {
        Some(LinkType::Any) | None => false,
        Some(_) => link.as_object().is_some_and(|map| map.len() > 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldKind;
    use serde_json::json;

    fn image(id: &str) -> Value {
        json!({
            "id": id,
            "url": format!("https://cdn.example.io/repo/{}.png", id),
            "dimensions": { "width": 10, "height": 10 },
            "edit": { "x": 0, "y": 0, "zoom": 1, "background": "transparent" },
            "alt": null,
            "copyright": null
        })
    }

    fn kinds(extraction: &Extraction) -> Vec<FieldKind> {
        extraction.dependencies.iter().map(|f| f.kind()).collect()
    }

    #[test]
    fn test_extracts_from_every_level() {
        let data = json!({
            "hero": image("hero"),
            "group": [{ "link": { "link_type": "Document", "id": "d1", "type": "page", "lang": "en-us" } }],
            "slices": [{
                "slice_type": "gallery",
                "primary": { "file": { "link_type": "Media", "id": "f1", "url": "https://cdn.example.io/f1.pdf", "name": "f1.pdf" } },
                "items": [{ "photo": image("p1") }]
            }],
            "title": [{ "type": "heading1", "text": "Hi", "spans": [] }]
        });

        let mut assets = AssetTable::new();
        let extraction = extract_dependencies(data.into(), &mut assets).unwrap();

        assert_eq!(extraction.dependencies.len(), 4);
        assert!(kinds(&extraction).contains(&FieldKind::ContentRelationship));
        assert!(kinds(&extraction).contains(&FieldKind::LinkToMedia));
        assert_eq!(assets.len(), 3);
        assert_eq!(extraction.data.fields().len(), 4);
    }

    #[test]
    fn test_rich_text_image_node() {
        let mut node = image("rt");
        node["type"] = json!("image");
        node["linkTo"] = json!({ "link_type": "Media", "id": "f1", "url": "https://cdn.example.io/f1.pdf" });
        let data = json!({ "body": [node, { "type": "paragraph", "text": "x", "spans": [] }] });

        let mut assets = AssetTable::new();
        let extraction = extract_dependencies(data.into(), &mut assets).unwrap();

        // the node and its media link
        assert_eq!(extraction.dependencies.len(), 2);
        let body = extraction.data.get("body").unwrap();
        let rt = body.at(0).unwrap().as_field().unwrap();
        assert_eq!(rt.kind(), FieldKind::RichTextImageNode);
        assert_eq!(assets.len(), 2);
    }

    #[test]
    fn test_thumbnails_registered() {
        let mut main = image("main");
        main["mobile"] = image("mobile");
        let mut assets = AssetTable::new();
        let extraction = extract_dependencies(json!({ "img": main }).into(), &mut assets).unwrap();

        assert_eq!(extraction.dependencies.len(), 1);
        assert_eq!(assets.len(), 2);
        match &*extraction.dependencies[0] {
            MigrationField::Image(image) => assert!(image.thumbnails().contains_key("mobile")),
            other => panic!("unexpected field {:?}", other),
        }
    }

    #[test]
    fn test_empty_fields_untouched() {
        let data = json!({
            "img": {},
            "link": { "link_type": "Any" },
            "embed": { "type": "embed", "oembed": { "id": "x", "url": "https://y.io", "dimensions": {} } }
        });
        let mut assets = AssetTable::new();
        let extraction = extract_dependencies(data.clone().into(), &mut assets).unwrap();

        assert!(extraction.dependencies.is_empty());
        assert!(assets.is_empty());
        assert_eq!(extraction.data.to_json(), Some(data));
    }

    #[test]
    fn test_same_asset_twice_registers_once() {
        let data = json!({ "a": image("same"), "b": image("same") });
        let mut assets = AssetTable::new();
        let extraction = extract_dependencies(data.into(), &mut assets).unwrap();

        assert_eq!(extraction.dependencies.len(), 2);
        assert_eq!(assets.len(), 1);
    }
}
