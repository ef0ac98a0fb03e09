//! Structural shape predicates over raw content JSON
//!
//! Raw field values carry no reliable type discriminant: a filled image, a
//! link to media and a content relationship are all plain objects. They are
//! told apart by the members they carry, checked in a fixed order.
//!
//! ## Precedence
//!
//! [`classify`] applies the checks in this order, and the order matters:
//! a rich-text image node is also a structurally valid image, and a
//! filled link to media also carries `id` and `url`.
//!
//! 1. Filled link to media (`link_type: "Media"` with `id` and `url`)
//! 2. Filled rich-text image node (`type: "image"` plus image members)
//! 3. Filled image (`id`, `url`, `dimensions`)
//! 4. Filled content relationship (`link_type: "Document"` with `id`), or a
//!    bare document object (`id`, `type`, `lang`, `data`)
//! 5. Array
//! 6. Plain object
//! 7. Primitive

use serde_json::Value;

use crate::types::LinkType;

/// Members that belong to the image itself rather than to a thumbnail
const IMAGE_MEMBERS: &[&str] = &[
    "id",
    "url",
    "dimensions",
    "edit",
    "alt",
    "copyright",
    "type",
    "linkTo",
];

/// Result of [`classify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    LinkToMedia,
    RichTextImageNode,
    Image,
    ContentRelationship,
    Document,
    Array,
    Object,
    Primitive,
}

/// Classify a raw value following the documented precedence
pub fn classify(value: &Value) -> Shape {
    if is_filled_link_to_media(value) {
        Shape::LinkToMedia
    } else if is_filled_rt_image_node(value) {
        Shape::RichTextImageNode
    } else if is_filled_image(value) {
        Shape::Image
    } else if is_filled_content_relationship(value) {
        Shape::ContentRelationship
    } else if is_document(value) {
        Shape::Document
    } else if value.is_array() {
        Shape::Array
    } else if value.is_object() {
        Shape::Object
    } else {
        Shape::Primitive
    }
}

/// String member of an object
pub fn str_member<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// String member of an object, ignoring empty strings
pub fn non_empty_str_member<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    str_member(value, key).filter(|s| !s.is_empty())
}

/// Link discriminant, if the value is a link field
pub fn link_type(value: &Value) -> Option<LinkType> {
    str_member(value, "link_type").and_then(LinkType::parse)
}

pub fn is_filled_image(value: &Value) -> bool {
    value.is_object()
        && non_empty_str_member(value, "id").is_some()
        && non_empty_str_member(value, "url").is_some()
        && value.get("dimensions").is_some_and(Value::is_object)
}

pub fn is_filled_rt_image_node(value: &Value) -> bool {
    str_member(value, "type") == Some("image") && is_filled_image(value)
}

pub fn is_filled_link_to_media(value: &Value) -> bool {
    link_type(value) == Some(LinkType::Media)
        && non_empty_str_member(value, "id").is_some()
        && non_empty_str_member(value, "url").is_some()
}

pub fn is_filled_content_relationship(value: &Value) -> bool {
    link_type(value) == Some(LinkType::Document) && non_empty_str_member(value, "id").is_some()
}

/// A whole document object, as returned by the content API
pub fn is_document(value: &Value) -> bool {
    value.get("link_type").is_none()
        && non_empty_str_member(value, "id").is_some()
        && str_member(value, "type").is_some()
        && str_member(value, "lang").is_some()
        && value.get("data").is_some_and(Value::is_object)
}

/// Rich-text embed node, copied verbatim
pub fn is_embed_node(value: &Value) -> bool {
    str_member(value, "type") == Some("embed") && value.get("oembed").is_some()
}

/// Named thumbnails of a filled image
pub fn image_thumbnails(value: &Value) -> impl Iterator<Item = (&String, &Value)> {
    value
        .as_object()
        .into_iter()
        .flat_map(|map| map.iter())
        .filter(|(key, member)| !IMAGE_MEMBERS.contains(&key.as_str()) && is_filled_image(member))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image() -> Value {
        json!({
            "id": "img",
            "url": "https://images.example.io/img.png",
            "dimensions": { "width": 1, "height": 1 }
        })
    }

    #[test]
    fn test_precedence_rt_image_before_image() {
        let mut node = image();
        node["type"] = json!("image");
        assert!(is_filled_image(&node));
        assert_eq!(classify(&node), Shape::RichTextImageNode);
    }

    #[test]
    fn test_precedence_media_before_relationship() {
        let media = json!({ "link_type": "Media", "id": "f", "url": "https://x.io/f.pdf" });
        assert_eq!(classify(&media), Shape::LinkToMedia);

        let doc = json!({ "link_type": "Document", "id": "d", "type": "page", "lang": "en-us" });
        assert_eq!(classify(&doc), Shape::ContentRelationship);
    }

    #[test]
    fn test_empty_links_are_plain_objects() {
        assert_eq!(classify(&json!({ "link_type": "Any" })), Shape::Object);
        assert_eq!(classify(&json!({ "link_type": "Media" })), Shape::Object);
        assert_eq!(classify(&json!({ "link_type": "Web", "url": "https://x.io" })), Shape::Object);
    }

    #[test]
    fn test_empty_image_is_plain_object() {
        assert_eq!(classify(&json!({})), Shape::Object);
        assert_eq!(classify(&json!({ "url": null, "dimensions": null })), Shape::Object);
    }

    #[test]
    fn test_document_shape() {
        let doc = json!({ "id": "d", "type": "page", "lang": "en-us", "data": {} });
        assert_eq!(classify(&doc), Shape::Document);
    }

    #[test]
    fn test_thumbnails() {
        let mut img = image();
        img["mobile"] = image();
        img["alt"] = json!("x");
        let names: Vec<_> = image_thumbnails(&img).map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["mobile"]);
    }
}
