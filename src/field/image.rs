//! Asset-backed fields

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

use super::ResolveContext;
use crate::asset::strip_query;
use crate::content::ContentNode;
use crate::shape;
use crate::types::Asset;

/// Crop applied when neither an override nor the initial field has one
fn default_edit() -> Value {
    json!({ "x": 0, "y": 0, "zoom": 1, "background": "transparent" })
}

/// Build a filled image value for `asset`
///
/// The URL keeps the initial field's query parameters (image processing
/// options), falling back to the asset's own. Crop and alt text come from
/// the overrides first, then the initial field.
pub(crate) fn image_from_asset(
    asset: &Asset,
    initial: Option<&Value>,
    alt_override: Option<&str>,
    crop_override: Option<&Value>,
) -> Value {
    let query = initial
        .and_then(|field| shape::str_member(field, "url"))
        .and_then(|url| url.split_once('?'))
        .or_else(|| asset.url.split_once('?'))
        .map(|(_, query)| query)
        .filter(|query| !query.is_empty());
    let base = strip_query(&asset.url);
    let url = match query {
        Some(query) => format!("{}?{}", base, query),
        None => base.to_string(),
    };

    let edit = crop_override
        .cloned()
        .or_else(|| initial.and_then(|field| field.get("edit")).cloned())
        .filter(Value::is_object)
        .unwrap_or_else(default_edit);

    let alt = alt_override
        .or_else(|| initial.and_then(|field| shape::non_empty_str_member(field, "alt")))
        .or(asset.alt.as_deref().filter(|alt| !alt.is_empty()));

    let mut image = Map::new();
    image.insert("id".into(), json!(asset.id));
    image.insert("url".into(), json!(url));
    image.insert(
        "dimensions".into(),
        json!({ "width": asset.width, "height": asset.height }),
    );
    image.insert("edit".into(), edit);
    image.insert("alt".into(), json!(alt));
    image.insert("copyright".into(), json!(asset.credits));
    Value::Object(image)
}

/// Image field backed by a staged asset
#[derive(Debug, Clone)]
pub struct MigrationImage {
    config_id: String,
    initial: Option<Value>,
    alt_override: Option<String>,
    crop_override: Option<Value>,
    thumbnails: BTreeMap<String, MigrationImage>,
    resolved: OnceLock<Value>,
}

impl MigrationImage {
    pub(crate) fn new(config_id: impl Into<String>, initial: Option<Value>) -> Self {
        Self {
            config_id: config_id.into(),
            initial,
            alt_override: None,
            crop_override: None,
            thumbnails: BTreeMap::new(),
            resolved: OnceLock::new(),
        }
    }

    /// Asset config id this image points at
    pub fn config_id(&self) -> &str {
        &self.config_id
    }

    /// Field value the image was registered from
    pub fn initial(&self) -> Option<&Value> {
        self.initial.as_ref()
    }

    /// Replace the alt text carried over from the initial field
    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.alt_override = Some(alt.into());
        self
    }

    /// Replace the crop rectangle carried over from the initial field
    pub fn with_crop(mut self, edit: Value) -> Self {
        self.crop_override = Some(edit);
        self
    }

    /// Attach a named thumbnail, resolved alongside this image
    pub fn add_thumbnail(&mut self, name: impl Into<String>, thumbnail: MigrationImage) {
        self.thumbnails.insert(name.into(), thumbnail.unresolved());
    }

    pub fn with_thumbnail(mut self, name: impl Into<String>, thumbnail: MigrationImage) -> Self {
        self.add_thumbnail(name, thumbnail);
        self
    }

    pub fn thumbnails(&self) -> &BTreeMap<String, MigrationImage> {
        &self.thumbnails
    }

    /// Link-to-media field for the same asset
    pub fn as_link_to_media(&self, text: Option<String>) -> MigrationLinkToMedia {
        MigrationLinkToMedia::new(self.config_id.clone(), text)
    }

    /// Rich-text image node for the same asset, keeping crop and alt text
    pub fn as_rt_image_node(&self, link_to: Option<ContentNode>) -> MigrationRtImageNode {
        MigrationRtImageNode::new(self.unresolved(), link_to)
    }

    pub fn resolve(&self, ctx: &ResolveContext<'_>) {
        if self.resolved.get().is_some() {
            return;
        }
        let Some(asset) = ctx.assets.get(&self.config_id) else {
            debug!(asset_id = %self.config_id, "Image asset not in asset map");
            return;
        };

        let mut value = image_from_asset(
            asset,
            self.initial.as_ref(),
            self.alt_override.as_deref(),
            self.crop_override.as_ref(),
        );
        for (name, thumbnail) in &self.thumbnails {
            thumbnail.resolve(ctx);
            if let (Some(resolved), Value::Object(image)) = (thumbnail.resolved(), &mut value) {
                image.insert(name.clone(), resolved.clone());
            }
        }
        let _ = self.resolved.set(value);
    }

    pub fn resolved(&self) -> Option<&Value> {
        self.resolved.get()
    }

    /// Copy without resolution state
    fn unresolved(&self) -> Self {
        Self {
            config_id: self.config_id.clone(),
            initial: self.initial.clone(),
            alt_override: self.alt_override.clone(),
            crop_override: self.crop_override.clone(),
            thumbnails: self
                .thumbnails
                .iter()
                .map(|(name, thumb)| (name.clone(), thumb.unresolved()))
                .collect(),
            resolved: OnceLock::new(),
        }
    }
}

/// Link-to-media field backed by a staged asset
#[derive(Debug, Clone)]
pub struct MigrationLinkToMedia {
    config_id: String,
    text: Option<String>,
    resolved: OnceLock<Value>,
}

impl MigrationLinkToMedia {
    pub(crate) fn new(config_id: impl Into<String>, text: Option<String>) -> Self {
        Self {
            config_id: config_id.into(),
            text: text.filter(|t| !t.is_empty()),
            resolved: OnceLock::new(),
        }
    }

    pub fn config_id(&self) -> &str {
        &self.config_id
    }

    /// Display text
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn resolve(&self, ctx: &ResolveContext<'_>) {
        if self.resolved.get().is_some() {
            return;
        }
        if let Some(asset) = ctx.assets.get(&self.config_id) {
            let _ = self.resolved.set(media_link(asset, self.text.as_deref()));
        }
    }

    pub fn resolved(&self) -> Option<&Value> {
        self.resolved.get()
    }
}

/// Filled link-to-media value for `asset`
pub(crate) fn media_link(asset: &Asset, text: Option<&str>) -> Value {
    let mut link = Map::new();
    link.insert("link_type".into(), json!("Media"));
    link.insert("id".into(), json!(asset.id));
    if let Some(text) = text {
        link.insert("text".into(), json!(text));
    }
    Value::Object(link)
}

/// Rich-text image node: an image plus an optional link
#[derive(Debug, Clone)]
pub struct MigrationRtImageNode {
    image: MigrationImage,
    link_to: Option<ContentNode>,
    resolved: OnceLock<Value>,
}

impl MigrationRtImageNode {
    pub(crate) fn new(image: MigrationImage, link_to: Option<ContentNode>) -> Self {
        Self {
            image,
            link_to,
            resolved: OnceLock::new(),
        }
    }

    pub fn image(&self) -> &MigrationImage {
        &self.image
    }

    pub fn link_to(&self) -> Option<&ContentNode> {
        self.link_to.as_ref()
    }

    /// Resolve the link first, then the node itself
    pub fn resolve(&self, ctx: &ResolveContext<'_>) {
        if self.resolved.get().is_some() {
            return;
        }
        let link = self
            .link_to
            .as_ref()
            .and_then(|link| crate::patch::patch_link(link, ctx));

        self.image.resolve(ctx);
        let Some(Value::Object(image)) = self.image.resolved() else {
            return;
        };

        let mut node = image.clone();
        node.insert("type".into(), json!("image"));
        if let Some(link) = link {
            node.insert("linkTo".into(), link);
        }
        let _ = self.resolved.set(Value::Object(node));
    }

    pub fn resolved(&self) -> Option<&Value> {
        self.resolved.get()
    }
}
