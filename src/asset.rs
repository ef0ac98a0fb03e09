//! Staged asset configuration
//!
//! An [`AssetConfig`] describes an asset to upload during the asset phase.
//! Configs are keyed by `id`, never by value: registering the same id again
//! merges metadata into the existing entry.
//!
//! ## Identity
//!
//! | Input | Config id |
//! |-------|-----------|
//! | Raw bytes | `sha256-<hex digest>` of the bytes |
//! | URL | the URL itself |
//! | Existing asset | the asset id |
//! | Filled image / link-to-media field | the field's asset id |

use bytes::Bytes;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::error::{MigrationError, Result};
use crate::shape;
use crate::types::Asset;

/// Maximum length of notes, credits and alt text
pub const MAX_METADATA_LEN: usize = 500;

/// Minimum tag length
pub const MIN_TAG_LEN: usize = 3;

/// Maximum tag length
pub const MAX_TAG_LEN: usize = 20;

/// Where the asset content comes from
#[derive(Debug, Clone, PartialEq)]
pub enum AssetSource {
    /// Local bytes, uploaded as-is
    Bytes(Bytes),
    /// Foreign URL, downloaded then re-uploaded
    Url(String),
    /// Asset already stored remotely; re-uploaded from its URL only when
    /// the destination repository does not know its id
    Existing(String),
}

impl AssetSource {
    /// URL to fetch, for non-local sources
    pub fn url(&self) -> Option<&str> {
        match self {
            AssetSource::Bytes(_) => None,
            AssetSource::Url(url) | AssetSource::Existing(url) => Some(url),
        }
    }
}

/// Input accepted by asset registration
#[derive(Debug, Clone)]
pub enum AssetInput {
    /// Raw file content; requires a filename
    Bytes(Bytes),
    /// Foreign URL
    Url(String),
    /// Asset from an asset listing
    Asset(Box<Asset>),
    /// Filled image field or filled link-to-media field
    Field(Value),
}

impl From<Vec<u8>> for AssetInput {
    fn from(data: Vec<u8>) -> Self {
        AssetInput::Bytes(Bytes::from(data))
    }
}

impl From<Bytes> for AssetInput {
    fn from(data: Bytes) -> Self {
        AssetInput::Bytes(data)
    }
}

impl From<Asset> for AssetInput {
    fn from(asset: Asset) -> Self {
        AssetInput::Asset(Box::new(asset))
    }
}

impl From<Value> for AssetInput {
    fn from(field: Value) -> Self {
        AssetInput::Field(field)
    }
}

/// Optional asset metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetMetadata {
    pub notes: Option<String>,
    pub credits: Option<String>,
    pub alt: Option<String>,
    pub tags: Vec<String>,
}

impl AssetMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_credits(mut self, credits: impl Into<String>) -> Self {
        self.credits = Some(credits.into());
        self
    }

    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = Some(alt.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Check length constraints on every member
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        for (name, value) in [
            ("notes", &self.notes),
            ("credits", &self.credits),
            ("alt", &self.alt),
        ] {
            if let Some(value) = value {
                if value.chars().count() > MAX_METADATA_LEN {
                    errors.push(format!(
                        "`{}` must be at most {} characters",
                        name, MAX_METADATA_LEN
                    ));
                }
            }
        }

        if self.tags.iter().any(|tag| {
            let len = tag.chars().count();
            !(MIN_TAG_LEN..=MAX_TAG_LEN).contains(&len)
        }) {
            errors.push(format!(
                "tags must be at least {} characters long and {} characters at most",
                MIN_TAG_LEN, MAX_TAG_LEN
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(MigrationError::Validation(format!(
                "Errors validating asset metadata: {}",
                errors.join(", ")
            )))
        }
    }
}

/// A staged asset
#[derive(Debug, Clone, PartialEq)]
pub struct AssetConfig {
    /// Dedup key
    pub id: String,
    pub source: AssetSource,
    pub filename: String,
    pub notes: Option<String>,
    pub credits: Option<String>,
    pub alt: Option<String>,
    /// Tag names, deduplicated, in first-seen order
    pub tags: Vec<String>,
}

impl AssetConfig {
    /// Normalize a registration input into a config
    ///
    /// Returns the config plus the initial field value when the input was a
    /// filled image, so the image field can keep its crop and alt text.
    pub fn from_input(
        input: AssetInput,
        filename: Option<&str>,
        metadata: AssetMetadata,
    ) -> Result<(Self, Option<Value>)> {
        let (config, initial) = match input {
            AssetInput::Bytes(data) => {
                let filename = filename
                    .filter(|f| !f.is_empty())
                    .ok_or_else(|| {
                        MigrationError::Validation(
                            "a filename is required when registering raw bytes".into(),
                        )
                    })?
                    .to_string();
                let config = Self {
                    id: bytes_id(&data),
                    source: AssetSource::Bytes(data),
                    filename,
                    notes: None,
                    credits: None,
                    alt: None,
                    tags: Vec::new(),
                };
                (config, None)
            }
            AssetInput::Url(raw) => {
                let parsed = url::Url::parse(&raw).map_err(|e| {
                    MigrationError::Validation(format!("invalid asset URL {}: {}", raw, e))
                })?;
                let filename = filename
                    .map(str::to_string)
                    .unwrap_or_else(|| filename_from_url(parsed.as_str()));
                let config = Self {
                    id: raw.clone(),
                    source: AssetSource::Url(raw),
                    filename,
                    notes: None,
                    credits: None,
                    alt: None,
                    tags: Vec::new(),
                };
                (config, None)
            }
            AssetInput::Asset(asset) => {
                let asset = *asset;
                let config = Self {
                    id: asset.id,
                    source: AssetSource::Existing(asset.url),
                    filename: filename.map(str::to_string).unwrap_or(asset.filename),
                    notes: asset.notes,
                    credits: asset.credits,
                    alt: asset.alt,
                    tags: asset.tags.into_iter().map(|tag| tag.name).collect(),
                };
                (config, None)
            }
            AssetInput::Field(field) => Self::from_field(field, filename)?,
        };

        let mut config = config;
        config.apply(metadata);
        config.metadata().validate()?;
        Ok((config, initial))
    }

    fn from_field(field: Value, filename: Option<&str>) -> Result<(Self, Option<Value>)> {
        let is_image = shape::is_filled_image(&field) || shape::is_filled_rt_image_node(&field);
        if !is_image && !shape::is_filled_link_to_media(&field) {
            return Err(MigrationError::Validation(
                "expected a filled image or link-to-media field".into(),
            ));
        }

        let id = shape::str_member(&field, "id").unwrap_or_default().to_string();
        let url = shape::str_member(&field, "url").unwrap_or_default();
        let url = strip_query(url).to_string();
        if id.is_empty() || url.is_empty() {
            return Err(MigrationError::Validation(
                "filled asset fields need an id and a url".into(),
            ));
        }

        let filename = filename
            .map(str::to_string)
            .or_else(|| shape::str_member(&field, "name").map(str::to_string))
            .unwrap_or_else(|| filename_from_url(&url));
        let credits = shape::non_empty_str_member(&field, "copyright").map(str::to_string);
        let alt = shape::non_empty_str_member(&field, "alt").map(str::to_string);

        let config = Self {
            id,
            source: AssetSource::Url(url),
            filename,
            notes: None,
            credits,
            alt,
            tags: Vec::new(),
        };
        Ok((config, is_image.then_some(field)))
    }

    /// Overlay non-empty metadata values
    fn apply(&mut self, metadata: AssetMetadata) {
        if let Some(notes) = metadata.notes.filter(|v| !v.is_empty()) {
            self.notes = Some(notes);
        }
        if let Some(credits) = metadata.credits.filter(|v| !v.is_empty()) {
            self.credits = Some(credits);
        }
        if let Some(alt) = metadata.alt.filter(|v| !v.is_empty()) {
            self.alt = Some(alt);
        }
        for tag in metadata.tags {
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }

    /// Merge a later registration of the same id into this one
    ///
    /// Later non-empty scalars win, tags are unioned. Source and filename
    /// keep their first registered value.
    pub fn merge(&mut self, later: AssetConfig) {
        self.apply(later.metadata());
    }

    /// Metadata view of this config
    pub fn metadata(&self) -> AssetMetadata {
        AssetMetadata {
            notes: self.notes.clone(),
            credits: self.credits.clone(),
            alt: self.alt.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Staged assets keyed by config id, iterated in registration order
#[derive(Debug, Clone, Default)]
pub struct AssetTable {
    order: Vec<String>,
    by_id: HashMap<String, AssetConfig>,
}

impl AssetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a config, merging into an existing entry with the same id
    pub fn upsert(&mut self, config: AssetConfig) -> &AssetConfig {
        let id = config.id.clone();
        match self.by_id.get_mut(&id) {
            Some(existing) => existing.merge(config),
            None => {
                self.order.push(id.clone());
                self.by_id.insert(id.clone(), config);
            }
        }
        &self.by_id[&id]
    }

    pub fn get(&self, id: &str) -> Option<&AssetConfig> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Configs in registration order
    pub fn iter(&self) -> impl Iterator<Item = &AssetConfig> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }
}

/// Content-addressed id for raw bytes
pub fn bytes_id(data: &[u8]) -> String {
    format!("sha256-{}", hex::encode(Sha256::digest(data)))
}

/// URL without its query string
pub fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Filename from the last path segment, dropping leading `hash_` prefixes
pub fn filename_from_url(url: &str) -> String {
    let path = strip_query(url);
    let mut name = path.rsplit('/').next().unwrap_or(path);
    while let Some((prefix, rest)) = name.split_once('_') {
        if rest.is_empty() || !looks_like_hash(prefix) {
            break;
        }
        name = rest;
    }
    name.to_string()
}

/// Storage ids prepended to uploaded filenames: long, mixed-case with
/// digits, or plain hex
fn looks_like_hash(segment: &str) -> bool {
    if segment.len() < 8
        || !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return false;
    }
    let has_digit = segment.chars().any(|c| c.is_ascii_digit());
    let has_upper = segment.chars().any(|c| c.is_ascii_uppercase());
    let is_hex = segment.len() >= 16 && segment.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
    (has_digit && has_upper) || is_hex
}
