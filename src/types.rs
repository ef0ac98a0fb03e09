//! Wire types for the remote APIs
//!
//! Covers the asset API, the content (read) API metadata the migration
//! needs, and the document migration API request bodies.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ============================================================================
// Asset API Types
// ============================================================================

/// An asset stored in the destination repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset ID
    pub id: String,
    /// Public URL (may carry image-processing query parameters)
    pub url: String,
    /// Original filename
    #[serde(default)]
    pub filename: String,
    /// File extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// Asset kind ("image", "all", ...)
    #[serde(default)]
    pub kind: String,
    /// Width in pixels (images only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Height in pixels (images only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Internal notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Credits, surfaced as image copyright
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<String>,
    /// Default alt text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    /// Tags attached to the asset
    #[serde(default)]
    pub tags: Vec<AssetTag>,
    /// Creation timestamp (Unix seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
    /// Last modified timestamp (Unix seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<u64>,
}

/// Asset tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetTag {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

/// One page of the cursor-based asset listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetsPage {
    /// Total assets in the repository
    #[serde(default)]
    pub total: u64,
    /// Assets in this page
    #[serde(default)]
    pub items: Vec<Asset>,
    /// Cursor for the next page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    /// Requested ids that do not exist
    #[serde(default)]
    pub missing_ids: Vec<String>,
}

impl AssetsPage {
    /// Cursor to request next, if another page may exist
    pub fn next_cursor(&self) -> Option<&str> {
        if self.items.is_empty() {
            return None;
        }
        self.cursor.as_deref().filter(|c| !c.is_empty())
    }
}

/// Response from the tag listing endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub items: Vec<AssetTag>,
}

/// Request body for tag creation
#[derive(Debug, Clone, Serialize)]
pub struct CreateTagRequest {
    pub name: String,
}

/// Multipart upload for asset creation
#[derive(Debug, Clone)]
pub struct AssetUpload {
    /// File content
    pub file: Bytes,
    /// Filename sent with the file part
    pub filename: String,
    /// MIME type, when known
    pub content_type: Option<String>,
    pub notes: Option<String>,
    pub credits: Option<String>,
    pub alt: Option<String>,
}

/// JSON body for asset updates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Tag ids (not names)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Bytes downloaded from a foreign asset URL
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

// ============================================================================
// Content API Types
// ============================================================================

/// Repository language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    /// Locale code, e.g. "en-us"
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_master: bool,
}

/// Content API ref
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub id: String,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "isMasterRef")]
    pub is_master_ref: bool,
}

/// Repository metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub refs: Vec<RepositoryRef>,
    #[serde(default)]
    pub languages: Vec<Language>,
}

impl Repository {
    /// The master locale, falling back to the first declared language
    pub fn master_locale(&self) -> Option<&str> {
        self.languages
            .iter()
            .find(|l| l.is_master)
            .or_else(|| self.languages.first())
            .map(|l| l.id.as_str())
    }

    /// The master content ref
    pub fn master_ref(&self) -> Option<&str> {
        self.refs
            .iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference.as_str())
    }
}

/// Alternate language entry on a remote document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternateLanguage {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub lang: String,
}

/// A document as returned by the content API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub lang: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub alternate_languages: Vec<AlternateLanguage>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_publication_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_publication_date: Option<String>,
}

impl RemoteDocument {
    /// Id of this document's counterpart in `locale`, if listed
    pub fn alternate_language_id(&self, locale: &str) -> Option<&str> {
        self.alternate_languages
            .iter()
            .find(|alt| alt.lang == locale)
            .map(|alt| alt.id.as_str())
    }
}

/// One page of the document search endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentsPage {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub results_per_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub results: Vec<RemoteDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page: Option<String>,
}

// ============================================================================
// Document Migration API Types
// ============================================================================

/// Body for document creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate_language_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub data: serde_json::Value,
}

/// Body for document update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateDocumentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub data: serde_json::Value,
}

/// Response from document creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

/// Link discriminant carried by filled link fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    Any,
    Document,
    Media,
    Web,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Any => "Any",
            LinkType::Document => "Document",
            LinkType::Media => "Media",
            LinkType::Web => "Web",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Any" => Some(LinkType::Any),
            "Document" => Some(LinkType::Document),
            "Media" => Some(LinkType::Media),
            "Web" => Some(LinkType::Web),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_repository_master_locale() {
        let repo: Repository = serde_json::from_value(json!({
            "refs": [{ "id": "master", "ref": "abc", "label": "Master", "isMasterRef": true }],
            "languages": [
                { "id": "fr-fr", "name": "French", "is_master": false },
                { "id": "en-us", "name": "English", "is_master": true }
            ]
        }))
        .unwrap();

        assert_eq!(repo.master_locale(), Some("en-us"));
        assert_eq!(repo.master_ref(), Some("abc"));
    }

    #[test]
    fn test_assets_page_cursor_stops_on_empty_page() {
        let page = AssetsPage {
            cursor: Some("next".into()),
            ..Default::default()
        };
        assert_eq!(page.next_cursor(), None);
    }

    #[test]
    fn test_create_request_omits_absent_fields() {
        let body = CreateDocumentRequest {
            title: "Home".into(),
            doc_type: "page".into(),
            uid: None,
            lang: "en-us".into(),
            alternate_language_id: None,
            tags: None,
            data: json!({}),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({ "title": "Home", "type": "page", "lang": "en-us", "data": {} })
        );
    }
}
