//! Staging registry
//!
//! A [`Migration`] collects everything a run will push: asset configs and
//! documents (to create or to update). Registration never talks to the
//! network; it validates input, extracts lazy fields from document data and
//! indexes documents for lookup by type and UID.

use std::collections::HashMap;

use crate::asset::{AssetConfig, AssetInput, AssetMetadata, AssetTable};
use crate::content::ContentNode;
use crate::error::{MigrationError, Result};
use crate::extract::extract_dependencies;
use crate::field::{DocumentReference, FieldRef, MigrationContentRelationship, MigrationImage};
use crate::reporter::PendingCounts;
use crate::types::RemoteDocument;

/// Index key used for documents without a UID
const SINGLE_KEY: &str = "__SINGLE__";

/// Handle to a staged document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StagedDocumentId(usize);

impl StagedDocumentId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Registration index
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Staging-index queries available to deferred references
pub trait DocumentLookup: Send + Sync {
    /// Staged document of `doc_type` with `uid`
    fn get_by_uid(&self, doc_type: &str, uid: &str) -> Option<StagedDocumentId>;

    /// Staged singleton document of `doc_type`
    fn get_single(&self, doc_type: &str) -> Option<StagedDocumentId>;
}

/// What the run does with a staged document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedMode {
    /// Create a new document, then patch its content
    Create,
    /// Patch the existing remote document with this id
    Update { id: String },
}

/// Document fields supplied by the caller
#[derive(Debug, Clone, Default)]
pub struct DocumentInput {
    /// Remote id; required for updates
    pub id: Option<String>,
    pub doc_type: String,
    pub uid: Option<String>,
    pub lang: String,
    /// Left untouched on update when `None`
    pub tags: Option<Vec<String>>,
    pub data: ContentNode,
}

impl DocumentInput {
    pub fn new(doc_type: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            lang: lang.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_data(mut self, data: impl Into<ContentNode>) -> Self {
        self.data = data.into();
        self
    }
}

/// Extra creation parameters
#[derive(Debug, Clone, Default)]
pub struct DocumentParams {
    /// Master-locale counterpart of a translation
    pub master_language_document: Option<DocumentReference>,
}

impl DocumentParams {
    pub fn with_master(master: impl Into<DocumentReference>) -> Self {
        Self {
            master_language_document: Some(master.into()),
        }
    }
}

/// A registered document
#[derive(Debug, Clone)]
pub struct StagedDocument {
    id: StagedDocumentId,
    mode: StagedMode,
    title: String,
    doc_type: String,
    uid: Option<String>,
    lang: String,
    tags: Option<Vec<String>>,
    data: ContentNode,
    dependencies: Vec<FieldRef>,
    master_language_document: Option<DocumentReference>,
    original: Option<RemoteDocument>,
}

impl StagedDocument {
    pub fn id(&self) -> StagedDocumentId {
        self.id
    }

    pub fn mode(&self) -> &StagedMode {
        &self.mode
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// Tags supplied at staging, if any were given
    pub fn tags(&self) -> Option<&[String]> {
        self.tags.as_deref()
    }

    /// Content tree with fields extracted
    pub fn data(&self) -> &ContentNode {
        &self.data
    }

    /// Every lazy field reachable from the content tree
    pub fn dependencies(&self) -> &[FieldRef] {
        &self.dependencies
    }

    pub fn master_language_document(&self) -> Option<&DocumentReference> {
        self.master_language_document.as_ref()
    }

    /// Source document, when copied from a content API
    pub fn original(&self) -> Option<&RemoteDocument> {
        self.original.as_ref()
    }

    pub fn is_update(&self) -> bool {
        matches!(self.mode, StagedMode::Update { .. })
    }
}

/// Everything one migration run will push
#[derive(Debug, Default)]
pub struct Migration {
    assets: AssetTable,
    documents: Vec<StagedDocument>,
    index: HashMap<String, HashMap<String, StagedDocumentId>>,
}

impl Migration {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Assets
    // =========================================================================

    /// Stage an asset, returning an image field pointing at it
    ///
    /// Registering the same asset id again merges metadata into the existing
    /// entry. When the input is a filled image, the returned field keeps its
    /// crop, and `metadata.alt` overrides its alt text.
    pub fn create_asset(
        &mut self,
        input: impl Into<AssetInput>,
        filename: Option<&str>,
        metadata: AssetMetadata,
    ) -> Result<MigrationImage> {
        register_asset(&mut self.assets, input.into(), filename, metadata)
    }

    pub fn assets(&self) -> &AssetTable {
        &self.assets
    }

    pub fn asset(&self, id: &str) -> Option<&AssetConfig> {
        self.assets.get(id)
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Stage a document for creation
    pub fn create_document(
        &mut self,
        input: DocumentInput,
        title: impl Into<String>,
        params: DocumentParams,
    ) -> Result<StagedDocumentId> {
        self.register(
            StagedMode::Create,
            input,
            title.into(),
            params.master_language_document,
            None,
        )
    }

    /// Stage an update of an existing remote document
    pub fn update_document(
        &mut self,
        input: DocumentInput,
        title: impl Into<String>,
    ) -> Result<StagedDocumentId> {
        let id = input
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                MigrationError::Validation("updated documents need a remote id".into())
            })?;
        self.register(StagedMode::Update { id }, input, title.into(), None, None)
    }

    /// Stage a copy of a document read from a content API
    ///
    /// The source document's id becomes an alias for the new document, so
    /// relationships copied along with it keep pointing at the right place.
    pub fn create_document_from_remote(
        &mut self,
        document: RemoteDocument,
        title: impl Into<String>,
    ) -> Result<StagedDocumentId> {
        let input = DocumentInput {
            id: None,
            doc_type: document.doc_type.clone(),
            uid: document.uid.clone(),
            lang: document.lang.clone(),
            tags: Some(document.tags.clone()),
            data: ContentNode::Json(document.data.clone()),
        };
        self.register(
            StagedMode::Create,
            input,
            title.into(),
            None,
            Some(document),
        )
    }

    /// Content relationship field pointing at `target`
    pub fn create_content_relationship(
        &self,
        target: impl Into<DocumentReference>,
        text: Option<String>,
    ) -> MigrationContentRelationship {
        MigrationContentRelationship::new(target, text)
    }

    pub fn documents(&self) -> &[StagedDocument] {
        &self.documents
    }

    pub fn document(&self, id: StagedDocumentId) -> Option<&StagedDocument> {
        self.documents.get(id.index())
    }

    /// Counts reported when a run starts
    pub fn pending_counts(&self) -> PendingCounts {
        PendingCounts {
            assets: self.assets.len(),
            documents: self.documents.len(),
        }
    }

    fn register(
        &mut self,
        mode: StagedMode,
        input: DocumentInput,
        title: String,
        master_language_document: Option<DocumentReference>,
        original: Option<RemoteDocument>,
    ) -> Result<StagedDocumentId> {
        if input.doc_type.is_empty() {
            return Err(MigrationError::Validation("document type is required".into()));
        }
        if input.lang.is_empty() {
            return Err(MigrationError::Validation("document language is required".into()));
        }

        let extraction = extract_dependencies(input.data, &mut self.assets)?;
        let id = StagedDocumentId::new(self.documents.len());

        let key = input
            .uid
            .clone()
            .filter(|uid| !uid.is_empty())
            .unwrap_or_else(|| SINGLE_KEY.to_string());
        self.index
            .entry(input.doc_type.clone())
            .or_default()
            .insert(key, id);

        self.documents.push(StagedDocument {
            id,
            mode,
            title,
            doc_type: input.doc_type,
            uid: input.uid,
            lang: input.lang,
            tags: input.tags,
            data: extraction.data,
            dependencies: extraction.dependencies,
            master_language_document,
            original,
        });
        Ok(id)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn get_by_uid(&self, doc_type: &str, uid: &str) -> Option<&StagedDocument> {
        DocumentLookup::get_by_uid(self, doc_type, uid).and_then(|id| self.document(id))
    }

    pub fn get_single(&self, doc_type: &str) -> Option<&StagedDocument> {
        DocumentLookup::get_single(self, doc_type).and_then(|id| self.document(id))
    }
}

impl DocumentLookup for Migration {
    fn get_by_uid(&self, doc_type: &str, uid: &str) -> Option<StagedDocumentId> {
        self.index.get(doc_type)?.get(uid).copied()
    }

    fn get_single(&self, doc_type: &str) -> Option<StagedDocumentId> {
        self.index.get(doc_type)?.get(SINGLE_KEY).copied()
    }
}

/// Stage an asset into `assets` and build the image field for it
pub(crate) fn register_asset(
    assets: &mut AssetTable,
    input: AssetInput,
    filename: Option<&str>,
    metadata: AssetMetadata,
) -> Result<MigrationImage> {
    let alt = metadata.alt.clone().filter(|alt| !alt.is_empty());
    let (config, initial) = AssetConfig::from_input(input, filename, metadata)?;
    let config_id = assets.upsert(config).id.clone();

    let has_initial = initial.is_some();
    let image = MigrationImage::new(config_id, initial);
    Ok(match alt {
        Some(alt) if has_initial => image.with_alt(alt),
        _ => image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetSource;
    use serde_json::json;

    #[test]
    fn test_index_by_uid_and_single() {
        let mut migration = Migration::new();
        let home = migration
            .create_document(
                DocumentInput::new("page", "en-us").with_uid("home"),
                "Home",
                DocumentParams::default(),
            )
            .unwrap();
        let settings = migration
            .create_document(
                DocumentInput::new("settings", "en-us"),
                "Settings",
                DocumentParams::default(),
            )
            .unwrap();

        assert_eq!(migration.get_by_uid("page", "home").unwrap().id(), home);
        assert_eq!(migration.get_single("settings").unwrap().id(), settings);
        assert!(migration.get_by_uid("page", "missing").is_none());
        assert!(migration.get_single("page").is_none());
    }

    #[test]
    fn test_update_requires_id() {
        let mut migration = Migration::new();
        let result = migration.update_document(DocumentInput::new("page", "en-us"), "Page");
        assert!(matches!(result, Err(MigrationError::Validation(_))));

        let staged = migration
            .update_document(DocumentInput::new("page", "en-us").with_id("R1"), "Page")
            .unwrap();
        assert_eq!(
            migration.document(staged).unwrap().mode(),
            &StagedMode::Update { id: "R1".into() }
        );
    }

    #[test]
    fn test_invalid_asset_metadata_stages_nothing() {
        let mut migration = Migration::new();
        let result = migration.create_asset(
            AssetInput::Url("https://example.com/a.png".into()),
            None,
            AssetMetadata::new().with_alt("x".repeat(501)),
        );
        assert!(result.is_err());
        assert!(migration.assets().is_empty());
    }

    #[test]
    fn test_alt_override_applies_to_filled_image() {
        let mut migration = Migration::new();
        let field = json!({
            "id": "img",
            "url": "https://cdn.example.io/img.png",
            "dimensions": { "width": 1, "height": 1 },
            "alt": "old"
        });
        let image = migration
            .create_asset(field, None, AssetMetadata::new().with_alt("new"))
            .unwrap();

        assert_eq!(image.config_id(), "img");
        assert_eq!(
            migration.asset("img").unwrap().source,
            AssetSource::Url("https://cdn.example.io/img.png".into())
        );
        assert_eq!(migration.asset("img").unwrap().alt.as_deref(), Some("new"));
    }

    #[test]
    fn test_from_remote_keeps_original() {
        let mut migration = Migration::new();
        let remote: RemoteDocument = serde_json::from_value(json!({
            "id": "orig-1",
            "uid": "about",
            "type": "page",
            "lang": "fr-fr",
            "data": { "title": "A propos" }
        }))
        .unwrap();

        let staged = migration.create_document_from_remote(remote, "About").unwrap();
        let document = migration.document(staged).unwrap();

        assert_eq!(document.original().unwrap().id, "orig-1");
        assert_eq!(document.lang(), "fr-fr");
        assert_eq!(migration.get_by_uid("page", "about").unwrap().id(), staged);
    }
}
