//! Core trait for migration backends.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    Asset, AssetTag, AssetUpdate, AssetUpload, AssetsPage, CreateDocumentRequest,
    CreatedDocument, DocumentsPage, FetchedAsset, Repository, UpdateDocumentRequest,
};

/// Everything a migration run needs from the destination repository.
///
/// Calls are issued strictly one at a time by the migrator.
#[async_trait]
pub trait MigrationBackend: Send + Sync {
    // ===== Asset API =====

    /// One page of existing assets, starting at `cursor`.
    async fn list_assets(&self, cursor: Option<&str>, page_size: u32) -> Result<AssetsPage>;

    /// Upload a new asset.
    async fn create_asset(&self, upload: AssetUpload) -> Result<Asset>;

    /// Update asset metadata or tags.
    async fn update_asset(&self, id: &str, update: AssetUpdate) -> Result<Asset>;

    /// All asset tags.
    async fn list_tags(&self) -> Result<Vec<AssetTag>>;

    /// Create an asset tag.
    async fn create_tag(&self, name: &str) -> Result<AssetTag>;

    // ===== Content API =====

    /// Repository metadata (languages, refs).
    async fn repository(&self) -> Result<Repository>;

    /// One page of existing documents, 1-based.
    async fn list_documents(
        &self,
        master_ref: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<DocumentsPage>;

    // ===== Migration API =====

    /// Create a document shell.
    async fn create_document(&self, request: CreateDocumentRequest) -> Result<CreatedDocument>;

    /// Replace a document's title, uid, tags and data.
    async fn update_document(
        &self,
        id: &str,
        request: UpdateDocumentRequest,
    ) -> Result<CreatedDocument>;

    // ===== Foreign assets =====

    /// Download a file from an arbitrary URL.
    async fn fetch_asset(&self, url: &str) -> Result<FetchedAsset>;
}
