//! In-memory backend used by the tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::traits::MigrationBackend;
use crate::error::{MigrationError, Result};
use crate::types::*;

/// A call received by [`MockBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    ListAssets { cursor: Option<String> },
    CreateAsset { filename: String },
    UpdateAsset { id: String, update: AssetUpdate },
    ListTags,
    CreateTag { name: String },
    Repository,
    ListDocuments { page: u32 },
    CreateDocument(CreateDocumentRequest),
    UpdateDocument { id: String, request: UpdateDocumentRequest },
    FetchAsset { url: String },
}

impl BackendCall {
    /// Whether the call changes remote state
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            BackendCall::CreateAsset { .. }
                | BackendCall::UpdateAsset { .. }
                | BackendCall::CreateTag { .. }
                | BackendCall::CreateDocument(_)
                | BackendCall::UpdateDocument { .. }
        )
    }
}

#[derive(Default)]
struct MockState {
    assets: Vec<Asset>,
    tags: Vec<AssetTag>,
    documents: Vec<RemoteDocument>,
    foreign: HashMap<String, FetchedAsset>,
    calls: Vec<BackendCall>,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

/// In-memory repository recording every call.
///
/// Created assets and documents become visible to later listings, so a
/// second run against the same mock sees the first run's output.
pub struct MockBackend {
    repository: Repository,
    page_size: Option<u32>,
    state: Mutex<MockState>,
}

impl MockBackend {
    /// Create a mock with a single master language.
    pub fn new(master_locale: impl Into<String>) -> Self {
        let master_locale = master_locale.into();
        Self {
            repository: Repository {
                refs: vec![RepositoryRef {
                    id: "master".into(),
                    reference: "mock-master-ref".into(),
                    label: "Master".into(),
                    is_master_ref: true,
                }],
                languages: vec![Language {
                    name: master_locale.clone(),
                    id: master_locale,
                    is_master: true,
                }],
            },
            page_size: None,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Add a non-master language.
    pub fn with_language(mut self, locale: impl Into<String>) -> Self {
        let locale = locale.into();
        self.repository.languages.push(Language {
            name: locale.clone(),
            id: locale,
            is_master: false,
        });
        self
    }

    /// Cap listing page sizes, to exercise pagination.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Seed an existing asset.
    pub fn with_asset(mut self, asset: Asset) -> Self {
        self.state.get_mut().assets.push(asset);
        self
    }

    /// Seed an existing tag.
    pub fn with_tag(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        let tag = AssetTag {
            id: id.into(),
            name: name.into(),
            created_at: None,
            last_modified: None,
            count: None,
        };
        self.state.get_mut().tags.push(tag);
        self
    }

    /// Seed an existing document.
    pub fn with_document(mut self, document: RemoteDocument) -> Self {
        self.state.get_mut().documents.push(document);
        self
    }

    /// Serve `bytes` for a foreign asset URL.
    pub fn with_foreign_asset(mut self, url: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let fetched = FetchedAsset {
            bytes: bytes.into(),
            content_type: None,
        };
        self.state.get_mut().foreign.insert(url.into(), fetched);
        self
    }

    /// Every call so far, in order.
    pub async fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().await.calls.clone()
    }

    /// Document creation requests, in order.
    pub async fn created_documents(&self) -> Vec<CreateDocumentRequest> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::CreateDocument(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Document update requests with their target ids, in order.
    pub async fn updated_documents(&self) -> Vec<(String, UpdateDocumentRequest)> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::UpdateDocument { id, request } => Some((id, request)),
                _ => None,
            })
            .collect()
    }

    /// Number of asset uploads.
    pub async fn created_asset_count(&self) -> usize {
        self.calls()
            .await
            .iter()
            .filter(|call| matches!(call, BackendCall::CreateAsset { .. }))
            .count()
    }

    /// Current documents, including ones created through this mock.
    pub async fn documents(&self) -> Vec<RemoteDocument> {
        self.state.lock().await.documents.clone()
    }

    fn page_size(&self, requested: u32) -> usize {
        self.page_size.unwrap_or(requested).min(requested).max(1) as usize
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("en-us")
    }
}

#[async_trait]
impl MigrationBackend for MockBackend {
    async fn list_assets(&self, cursor: Option<&str>, page_size: u32) -> Result<AssetsPage> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::ListAssets {
            cursor: cursor.map(str::to_string),
        });

        let start: usize = match cursor {
            Some(cursor) => cursor
                .parse()
                .map_err(|_| MigrationError::InvalidResponse(format!("bad cursor {}", cursor)))?,
            None => 0,
        };
        let end = (start + self.page_size(page_size)).min(state.assets.len());
        let items = state.assets.get(start..end).unwrap_or_default().to_vec();

        Ok(AssetsPage {
            total: state.assets.len() as u64,
            cursor: (end < state.assets.len()).then(|| end.to_string()),
            items,
            missing_ids: Vec::new(),
        })
    }

    async fn create_asset(&self, upload: AssetUpload) -> Result<Asset> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::CreateAsset {
            filename: upload.filename.clone(),
        });

        let id = state.next_id("asset");
        let asset = Asset {
            url: format!("https://assets.mock/{}/{}", id, upload.filename),
            id,
            extension: upload
                .filename
                .rsplit_once('.')
                .map(|(_, extension)| extension.to_string()),
            filename: upload.filename,
            size: upload.file.len() as u64,
            kind: "image".into(),
            width: Some(800),
            height: Some(600),
            notes: upload.notes,
            credits: upload.credits,
            alt: upload.alt,
            tags: Vec::new(),
            created_at: None,
            last_modified: None,
        };
        state.assets.push(asset.clone());
        Ok(asset)
    }

    async fn update_asset(&self, id: &str, update: AssetUpdate) -> Result<Asset> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::UpdateAsset {
            id: id.to_string(),
            update: update.clone(),
        });

        let tags: Vec<AssetTag> = update
            .tags
            .iter()
            .flatten()
            .filter_map(|tag_id| state.tags.iter().find(|tag| &tag.id == tag_id).cloned())
            .collect();
        let asset = state
            .assets
            .iter_mut()
            .find(|asset| asset.id == id)
            .ok_or_else(|| MigrationError::NotFound(format!("asset {}", id)))?;

        if update.tags.is_some() {
            asset.tags = tags;
        }
        if let Some(alt) = update.alt {
            asset.alt = Some(alt);
        }
        if let Some(notes) = update.notes {
            asset.notes = Some(notes);
        }
        if let Some(credits) = update.credits {
            asset.credits = Some(credits);
        }
        Ok(asset.clone())
    }

    async fn list_tags(&self) -> Result<Vec<AssetTag>> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::ListTags);
        Ok(state.tags.clone())
    }

    async fn create_tag(&self, name: &str) -> Result<AssetTag> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::CreateTag {
            name: name.to_string(),
        });

        let tag = AssetTag {
            id: state.next_id("tag"),
            name: name.to_string(),
            created_at: None,
            last_modified: None,
            count: None,
        };
        state.tags.push(tag.clone());
        Ok(tag)
    }

    async fn repository(&self) -> Result<Repository> {
        self.state.lock().await.calls.push(BackendCall::Repository);
        Ok(self.repository.clone())
    }

    async fn list_documents(
        &self,
        _master_ref: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<DocumentsPage> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::ListDocuments { page });

        let size = self.page_size(page_size);
        let total = state.documents.len();
        let total_pages = total.div_ceil(size).max(1) as u32;
        let start = (page.max(1) as usize - 1) * size;
        let results = state
            .documents
            .get(start.min(total)..(start + size).min(total))
            .unwrap_or_default()
            .to_vec();

        Ok(DocumentsPage {
            page,
            results_per_page: size as u32,
            total_pages,
            results,
            next_page: (page < total_pages).then(|| format!("page={}", page + 1)),
        })
    }

    async fn create_document(&self, request: CreateDocumentRequest) -> Result<CreatedDocument> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::CreateDocument(request.clone()));

        let id = state.next_id("doc");
        let mut document = RemoteDocument {
            id: id.clone(),
            uid: request.uid.clone(),
            doc_type: request.doc_type.clone(),
            lang: request.lang.clone(),
            tags: request.tags.clone().unwrap_or_default(),
            alternate_languages: Vec::new(),
            data: request.data,
            first_publication_date: None,
            last_publication_date: None,
        };
        if let Some(master_id) = &request.alternate_language_id {
            if let Some(master) = state.documents.iter().find(|doc| &doc.id == master_id) {
                document.alternate_languages.push(AlternateLanguage {
                    id: master.id.clone(),
                    uid: master.uid.clone(),
                    doc_type: master.doc_type.clone(),
                    lang: master.lang.clone(),
                });
            }
        }
        state.documents.push(document);

        Ok(CreatedDocument {
            id,
            uid: request.uid,
            doc_type: Some(request.doc_type),
            lang: Some(request.lang),
        })
    }

    async fn update_document(
        &self,
        id: &str,
        request: UpdateDocumentRequest,
    ) -> Result<CreatedDocument> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::UpdateDocument {
            id: id.to_string(),
            request: request.clone(),
        });

        let document = state
            .documents
            .iter_mut()
            .find(|doc| doc.id == id)
            .ok_or_else(|| MigrationError::NotFound(format!("document {}", id)))?;
        if request.uid.is_some() {
            document.uid = request.uid;
        }
        if let Some(tags) = request.tags {
            document.tags = tags;
        }
        document.data = request.data;

        Ok(CreatedDocument {
            id: document.id.clone(),
            uid: document.uid.clone(),
            doc_type: Some(document.doc_type.clone()),
            lang: Some(document.lang.clone()),
        })
    }

    async fn fetch_asset(&self, url: &str) -> Result<FetchedAsset> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::FetchAsset {
            url: url.to_string(),
        });

        state
            .foreign
            .get(url)
            .cloned()
            .ok_or_else(|| MigrationError::AssetFetch {
                url: url.to_string(),
                reason: "status 404".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_asset_listing_pages() {
        let mock = MockBackend::default().with_page_size(1);
        for name in ["a.png", "b.png"] {
            mock.create_asset(AssetUpload {
                file: Bytes::from_static(b"x"),
                filename: name.into(),
                content_type: None,
                notes: None,
                credits: None,
                alt: None,
            })
            .await
            .unwrap();
        }

        let first = mock.list_assets(None, 100).await.unwrap();
        assert_eq!(first.items.len(), 1);
        let cursor = first.next_cursor().unwrap().to_string();

        let second = mock.list_assets(Some(&cursor), 100).await.unwrap();
        assert_eq!(second.items[0].filename, "b.png");
        assert!(second.next_cursor().is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_document() {
        let mock = MockBackend::default();
        let result = mock
            .update_document(
                "missing",
                UpdateDocumentRequest {
                    title: None,
                    uid: None,
                    tags: None,
                    data: json!({}),
                },
            )
            .await;
        assert!(matches!(result, Err(MigrationError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_foreign_asset() {
        let mock = MockBackend::default().with_foreign_asset("https://x.io/a.png", vec![1u8]);
        assert!(mock.fetch_asset("https://x.io/a.png").await.is_ok());
        assert!(matches!(
            mock.fetch_asset("https://x.io/b.png").await,
            Err(MigrationError::AssetFetch { .. })
        ));
    }
}
