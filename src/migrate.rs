//! Migration runner
//!
//! Pushes a staged [`Migration`] to the destination repository in three
//! sequential phases:
//!
//! 1. **Assets**: list remote assets, upload every staged asset whose id is
//!    not already known, attach tags.
//! 2. **Document shells**: create every new document with empty data,
//!    master-locale documents first so translations can name their master.
//! 3. **Patch**: resolve every lazy field against the asset and document
//!    maps, then write each document's final data.
//!
//! Calls to the backend are issued one at a time. A run is not
//! transactional: a failure aborts it, leaving what was already written.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::asset::{AssetConfig, AssetSource};
use crate::backend::{HttpBackend, MigrationBackend};
use crate::config::MigrationConfig;
use crate::error::{MigrationError, Result};
use crate::field::ResolveContext;
use crate::maps::{AssetMap, DocumentKey, DocumentMap, ResolvedDocument};
use crate::patch::patch_document_data;
use crate::registry::{Migration, StagedDocument, StagedMode};
use crate::reporter::{MigratedCounts, MigrationEvent, Reporter};
use crate::types::{
    Asset, AssetUpdate, AssetUpload, CreateDocumentRequest, UpdateDocumentRequest,
};

/// Page size used when none is configured
const DEFAULT_PAGE_SIZE: u32 = 100;

/// Per-run options
#[derive(Clone, Default)]
pub struct MigrateOptions {
    /// Checked before every phase and raced against every remote call
    pub cancel: CancellationToken,
    /// Progress callback
    pub reporter: Option<Reporter>,
}

impl MigrateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_reporter<F>(mut self, reporter: F) -> Self
    where
        F: Fn(&MigrationEvent) + Send + Sync + 'static,
    {
        self.reporter = Some(Arc::new(reporter));
        self
    }
}

/// What a run wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub assets_created: usize,
    pub documents_created: usize,
    pub documents_updated: usize,
}

/// Runs migrations against a backend
pub struct Migrator {
    backend: Arc<dyn MigrationBackend>,
    /// Serializes tag lookups so concurrent runs never create a tag twice
    tag_lock: Semaphore,
    asset_page_size: u32,
    document_page_size: u32,
}

impl Migrator {
    pub fn new(backend: Arc<dyn MigrationBackend>) -> Self {
        Self {
            backend,
            tag_lock: Semaphore::new(1),
            asset_page_size: DEFAULT_PAGE_SIZE,
            document_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Migrator over the HTTP APIs described by `config`
    pub fn from_config(config: &MigrationConfig) -> Result<Self> {
        config.validate()?;
        let asset_page_size = config.asset_page_size;
        let document_page_size = config.document_page_size;
        let backend = HttpBackend::new(config.clone())?;
        Ok(Self::new(Arc::new(backend)).with_page_sizes(asset_page_size, document_page_size))
    }

    pub fn with_page_sizes(mut self, asset_page_size: u32, document_page_size: u32) -> Self {
        self.asset_page_size = asset_page_size.max(1);
        self.document_page_size = document_page_size.max(1);
        self
    }

    /// Push `migration` to the repository
    ///
    /// The registry is consumed: its fields keep the ids resolved during
    /// this run, so staging starts over with a fresh [`Migration`].
    pub async fn migrate(
        &self,
        migration: Migration,
        options: MigrateOptions,
    ) -> Result<MigrationSummary> {
        let migration = &migration;
        let run = Run {
            backend: self.backend.as_ref(),
            tag_lock: &self.tag_lock,
            asset_page_size: self.asset_page_size,
            document_page_size: self.document_page_size,
            cancel: options.cancel,
            reporter: options.reporter,
        };

        let pending = migration.pending_counts();
        info!(
            assets = pending.assets,
            documents = pending.documents,
            "Starting migration"
        );
        run.report(MigrationEvent::Start { pending });

        let (assets, assets_created) = run.migrate_assets(migration).await?;
        let (documents, documents_created) = run.create_documents(migration).await?;
        let documents_updated = run.update_documents(migration, &assets, &documents).await?;

        let summary = MigrationSummary {
            assets_created,
            documents_created,
            documents_updated,
        };
        run.report(MigrationEvent::End {
            migrated: MigratedCounts {
                assets: assets_created,
                documents: documents_updated,
            },
        });
        info!(
            assets_created,
            documents_created, documents_updated, "Migration complete"
        );
        Ok(summary)
    }
}

/// State of one `migrate()` call
struct Run<'a> {
    backend: &'a dyn MigrationBackend,
    tag_lock: &'a Semaphore,
    asset_page_size: u32,
    document_page_size: u32,
    cancel: CancellationToken,
    reporter: Option<Reporter>,
}

impl Run<'_> {
    fn report(&self, event: MigrationEvent) {
        debug!(event = event.name(), "Migration progress");
        if let Some(reporter) = &self.reporter {
            reporter(&event);
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }
        Ok(())
    }

    /// Await a remote call unless the run is cancelled first
    async fn call<T>(&self, future: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(MigrationError::Cancelled),
            result = future => result,
        }
    }

    // ===== Phase 1: assets =====

    async fn migrate_assets(&self, migration: &Migration) -> Result<(AssetMap, usize)> {
        self.check_cancelled()?;

        let mut assets = AssetMap::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .call(
                    self.backend
                        .list_assets(cursor.as_deref(), self.asset_page_size),
                )
                .await?;
            for asset in &page.items {
                assets.insert(asset.id.clone(), asset.clone());
            }
            match page.next_cursor() {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }
        debug!(existing = assets.len(), "Fetched remote assets");

        let pending: Vec<&AssetConfig> = migration
            .assets()
            .iter()
            .filter(|config| !assets.contains(&config.id))
            .collect();
        let total = pending.len();

        for (index, config) in pending.into_iter().enumerate() {
            self.report(MigrationEvent::AssetsCreating {
                current: index + 1,
                remaining: total - index - 1,
                total,
                asset_id: config.id.clone(),
            });
            let asset = self.create_asset(config).await?;
            debug!(config_id = %config.id, asset_id = %asset.id, "Asset created");
            assets.insert(config.id.clone(), asset);
        }

        self.report(MigrationEvent::AssetsCreated { count: total });
        Ok((assets, total))
    }

    async fn create_asset(&self, config: &AssetConfig) -> Result<Asset> {
        let (file, content_type) = match &config.source {
            AssetSource::Bytes(bytes) => (bytes.clone(), None),
            AssetSource::Url(url) | AssetSource::Existing(url) => {
                let fetched = self
                    .call(self.backend.fetch_asset(url))
                    .await
                    .map_err(|e| match e {
                        MigrationError::AssetFetch { .. } | MigrationError::Cancelled => e,
                        other => MigrationError::AssetFetch {
                            url: url.clone(),
                            reason: other.to_string(),
                        },
                    })?;
                (fetched.bytes, fetched.content_type)
            }
        };

        let upload = AssetUpload {
            file,
            filename: config.filename.clone(),
            content_type,
            notes: config.notes.clone(),
            credits: config.credits.clone(),
            alt: config.alt.clone(),
        };
        let asset = self.call(self.backend.create_asset(upload)).await?;
        if config.tags.is_empty() {
            return Ok(asset);
        }

        let tag_ids = self.resolve_tag_ids(&config.tags).await?;
        let update = AssetUpdate {
            tags: Some(tag_ids),
            ..Default::default()
        };
        self.call(self.backend.update_asset(&asset.id, update)).await
    }

    /// Tag ids for `names`, creating missing tags
    async fn resolve_tag_ids(&self, names: &[String]) -> Result<Vec<String>> {
        let _permit = self
            .call(async {
                self.tag_lock
                    .acquire()
                    .await
                    .map_err(|_| MigrationError::Cancelled)
            })
            .await?;

        let mut by_name: HashMap<String, String> = self
            .call(self.backend.list_tags())
            .await?
            .into_iter()
            .map(|tag| (tag.name, tag.id))
            .collect();

        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let id = match by_name.get(name) {
                Some(id) => id.clone(),
                None => {
                    let tag = self.call(self.backend.create_tag(name)).await?;
                    debug!(tag = %tag.name, id = %tag.id, "Created asset tag");
                    by_name.insert(tag.name.clone(), tag.id.clone());
                    tag.id
                }
            };
            ids.push(id);
        }
        Ok(ids)
    }

    // ===== Phase 2: document shells =====

    async fn create_documents(&self, migration: &Migration) -> Result<(DocumentMap, usize)> {
        self.check_cancelled()?;

        let repository = self.call(self.backend.repository()).await?;
        let master_locale = repository
            .master_locale()
            .ok_or_else(|| {
                MigrationError::InvalidResponse("repository declares no languages".into())
            })?
            .to_string();
        self.report(MigrationEvent::DocumentsMasterLocale {
            locale: master_locale.clone(),
        });

        let mut documents = DocumentMap::new();
        let mut page = 1;
        loop {
            let results = self
                .call(self.backend.list_documents(
                    repository.master_ref(),
                    page,
                    self.document_page_size,
                ))
                .await?;
            for document in &results.results {
                documents.insert(
                    DocumentKey::Id(document.id.clone()),
                    ResolvedDocument::from_remote(document),
                );
            }
            if results.results.is_empty() || page >= results.total_pages {
                break;
            }
            page += 1;
        }
        debug!(existing = documents.len(), "Fetched remote documents");

        // Updates must target existing documents; checked before any write
        for staged in migration.documents() {
            if let StagedMode::Update { id } = staged.mode() {
                let existing = documents.get_by_id(id).cloned().ok_or_else(|| {
                    MigrationError::NotFound(format!(
                        "document {} ({}) does not exist in the repository",
                        id,
                        staged.title()
                    ))
                })?;
                documents.insert(DocumentKey::Staged(staged.id()), existing);
            }
        }

        let (masters, translations): (Vec<&StagedDocument>, Vec<&StagedDocument>) = migration
            .documents()
            .iter()
            .filter(|staged| !staged.is_update())
            .partition(|staged| staged.lang() == master_locale);
        let total = masters.len() + translations.len();

        for (index, staged) in masters.into_iter().chain(translations).enumerate() {
            self.report(MigrationEvent::DocumentsCreating {
                current: index + 1,
                remaining: total - index - 1,
                total,
                title: staged.title().to_string(),
            });

            let alternate_language_id = if staged.lang() == master_locale {
                None
            } else {
                self.master_language_id(staged, &master_locale, migration, &documents)
            };

            let request = CreateDocumentRequest {
                title: staged.title().to_string(),
                doc_type: staged.doc_type().to_string(),
                uid: staged.uid().map(str::to_string),
                lang: staged.lang().to_string(),
                alternate_language_id,
                tags: staged
                    .tags()
                    .filter(|tags| !tags.is_empty())
                    .map(<[String]>::to_vec),
                data: serde_json::json!({}),
            };
            let created = self.call(self.backend.create_document(request)).await?;
            debug!(title = %staged.title(), id = %created.id, "Document created");

            let resolved = ResolvedDocument::from_created(
                &created,
                staged.uid().map(str::to_string),
                staged.doc_type(),
                staged.tags().unwrap_or_default(),
                staged.lang(),
            );
            let mut keys = vec![
                DocumentKey::Staged(staged.id()),
                DocumentKey::Id(created.id.clone()),
            ];
            if let Some(original) = staged.original() {
                keys.push(DocumentKey::Id(original.id.clone()));
            }
            documents.insert_all(keys, &resolved);
        }

        self.report(MigrationEvent::DocumentsCreated { count: total });
        Ok((documents, total))
    }

    /// Remote id of a translation's master-locale document
    fn master_language_id(
        &self,
        staged: &StagedDocument,
        master_locale: &str,
        migration: &Migration,
        documents: &DocumentMap,
    ) -> Option<String> {
        let master = match (staged.master_language_document(), staged.original()) {
            (Some(reference), _) => reference.resolve(migration, documents),
            (None, Some(original)) => original
                .alternate_language_id(master_locale)
                .and_then(|id| documents.get_by_id(id)),
            (None, None) => None,
        };

        if master.is_none() {
            warn!(
                title = %staged.title(),
                lang = %staged.lang(),
                "Master language document not found, creating without it"
            );
        }
        master.map(|document| document.id.clone())
    }

    // ===== Phase 3: patch =====

    async fn update_documents(
        &self,
        migration: &Migration,
        assets: &AssetMap,
        documents: &DocumentMap,
    ) -> Result<usize> {
        self.check_cancelled()?;

        let ctx = ResolveContext::new(assets, documents, migration);
        let total = migration.documents().len();

        for (index, staged) in migration.documents().iter().enumerate() {
            self.report(MigrationEvent::DocumentsUpdating {
                current: index + 1,
                remaining: total - index - 1,
                total,
                title: staged.title().to_string(),
            });

            let id = documents
                .get_staged(staged.id())
                .map(|document| document.id.clone())
                .ok_or_else(|| {
                    MigrationError::InvalidResponse(format!(
                        "no remote id for document {}",
                        staged.title()
                    ))
                })?;

            for dependency in staged.dependencies() {
                dependency.resolve(&ctx);
            }
            let data = patch_document_data(staged.data(), &ctx);

            let request = UpdateDocumentRequest {
                title: Some(staged.title().to_string()),
                uid: staged.uid().map(str::to_string),
                tags: staged.tags().map(<[String]>::to_vec),
                data,
            };
            self.call(self.backend.update_document(&id, request)).await?;
            debug!(title = %staged.title(), id = %id, "Document updated");
        }

        self.report(MigrationEvent::DocumentsUpdated { count: total });
        Ok(total)
    }
}
