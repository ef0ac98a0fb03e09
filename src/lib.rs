//! Migration engine for the content repository write API
//!
//! Stage assets and documents locally, then push them in one run. References
//! between staged items (an image pointing at an asset not yet uploaded, a
//! link pointing at a document not yet created) are kept as lazy fields and
//! resolved once the remote ids exist.
//!
//! # Example
//!
//! ```rust,no_run
//! use elohim_migration::{
//!     AssetMetadata, ContentNode, DocumentInput, DocumentParams, MigrateOptions, Migration,
//!     MigrationConfig, Migrator,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut migration = Migration::new();
//!
//! let hero = migration.create_asset(
//!     elohim_migration::AssetInput::Url("https://images.example.org/hero.png".into()),
//!     None,
//!     AssetMetadata::new().with_alt("Hero"),
//! )?;
//! let home = migration.create_document(
//!     DocumentInput::new("page", "en-us")
//!         .with_uid("home")
//!         .with_data(ContentNode::object([("hero", ContentNode::from(hero))])),
//!     "Home",
//!     DocumentParams::default(),
//! )?;
//!
//! let about_link = migration.create_content_relationship(home, Some("Home".into()));
//! migration.create_document(
//!     DocumentInput::new("page", "en-us")
//!         .with_uid("about")
//!         .with_data(ContentNode::object([("back", ContentNode::from(about_link))])),
//!     "About",
//!     DocumentParams::default(),
//! )?;
//!
//! let migrator = Migrator::from_config(&MigrationConfig::new("my-repo", "write-token"))?;
//! let summary = migrator.migrate(migration, MigrateOptions::new()).await?;
//! println!("{} documents updated", summary.documents_updated);
//! # Ok(())
//! # }
//! ```

pub mod asset;
pub mod backend;
pub mod config;
pub mod content;
pub mod error;
pub mod extract;
pub mod field;
pub mod maps;
pub mod migrate;
pub mod patch;
pub mod registry;
pub mod reporter;
pub mod shape;
pub mod types;

// Re-export main types
pub use asset::{AssetConfig, AssetInput, AssetMetadata, AssetSource, AssetTable};
pub use backend::{BackendCall, HttpBackend, MigrationBackend, MockBackend};
pub use config::MigrationConfig;
pub use content::ContentNode;
pub use error::{MigrationError, Result};
pub use field::{
    DocumentReference, FieldKind, FieldRef, MigrationContentRelationship, MigrationField,
    MigrationImage, MigrationLinkToMedia, MigrationRtImageNode, ResolveContext,
};
pub use maps::{AssetMap, DocumentKey, DocumentMap, ResolvedDocument};
pub use migrate::{MigrateOptions, MigrationSummary, Migrator};
pub use registry::{
    DocumentInput, DocumentLookup, DocumentParams, Migration, StagedDocument, StagedDocumentId,
    StagedMode,
};
pub use reporter::{MigratedCounts, MigrationEvent, PendingCounts, Reporter};
pub use types::*;
