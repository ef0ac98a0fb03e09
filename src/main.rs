//! Elohim Migration CLI
//!
//! Copies documents exported from one repository into another.
//!
//! ## Usage
//!
//! ```bash
//! # Migrate an export using a config file
//! elohim-migrate --config migration.toml --input export.json
//!
//! # Credentials from the environment
//! ELOHIM_REPOSITORY=my-repo ELOHIM_WRITE_TOKEN=... elohim-migrate --input export.json
//!
//! # Stage only, no network calls
//! elohim-migrate --input export.json --dry-run
//! ```
//!
//! The export is either a JSON array of documents or a content API search
//! page (`{"results": [...]}`).

use anyhow::{bail, Context};
use clap::Parser;
use elohim_migration::{
    MigrateOptions, Migration, MigrationConfig, MigrationEvent, Migrator, RemoteDocument,
};
use serde_json::Value;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "elohim-migrate")]
#[command(about = "Migrate exported documents into a content repository")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON export to migrate
    #[arg(short, long)]
    input: PathBuf,

    /// Destination repository name
    #[arg(long, env = "ELOHIM_REPOSITORY")]
    repository: Option<String>,

    /// Write API token
    #[arg(long, env = "ELOHIM_WRITE_TOKEN", hide_env_values = true)]
    write_token: Option<String>,

    /// Migration API key
    #[arg(long, env = "ELOHIM_MIGRATION_API_KEY", hide_env_values = true)]
    migration_api_key: Option<String>,

    /// Content API access token
    #[arg(long, env = "ELOHIM_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Stage documents and print what would be migrated
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("elohim_migration=info".parse()?),
        )
        .init();

    let args = Args::parse();

    // Load config
    let mut config = match &args.config {
        Some(path) => MigrationConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MigrationConfig::default(),
    };

    // Apply CLI overrides
    if let Some(repository) = args.repository {
        config.repository = repository;
    }
    if let Some(token) = args.write_token {
        config.write_token = token;
    }
    if args.migration_api_key.is_some() {
        config.migration_api_key = args.migration_api_key;
    }
    if args.access_token.is_some() {
        config.access_token = args.access_token;
    }

    let documents = read_export(&args.input)?;
    let mut migration = Migration::new();
    for document in documents {
        let title = document_title(&document);
        migration
            .create_document_from_remote(document, title)
            .context("staging document")?;
    }

    let pending = migration.pending_counts();
    info!(
        input = %args.input.display(),
        assets = pending.assets,
        documents = pending.documents,
        "Staged export"
    );

    if args.dry_run {
        for staged in migration.documents() {
            info!(
                title = %staged.title(),
                doc_type = %staged.doc_type(),
                lang = %staged.lang(),
                dependencies = staged.dependencies().len(),
                "Would migrate document"
            );
        }
        return Ok(());
    }

    config.validate()?;
    info!(repository = %config.repository, "Starting migration");
    let migrator = Migrator::from_config(&config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling migration");
            on_signal.cancel();
        }
    });

    let options = MigrateOptions::new()
        .with_cancel(cancel)
        .with_reporter(log_event);
    let summary = migrator.migrate(migration, options).await?;

    info!(
        assets_created = summary.assets_created,
        documents_created = summary.documents_created,
        documents_updated = summary.documents_updated,
        "Done"
    );
    Ok(())
}

fn read_export(path: &PathBuf) -> anyhow::Result<Vec<RemoteDocument>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading export {}", path.display()))?;
    let value: Value = serde_json::from_str(&content).context("parsing export")?;

    let documents = match value {
        Value::Array(_) => value,
        Value::Object(mut page) => match page.remove("results") {
            Some(results) => results,
            None => bail!("export object has no `results` array"),
        },
        _ => bail!("export must be an array of documents"),
    };
    Ok(serde_json::from_value(documents).context("reading documents")?)
}

fn document_title(document: &RemoteDocument) -> String {
    match &document.uid {
        Some(uid) => format!("{} ({})", uid, document.lang),
        None => format!("{} {} ({})", document.doc_type, document.id, document.lang),
    }
}

fn log_event(event: &MigrationEvent) {
    match event {
        MigrationEvent::AssetsCreating {
            current,
            total,
            asset_id,
            ..
        } => info!(current, total, asset_id = %asset_id, "Creating asset"),
        MigrationEvent::DocumentsCreating {
            current,
            total,
            title,
            ..
        } => info!(current, total, title = %title, "Creating document"),
        MigrationEvent::DocumentsUpdating {
            current,
            total,
            title,
            ..
        } => info!(current, total, title = %title, "Updating document"),
        MigrationEvent::DocumentsMasterLocale { locale } => {
            info!(locale = %locale, "Master locale")
        }
        other => info!(event = other.name(), "Migration progress"),
    }
}
