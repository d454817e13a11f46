//! Startup wiring.
//!
//! Builds the store, adapters, and [`DocumentService`] from configuration.
//! These handles are the only process-wide state; nothing is global.

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;

use docchat_core::adapters::Generator;
use docchat_core::lifecycle::DocumentService;

use crate::config::Config;
use crate::db;
use crate::extract::PdfExtractor;
use crate::generation::create_generator;
use crate::migrate;
use crate::profiles::SqliteProfiles;
use crate::sqlite_store::SqliteStore;

/// Handles shared by the CLI and the HTTP server.
#[derive(Clone)]
pub struct App {
    pub service: Arc<DocumentService>,
    pub profiles: Arc<SqliteProfiles>,
    pub pool: SqlitePool,
}

/// Connects, migrates, and wires the generator named in the config.
pub async fn build(config: &Config) -> Result<App> {
    let generator = create_generator(&config.generation)?;
    build_with_generator(config, generator).await
}

/// Like [`build`], with a caller-supplied generator.
pub async fn build_with_generator(config: &Config, generator: Arc<dyn Generator>) -> Result<App> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let store = Arc::new(SqliteStore::new(pool.clone()));
    let profiles = Arc::new(SqliteProfiles::new(pool.clone()));
    let extractor = Arc::new(PdfExtractor::new(config.upload.spool_dir.clone()));

    let service = DocumentService::new(store, extractor, generator)
        .with_profiles(profiles.clone())
        .with_default_interests(config.generation.default_interests.clone());

    Ok(App {
        service: Arc::new(service),
        profiles,
        pool,
    })
}
