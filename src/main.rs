use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod models;
mod services;
#[cfg(test)]
mod test_support;

use config::{AppConfig, RunMode};
use services::{
    key_builder::{Clock, KeyBuilder, SystemClock},
    metadata_cache::MetadataCache,
    reconciler::{ReconcileOutcome, Reconciler},
    remote_store::RemoteStore,
    s3_store::{S3RemoteStore, S3Settings},
    uploader::Uploader,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = AppConfig::from_env_and_args().context("loading configuration")?;

    tracing::info!("Starting object-sync with config: {:?}", cfg);

    // --- Open the metadata cache (schema is created when missing) ---
    tracing::debug!("Connecting using raw URL => {}", cfg.database_url);
    let cache = MetadataCache::open(&cfg.database_url)
        .await
        .with_context(|| format!("opening metadata cache at {}", cfg.database_url))?;

    if mode == RunMode::Migrate {
        tracing::info!("Metadata cache initialized.");
        return Ok(());
    }

    // --- Remote store + clock ---
    let store: Arc<dyn RemoteStore> = Arc::new(
        S3RemoteStore::connect(S3Settings {
            bucket: cfg.bucket.clone(),
            region: cfg.region.clone(),
            endpoint: cfg.endpoint.clone(),
            force_path_style: cfg.force_path_style,
            page_size: cfg.page_size,
        })
        .await,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // --- Reconcile before trusting the cache ---
    let reconciler = Reconciler::new(store.clone(), cache.clone(), clock.clone());
    match reconciler.reconcile().await? {
        ReconcileOutcome::Applied(summary) if summary.is_noop() => {
            tracing::info!("Metadata cache already matches bucket {}", cfg.bucket)
        }
        ReconcileOutcome::Applied(summary) => tracing::info!(
            added = summary.added,
            updated = summary.updated,
            deleted = summary.deleted,
            "Metadata cache reconciled with bucket {}",
            cfg.bucket
        ),
        ReconcileOutcome::ListingUnavailable => {
            tracing::warn!("Bucket listing unavailable; cache left unchanged.")
        }
    }

    if mode == RunMode::ReconcileOnly {
        return Ok(());
    }

    // --- Upload whatever is missing ---
    let keys = KeyBuilder::new(cfg.granularity, clock.clone());
    let uploader = Uploader::new(store, cache, keys, clock);
    let summary = uploader
        .sync_directory(&cfg.data_dir)
        .await
        .with_context(|| format!("syncing {}", cfg.data_dir.display()))?;

    tracing::info!(
        scanned = summary.scanned,
        uploaded = summary.uploaded,
        skipped = summary.skipped,
        "Upload pass complete"
    );

    Ok(())
}
