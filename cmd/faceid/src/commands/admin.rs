//! Collection administration: init, status, drop.

use faceid::{Config, CreateOutcome, MatchingEngine};
use serde::Serialize;

use super::{build_engine, failure, output_result};
use crate::Cli;

#[derive(Serialize)]
struct InitReport {
    collection: String,
    created: bool,
    size: usize,
    metric: String,
}

#[derive(Serialize)]
struct StatusReport {
    collection: String,
    exists: bool,
    threshold: f32,
    embedder: ProviderStatus,
    store: ProviderStatus,
}

#[derive(Serialize)]
struct ProviderStatus {
    provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimension: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metric: Option<String>,
}

#[derive(Serialize)]
struct DropReport {
    collection: String,
    deleted: bool,
}

pub async fn init(cli: &Cli) -> anyhow::Result<()> {
    let (engine, cfg) = build_engine(cli).await?;
    let report = init_collection(&engine, &cfg).await?;
    output_result(&report, cli.json)
}

/// Create the collection once and report whether this call created it.
async fn init_collection(engine: &MatchingEngine, cfg: &Config) -> anyhow::Result<InitReport> {
    let size = cfg
        .collection_size(engine.embedder().dimension())
        .map_err(failure)?;
    let outcome = engine
        .ensure_ready(size, cfg.store.metric)
        .await
        .map_err(failure)?;
    tracing::info!(collection = engine.collection(), ?outcome, "init");
    Ok(InitReport {
        collection: engine.collection().to_string(),
        created: outcome == CreateOutcome::Created,
        size,
        metric: cfg.store.metric.to_string(),
    })
}

pub async fn status(cli: &Cli) -> anyhow::Result<()> {
    let (engine, cfg) = build_engine(cli).await?;
    let exists = engine
        .collection_exists()
        .await
        .map_err(failure)?;
    let info = engine.embedder().info();
    output_result(
        &StatusReport {
            collection: engine.collection().to_string(),
            exists,
            threshold: cfg.threshold,
            embedder: ProviderStatus {
                provider: cfg.embedder.provider.clone(),
                model: info.as_ref().map(|i| i.model.clone()),
                detector: info.as_ref().map(|i| i.detector.clone()),
                dimension: info.as_ref().map(|i| i.dimension),
                metric: None,
            },
            store: ProviderStatus {
                provider: cfg.store.provider.clone(),
                model: None,
                detector: None,
                dimension: None,
                metric: Some(cfg.store.metric.to_string()),
            },
        },
        cli.json,
    )
}

pub async fn drop_collection(cli: &Cli) -> anyhow::Result<()> {
    let (engine, _) = build_engine(cli).await?;
    engine
        .delete_collection()
        .await
        .map_err(failure)?;
    output_result(
        &DropReport {
            collection: engine.collection().to_string(),
            deleted: true,
        },
        cli.json,
    )
}
