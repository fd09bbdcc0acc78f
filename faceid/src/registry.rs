//! Provider registry: build embedders and vector stores by name.

use std::collections::HashMap;
use std::sync::Arc;

use faceid_embed::{DeepFace, EmbedConfig, FaceEmbedder, Thumbnail};
use faceid_vecstore::{MemoryStore, QdrantStore, VectorStore};

use crate::config::{Config, EmbedderConfig, StoreConfig};
use crate::engine::MatchingEngine;
use crate::error::ConfigError;

type EmbedderCtor =
    Box<dyn Fn(&EmbedderConfig) -> Result<Arc<dyn FaceEmbedder>, ConfigError> + Send + Sync>;
type StoreCtor =
    Box<dyn Fn(&StoreConfig) -> Result<Arc<dyn VectorStore>, ConfigError> + Send + Sync>;

/// Registry maps provider names (case-insensitive) to constructors.
///
/// Lookups of unregistered names fail with [`ConfigError::UnknownProvider`];
/// there is no fallback provider.
#[derive(Default)]
pub struct Registry {
    embedders: HashMap<String, EmbedderCtor>,
    stores: HashMap<String, StoreCtor>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the providers shipped in this workspace:
    /// embedders `deepface`, `thumbnail`; stores `qdrant`, `memory`.
    pub fn builtin() -> Self {
        let mut reg = Self::new();
        reg.embedders.insert("deepface".into(), Box::new(deepface));
        reg.embedders.insert("thumbnail".into(), Box::new(thumbnail));
        reg.stores.insert("qdrant".into(), Box::new(qdrant));
        reg.stores.insert("memory".into(), Box::new(memory));
        reg
    }

    pub fn register_embedder<F>(&mut self, name: &str, ctor: F) -> Result<(), ConfigError>
    where
        F: Fn(&EmbedderConfig) -> Result<Arc<dyn FaceEmbedder>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        let key = name.to_lowercase();
        if self.embedders.contains_key(&key) {
            return Err(ConfigError::DuplicateProvider {
                kind: "embedder",
                name: name.to_string(),
            });
        }
        self.embedders.insert(key, Box::new(ctor));
        Ok(())
    }

    pub fn register_store<F>(&mut self, name: &str, ctor: F) -> Result<(), ConfigError>
    where
        F: Fn(&StoreConfig) -> Result<Arc<dyn VectorStore>, ConfigError> + Send + Sync + 'static,
    {
        let key = name.to_lowercase();
        if self.stores.contains_key(&key) {
            return Err(ConfigError::DuplicateProvider {
                kind: "store",
                name: name.to_string(),
            });
        }
        self.stores.insert(key, Box::new(ctor));
        Ok(())
    }

    /// Registered embedder names, sorted.
    pub fn embedder_names(&self) -> Vec<&str> {
        sorted_keys(&self.embedders)
    }

    /// Registered store names, sorted.
    pub fn store_names(&self) -> Vec<&str> {
        sorted_keys(&self.stores)
    }

    /// Construct the embedder named by `cfg.provider`. It is not configured yet.
    pub fn embedder(&self, cfg: &EmbedderConfig) -> Result<Arc<dyn FaceEmbedder>, ConfigError> {
        let ctor = self
            .embedders
            .get(&cfg.provider.to_lowercase())
            .ok_or_else(|| ConfigError::UnknownProvider {
                kind: "embedder",
                name: cfg.provider.clone(),
                known: self.embedder_names().join(", "),
            })?;
        ctor(cfg)
    }

    /// Construct the store named by `cfg.provider`.
    pub fn store(&self, cfg: &StoreConfig) -> Result<Arc<dyn VectorStore>, ConfigError> {
        let ctor = self
            .stores
            .get(&cfg.provider.to_lowercase())
            .ok_or_else(|| ConfigError::UnknownProvider {
                kind: "store",
                name: cfg.provider.clone(),
                known: self.store_names().join(", "),
            })?;
        ctor(cfg)
    }

    /// Build both providers, configure the embedder once, and wrap them in
    /// an engine. No request reaches the vector backend.
    pub async fn build(&self, cfg: &Config) -> Result<MatchingEngine, ConfigError> {
        let embedder = self.embedder(&cfg.embedder)?;
        let info = embedder
            .configure(&cfg.embedder.model, &cfg.embedder.detector)
            .await?;
        let store = self.store(&cfg.store)?;
        tracing::info!(
            embedder = %cfg.embedder.provider,
            model = %info.model,
            detector = %info.detector,
            store = %cfg.store.provider,
            collection = %cfg.collection,
            "engine built"
        );
        Ok(MatchingEngine::new(embedder, store, cfg.collection.clone()))
    }

    /// [`Registry::build`], then make sure the collection exists with the
    /// configured size and metric.
    pub async fn start(&self, cfg: &Config) -> Result<MatchingEngine, ConfigError> {
        let engine = self.build(cfg).await?;
        let size = cfg.collection_size(engine.embedder().dimension())?;
        engine.ensure_ready(size, cfg.store.metric).await?;
        Ok(engine)
    }
}

fn deepface(cfg: &EmbedderConfig) -> Result<Arc<dyn FaceEmbedder>, ConfigError> {
    let ec = EmbedConfig::default()
        .with_base_url(&cfg.base_url)
        .with_api_key(&cfg.api_key)
        .with_dimension(cfg.dimension);
    Ok(Arc::new(DeepFace::with_config(ec)))
}

fn thumbnail(_: &EmbedderConfig) -> Result<Arc<dyn FaceEmbedder>, ConfigError> {
    Ok(Arc::new(Thumbnail::new()))
}

fn qdrant(cfg: &StoreConfig) -> Result<Arc<dyn VectorStore>, ConfigError> {
    Ok(Arc::new(
        QdrantStore::new(&cfg.url).with_api_key(&cfg.api_key),
    ))
}

fn memory(_: &StoreConfig) -> Result<Arc<dyn VectorStore>, ConfigError> {
    Ok(Arc::new(MemoryStore::new()))
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut names: Vec<&str> = map.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}
