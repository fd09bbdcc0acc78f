//! [`VectorStore`] backed by a Qdrant server over its REST API.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::metric::Metric;
use crate::vecstore::{
    CollectionConfig, CreateOutcome, IdentityRecord, Point, PointId, ScoredRecord, VectorStore,
    check_finite, validate_collection_name,
};

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";

/// Qdrant response envelope: `{"result": ..., "status": "ok", "time": ...}`.
#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct ExistsResult {
    exists: bool,
}

#[derive(Serialize, Deserialize)]
struct VectorParams {
    size: usize,
    distance: String,
}

#[derive(Serialize)]
struct CreateRequest {
    vectors: VectorParams,
}

#[derive(Deserialize)]
struct CollectionInfo {
    config: CollectionInfoConfig,
}

#[derive(Deserialize)]
struct CollectionInfoConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    points: &'a [Point],
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct SearchHit {
    id: PointId,
    score: f32,
    payload: Option<IdentityRecord>,
}

fn distance_name(metric: Metric) -> &'static str {
    match metric {
        Metric::Cosine => "Cosine",
        Metric::Dot => "Dot",
    }
}

fn parse_distance(name: &str) -> Result<Metric, StoreError> {
    match name {
        "Cosine" => Ok(Metric::Cosine),
        "Dot" => Ok(Metric::Dot),
        other => Err(StoreError::InvalidResponse(format!(
            "unsupported distance {other:?}"
        ))),
    }
}

/// Path of a collection endpoint. Names are restricted to URL-safe
/// characters, so they are used unescaped.
fn collection_path(name: &str, rest: &str) -> Result<String, StoreError> {
    validate_collection_name(name)?;
    Ok(format!("/collections/{name}{rest}"))
}

/// QdrantStore talks to a Qdrant server.
///
/// Collection schemas are cached after the first create or lookup so that
/// vector lengths are checked locally before a request is sent. A length
/// that disagrees with the cached schema triggers one refetch, so a
/// collection re-created elsewhere with another size is picked up.
pub struct QdrantStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    schemas: RwLock<HashMap<String, CollectionConfig>>,
}

impl QdrantStore {
    /// Create a store for the server at `base_url` (empty selects
    /// [`DEFAULT_QDRANT_URL`]). No request is sent until first use.
    pub fn new(base_url: &str) -> Self {
        let base_url = if base_url.is_empty() {
            DEFAULT_QDRANT_URL
        } else {
            base_url
        };
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            schemas: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        if !api_key.is_empty() {
            self.api_key = Some(api_key.to_string());
        }
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let rb = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => rb.header("api-key", key),
            None => rb,
        }
    }

    async fn send(&self, rb: RequestBuilder) -> Result<Response, StoreError> {
        rb.send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    /// Turn a non-2xx response into an error; 404 means the collection is gone.
    async fn check(&self, name: &str, resp: Response) -> Result<Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::NOT_FOUND {
            self.schemas.write().remove(name);
            return Err(StoreError::CollectionNotFound(name.to_string()));
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Backend {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    async fn read<T: DeserializeOwned>(resp: Response) -> Result<T, StoreError> {
        resp.json::<Envelope<T>>()
            .await
            .map(|e| e.result)
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))
    }

    async fn fetch_schema(&self, name: &str) -> Result<CollectionConfig, StoreError> {
        let resp = self
            .send(self.request(Method::GET, &collection_path(name, "")?))
            .await?;
        let resp = self.check(name, resp).await?;
        let info: CollectionInfo = Self::read(resp).await?;
        let params = info.config.params.vectors;
        let config = CollectionConfig::new(params.size, parse_distance(&params.distance)?);
        self.schemas.write().insert(name.to_string(), config);
        Ok(config)
    }

    /// Schema that accepts vectors of every length in `lens`, refetched
    /// once when the cached one does not.
    async fn schema_for(&self, name: &str, lens: &[usize]) -> Result<CollectionConfig, StoreError> {
        let fits = |c: &CollectionConfig| lens.iter().try_for_each(|&n| c.check_len(n));
        let cached = self.schemas.read().get(name).copied();
        if let Some(config) = cached {
            if fits(&config).is_ok() {
                return Ok(config);
            }
            tracing::debug!(collection = name, %config, "cached schema rejects vector, refetching");
        }
        let config = self.fetch_schema(name).await?;
        fits(&config)?;
        Ok(config)
    }

    fn compare_schema(
        name: &str,
        existing: CollectionConfig,
        wanted: CollectionConfig,
    ) -> Result<CreateOutcome, StoreError> {
        if existing != wanted {
            return Err(StoreError::SchemaConflict {
                name: name.to_string(),
                existing: existing.to_string(),
            });
        }
        Ok(CreateOutcome::AlreadyExists)
    }
}

/// Extract `status.error` from a Qdrant error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["status"]["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let resp = self
            .send(self.request(Method::GET, &collection_path(name, "/exists")?))
            .await?;
        let resp = self.check(name, resp).await?;
        let result: ExistsResult = Self::read(resp).await?;
        if !result.exists {
            self.schemas.write().remove(name);
        }
        Ok(result.exists)
    }

    async fn create_collection(
        &self,
        name: &str,
        config: CollectionConfig,
    ) -> Result<CreateOutcome, StoreError> {
        config.validate()?;
        if self.collection_exists(name).await? {
            let existing = self.fetch_schema(name).await?;
            return Self::compare_schema(name, existing, config);
        }

        let body = CreateRequest {
            vectors: VectorParams {
                size: config.size,
                distance: distance_name(config.metric).to_string(),
            },
        };
        let resp = self
            .send(
                self.request(Method::PUT, &collection_path(name, "")?)
                    .json(&body),
            )
            .await?;

        // Lost a creation race against another process.
        if resp.status() == StatusCode::CONFLICT {
            tracing::debug!(collection = name, "collection created concurrently");
            let existing = self.fetch_schema(name).await?;
            return Self::compare_schema(name, existing, config);
        }

        self.check(name, resp).await?;
        self.schemas.write().insert(name.to_string(), config);
        tracing::info!(collection = name, %config, url = %self.base_url, "collection created");
        Ok(CreateOutcome::Created)
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionConfig, StoreError> {
        self.fetch_schema(name).await
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        let resp = self
            .send(self.request(Method::DELETE, &collection_path(name, "")?))
            .await?;
        let resp = self.check(name, resp).await?;
        let deleted: bool = Self::read(resp).await?;
        self.schemas.write().remove(name);
        if !deleted {
            return Err(StoreError::CollectionNotFound(name.to_string()));
        }
        tracing::info!(collection = name, "collection deleted");
        Ok(())
    }

    async fn upsert_points(&self, name: &str, points: Vec<Point>) -> Result<(), StoreError> {
        for p in &points {
            check_finite(&p.vector)?;
        }
        let lens: Vec<usize> = points.iter().map(|p| p.vector.len()).collect();
        self.schema_for(name, &lens).await?;

        let resp = self
            .send(
                self.request(Method::PUT, &collection_path(name, "/points?wait=true")?)
                    .json(&UpsertRequest { points: &points }),
            )
            .await?;
        self.check(name, resp).await?;
        tracing::debug!(collection = name, count = points.len(), "points upserted");
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        check_finite(query)?;
        self.schema_for(name, &[query.len()]).await?;
        if limit == 0 {
            return Ok(vec![]);
        }

        let body = SearchRequest {
            vector: query,
            limit,
            with_payload: true,
        };
        let resp = self
            .send(
                self.request(Method::POST, &collection_path(name, "/points/search")?)
                    .json(&body),
            )
            .await?;
        let resp = self.check(name, resp).await?;
        let hits: Vec<SearchHit> = Self::read(resp).await?;

        hits.into_iter()
            .map(|hit| {
                let record = hit.payload.ok_or_else(|| {
                    StoreError::InvalidResponse(format!("point {} has no payload", hit.id))
                })?;
                Ok(ScoredRecord {
                    id: hit.id,
                    score: hit.score,
                    record,
                })
            })
            .collect()
    }
}
