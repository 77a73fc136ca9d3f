use crate::error::VectorStoreError;
use crate::models::{Chunk, RetrievedChunk};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

pub const DEFAULT_CHROMA_URL: &str = "http://localhost:8000";
pub const DEFAULT_COLLECTION: &str = "document_embeddings";
pub const COLLECTION_DESCRIPTION: &str = "Pet insurance policy document embeddings";

const BACKEND: &str = "chroma";

#[derive(Debug, Clone)]
pub struct ChromaConfig {
    pub endpoint: String,
    pub tenant: String,
    pub database: String,
    pub collection: String,
    pub timeout: Duration,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CHROMA_URL.to_string(),
            tenant: "default_tenant".to_string(),
            database: "default_database".to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    pub id: String,
    pub name: String,
}

/// Chroma client bound to a single collection. The collection is resolved on
/// first use and cached; concurrent first callers share one resolution. A 404
/// from the cached collection drops the cache and resolves once more.
pub struct ChromaStore {
    client: Client,
    api_base: Url,
    heartbeat_url: Url,
    collection_name: String,
    collection: Mutex<Option<CollectionHandle>>,
}

impl ChromaStore {
    pub fn new(config: ChromaConfig) -> Result<Self, VectorStoreError> {
        let mut root = Url::parse(&config.endpoint)?;
        if !root.path().ends_with('/') {
            let with_slash = format!("{}/", root.path());
            root.set_path(&with_slash);
        }

        let api_base = root.join(&format!(
            "api/v2/tenants/{}/databases/{}/",
            config.tenant, config.database
        ))?;
        let heartbeat_url = root.join("api/v2/heartbeat")?;
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_base,
            heartbeat_url,
            collection_name: config.collection,
            collection: Mutex::new(None),
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub async fn collection(&self) -> Result<CollectionHandle, VectorStoreError> {
        let mut cached = self.collection.lock().await;
        if let Some(handle) = cached.as_ref() {
            return Ok(handle.clone());
        }
        let handle = self.resolve_collection().await?;
        *cached = Some(handle.clone());
        Ok(handle)
    }

    // Only clears the cache if it still holds the stale id.
    async fn forget_collection(&self, stale_id: &str) {
        let mut cached = self.collection.lock().await;
        if cached.as_ref().is_some_and(|handle| handle.id == stale_id) {
            *cached = None;
        }
    }

    async fn resolve_collection(&self) -> Result<CollectionHandle, VectorStoreError> {
        if let Some(existing) = self.find_collection().await? {
            tracing::debug!(collection = %existing.name, id = %existing.id, "using existing collection");
            return Ok(existing);
        }

        if let Some(created) = self.create_collection().await? {
            tracing::info!(collection = %created.name, id = %created.id, "created collection");
            return Ok(created);
        }

        // Another writer created it between our list and create.
        self.find_collection()
            .await?
            .ok_or_else(|| VectorStoreError::CollectionUnavailable(self.collection_name.clone()))
    }

    async fn find_collection(&self) -> Result<Option<CollectionHandle>, VectorStoreError> {
        let response = self
            .client
            .get(self.api_base.join("collections")?)
            .send()
            .await?;
        let listed = read_json(response).await?;

        let found = listed
            .as_array()
            .into_iter()
            .flatten()
            .find(|entry| {
                entry.pointer("/name").and_then(Value::as_str) == Some(self.collection_name.as_str())
            })
            .map(parse_handle)
            .transpose()?;

        Ok(found)
    }

    /// `Ok(None)` means the server reported that the collection already exists.
    async fn create_collection(&self) -> Result<Option<CollectionHandle>, VectorStoreError> {
        let response = self
            .client
            .post(self.api_base.join("collections")?)
            .json(&json!({
                "name": self.collection_name,
                "metadata": { "description": COLLECTION_DESCRIPTION },
                "get_or_create": false,
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let created: Value = response.json().await?;
            return parse_handle(&created).map(Some);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT || body.to_lowercase().contains("already exists") {
            tracing::debug!(collection = %self.collection_name, "collection already exists");
            return Ok(None);
        }

        Err(backend_error(status, &body))
    }

    async fn post_to_collection(
        &self,
        operation: &str,
        body: &Value,
    ) -> Result<Value, VectorStoreError> {
        let handle = self.collection().await?;
        let response = self.send_to_collection(&handle, operation, body).await?;
        if response.status() != StatusCode::NOT_FOUND {
            return read_json(response).await;
        }

        tracing::warn!(collection = %handle.name, id = %handle.id, "collection id is stale; resolving again");
        self.forget_collection(&handle.id).await;
        let handle = self.collection().await?;
        let response = self.send_to_collection(&handle, operation, body).await?;
        read_json(response).await
    }

    async fn send_to_collection(
        &self,
        handle: &CollectionHandle,
        operation: &str,
        body: &Value,
    ) -> Result<reqwest::Response, VectorStoreError> {
        let url = self
            .api_base
            .join(&format!("collections/{}/{}", handle.id, operation))?;
        Ok(self.client.post(url).json(body).send().await?)
    }
}

#[async_trait]
impl VectorIndex for ChromaStore {
    async fn upsert_chunks(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), VectorStoreError> {
        if chunks.len() != embeddings.len() {
            return Err(VectorStoreError::LengthMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let ids = chunks.iter().map(chunk_id).collect::<Vec<_>>();
        let documents = chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>();
        let metadatas = chunks.iter().map(chunk_metadata).collect::<Vec<_>>();

        let body = json!({
            "ids": ids,
            "embeddings": embeddings,
            "documents": documents,
            "metadatas": metadatas,
        });
        self.post_to_collection("upsert", &body).await?;

        tracing::debug!(count = chunks.len(), "upserted chunks");
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        policy_id: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, VectorStoreError> {
        let mut body = json!({
            "query_embeddings": [embedding],
            "n_results": top_k.max(1),
            "include": ["documents", "metadatas", "distances"],
        });
        if let Some(policy_id) = policy_id {
            body["where"] = json!({ "policyId": policy_id });
        }

        let parsed = self.post_to_collection("query", &body).await?;

        let documents = first_row(&parsed, "/documents");
        let metadatas = first_row(&parsed, "/metadatas");
        let distances = first_row(&parsed, "/distances");

        let hits = documents
            .iter()
            .enumerate()
            .map(|(index, document)| {
                let metadata = metadatas.get(index);
                let field = |name: &str| metadata.and_then(|value| value.get(name));
                RetrievedChunk {
                    text: document.as_str().unwrap_or_default().to_string(),
                    score: distances.get(index).and_then(Value::as_f64).unwrap_or(0.0),
                    page_number: field("pageNumber")
                        .and_then(Value::as_u64)
                        .and_then(|page| u32::try_from(page).ok()),
                    document_id: field("documentId").and_then(Value::as_str).map(str::to_string),
                    policy_id: field("policyId").and_then(Value::as_str).map(str::to_string),
                }
            })
            .collect();

        Ok(hits)
    }

    async fn heartbeat(&self) -> Result<(), VectorStoreError> {
        let response = self.client.get(self.heartbeat_url.clone()).send().await?;
        read_json(response).await.map(|_| ())
    }
}

// The same document may be ingested under several policies, so the policy is
// part of the id.
fn chunk_id(chunk: &Chunk) -> String {
    let metadata = &chunk.metadata;
    match (&metadata.policy_id, &metadata.document_id) {
        (Some(policy_id), Some(document_id)) => {
            format!("{policy_id}:{document_id}:{}", chunk.chunk_index)
        }
        (None, Some(document_id)) => format!("{document_id}:{}", chunk.chunk_index),
        (_, None) => uuid::Uuid::new_v4().to_string(),
    }
}

// Chroma metadata values must be scalars, so absent ids are left out.
fn chunk_metadata(chunk: &Chunk) -> Value {
    let mut metadata = Map::new();
    metadata.insert("pageNumber".to_string(), json!(chunk.metadata.page_number));
    metadata.insert("chunkIndex".to_string(), json!(chunk.chunk_index));
    if let Some(document_id) = &chunk.metadata.document_id {
        metadata.insert("documentId".to_string(), json!(document_id));
    }
    if let Some(policy_id) = &chunk.metadata.policy_id {
        metadata.insert("policyId".to_string(), json!(policy_id));
    }
    Value::Object(metadata)
}

fn parse_handle(value: &Value) -> Result<CollectionHandle, VectorStoreError> {
    let id = value.pointer("/id").and_then(Value::as_str);
    let name = value.pointer("/name").and_then(Value::as_str);
    match (id, name) {
        (Some(id), Some(name)) => Ok(CollectionHandle {
            id: id.to_string(),
            name: name.to_string(),
        }),
        _ => Err(VectorStoreError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!("collection without id or name: {value}"),
        }),
    }
}

fn first_row(parsed: &Value, pointer: &str) -> Vec<Value> {
    parsed
        .pointer(pointer)
        .and_then(|rows| rows.get(0))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

async fn read_json(response: reqwest::Response) -> Result<Value, VectorStoreError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(backend_error(status, &body));
    }
    let body = response.text().await?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|error| VectorStoreError::BackendResponse {
        backend: BACKEND.to_string(),
        details: format!("invalid json: {error}"),
    })
}

fn backend_error(status: StatusCode, body: &str) -> VectorStoreError {
    VectorStoreError::BackendResponse {
        backend: BACKEND.to_string(),
        details: if body.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {body}")
        },
    }
}
