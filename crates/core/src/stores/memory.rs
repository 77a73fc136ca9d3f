use crate::error::VectorStoreError;
use crate::models::{Chunk, RetrievedChunk};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredChunk {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// Process-local vector index. Scores are cosine distances, so lower is
/// closer, matching what the Chroma backend reports.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<Vec<StoredChunk>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl VectorIndex for InMemoryStore {
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

        let mut entries = self.entries.write().await;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            let same_slot = |stored: &StoredChunk| {
                chunk.metadata.document_id.is_some()
                    && stored.chunk.metadata.document_id == chunk.metadata.document_id
                    && stored.chunk.metadata.policy_id == chunk.metadata.policy_id
                    && stored.chunk.chunk_index == chunk.chunk_index
            };
            let replacement = StoredChunk {
                chunk: chunk.clone(),
                embedding: embedding.clone(),
            };
            match entries.iter_mut().find(|stored| same_slot(stored)) {
                Some(existing) => *existing = replacement,
                None => entries.push(replacement),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        policy_id: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, VectorStoreError> {
        let entries = self.entries.read().await;
        let mut hits = entries
            .iter()
            .filter(|stored| {
                policy_id.is_none() || stored.chunk.metadata.policy_id.as_deref() == policy_id
            })
            .map(|stored| RetrievedChunk {
                text: stored.chunk.text.clone(),
                score: 1.0 - cosine_similarity(embedding, &stored.embedding),
                page_number: Some(stored.chunk.metadata.page_number),
                document_id: stored.chunk.metadata.document_id.clone(),
                policy_id: stored.chunk.metadata.policy_id.clone(),
            })
            .collect::<Vec<_>>();

        hits.sort_by(|left, right| left.score.total_cmp(&right.score));
        hits.truncate(top_k.max(1));
        Ok(hits)
    }

    async fn heartbeat(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    let dot = left
        .iter()
        .zip(right)
        .map(|(a, b)| f64::from(*a) * f64::from(*b))
        .sum::<f64>();
    let norm = |values: &[f32]| values.iter().map(|v| f64::from(*v).powi(2)).sum::<f64>().sqrt();
    let denominator = norm(left) * norm(right);
    if denominator == 0.0 {
        0.0
    } else {
        dot / denominator
    }
}
