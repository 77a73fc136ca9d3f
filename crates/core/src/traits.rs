use crate::error::{GenerationError, VectorStoreError};
use crate::models::{Chunk, CoverageChecklist, RetrievedChunk};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert_chunks(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), VectorStoreError>;

    /// Nearest chunks to `embedding`, restricted to one policy when
    /// `policy_id` is set.
    async fn query(
        &self,
        embedding: &[f32],
        policy_id: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, VectorStoreError>;

    async fn heartbeat(&self) -> Result<(), VectorStoreError>;
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn coverage_checklist(
        &self,
        incident_description: &str,
        passages: &[RetrievedChunk],
    ) -> Result<CoverageChecklist, GenerationError>;

    async fn compare(
        &self,
        question: &str,
        policy1_passages: &[RetrievedChunk],
        policy2_passages: &[RetrievedChunk],
    ) -> Result<String, GenerationError>;
}
