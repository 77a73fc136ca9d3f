use crate::embeddings::Embedder;
use crate::error::QueryError;
use crate::models::{
    ComparisonAnswer, ComparisonSources, CoverageChecklist, RetrievedChunk, SourceRef,
};
use crate::traits::{AnswerGenerator, VectorIndex};
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_TOP_K: usize = 6;

/// Retrieval plus answer generation over the stored policy chunks.
#[derive(Clone)]
pub struct PolicyAssistant {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn AnswerGenerator>,
    top_k: usize,
}

impl PolicyAssistant {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn AnswerGenerator>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            generator,
            top_k: top_k.max(1),
        }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub async fn coverage_check(
        &self,
        policy_id: &str,
        incident_description: &str,
    ) -> Result<CoverageChecklist, QueryError> {
        let query_vector = self.embedder.embed(incident_description).await?;
        let passages = self
            .index
            .query(&query_vector, Some(policy_id), self.top_k)
            .await?;

        tracing::debug!(policy_id, passages = passages.len(), "coverage passages retrieved");

        let mut checklist = self
            .generator
            .coverage_checklist(incident_description, &passages)
            .await?;
        checklist.sources = distinct_sources(&passages);
        Ok(checklist)
    }

    pub async fn compare(
        &self,
        policy_id1: &str,
        policy_id2: &str,
        question: &str,
    ) -> Result<ComparisonAnswer, QueryError> {
        let query_vector = self.embedder.embed(question).await?;

        let (first, second) = tokio::try_join!(
            self.index.query(&query_vector, Some(policy_id1), self.top_k),
            self.index.query(&query_vector, Some(policy_id2), self.top_k)
        )?;

        tracing::debug!(
            policy_id1,
            policy_id2,
            policy1_passages = first.len(),
            policy2_passages = second.len(),
            "comparison passages retrieved"
        );

        let answer = self.generator.compare(question, &first, &second).await?;

        Ok(ComparisonAnswer {
            answer,
            sources: ComparisonSources {
                policy1: distinct_sources(&first),
                policy2: distinct_sources(&second),
            },
        })
    }
}

/// Source references in retrieval order, each page/document pair once.
pub fn distinct_sources(passages: &[RetrievedChunk]) -> Vec<SourceRef> {
    let mut seen = HashSet::new();
    passages
        .iter()
        .map(RetrievedChunk::source_ref)
        .filter(|source| seen.insert(source.clone()))
        .collect()
}
