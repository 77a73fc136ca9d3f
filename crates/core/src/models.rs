use crate::summary::{Confidence, PolicySummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedTextResult {
    pub text: String,
    pub page_count: u32,
    pub metadata: PdfMetadata,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub page_number: u32,
    pub document_id: Option<String>,
    pub policy_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub text: String,
    pub chunk_index: usize,
    pub metadata: ChunkMetadata,
}

/// A chunk returned by a similarity query. `score` is the store's distance,
/// so lower is closer.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    pub text: String,
    pub score: f64,
    pub page_number: Option<u32>,
    pub document_id: Option<String>,
    pub policy_id: Option<String>,
}

impl RetrievedChunk {
    pub fn source_ref(&self) -> SourceRef {
        SourceRef {
            page_number: self.page_number,
            document_id: self.document_id.clone(),
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub page_number: Option<u32>,
    pub document_id: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRecord {
    pub policy_id: String,
    pub name: String,
    pub file_name: String,
    pub document_id: String,
    pub page_count: u32,
    pub chunk_count: usize,
    pub metadata: PdfMetadata,
    pub uploaded_at: DateTime<Utc>,
    pub summary: Option<PolicySummary>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoverageChecklist {
    pub is_covered: bool,
    pub confidence: Confidence,
    pub explanation: String,
    pub required_documents: Vec<String>,
    pub action_steps: Vec<String>,
    pub relevant_exclusions: Vec<String>,
    pub waiting_period_notes: Option<String>,
    pub sources: Vec<SourceRef>,
}

impl Default for CoverageChecklist {
    fn default() -> Self {
        Self {
            is_covered: false,
            confidence: Confidence::Low,
            explanation: String::new(),
            required_documents: Vec::new(),
            action_steps: Vec::new(),
            relevant_exclusions: Vec::new(),
            waiting_period_notes: None,
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSources {
    pub policy1: Vec<SourceRef>,
    pub policy2: Vec<SourceRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonAnswer {
    pub answer: String,
    pub sources: ComparisonSources,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub pdf_timeout_secs: u64,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
            pdf_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_serializes_camel_case_without_missing_ids() {
        let chunk = Chunk {
            text: "Accidents are covered.".to_string(),
            chunk_index: 3,
            metadata: ChunkMetadata {
                page_number: 2,
                document_id: None,
                policy_id: Some("p-1".to_string()),
            },
        };

        let json = serde_json::to_value(&chunk).expect("chunk should serialize");
        assert_eq!(json["chunkIndex"], 3);
        assert_eq!(json["metadata"]["pageNumber"], 2);
        assert_eq!(json["metadata"]["policyId"], "p-1");
        assert!(json["metadata"].get("documentId").is_none());
    }

    #[test]
    fn coverage_checklist_fills_missing_fields_with_defaults() {
        let parsed: CoverageChecklist =
            serde_json::from_str(r#"{"isCovered": true, "confidence": "high"}"#)
                .expect("partial checklist should parse");

        assert!(parsed.is_covered);
        assert_eq!(parsed.confidence, Confidence::High);
        assert!(parsed.required_documents.is_empty());
        assert!(parsed.waiting_period_notes.is_none());
    }
}
