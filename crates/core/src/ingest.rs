use crate::chunking::{chunk_document, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::extractor::{extract_with_timeout, PdfExtractor};
use crate::models::{IngestionOptions, PolicyRecord};
use crate::traits::VectorIndex;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use walkdir::WalkDir;

const EMBED_BATCH_SIZE: usize = 64;

/// A PDF handed to the pipeline together with the identity it is filed under.
#[derive(Debug, Clone)]
pub struct PdfUpload {
    pub bytes: Vec<u8>,
    pub policy_id: String,
    pub name: String,
    pub file_name: String,
}

#[derive(Clone)]
pub struct IngestionPipeline {
    extractor: Arc<dyn PdfExtractor>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    options: IngestionOptions,
}

impl IngestionPipeline {
    pub fn new(
        extractor: Arc<dyn PdfExtractor>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        options: IngestionOptions,
    ) -> Result<Self, IngestError> {
        ChunkingConfig::from(&options).validate()?;
        Ok(Self {
            extractor,
            embedder,
            index,
            options,
        })
    }

    /// Extracts, chunks, embeds and stores one PDF. Nothing is written to the
    /// vector store unless every earlier stage succeeded.
    pub async fn ingest_pdf(&self, upload: PdfUpload) -> Result<PolicyRecord, IngestError> {
        let PdfUpload {
            bytes,
            policy_id,
            name,
            file_name,
        } = upload;

        if bytes.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "{file_name} is empty"
            )));
        }

        let document_id = digest_bytes(&bytes);
        let timeout = Duration::from_secs(self.options.pdf_timeout_secs);
        let extracted = extract_with_timeout(self.extractor.clone(), bytes, timeout).await?;

        let chunks = chunk_document(
            &extracted.text,
            extracted.page_count,
            Some(&document_id),
            Some(&policy_id),
            ChunkingConfig::from(&self.options),
        )?;

        let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect::<Vec<_>>();
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            embeddings.extend(self.embedder.embed_batch(batch).await?);
        }

        self.index.upsert_chunks(&chunks, &embeddings).await?;

        tracing::info!(
            policy_id = %policy_id,
            document_id = %document_id,
            pages = extracted.page_count,
            chunks = chunks.len(),
            "policy document ingested"
        );

        Ok(PolicyRecord {
            policy_id,
            name,
            file_name,
            document_id,
            page_count: extracted.page_count,
            chunk_count: chunks.len(),
            metadata: extracted.metadata,
            uploaded_at: Utc::now(),
            summary: None,
        })
    }

    pub async fn ingest_file(&self, path: &Path, policy_id: String) -> Result<PolicyRecord, IngestError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                IngestError::InvalidArgument(format!("path missing filename: {}", path.display()))
            })?
            .to_string();
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&file_name)
            .to_string();
        let bytes = tokio::fs::read(path).await?;

        self.ingest_pdf(PdfUpload {
            bytes,
            policy_id,
            name,
            file_name,
        })
        .await
    }

    /// Ingests every PDF under `folder`. Files that fail are reported and
    /// skipped; the run only fails when there is nothing to ingest.
    pub async fn ingest_folder_best_effort(
        &self,
        folder: &Path,
    ) -> Result<IngestionReport, IngestError> {
        let files = discover_pdf_files(folder);

        if files.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "no pdf files found in {}",
                folder.display()
            )));
        }

        let mut report = IngestionReport::default();
        for path in files {
            let policy_id = uuid::Uuid::new_v4().to_string();
            match self.ingest_file(&path, policy_id).await {
                Ok(record) => report.records.push(record),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping pdf");
                    report.skipped_files.push(SkippedPdf {
                        path,
                        reason: error.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }
}

#[derive(Debug)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestionReport {
    pub records: Vec<PolicyRecord>,
    pub skipped_files: Vec<SkippedPdf>,
}

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Hex SHA-256 of the document bytes; re-uploading the same file maps onto the
/// same chunk ids.
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
