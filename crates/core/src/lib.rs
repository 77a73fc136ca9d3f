pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod stores;
pub mod summary;
pub mod traits;

pub use chunking::{
    chunk_document, estimate_page, normalize_whitespace, ChunkingConfig, RecursiveTextSplitter,
};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, HttpEmbedder, HttpEmbedderConfig,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{
    ChunkingError, EmbeddingError, ExtractionError, GenerationError, IngestError, QueryError,
    VectorStoreError,
};
pub use extractor::{extract_text_from_pdf, extract_with_timeout, LopdfExtractor, PdfExtractor};
pub use generator::{ChatCompletionConfig, ChatCompletionGenerator, ExtractiveGenerator};
pub use ingest::{
    digest_bytes, discover_pdf_files, IngestionPipeline, IngestionReport, PdfUpload, SkippedPdf,
};
pub use models::{
    Chunk, ChunkMetadata, ComparisonAnswer, ComparisonSources, CoverageChecklist,
    ExtractedTextResult, IngestionOptions, PdfMetadata, PolicyRecord, RetrievedChunk, SourceRef,
};
pub use orchestrator::{PolicyAssistant, DEFAULT_TOP_K};
pub use registry::PolicyRegistry;
pub use stores::{
    ChromaConfig, ChromaStore, CollectionHandle, InMemoryStore, DEFAULT_CHROMA_URL,
    DEFAULT_COLLECTION,
};
pub use summary::{Confidence, PolicySummary};
pub use traits::{AnswerGenerator, VectorIndex};
