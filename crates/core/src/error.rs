use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("pdf buffer is empty")]
    EmptyInput,

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("pdf has no pages")]
    NoPages,

    #[error("pdf had no readable page text")]
    NoText,

    #[error("pdf extraction timed out after {0}s")]
    Timeout(u64),

    #[error("pdf extraction task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum ChunkingError {
    #[error("invalid chunking config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("invalid vector store endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("collection {0} could not be resolved")]
    CollectionUnavailable(String),

    #[error("embedding count {embeddings} doesn't match chunk count {chunks}")]
    LengthMismatch { chunks: usize, embeddings: usize },
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding server returned {status}: {details}")]
    Server { status: u16, details: String },

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("language model returned {status}")]
    Server { status: u16 },

    #[error("language model returned an empty response")]
    EmptyResponse,

    #[error("could not parse model output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure while turning an uploaded PDF into stored chunks. The variant names
/// the stage that failed.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("chunking failed: {0}")]
    Chunking(#[from] ChunkingError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store failed: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("retrieval failed: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("answer generation failed: {0}")]
    Generation(#[from] GenerationError),
}
