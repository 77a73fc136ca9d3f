use clap::{Args, ValueEnum};
use pet_policy_core::{
    ChatCompletionConfig, ChromaConfig, HttpEmbedderConfig, IngestionOptions, DEFAULT_CHROMA_URL,
    DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_TOP_K,
};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VectorBackend {
    /// Chroma server over HTTP.
    Chroma,
    /// Process-local index, lost on exit.
    Memory,
}

/// Runtime settings. Every flag falls back to an environment variable, and a
/// `.env` file is loaded before parsing.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Address the HTTP server listens on.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3001")]
    pub bind: SocketAddr,

    #[arg(long, env = "VECTOR_BACKEND", value_enum, default_value_t = VectorBackend::Chroma)]
    pub vector_backend: VectorBackend,

    #[arg(long, env = "CHROMA_URL", default_value = DEFAULT_CHROMA_URL)]
    pub chroma_url: String,

    #[arg(long, env = "CHROMA_TENANT", default_value = "default_tenant")]
    pub chroma_tenant: String,

    #[arg(long, env = "CHROMA_DATABASE", default_value = "default_database")]
    pub chroma_database: String,

    /// Collection holding every policy's chunks.
    #[arg(long, env = "CHROMA_COLLECTION", default_value = DEFAULT_COLLECTION)]
    pub collection: String,

    /// Maximum chunk length in characters.
    #[arg(long, env = "CHUNK_SIZE", default_value_t = 1_000)]
    pub chunk_size: usize,

    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = 200)]
    pub chunk_overlap: usize,

    /// Passages retrieved per policy for each question.
    #[arg(long, env = "TOP_K", default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// OpenAI-compatible base URL, e.g. https://api.openai.com/v1. Without it
    /// answers are extractive and embeddings are computed locally.
    #[arg(long, env = "LLM_BASE_URL")]
    pub llm_base_url: Option<String>,

    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4o-mini")]
    pub llm_model: String,

    #[arg(long, env = "LLM_MAX_TOKENS", default_value_t = 1_024)]
    pub llm_max_tokens: u32,

    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value_t = 60)]
    pub llm_timeout_secs: u64,

    /// Remote embedding model. Requires --llm-base-url.
    #[arg(long, env = "EMBEDDING_MODEL")]
    pub embedding_model: Option<String>,

    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    pub embedding_dimensions: usize,

    #[arg(long, env = "PDF_TIMEOUT_SECS", default_value_t = 30)]
    pub pdf_timeout_secs: u64,

    #[arg(long, env = "VECTOR_STORE_TIMEOUT_SECS", default_value_t = 15)]
    pub vector_store_timeout_secs: u64,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Allowed CORS origin. Any origin is allowed when unset.
    #[arg(long, env = "CORS_ORIGIN")]
    pub cors_origin: Option<String>,
}

impl Settings {
    pub fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            pdf_timeout_secs: self.pdf_timeout_secs,
        }
    }

    pub fn chroma_config(&self) -> ChromaConfig {
        ChromaConfig {
            endpoint: self.chroma_url.clone(),
            tenant: self.chroma_tenant.clone(),
            database: self.chroma_database.clone(),
            collection: self.collection.clone(),
            timeout: Duration::from_secs(self.vector_store_timeout_secs),
        }
    }

    pub fn chat_config(&self) -> Option<ChatCompletionConfig> {
        let base_url = self.llm_base_url.clone()?;
        Some(ChatCompletionConfig {
            base_url,
            api_key: self.llm_api_key.clone(),
            model: self.llm_model.clone(),
            max_tokens: self.llm_max_tokens,
            timeout: Duration::from_secs(self.llm_timeout_secs),
        })
    }

    pub fn embedder_config(&self) -> Option<HttpEmbedderConfig> {
        let model = self.embedding_model.clone()?;
        let base_url = self.llm_base_url.clone()?;
        Some(HttpEmbedderConfig {
            base_url,
            api_key: self.llm_api_key.clone(),
            model,
            dimensions: self.embedding_dimensions,
            timeout: Duration::from_secs(self.llm_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        settings: Settings,
    }

    #[test]
    fn defaults_match_documented_values() {
        let cli = TestCli::try_parse_from(["test"]).unwrap();
        let settings = cli.settings;

        assert_eq!(settings.bind.port(), 3001);
        assert_eq!(settings.collection, "document_embeddings");
        assert_eq!(settings.chunk_size, 1_000);
        assert_eq!(settings.chunk_overlap, 200);
        assert_eq!(settings.top_k, 6);
        assert_eq!(settings.max_upload_bytes, 20 * 1024 * 1024);
        assert_eq!(settings.vector_backend, VectorBackend::Chroma);
    }

    #[test]
    fn remote_clients_need_a_base_url() {
        let cli = TestCli::try_parse_from(["test", "--embedding-model", "text-embedding-3-small"])
            .unwrap();
        assert!(cli.settings.chat_config().is_none());
        assert!(cli.settings.embedder_config().is_none());

        let cli = TestCli::try_parse_from([
            "test",
            "--llm-base-url",
            "http://localhost:11434/v1",
            "--embedding-model",
            "nomic-embed-text",
            "--embedding-dimensions",
            "768",
        ])
        .unwrap();
        let embedder = cli.settings.embedder_config().unwrap();
        assert_eq!(embedder.dimensions, 768);
        assert_eq!(cli.settings.chat_config().unwrap().model, "gpt-4o-mini");
    }

    #[test]
    fn ingestion_options_follow_flags() {
        let cli = TestCli::try_parse_from(["test", "--chunk-size", "500", "--chunk-overlap", "50"])
            .unwrap();
        let options = cli.settings.ingestion_options();
        assert_eq!(options.chunk_size, 500);
        assert_eq!(options.chunk_overlap, 50);
        assert_eq!(options.pdf_timeout_secs, 30);
    }
}
