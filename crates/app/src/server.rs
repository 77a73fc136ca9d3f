use crate::config::{Settings, VectorBackend};
use crate::router::{build_router, cors_layer};
use anyhow::Context;
use pet_policy_core::{
    AnswerGenerator, CharacterNgramEmbedder, ChatCompletionGenerator, ChromaStore, Embedder,
    ExtractiveGenerator, HttpEmbedder, InMemoryStore, IngestionPipeline, LopdfExtractor,
    PolicyAssistant, PolicyRegistry, VectorIndex,
};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub(crate) struct AppState {
    pub assistant: PolicyAssistant,
    pub pipeline: IngestionPipeline,
    pub registry: PolicyRegistry,
    pub started_at: Instant,
}

/// Everything the commands need, built once from the settings.
pub(crate) struct Services {
    pub assistant: PolicyAssistant,
    pub pipeline: IngestionPipeline,
}

impl Services {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let index: Arc<dyn VectorIndex> = match settings.vector_backend {
            VectorBackend::Chroma => {
                let store =
                    ChromaStore::new(settings.chroma_config()).context("invalid chroma settings")?;
                tracing::info!(url = %settings.chroma_url, collection = store.collection_name(), "chroma vector store");
                Arc::new(store)
            }
            VectorBackend::Memory => {
                tracing::warn!("using the in-memory vector index; stored chunks are lost on exit");
                Arc::new(InMemoryStore::new())
            }
        };

        let embedder: Arc<dyn Embedder> = match settings.embedder_config() {
            Some(config) => {
                tracing::info!(model = %config.model, dimensions = config.dimensions, "remote embeddings");
                Arc::new(HttpEmbedder::new(config).context("invalid embedding settings")?)
            }
            None => Arc::new(CharacterNgramEmbedder {
                dimensions: settings.embedding_dimensions,
            }),
        };

        let generator: Arc<dyn AnswerGenerator> = match settings.chat_config() {
            Some(config) => {
                tracing::info!(model = %config.model, "chat completion answers");
                Arc::new(ChatCompletionGenerator::new(config).context("invalid llm settings")?)
            }
            None => {
                tracing::warn!("no llm endpoint configured; answers are extractive");
                Arc::new(ExtractiveGenerator)
            }
        };

        let pipeline = IngestionPipeline::new(
            Arc::new(LopdfExtractor),
            embedder.clone(),
            index.clone(),
            settings.ingestion_options(),
        )
        .context("invalid ingestion settings")?;
        let assistant = PolicyAssistant::new(index, embedder, generator, settings.top_k);

        Ok(Self {
            assistant,
            pipeline,
        })
    }
}

pub(crate) async fn serve(services: Services, settings: &Settings) -> anyhow::Result<()> {
    let state = AppState {
        assistant: services.assistant,
        pipeline: services.pipeline,
        registry: PolicyRegistry::new(),
        started_at: Instant::now(),
    };

    let cors = cors_layer(settings.cors_origin.as_deref())
        .with_context(|| format!("invalid cors origin {:?}", settings.cors_origin))?;
    let router = build_router(state, settings.max_upload_bytes, cors);

    let listener = tokio::net::TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind))?;
    tracing::info!(addr = %settings.bind, "server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("server shutting down");
}
