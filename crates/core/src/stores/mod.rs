pub mod chroma;
pub mod memory;

pub use chroma::{ChromaConfig, ChromaStore, CollectionHandle, DEFAULT_CHROMA_URL, DEFAULT_COLLECTION};
pub use memory::InMemoryStore;
