pub mod local;
pub mod lmstudio;
pub mod ollama;
pub mod provider;
pub mod registry;
pub mod splitter;
pub mod types;

pub use provider::{EmbeddingProvider, GenerationProvider};
pub use registry::ProviderSet;
pub use types::{ChatMessage, GenerationHooks, GenerationRequest, GenerationStage, Interrupt, ProviderKind};
