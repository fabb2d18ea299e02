// Service exports
pub mod cache;
pub mod embedding;
pub mod llm;
pub mod session;

pub use cache::{request_hash, CacheError, ExplanationCache};
pub use embedding::{Embedder, EmbeddingError, OpenAiEmbedder};
pub use llm::{GenerationRequest, LlmError, OpenAiClient, TextGenerator};
pub use session::{
    Dimension, InMemorySessionStore, InterviewPhase, InterviewSession, PersonaScores, QaPair,
    SessionHandle, SessionStore,
};
