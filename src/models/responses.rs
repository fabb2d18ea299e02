use crate::models::domain::Vector;
use serde::{Deserialize, Serialize};

/// Embeddings of an `EmbedRequest`, in request order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub model: String,
    pub dimension: usize,
    pub embeddings: Vec<Vector>,
}
