/// Contracts for the two external collaborators of the recommender.
///
/// - `TextEncoder`: text → fixed-length vector, deterministic for a fixed model.
/// - `NeighborIndex`: stores vectors with opaque metadata and answers top-N
///   cosine queries.
///
/// Both are object safe so the binary can pick an implementation at startup
/// (fastembed vs. test encoders, LanceDB vs. the in-memory index).
use async_trait::async_trait;

use crate::error::CommonError;

#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Embed documents for indexing, one vector per input, in input order.
    async fn encode_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CommonError>;

    /// Embed a single search query.
    async fn encode_query(&self, query: &str) -> Result<Vec<f32>, CommonError>;

    /// Length of every vector this encoder produces.
    fn dimensions(&self) -> usize;

    /// Stable name of the underlying model. Vectors from different models are not comparable.
    fn model_id(&self) -> &str;
}

/// One row handed to a `NeighborIndex`.
#[derive(Debug, Clone)]
pub struct IndexedVector {
    pub id: String,
    pub vector: Vec<f32>,
    /// The text that was embedded.
    pub text: String,
    /// Caller-defined payload, returned verbatim by `query`.
    pub metadata: String,
}

/// A single query hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: String,
    pub metadata: String,
    /// Cosine distance (0.0 = identical direction).
    pub distance: f32,
}

impl Neighbor {
    /// Cosine similarity, higher is more similar.
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

#[async_trait]
pub trait NeighborIndex: Send + Sync {
    /// Append entries. Ids are not deduplicated; callers check `count` before
    /// populating.
    async fn add(&self, entries: Vec<IndexedVector>) -> Result<(), CommonError>;

    /// Return up to `top_n` entries ranked by descending cosine similarity.
    async fn query(&self, vector: &[f32], top_n: usize) -> Result<Vec<Neighbor>, CommonError>;

    /// Number of stored entries.
    async fn count(&self) -> Result<usize, CommonError>;

    /// Remove every entry.
    async fn clear(&self) -> Result<(), CommonError>;
}
