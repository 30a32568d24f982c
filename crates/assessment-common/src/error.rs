/// Error types shared by the infrastructure adapters (vector index, embeddings).
///
/// These represent failures of the two oracles the recommender sits on. Application
/// errors are defined in the recommender crate and wrap `CommonError` via `#[from]`.
/// Redis failures never surface here: the cache degrades to a no-op instead.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("vector db error: {0}")]
    VectorDb(String),

    #[error("embedding error: {0}")]
    Embedding(String),
}
