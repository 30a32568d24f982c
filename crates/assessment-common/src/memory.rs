/// In-memory `NeighborIndex` with brute-force cosine similarity.
///
/// Used when no LanceDB path is configured. The catalog is a few hundred rows, so
/// a linear scan per query is fine. Nothing is persisted: the index is rebuilt on
/// every process start.
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CommonError;
use crate::oracle::{IndexedVector, Neighbor, NeighborIndex};

#[derive(Default)]
pub struct MemoryIndex {
    entries: RwLock<Vec<IndexedVector>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NeighborIndex for MemoryIndex {
    async fn add(&self, entries: Vec<IndexedVector>) -> Result<(), CommonError> {
        self.entries.write().await.extend(entries);
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_n: usize) -> Result<Vec<Neighbor>, CommonError> {
        let entries = self.entries.read().await;

        let mut scored: Vec<(f32, &IndexedVector)> = entries
            .iter()
            .map(|e| (cosine_similarity(vector, &e.vector), e))
            .collect();

        // Stable sort: exact ties keep insertion order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_n);

        Ok(scored
            .into_iter()
            .map(|(score, e)| Neighbor {
                id: e.id.clone(),
                metadata: e.metadata.clone(),
                distance: 1.0 - score,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, CommonError> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<(), CommonError> {
        self.entries.write().await.clear();
        Ok(())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
