//! Deterministic stand-ins for the embedding model and the cache, shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cache::IndexCache;
use crate::model::{AssessmentRecord, Support};
use assessment_common::error::CommonError;
use assessment_common::oracle::TextEncoder;

pub fn record(id: &str, name: &str, description: &str, codes: &[&str], duration: u32) -> AssessmentRecord {
    AssessmentRecord {
        id: id.to_string(),
        name: name.to_string(),
        url: format!("https://example.com/view/{id}/"),
        description: description.to_string(),
        test_type: codes.iter().map(|c| c.to_string()).collect(),
        duration,
        adaptive_support: Support::No,
        remote_support: Support::Yes,
    }
}

/// Hashes lower-cased alphanumeric tokens into a fixed number of buckets.
pub struct BagOfWordsEncoder {
    dims: usize,
    model_id: String,
}

impl Default for BagOfWordsEncoder {
    fn default() -> Self {
        Self::with_dimensions(1024)
    }
}

impl BagOfWordsEncoder {
    pub fn with_dimensions(dims: usize) -> Self {
        Self {
            dims,
            model_id: format!("bag-of-words-{dims}"),
        }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = fnv1a(&token.to_lowercase()) % self.dims as u64;
            vector[bucket as usize] += 1.0;
        }
        vector
    }
}

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(0xcbf29ce484222325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl TextEncoder for BagOfWordsEncoder {
    async fn encode_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CommonError> {
        Ok(texts.iter().map(|t| self.encode(t)).collect())
    }

    async fn encode_query(&self, query: &str) -> Result<Vec<f32>, CommonError> {
        Ok(self.encode(query))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Always fails, like a model that could not be loaded.
pub struct FailingEncoder;

#[async_trait]
impl TextEncoder for FailingEncoder {
    async fn encode_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, CommonError> {
        Err(CommonError::Embedding("model unavailable".to_string()))
    }

    async fn encode_query(&self, _query: &str) -> Result<Vec<f32>, CommonError> {
        Err(CommonError::Embedding("model unavailable".to_string()))
    }

    fn dimensions(&self) -> usize {
        0
    }

    fn model_id(&self) -> &str {
        "failing"
    }
}

/// In-process cache that remembers everything until invalidated.
#[derive(Default)]
pub struct MemoryCache {
    digest: Mutex<Option<String>>,
    searches: Mutex<HashMap<(String, usize), Vec<AssessmentRecord>>>,
}

impl MemoryCache {
    /// A cache that already records `digest`, as left behind by an earlier run.
    pub fn with_digest(digest: &str) -> Self {
        Self {
            digest: Mutex::new(Some(digest.to_string())),
            ..Self::default()
        }
    }

    pub fn digest(&self) -> Option<String> {
        self.digest.lock().unwrap().clone()
    }
}

#[async_trait]
impl IndexCache for MemoryCache {
    async fn get_search_results(&self, query: &str, limit: usize) -> Option<Vec<AssessmentRecord>> {
        self.searches
            .lock()
            .unwrap()
            .get(&(query.to_string(), limit))
            .cloned()
    }

    async fn set_search_results(&self, query: &str, limit: usize, results: &[AssessmentRecord]) {
        self.searches
            .lock()
            .unwrap()
            .insert((query.to_string(), limit), results.to_vec());
    }

    async fn get_catalog_digest(&self) -> Option<String> {
        self.digest()
    }

    async fn set_catalog_digest(&self, digest: &str) {
        *self.digest.lock().unwrap() = Some(digest.to_string());
    }

    async fn invalidate_all(&self) {
        *self.digest.lock().unwrap() = None;
        self.searches.lock().unwrap().clear();
    }
}
