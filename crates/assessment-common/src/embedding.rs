/// Embedding wrapper around fastembed.
///
/// `TextEmbedding` from fastembed is synchronous and CPU-bound. All embed calls go through
/// `tokio::task::spawn_blocking`, with the model shared behind an `Arc`.
///
/// The default model is all-MiniLM-L6-v2 (384 dimensions), which takes raw text. The
/// nomic-embed-text-v1.5 option expects task-prefixed inputs:
/// - Documents: "search_document: {text}"
/// - Queries: "search_query: {text}"
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CommonError;
use crate::oracle::TextEncoder;

/// Embedding models the service knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelChoice {
    #[default]
    AllMiniLmL6V2,
    BgeSmallEnV15,
    NomicEmbedTextV15,
}

impl ModelChoice {
    pub fn name(self) -> &'static str {
        match self {
            ModelChoice::AllMiniLmL6V2 => "all-minilm-l6-v2",
            ModelChoice::BgeSmallEnV15 => "bge-small-en-v1.5",
            ModelChoice::NomicEmbedTextV15 => "nomic-embed-text-v1.5",
        }
    }

    pub fn dimensions(self) -> usize {
        match self {
            ModelChoice::AllMiniLmL6V2 | ModelChoice::BgeSmallEnV15 => 384,
            ModelChoice::NomicEmbedTextV15 => 768,
        }
    }

    fn fastembed_model(self) -> fastembed::EmbeddingModel {
        match self {
            ModelChoice::AllMiniLmL6V2 => fastembed::EmbeddingModel::AllMiniLML6V2,
            ModelChoice::BgeSmallEnV15 => fastembed::EmbeddingModel::BGESmallENV15,
            ModelChoice::NomicEmbedTextV15 => fastembed::EmbeddingModel::NomicEmbedTextV15,
        }
    }

    fn document_prefix(self) -> &'static str {
        match self {
            ModelChoice::NomicEmbedTextV15 => "search_document: ",
            _ => "",
        }
    }

    fn query_prefix(self) -> &'static str {
        match self {
            ModelChoice::NomicEmbedTextV15 => "search_query: ",
            _ => "",
        }
    }
}

impl FromStr for ModelChoice {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all-minilm-l6-v2" | "minilm" => Ok(ModelChoice::AllMiniLmL6V2),
            "bge-small-en-v1.5" | "bge-small" => Ok(ModelChoice::BgeSmallEnV15),
            "nomic-embed-text-v1.5" | "nomic" => Ok(ModelChoice::NomicEmbedTextV15),
            other => Err(CommonError::Embedding(format!("unknown embedding model: {other}"))),
        }
    }
}

/// Wraps fastembed's `TextEmbedding` model for generating vector embeddings.
pub struct Embedder {
    model: Arc<fastembed::TextEmbedding>,
    choice: ModelChoice,
}

impl Embedder {
    /// Initialize the embedding model.
    ///
    /// This downloads the model on first run. The download happens synchronously
    /// inside a blocking task.
    pub async fn new(choice: ModelChoice) -> Result<Self, CommonError> {
        let model = tokio::task::spawn_blocking(move || {
            let options = fastembed::InitOptions::new(choice.fastembed_model())
                .with_show_download_progress(true);
            fastembed::TextEmbedding::try_new(options)
        })
        .await
        .map_err(|e| CommonError::Embedding(format!("spawn_blocking join error: {e}")))?
        .map_err(|e| CommonError::Embedding(format!("model initialization failed: {e}")))?;

        Ok(Self {
            model: Arc::new(model),
            choice,
        })
    }
}

#[async_trait]
impl TextEncoder for Embedder {
    async fn encode_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CommonError> {
        let prefix = self.choice.document_prefix();
        let prefixed: Vec<String> = texts.iter().map(|t| format!("{prefix}{t}")).collect();
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || model.embed(prefixed, None))
            .await
            .map_err(|e| CommonError::Embedding(format!("spawn_blocking join error: {e}")))?
            .map_err(|e| CommonError::Embedding(format!("document embedding failed: {e}")))
    }

    async fn encode_query(&self, query: &str) -> Result<Vec<f32>, CommonError> {
        let prefixed = vec![format!("{}{query}", self.choice.query_prefix())];
        let model = Arc::clone(&self.model);
        let mut results = tokio::task::spawn_blocking(move || model.embed(prefixed, None))
            .await
            .map_err(|e| CommonError::Embedding(format!("spawn_blocking join error: {e}")))?
            .map_err(|e| CommonError::Embedding(format!("query embedding failed: {e}")))?;
        results
            .pop()
            .ok_or_else(|| CommonError::Embedding("empty embedding result".to_string()))
    }

    fn dimensions(&self) -> usize {
        self.choice.dimensions()
    }

    fn model_id(&self) -> &str {
        self.choice.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_choice_parsing() {
        assert_eq!(
            "all-MiniLM-L6-v2".parse::<ModelChoice>().unwrap(),
            ModelChoice::AllMiniLmL6V2
        );
        assert_eq!("nomic".parse::<ModelChoice>().unwrap(), ModelChoice::NomicEmbedTextV15);
        assert!("word2vec".parse::<ModelChoice>().is_err());
        for choice in [
            ModelChoice::AllMiniLmL6V2,
            ModelChoice::BgeSmallEnV15,
            ModelChoice::NomicEmbedTextV15,
        ] {
            assert_eq!(choice.name().parse::<ModelChoice>().unwrap(), choice);
        }
    }

    #[test]
    fn test_prefixes_only_for_nomic() {
        assert_eq!(ModelChoice::AllMiniLmL6V2.query_prefix(), "");
        assert_eq!(ModelChoice::NomicEmbedTextV15.query_prefix(), "search_query: ");
        assert_eq!(ModelChoice::NomicEmbedTextV15.dimensions(), 768);
        assert_eq!(ModelChoice::BgeSmallEnV15.dimensions(), 384);
    }
}
