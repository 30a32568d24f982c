/// Embedding index over the assessment catalog.
///
/// Builds one vector per record from its searchable text and stores it, together with
/// the record as JSON metadata, in a `NeighborIndex`. Population is idempotent: a
/// non-empty index is left alone unless the catalog digest changed or a rebuild is forced.
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::cache::IndexCache;
use crate::catalog::Catalog;
use crate::error::AppError;
use crate::model::AssessmentRecord;
use assessment_common::error::CommonError;
use assessment_common::oracle::{IndexedVector, NeighborIndex, TextEncoder};

/// Description length kept in index metadata.
const MAX_METADATA_DESCRIPTION: usize = 500;

/// What a populate/sync call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Populated { added: usize },
    Skipped { existing: usize },
}

pub struct AssessmentIndex {
    encoder: Arc<dyn TextEncoder>,
    store: Arc<dyn NeighborIndex>,
    cache: Arc<dyn IndexCache>,
    batch_size: usize,
}

impl AssessmentIndex {
    pub fn new(
        encoder: Arc<dyn TextEncoder>,
        store: Arc<dyn NeighborIndex>,
        cache: Arc<dyn IndexCache>,
        batch_size: usize,
    ) -> Self {
        Self {
            encoder,
            store,
            cache,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn count(&self) -> Result<usize, AppError> {
        Ok(self.store.count().await?)
    }

    /// Embed and store every record, unless the index already holds entries.
    pub async fn populate(&self, records: &[AssessmentRecord]) -> Result<SyncOutcome, AppError> {
        let existing = self.store.count().await?;
        if existing > 0 {
            info!(existing, "index already populated, skipping");
            return Ok(SyncOutcome::Skipped { existing });
        }

        info!(records = records.len(), batch_size = self.batch_size, "populating index");
        let mut added = 0;
        for batch in records.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(AssessmentRecord::searchable_text).collect();
            let vectors = self.encoder.encode_documents(&texts).await?;

            if vectors.len() != batch.len() {
                return Err(AppError::Common(CommonError::Embedding(format!(
                    "embedding count mismatch: expected {}, got {}",
                    batch.len(),
                    vectors.len()
                ))));
            }

            let entries = batch
                .iter()
                .zip(texts)
                .zip(vectors)
                .map(|((record, text), vector)| {
                    Ok(IndexedVector {
                        id: record.id.clone(),
                        vector,
                        text,
                        metadata: index_metadata(record)?,
                    })
                })
                .collect::<Result<Vec<_>, AppError>>()?;

            self.store.add(entries).await?;
            added += batch.len();
            info!(progress = added, total = records.len(), "embedded batch");
        }

        Ok(SyncOutcome::Populated { added })
    }

    /// Drop every entry and cached search result, then populate from scratch.
    pub async fn rebuild(&self, records: &[AssessmentRecord]) -> Result<SyncOutcome, AppError> {
        self.store.clear().await?;
        self.cache.invalidate_all().await;
        self.populate(records).await
    }

    /// Bring the index in line with `catalog`.
    ///
    /// Rebuilds when forced, when the digest recorded at the last build differs from
    /// the current one, or when a non-empty index has no recorded digest at all.
    /// Otherwise populates idempotently. The digest covers the catalog bytes and the
    /// embedding model, and is recorded only after entries were actually written.
    pub async fn sync(&self, catalog: &Catalog, force: bool) -> Result<SyncOutcome, AppError> {
        let digest = index_digest(self.encoder.model_id(), &catalog.digest);
        let recorded = self.cache.get_catalog_digest().await;
        let existing = self.store.count().await?;

        // entries of unknown provenance are stale
        let stale = match recorded.as_deref() {
            Some(recorded) => recorded != digest,
            None => existing > 0,
        };
        info!(
            catalog = %catalog.path.display(),
            model = self.encoder.model_id(),
            existing,
            stale,
            force,
            "syncing index"
        );

        let outcome = if force || stale {
            self.rebuild(&catalog.records).await?
        } else {
            self.populate(&catalog.records).await?
        };

        if let SyncOutcome::Populated { .. } = outcome {
            self.cache.set_catalog_digest(&digest).await;
        }
        Ok(outcome)
    }

    /// Top `n_results` records for `query`, most similar first.
    ///
    /// `n_results` is clamped to the index size; an empty index yields an empty list.
    /// Oracle failures are returned as errors.
    pub async fn try_search(
        &self,
        query: &str,
        n_results: usize,
    ) -> Result<Vec<AssessmentRecord>, AppError> {
        let count = self.store.count().await?;
        if count == 0 {
            warn!("index is empty");
            return Ok(Vec::new());
        }
        let limit = n_results.min(count);
        if limit == 0 {
            return Ok(Vec::new());
        }

        if let Some(cached) = self.cache.get_search_results(query, limit).await {
            info!(limit, "search cache hit");
            return Ok(cached);
        }

        let vector = self.encoder.encode_query(query).await?;
        let neighbors = self.store.query(&vector, limit).await?;

        let results: Vec<AssessmentRecord> = neighbors
            .into_iter()
            .filter_map(|n| {
                serde_json::from_str(&n.metadata)
                    .inspect_err(|e| warn!(id = %n.id, error = %e, "undecodable index metadata, skipping"))
                    .ok()
            })
            .collect();

        self.cache.set_search_results(query, limit, &results).await;
        Ok(results)
    }

    /// Like `try_search`, but any oracle failure is logged and yields no candidates.
    pub async fn search(&self, query: &str, n_results: usize) -> Vec<AssessmentRecord> {
        self.try_search(query, n_results).await.unwrap_or_else(|e| {
            warn!(error = %e, "search failed, returning no candidates");
            Vec::new()
        })
    }
}

/// Hex SHA-256 of `model|catalog digest`.
fn index_digest(model_id: &str, catalog_digest: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update(b"|");
    hasher.update(catalog_digest.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn index_metadata(record: &AssessmentRecord) -> Result<String, AppError> {
    let mut stored = record.clone();
    if stored.description.chars().count() > MAX_METADATA_DESCRIPTION {
        stored.description = stored.description.chars().take(MAX_METADATA_DESCRIPTION).collect();
    }
    Ok(serde_json::to_string(&stored)?)
}
