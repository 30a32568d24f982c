/// LanceDB-backed `NeighborIndex`.
///
/// One table holds every indexed entry. The table schema is:
/// - id: Utf8 (not null)
/// - text: Utf8 (not null): the text that was embedded
/// - metadata: Utf8 (not null): caller payload, returned with each hit
/// - embedding: FixedSizeList<Float32, dimensions> (not null)
///
/// Queries use cosine distance. The table is created lazily by the first `add`.
use std::sync::Arc;

use arrow_array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;
use tracing::{info, warn};

use crate::error::CommonError;
use crate::oracle::{IndexedVector, Neighbor, NeighborIndex};

pub struct VectorDb {
    db: lancedb::Connection,
    table_name: String,
    dimensions: usize,
}

impl VectorDb {
    /// Connect to a LanceDB database at the given filesystem path.
    pub async fn connect(path: &str, table_name: &str, dimensions: usize) -> Result<Self, CommonError> {
        let db = lancedb::connect(path)
            .execute()
            .await
            .map_err(|e| CommonError::VectorDb(format!("connection failed: {e}")))?;
        Ok(Self {
            db,
            table_name: table_name.to_string(),
            dimensions,
        })
    }

    async fn table_exists(&self) -> Result<bool, CommonError> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .map_err(|e| CommonError::VectorDb(format!("listing tables failed: {e}")))?;
        Ok(names.iter().any(|n| n == &self.table_name))
    }

    async fn open_table(&self) -> Result<lancedb::Table, CommonError> {
        self.db
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| CommonError::VectorDb(format!("open table failed: {e}")))
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimensions as i32,
                ),
                false,
            ),
        ]))
    }

    /// Build an Arrow RecordBatch from index entries.
    fn build_record_batch(&self, entries: &[IndexedVector]) -> Result<RecordBatch, CommonError> {
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != self.dimensions) {
            return Err(CommonError::VectorDb(format!(
                "entry {} has {} dimensions, expected {}",
                bad.id,
                bad.vector.len(),
                self.dimensions
            )));
        }

        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        let metadata: Vec<&str> = entries.iter().map(|e| e.metadata.as_str()).collect();

        let flat_values: Vec<f32> = entries.iter().flat_map(|e| e.vector.iter().copied()).collect();
        let embedding_array: ArrayRef = Arc::new(
            FixedSizeListArray::try_new(
                Arc::new(Field::new("item", DataType::Float32, true)),
                self.dimensions as i32,
                Arc::new(Float32Array::from(flat_values)),
                None,
            )
            .map_err(|e| CommonError::VectorDb(format!("failed to build embedding array: {e}")))?,
        );

        RecordBatch::try_new(
            self.schema(),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(metadata)),
                embedding_array,
            ],
        )
        .map_err(|e| CommonError::VectorDb(format!("failed to build record batch: {e}")))
    }
}

#[async_trait]
impl NeighborIndex for VectorDb {
    async fn add(&self, entries: Vec<IndexedVector>) -> Result<(), CommonError> {
        if entries.is_empty() {
            return Ok(());
        }
        let batch = self.build_record_batch(&entries)?;
        let batch_iter = RecordBatchIterator::new(vec![Ok(batch)], self.schema());

        if self.table_exists().await? {
            self.open_table()
                .await?
                .add(Box::new(batch_iter))
                .execute()
                .await
                .map_err(|e| CommonError::VectorDb(format!("append failed: {e}")))?;
        } else {
            self.db
                .create_table(&self.table_name, Box::new(batch_iter))
                .execute()
                .await
                .map_err(|e| CommonError::VectorDb(format!("create table failed: {e}")))?;
            info!(table = %self.table_name, "vector table created");
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_n: usize) -> Result<Vec<Neighbor>, CommonError> {
        if top_n == 0 || !self.table_exists().await? {
            return Ok(Vec::new());
        }

        let results = self
            .open_table()
            .await?
            .vector_search(vector)
            .map_err(|e| CommonError::VectorDb(format!("vector search setup failed: {e}")))?
            .distance_type(DistanceType::Cosine)
            .limit(top_n)
            .execute()
            .await
            .map_err(|e| CommonError::VectorDb(format!("vector search failed: {e}")))?;

        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results)
            .await
            .map_err(|e| CommonError::VectorDb(format!("collecting search results failed: {e}")))?;

        Ok(extract_neighbors(&batches))
    }

    async fn count(&self) -> Result<usize, CommonError> {
        if !self.table_exists().await? {
            return Ok(0);
        }
        self.open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| CommonError::VectorDb(format!("count rows failed: {e}")))
    }

    async fn clear(&self) -> Result<(), CommonError> {
        if self.table_exists().await? {
            self.db
                .drop_table(&self.table_name)
                .await
                .map_err(|e| CommonError::VectorDb(format!("drop table failed: {e}")))?;
            info!(table = %self.table_name, "vector table dropped");
        }
        Ok(())
    }
}

/// Expected columns: id (Utf8), metadata (Utf8), _distance (Float32).
fn extract_neighbors(batches: &[RecordBatch]) -> Vec<Neighbor> {
    let mut neighbors = Vec::new();

    for batch in batches {
        let schema = batch.schema();
        let id_col = get_string_column(batch, &schema, "id");
        let metadata_col = get_string_column(batch, &schema, "metadata");
        let distance_col = get_float_column(batch, &schema, "_distance");

        let (Some(id_col), Some(metadata_col)) = (id_col, metadata_col) else {
            warn!("search result batch missing expected columns");
            continue;
        };

        for row in 0..batch.num_rows() {
            neighbors.push(Neighbor {
                id: id_col.value(row).to_string(),
                metadata: metadata_col.value(row).to_string(),
                distance: distance_col.map(|c| c.value(row)).unwrap_or(0.0),
            });
        }
    }

    neighbors
}

fn get_string_column<'a>(
    batch: &'a RecordBatch,
    schema: &Schema,
    name: &str,
) -> Option<&'a StringArray> {
    let idx = schema.index_of(name).ok()?;
    batch.column(idx).as_any().downcast_ref::<StringArray>()
}

fn get_float_column<'a>(
    batch: &'a RecordBatch,
    schema: &Schema,
    name: &str,
) -> Option<&'a Float32Array> {
    let idx = schema.index_of(name).ok()?;
    batch.column(idx).as_any().downcast_ref::<Float32Array>()
}
