//! Vector index integration
//!
//! `VectorIndex` is the narrow interface the pipeline needs from an index
//! provider: namespace-scoped upsert and nearest-neighbor query plus
//! best-effort statistics. `QdrantIndex` implements it against a Qdrant
//! collection; namespaces are realized as a mandatory payload field with a
//! filter condition on every query, since Qdrant collections have no
//! first-class namespace partitioning.

mod payload;

pub use payload::*;

use crate::embed::VectorRecord;
use crate::error::{Error, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CountPointsBuilder, Distance, Filter, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A search hit echoing the stored record's metadata
#[derive(Debug, Clone, serde::Serialize)]
pub struct RankedMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

/// Best-effort index statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexStats {
    pub exists: bool,
    pub vector_count: u64,
    pub dimension: usize,
    pub fullness: f32,
}

/// Narrow interface to an external vector index provider
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<()>;

    async fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
        filter: Option<Map<String, Value>>,
    ) -> Result<Vec<RankedMatch>>;

    async fn describe(&self) -> Result<IndexStats>;
}

/// Batching options for storage
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_delay_ms: 200,
        }
    }
}

/// Store records in fixed-size batches. The first failing batch aborts the
/// remaining ones; there is no partial-success continuation. Returns the
/// number of records sent.
pub async fn store_records(
    index: &dyn VectorIndex,
    records: Vec<VectorRecord>,
    namespace: &str,
    options: &StoreOptions,
) -> Result<usize> {
    for (position, record) in records.iter().enumerate() {
        validate_record(record, position)?;
    }

    let batch_size = options.batch_size.max(1);
    let total = records.len();
    let mut batches: Vec<Vec<VectorRecord>> = Vec::new();
    let mut rest = records;
    while rest.len() > batch_size {
        let tail = rest.split_off(batch_size);
        batches.push(rest);
        rest = tail;
    }
    if !rest.is_empty() {
        batches.push(rest);
    }

    for (batch_index, batch) in batches.into_iter().enumerate() {
        if batch_index > 0 && options.batch_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(options.batch_delay_ms)).await;
        }
        debug!(
            "Upserting batch {} ({} records) to namespace {}",
            batch_index + 1,
            batch.len(),
            namespace
        );
        index.upsert(namespace, batch).await?;
    }

    Ok(total)
}

/// Per-record validation naming the offending fields
fn validate_record(record: &VectorRecord, position: usize) -> Result<()> {
    let mut problems = Vec::new();
    if record.id.trim().is_empty() {
        problems.push("id is empty");
    }
    if record.values.is_empty() {
        problems.push("vector is empty");
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "record {} is invalid: {}",
            position,
            problems.join(", ")
        )))
    }
}

/// Best-effort statistics: any provider failure reads as "does not exist"
pub async fn index_stats(index: &dyn VectorIndex) -> IndexStats {
    match index.describe().await {
        Ok(stats) => stats,
        Err(e) => {
            warn!("Index describe failed, treating as absent: {}", e);
            IndexStats {
                exists: false,
                vector_count: 0,
                dimension: 0,
                fullness: 0.0,
            }
        }
    }
}

/// Qdrant-backed vector index
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantIndex {
    /// Connect to Qdrant; the collection is created lazily on first upsert
    pub fn connect(url: &str, collection: &str, dimension: usize) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", url);
        let client = Qdrant::from_url(url)
            .skip_compatibility_check()
            .build()
            .map_err(|e| Error::Upstream(e.to_string()))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            dimension,
        })
    }

    async fn ensure_collection(&self) -> Result<()> {
        if self.client.collection_exists(&self.collection).await? {
            return Ok(());
        }

        info!(
            "Creating collection {} with dimension {}",
            self.collection, self.dimension
        );
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                ),
            )
            .await?;
        Ok(())
    }

    fn namespace_filter(namespace: &str, metadata_filter: Option<&Map<String, Value>>) -> Filter {
        let mut must: Vec<Condition> = vec![Condition::matches("namespace", namespace.to_string())];

        if let Some(filter) = metadata_filter {
            for (key, value) in filter {
                match value {
                    Value::String(s) => must.push(Condition::matches(key.as_str(), s.clone())),
                    Value::Bool(b) => must.push(Condition::matches(key.as_str(), *b)),
                    Value::Number(n) => {
                        if let Some(i) = n.as_i64() {
                            must.push(Condition::matches(key.as_str(), i));
                        }
                    }
                    _ => {}
                }
            }
        }

        Filter {
            must,
            should: vec![],
            must_not: vec![],
            min_should: None,
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.ensure_collection().await?;

        let points: Vec<PointStruct> = records
            .into_iter()
            .map(|record| {
                let mut metadata = record.metadata;
                metadata.insert("record_id".to_string(), Value::String(record.id.clone()));
                metadata.insert("namespace".to_string(), Value::String(namespace.to_string()));

                // Qdrant point ids must be UUIDs or integers; the readable
                // id lives in the payload and maps deterministically onto a
                // v5 UUID.
                let point_id = Uuid::new_v5(&Uuid::NAMESPACE_URL, record.id.as_bytes());
                PointStruct::new(
                    point_id.to_string(),
                    record.values,
                    json_map_to_payload(&metadata),
                )
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points))
            .await?;
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
        filter: Option<Map<String, Value>>,
    ) -> Result<Vec<RankedMatch>> {
        let search = SearchPointsBuilder::new(&self.collection, vector, top_k as u64)
            .with_payload(true)
            .filter(Self::namespace_filter(namespace, filter.as_ref()));

        let response = self.client.search_points(search).await?;

        let matches = response
            .result
            .into_iter()
            .map(|point| {
                let metadata = payload_to_json_map(point.payload);
                let id = metadata
                    .get("record_id")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| point_id_to_string(point.id));
                RankedMatch {
                    id,
                    score: point.score,
                    metadata,
                }
            })
            .collect();
        Ok(matches)
    }

    async fn describe(&self) -> Result<IndexStats> {
        if !self.client.collection_exists(&self.collection).await? {
            return Ok(IndexStats {
                exists: false,
                vector_count: 0,
                dimension: self.dimension,
                fullness: 0.0,
            });
        }

        let info = self.client.collection_info(&self.collection).await?;
        let result = info
            .result
            .ok_or_else(|| Error::NotFound(format!("collection {} has no info", self.collection)))?;

        let vector_count = result.points_count.unwrap_or(0);
        let indexed = result.indexed_vectors_count.unwrap_or(0);
        let fullness = if vector_count > 0 {
            (indexed as f32 / vector_count as f32).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Ok(IndexStats {
            exists: true,
            vector_count,
            dimension: self.dimension,
            fullness,
        })
    }
}

/// Count points in one namespace. Separate from `describe` because it needs
/// a filtered count query.
pub async fn namespace_vector_count(index: &QdrantIndex, namespace: &str) -> Result<u64> {
    let count = index
        .client
        .count(
            CountPointsBuilder::new(&index.collection)
                .filter(QdrantIndex::namespace_filter(namespace, None))
                .exact(true),
        )
        .await?;
    Ok(count.result.map(|r| r.count).unwrap_or(0))
}
