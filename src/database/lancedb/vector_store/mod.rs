
use super::{ChunkMetadata, DocumentChunk, DocumentType, RetrievedResult, StoreStats};
use crate::config::Config;
use crate::embeddings::{EmbeddingProvider, check_dimension};
use crate::rag::DocumentRetriever;
use crate::{RagError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const MAX_TOP_K: usize = 100;

/// Chunk store backed by a LanceDB table, one table per collection.
///
/// Construction is cheap and does no I/O. Every operation fails with
/// [`RagError::NotInitialized`] until [`VectorStore::initialize`] has run.
pub struct VectorStore {
    uri: String,
    collection_name: String,
    embedder: Arc<dyn EmbeddingProvider>,
    connection: Option<Connection>,
}

impl VectorStore {
    #[inline]
    pub fn new(
        uri: impl Into<String>,
        collection_name: impl Into<String>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            uri: uri.into(),
            collection_name: collection_name.into(),
            embedder,
            connection: None,
        }
    }

    #[inline]
    pub fn from_config(config: &Config, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::new(
            config.vector_store_uri(),
            config.vector_store.collection_name.clone(),
            embedder,
        )
    }

    #[inline]
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.connection.is_some()
    }

    /// Connect to the database and open or create the collection table.
    #[inline]
    pub async fn initialize(&mut self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        // Local paths need their parent directory to exist
        if !self.uri.contains("://") {
            std::fs::create_dir_all(Path::new(&self.uri)).map_err(|e| {
                RagError::Database(format!(
                    "Failed to create vector database directory {}: {}",
                    self.uri, e
                ))
            })?;
        }

        debug!("Connecting to LanceDB at {}", self.uri);
        let connection = lancedb::connect(&self.uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let expected = self.embedder.dimension();
        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.collection_name) {
            let table = connection
                .open_table(&self.collection_name)
                .execute()
                .await
                .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))?;
            let existing = detect_vector_dimension(&table).await?;
            if existing != expected {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: existing,
                });
            }
            debug!(
                "Opened existing collection {} ({} dimensions)",
                self.collection_name, existing
            );
        } else {
            connection
                .create_empty_table(&self.collection_name, create_schema(expected)?)
                .execute()
                .await
                .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;
            info!(
                "Created collection {} with {} dimensions",
                self.collection_name, expected
            );
        }

        self.connection = Some(connection);
        Ok(())
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or(RagError::NotInitialized)
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection()?
            .open_table(&self.collection_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    /// Embed and store a batch of chunks in a single write.
    ///
    /// Either every chunk of the batch becomes searchable or none does.
    /// Returns the stored ids in input order.
    #[inline]
    pub async fn add_documents(&self, chunks: &[DocumentChunk]) -> Result<Vec<String>> {
        self.connection()?;

        if chunks.is_empty() {
            debug!("No chunks to store");
            return Ok(Vec::new());
        }

        for chunk in chunks {
            chunk.validate()?;
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let dimension = self.embedder.dimension();
        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "Expected {} embeddings, received {}",
                chunks.len(),
                vectors.len()
            )));
        }
        for vector in &vectors {
            check_dimension(vector, dimension)?;
        }

        let ids: Vec<String> = chunks
            .iter()
            .map(|chunk| {
                chunk
                    .metadata
                    .id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string())
            })
            .collect();

        let record_batch = create_record_batch(chunks, &ids, &vectors, dimension)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        self.open_table()
            .await?
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert chunks: {}", e)))?;

        info!(
            "Stored {} chunks in collection {}",
            chunks.len(),
            self.collection_name
        );
        Ok(ids)
    }

    /// Return up to `top_k` chunks ordered by descending score.
    #[inline]
    pub async fn similarity_search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedResult>> {
        self.connection()?;

        if query.trim().is_empty() {
            return Err(RagError::Validation("query cannot be empty".to_string()));
        }
        if !(1..=MAX_TOP_K).contains(&top_k) {
            return Err(RagError::Validation(format!(
                "top_k {} must be between 1 and {}",
                top_k, MAX_TOP_K
            )));
        }

        let query_vector = self.embedder.embed_one(query).await.map_err(|e| match e {
            RagError::Validation(_) | RagError::DimensionMismatch { .. } => e,
            other => RagError::RetrievalFailed(format!("Failed to embed query: {}", other)),
        })?;

        let table = self.open_table().await?;
        let results = table
            .vector_search(query_vector)
            .map_err(|e| RagError::RetrievalFailed(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| RagError::RetrievalFailed(format!("Failed to execute search: {}", e)))?;

        let parsed = parse_search_results_stream(results).await?;
        debug!(
            "Similarity search returned {} results for top_k {}",
            parsed.len(),
            top_k
        );
        Ok(parsed)
    }

    /// Drop every stored chunk and recreate an empty collection.
    #[inline]
    pub async fn clear(&self) -> Result<()> {
        let connection = self.connection()?;

        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.collection_name) {
            connection
                .drop_table(&self.collection_name)
                .await
                .map_err(|e| RagError::Database(format!("Failed to drop table: {}", e)))?;
        }

        connection
            .create_empty_table(
                &self.collection_name,
                create_schema(self.embedder.dimension())?,
            )
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to recreate table: {}", e)))?;

        info!("Cleared collection {}", self.collection_name);
        Ok(())
    }

    #[inline]
    pub async fn stats(&self) -> Result<StoreStats> {
        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(StoreStats {
            count,
            collection_name: self.collection_name.clone(),
            embedding_model: self.embedder.model_name().to_string(),
            embedding_dimension: self.embedder.dimension(),
        })
    }
}

#[async_trait]
impl DocumentRetriever for VectorStore {
    async fn similarity_search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedResult>> {
        Self::similarity_search(self, query, top_k).await
    }

    async fn stats(&self) -> Result<StoreStats> {
        Self::stats(self).await
    }
}

fn create_schema(vector_dim: usize) -> Result<Arc<Schema>> {
    let list_size = i32::try_from(vector_dim).map_err(|_| {
        RagError::Validation(format!("vector dimension {} is too large", vector_dim))
    })?;

    Ok(Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                list_size,
            ),
            false,
        ),
        Field::new("text", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("file_path", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("total_chunks", DataType::UInt32, false),
        Field::new("document_type", DataType::Utf8, false),
        Field::new("processed_at", DataType::Utf8, false),
        Field::new("added_at", DataType::Utf8, false),
    ])))
}

async fn detect_vector_dimension(table: &Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

    for field in schema.fields() {
        if field.name() == "vector" {
            if let DataType::FixedSizeList(_, size) = field.data_type() {
                return usize::try_from(*size).map_err(|_| {
                    RagError::Database(format!("Invalid vector dimension in schema: {}", size))
                });
            }
        }
    }

    Err(RagError::Database(
        "Could not find vector column or determine dimension".to_string(),
    ))
}

fn create_record_batch(
    chunks: &[DocumentChunk],
    ids: &[String],
    vectors: &[Vec<f32>],
    vector_dim: usize,
) -> Result<RecordBatch> {
    let added_at = Utc::now().to_rfc3339();
    let processed_ats: Vec<String> = chunks
        .iter()
        .map(|c| c.metadata.processed_at.to_rfc3339())
        .collect();

    let mut flat_values = Vec::with_capacity(vectors.len() * vector_dim);
    for vector in vectors {
        flat_values.extend_from_slice(vector);
    }
    let list_size = i32::try_from(vector_dim)
        .map_err(|_| RagError::Validation(format!("vector dimension {} is too large", vector_dim)))?;
    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array = FixedSizeListArray::try_new(
        field,
        list_size,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from_iter_values(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| &c.text))),
        Arc::new(StringArray::from_iter_values(
            chunks.iter().map(|c| &c.metadata.source),
        )),
        Arc::new(StringArray::from_iter_values(
            chunks.iter().map(|c| &c.metadata.file_path),
        )),
        Arc::new(UInt32Array::from_iter_values(
            chunks.iter().map(|c| c.metadata.chunk_index),
        )),
        Arc::new(UInt32Array::from_iter_values(
            chunks.iter().map(|c| c.metadata.total_chunks),
        )),
        Arc::new(StringArray::from_iter_values(
            chunks.iter().map(|c| c.metadata.document_type.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(&processed_ats)),
        Arc::new(StringArray::from_iter_values(
            std::iter::repeat_n(added_at.as_str(), chunks.len()),
        )),
    ];

    RecordBatch::try_new(create_schema(vector_dim)?, arrays)
        .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
}

async fn parse_search_results_stream(
    mut results: lancedb::arrow::SendableRecordBatchStream,
) -> Result<Vec<RetrievedResult>> {
    let mut search_results = Vec::new();

    while let Some(batch) = results
        .try_next()
        .await
        .map_err(|e| RagError::RetrievalFailed(format!("Failed to read result stream: {}", e)))?
    {
        search_results.extend(parse_search_batch(&batch)?);
    }

    Ok(search_results)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::RetrievalFailed(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::RetrievalFailed(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::RetrievalFailed(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::RetrievalFailed(format!("Invalid {} column type", name)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<RetrievedResult>> {
    let ids = string_column(batch, "id")?;
    let texts = string_column(batch, "text")?;
    let sources = string_column(batch, "source")?;
    let file_paths = string_column(batch, "file_path")?;
    let chunk_indices = u32_column(batch, "chunk_index")?;
    let total_chunks = u32_column(batch, "total_chunks")?;
    let document_types = string_column(batch, "document_type")?;
    let processed_ats = string_column(batch, "processed_at")?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut results = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let processed_at = DateTime::parse_from_rfc3339(processed_ats.value(row))
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|e| {
                warn!("Unparsable processed_at in row {}: {}", row, e);
                DateTime::<Utc>::UNIX_EPOCH
            });

        let distance = distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

        results.push(RetrievedResult {
            id: ids.value(row).to_string(),
            text: texts.value(row).to_string(),
            metadata: ChunkMetadata {
                id: Some(ids.value(row).to_string()),
                source: sources.value(row).to_string(),
                file_path: file_paths.value(row).to_string(),
                chunk_index: chunk_indices.value(row),
                total_chunks: total_chunks.value(row),
                document_type: document_types.value(row).parse::<DocumentType>()?,
                processed_at,
            },
            distance,
            score: 1.0 - distance,
        });
    }

    Ok(results)
}
