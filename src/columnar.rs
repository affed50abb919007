//! The narrow contracts the core uses to reach its external collaborators:
//! a columnar writer, a columnar rewriter, and a schema describer. Each
//! trait is deliberately small — the core only ever calls through these
//! three methods — and each ships one default, DataFusion/Parquet-backed
//! implementation: an Arrow writer buffered in memory ahead of a single
//! put+head round trip, and a DataFusion read-rewrite via
//! `ParquetObjectReader` for merges and rewrites.

use crate::error::{CatalogError, Result};
use crate::store::ObjectStoreClient;
use async_trait::async_trait;
use datafusion::arrow::array::RecordBatch;
use datafusion::arrow::datatypes::{Schema as ArrowSchema, SchemaRef};
use datafusion::datasource::MemTable;
use datafusion::parquet::arrow::async_reader::ParquetObjectReader;
use datafusion::parquet::basic::Compression as ParquetCompression;
use datafusion::parquet::file::properties::{WriterProperties, WriterVersion};
use datafusion::prelude::SessionContext;
use futures::StreamExt;
use object_store::ObjectMeta;
use std::sync::Arc;
use std::time::Duration;

/// Compression codec requested for a written data file. Kept as our own
/// small enum (rather than exposing `parquet::basic::Compression`
/// directly) so an invalid string from configuration surfaces as
/// [`CatalogError::InvalidCompression`] instead of a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Uncompressed,
    Snappy,
    Zstd,
    Lz4Raw,
}

impl Compression {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "uncompressed" | "none" => Ok(Self::Uncompressed),
            "snappy" => Ok(Self::Snappy),
            "zstd" => Ok(Self::Zstd),
            "lz4" | "lz4_raw" => Ok(Self::Lz4Raw),
            other => Err(CatalogError::InvalidCompression(other.to_string())),
        }
    }

    fn into_parquet(self) -> ParquetCompression {
        match self {
            Self::Uncompressed => ParquetCompression::UNCOMPRESSED,
            Self::Snappy => ParquetCompression::SNAPPY,
            Self::Zstd => ParquetCompression::ZSTD(Default::default()),
            Self::Lz4Raw => ParquetCompression::LZ4_RAW,
        }
    }
}

/// Writes rows with sort order O and compression C to object key K, and
/// reports the resulting byte length.
#[async_trait]
pub trait ColumnarWriter: Send + Sync {
    async fn write(
        &self,
        store: &ObjectStoreClient,
        key: &str,
        rows: &[RecordBatch],
        schema: SchemaRef,
        sort_order: &[String],
        compression: Compression,
        row_group_size: usize,
    ) -> Result<u64>;
}

/// Rewrites a set of source objects through a user-supplied SQL
/// expression into object key K. `logical_name` is the table name the
/// query addresses (`source_files` for merge, `_rows` for a single-file
/// partition rewrite).
#[async_trait]
pub trait ColumnarRewriter: Send + Sync {
    async fn rewrite(
        &self,
        store: &ObjectStoreClient,
        sources: &[ObjectMeta],
        logical_name: &str,
        query: &str,
        dest_key: &str,
        row_group_size: usize,
    ) -> Result<u64>;
}

/// Describes the column types of a row set.
pub trait SchemaDescriber: Send + Sync {
    fn describe(&self, rows: &RecordBatch) -> Result<(Vec<String>, Vec<String>)>;
}

/// Bounded retry around an upload: up to 3 attempts, 300ms * attempt
/// between them. 4xx-shaped failures are not retried (the operation is
/// terminal); anything else gets the budget.
async fn put_with_retry(store: &ObjectStoreClient, key: &str, bytes: bytes::Bytes) -> Result<()> {
    const MAX_ATTEMPTS: u32 = 3;
    let mut attempt = 1;
    loop {
        match store.put(key, bytes.clone()).await {
            Ok(()) => return Ok(()),
            Err(CatalogError::Store(object_store::Error::Generic { .. })) if attempt < MAX_ATTEMPTS => {
                tracing::warn!(key, attempt, "transient upload failure, retrying");
                tokio::time::sleep(Duration::from_millis(300 * attempt as u64)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// DataFusion/Parquet-backed default [`ColumnarWriter`] and
/// [`ColumnarRewriter`]. Buffers a file in memory before a single
/// put+head round trip rather than streaming it straight to the object
/// store; streaming avoids the memory cost but can't apply a retry
/// policy mid-stream, and buffering the whole file keeps the retry
/// boundary auditable at a single call site.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataFusionColumnar;

#[async_trait]
impl ColumnarWriter for DataFusionColumnar {
    async fn write(
        &self,
        store: &ObjectStoreClient,
        key: &str,
        rows: &[RecordBatch],
        schema: SchemaRef,
        sort_order: &[String],
        compression: Compression,
        row_group_size: usize,
    ) -> Result<u64> {
        let ctx = SessionContext::new();
        let mem_table = MemTable::try_new(schema.clone(), vec![rows.to_vec()])
            .map_err(|e| CatalogError::Collaborator(e.to_string()))?;
        ctx.register_table("rows", Arc::new(mem_table))
            .map_err(|e| CatalogError::Collaborator(e.to_string()))?;

        let query = if sort_order.is_empty() {
            "SELECT * FROM rows".to_string()
        } else {
            format!("SELECT * FROM rows ORDER BY {}", sort_order.join(", "))
        };
        let sorted = ctx
            .sql(&query)
            .await
            .map_err(|e| CatalogError::Collaborator(e.to_string()))?
            .collect()
            .await
            .map_err(|e| CatalogError::Collaborator(e.to_string()))?;

        let buffer = encode_parquet(&sorted, schema, compression, row_group_size)?;
        let size = buffer.len() as u64;
        put_with_retry(store, key, bytes::Bytes::from(buffer)).await?;
        let head_size = store.head(key).await?;
        tracing::debug!(key, bytes = head_size, "wrote columnar data file");
        Ok(head_size.max(size))
    }
}

#[async_trait]
impl ColumnarRewriter for DataFusionColumnar {
    async fn rewrite(
        &self,
        store: &ObjectStoreClient,
        sources: &[ObjectMeta],
        logical_name: &str,
        query: &str,
        dest_key: &str,
        row_group_size: usize,
    ) -> Result<u64> {
        let ctx = SessionContext::new();
        let mut batches = Vec::new();
        let mut schema: Option<SchemaRef> = None;
        for meta in sources {
            let reader = ParquetObjectReader::new(store.inner().clone(), meta.clone());
            let builder = datafusion::parquet::arrow::ParquetRecordBatchStreamBuilder::new(reader)
                .await
                .map_err(|e| CatalogError::Collaborator(e.to_string()))?;
            if schema.is_none() {
                schema = Some(builder.schema().clone());
            }
            let mut stream = builder
                .build()
                .map_err(|e| CatalogError::Collaborator(e.to_string()))?;
            while let Some(batch) = stream.next().await {
                batches.push(batch.map_err(|e| CatalogError::Collaborator(e.to_string()))?);
            }
        }
        let schema = schema.unwrap_or_else(|| Arc::new(ArrowSchema::empty()));
        let mem_table = MemTable::try_new(schema.clone(), vec![batches])
            .map_err(|e| CatalogError::Collaborator(e.to_string()))?;
        ctx.register_table(logical_name, Arc::new(mem_table))
            .map_err(|e| CatalogError::Collaborator(e.to_string()))?;

        let rewritten = ctx
            .sql(query)
            .await
            .map_err(|e| CatalogError::Collaborator(e.to_string()))?
            .collect()
            .await
            .map_err(|e| CatalogError::Collaborator(e.to_string()))?;
        let out_schema = rewritten
            .first()
            .map(|b| b.schema())
            .unwrap_or(schema);

        let buffer = encode_parquet(&rewritten, out_schema, Compression::Lz4Raw, row_group_size)?;
        let size = buffer.len() as u64;
        put_with_retry(store, dest_key, bytes::Bytes::from(buffer)).await?;
        let head_size = store.head(dest_key).await?;
        tracing::debug!(dest_key, bytes = head_size, "rewrote columnar data file");
        Ok(head_size.max(size))
    }
}

impl SchemaDescriber for DataFusionColumnar {
    fn describe(&self, rows: &RecordBatch) -> Result<(Vec<String>, Vec<String>)> {
        let schema = rows.schema();
        let columns = schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        let types = schema
            .fields()
            .iter()
            .map(|f| format!("{:?}", f.data_type()))
            .collect();
        Ok((columns, types))
    }
}

fn encode_parquet(
    batches: &[RecordBatch],
    schema: SchemaRef,
    compression: Compression,
    row_group_size: usize,
) -> Result<Vec<u8>> {
    let props = WriterProperties::builder()
        .set_writer_version(WriterVersion::PARQUET_2_0)
        .set_compression(compression.into_parquet())
        .set_max_row_group_size(row_group_size)
        .build();
    let mut buffer = Vec::new();
    {
        let mut writer =
            datafusion::parquet::arrow::ArrowWriter::try_new(&mut buffer, schema, Some(props))
                .map_err(|e| CatalogError::Collaborator(e.to_string()))?;
        for batch in batches {
            writer
                .write(batch)
                .map_err(|e| CatalogError::Collaborator(e.to_string()))?;
        }
        writer
            .close()
            .map_err(|e| CatalogError::Collaborator(e.to_string()))?;
    }
    Ok(buffer)
}
