//! Typed wrapper over `list`/`get`/`put`/`head`/`delete` against a bucket
//! with a tenant prefix: a thin layer over `Arc<dyn ObjectStore>` plus a
//! root path. All operations are idempotent from the caller's
//! perspective; `object_store`'s own backends already retry
//! transport-level transients, so this wrapper does not duplicate that
//! policy.

use crate::error::{CatalogError, Result};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream};
use object_store::{ObjectStore, path::Path};
use std::sync::Arc;

/// One object discovered by [`ObjectStoreClient::list`].
#[derive(Debug, Clone)]
pub struct ListedObject {
    pub key: String,
    pub size: u64,
}

#[derive(Clone)]
pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
    root: Path,
}

impl std::fmt::Debug for ObjectStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreClient")
            .field("root", &self.root)
            .finish()
    }
}

impl ObjectStoreClient {
    pub fn new(store: Arc<dyn ObjectStore>, root: impl Into<String>) -> Self {
        Self {
            store,
            root: Path::from(root.into()),
        }
    }

    fn full_path(&self, key: &str) -> Path {
        Path::from(format!("{}/{key}", self.root))
    }

    /// Lists every object under `prefix` (relative to the client's
    /// root), transparently paginating continuation tokens.
    pub async fn list(&self, prefix: &str) -> Result<Vec<ListedObject>> {
        let full_prefix = self.full_path(prefix);
        let mut out = Vec::new();
        let mut stream = self.store.list(Some(&full_prefix));
        while let Some(meta) = stream.next().await {
            let meta = meta?;
            let key = meta
                .location
                .as_ref()
                .strip_prefix(&format!("{}/", self.root))
                .unwrap_or(meta.location.as_ref())
                .to_string();
            out.push(ListedObject {
                key,
                size: meta.size as u64,
            });
        }
        Ok(out)
    }

    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let result = self.store.get(&self.full_path(key)).await?;
        Ok(result.bytes().await?)
    }

    pub async fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        self.store.put(&self.full_path(key), bytes.into()).await?;
        Ok(())
    }

    pub async fn head(&self, key: &str) -> Result<u64> {
        let meta = self.store.head(&self.full_path(key)).await?;
        Ok(meta.size as u64)
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        match self.store.delete(&self.full_path(key)).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes every key in `keys`, tolerating objects that are already
    /// gone (delete is idempotent from the caller's perspective).
    pub async fn delete_many(&self, keys: &[String]) -> Result<()> {
        let paths = stream::iter(keys.iter().map(|k| Ok(self.full_path(k))));
        self.store
            .delete_stream(Box::pin(paths))
            .map(|res| match res {
                Ok(()) => Ok(()),
                Err(object_store::Error::NotFound { .. }) => Ok(()),
                Err(e) => Err(CatalogError::from(e)),
            })
            .try_collect::<Vec<()>>()
            .await?;
        Ok(())
    }

    /// Access to the underlying store and root, for collaborators that
    /// need to speak directly to `object_store` (e.g. a DataFusion
    /// `ParquetObjectReader` or `BufWriter`).
    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn full_object_path(&self, key: &str) -> Path {
        self.full_path(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn client() -> ObjectStoreClient {
        ObjectStoreClient::new(Arc::new(InMemory::new()), "tenant")
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let c = client();
        c.put("a/b.txt", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        let got = c.get("a/b.txt").await.unwrap();
        assert_eq!(&got[..], b"hello");
    }

    #[tokio::test]
    async fn head_reports_size() {
        let c = client();
        c.put("f", Bytes::from_static(b"12345")).await.unwrap();
        assert_eq!(c.head("f").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn list_paginates_under_prefix() {
        let c = client();
        for i in 0..5 {
            c.put(&format!("_log/{i}.jsonl"), Bytes::from_static(b"x"))
                .await
                .unwrap();
        }
        c.put("_data/other.parquet", Bytes::from_static(b"x"))
            .await
            .unwrap();
        let listed = c.list("_log").await.unwrap();
        assert_eq!(listed.len(), 5);
        assert!(listed.iter().all(|o| o.key.starts_with("_log/")));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let c = client();
        c.put("f", Bytes::from_static(b"x")).await.unwrap();
        c.delete("f").await.unwrap();
        // deleting again must not error
        c.delete("f").await.unwrap();
    }

    #[tokio::test]
    async fn delete_many_tolerates_missing_keys() {
        let c = client();
        c.put("a", Bytes::from_static(b"x")).await.unwrap();
        c.delete_many(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
    }
}
