//! Graph driver adapter.
//!
//! Exposes the layer store through the lifecycle contract a container
//! runtime's graph-driver plugin host expects. IDs and parents arrive as
//! plain strings, with an empty parent meaning "no parent". Mounting and
//! diff computation belong to the surrounding plugin and are reported as
//! unimplemented here.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strata_core::error::{LayerError, Result};
use strata_core::layer::{parse_parent, LayerId};
use tokio::io::AsyncRead;

use crate::store::LayerStore;

/// Name reported by [`StrataDriver`].
pub const DRIVER_NAME: &str = "strata-copyup";

/// Byte stream carrying a layer diff.
pub type DiffStream = Box<dyn AsyncRead + Send + Unpin>;

/// Kind of a filesystem change between a layer and its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Modify,
    Add,
    Delete,
}

/// A single path changed by a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    pub kind: ChangeKind,
}

/// Lifecycle contract between the plugin host and a layer backend.
#[async_trait]
pub trait GraphDriver: Send + Sync {
    /// Driver name shown in status output.
    fn name(&self) -> &str;

    /// Called once when the host connects.
    async fn init(&self, home: &str, options: &[String]) -> Result<()>;

    /// Create a read-only layer.
    async fn create(&self, id: &str, parent: &str) -> Result<()>;

    /// Create a read-write layer populated with its ancestry.
    async fn create_read_write(&self, id: &str, parent: &str) -> Result<()>;

    /// Remove an unpinned layer.
    async fn remove(&self, id: &str) -> Result<()>;

    /// Mount a layer and return its path.
    async fn get(&self, id: &str, mount_label: &str) -> Result<PathBuf>;

    /// Unmount a layer.
    async fn put(&self, id: &str) -> Result<()>;

    async fn exists(&self, id: &str) -> bool;

    /// Human-readable key/value status pairs.
    async fn status(&self) -> Vec<(String, String)>;

    async fn metadata(&self, id: &str) -> Result<HashMap<String, String>>;

    /// Called when the host shuts down.
    async fn cleanup(&self) -> Result<()>;

    async fn diff(&self, id: &str, parent: &str) -> Result<DiffStream>;

    async fn changes(&self, id: &str, parent: &str) -> Result<Vec<Change>>;

    async fn apply_diff(&self, id: &str, parent: &str, diff: DiffStream) -> Result<u64>;

    async fn diff_size(&self, id: &str, parent: &str) -> Result<u64>;
}

/// [`GraphDriver`] backed by a [`LayerStore`].
///
/// Store calls block on filesystem I/O and run on tokio's blocking pool.
#[derive(Clone)]
pub struct StrataDriver {
    store: Arc<LayerStore>,
}

impl StrataDriver {
    pub fn new(store: Arc<LayerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<LayerStore> {
        &self.store
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&LayerStore) -> Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| {
                LayerError::io(
                    "join blocking store task",
                    self.store.root(),
                    std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                )
            })?
    }
}

#[async_trait]
impl GraphDriver for StrataDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    async fn init(&self, home: &str, options: &[String]) -> Result<()> {
        tracing::info!(home, ?options, root = %self.store.root().display(), "Graph driver host connected");
        Ok(())
    }

    async fn create(&self, id: &str, parent: &str) -> Result<()> {
        let id = LayerId::new(id)?;
        let parent = parse_parent(parent)?;
        self.blocking(move |store| store.create_read_only(&id, parent.as_ref()))
            .await
    }

    async fn create_read_write(&self, id: &str, parent: &str) -> Result<()> {
        let id = LayerId::new(id)?;
        let parent = parse_parent(parent)?;
        self.blocking(move |store| store.create_read_write(&id, parent.as_ref()))
            .await
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let id = LayerId::new(id)?;
        self.blocking(move |store| store.remove(&id)).await
    }

    async fn get(&self, _id: &str, _mount_label: &str) -> Result<PathBuf> {
        Err(LayerError::Unimplemented("mount"))
    }

    async fn put(&self, _id: &str) -> Result<()> {
        Err(LayerError::Unimplemented("unmount"))
    }

    async fn exists(&self, id: &str) -> bool {
        match LayerId::new(id) {
            Ok(id) => self.blocking(move |store| Ok(store.exists(&id))).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn status(&self) -> Vec<(String, String)> {
        let layers = self
            .blocking(|store| store.list())
            .await
            .map(|ids| ids.len().to_string())
            .unwrap_or_else(|e| format!("unknown ({})", e));

        vec![
            ("Driver".to_string(), DRIVER_NAME.to_string()),
            ("Root Dir".to_string(), self.store.root().display().to_string()),
            ("Layers".to_string(), layers),
        ]
    }

    async fn metadata(&self, id: &str) -> Result<HashMap<String, String>> {
        let id = LayerId::new(id)?;
        let info = self.blocking(move |store| store.info(&id)).await?;

        let mut metadata = HashMap::new();
        metadata.insert("Dir".to_string(), info.dir.display().to_string());
        metadata.insert("DiffDir".to_string(), info.diff_dir.display().to_string());
        if let Some(work) = &info.work_dir {
            metadata.insert("WorkDir".to_string(), work.display().to_string());
        }
        if let Some(parent) = &info.parent {
            metadata.insert("Parent".to_string(), parent.to_string());
        }
        Ok(metadata)
    }

    async fn cleanup(&self) -> Result<()> {
        self.blocking(|store| store.cleanup()).await.map(|_| ())
    }

    async fn diff(&self, _id: &str, _parent: &str) -> Result<DiffStream> {
        Err(LayerError::Unimplemented("diff"))
    }

    async fn changes(&self, _id: &str, _parent: &str) -> Result<Vec<Change>> {
        Err(LayerError::Unimplemented("changes"))
    }

    async fn apply_diff(&self, _id: &str, _parent: &str, _diff: DiffStream) -> Result<u64> {
        Err(LayerError::Unimplemented("apply diff"))
    }

    async fn diff_size(&self, _id: &str, _parent: &str) -> Result<u64> {
        Err(LayerError::Unimplemented("diff size"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::config::StoreConfig;
    use tempfile::TempDir;

    fn driver(tmp: &TempDir) -> StrataDriver {
        let store = LayerStore::open(&StoreConfig::with_root(tmp.path().join("layers"))).unwrap();
        StrataDriver::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_lifecycle_with_empty_parent() {
        let tmp = TempDir::new().unwrap();
        let driver = driver(&tmp);

        driver.init("/var/lib/docker", &[]).await.unwrap();
        driver.create("base", "").await.unwrap();
        driver.create_read_write("rw", "base").await.unwrap();

        assert!(driver.exists("base").await);
        assert!(driver.exists("rw").await);

        let err = driver.remove("base").await.unwrap_err();
        assert!(matches!(err, LayerError::LayerPinned { .. }));

        driver.remove("rw").await.unwrap();
        driver.remove("base").await.unwrap();
        assert!(!driver.exists("base").await);
    }

    #[tokio::test]
    async fn test_exists_with_invalid_id_is_false() {
        let tmp = TempDir::new().unwrap();
        let driver = driver(&tmp);
        assert!(!driver.exists("../etc").await);
        assert!(!driver.exists("").await);
    }

    #[tokio::test]
    async fn test_create_with_invalid_id() {
        let tmp = TempDir::new().unwrap();
        let driver = driver(&tmp);
        assert!(matches!(
            driver.create("a/b", "").await,
            Err(LayerError::InvalidLayerId { .. })
        ));
    }

    #[tokio::test]
    async fn test_unimplemented_operations() {
        let tmp = TempDir::new().unwrap();
        let driver = driver(&tmp);
        driver.create("a", "").await.unwrap();

        assert!(matches!(driver.get("a", "").await, Err(LayerError::Unimplemented(_))));
        assert!(matches!(driver.put("a").await, Err(LayerError::Unimplemented(_))));
        assert!(matches!(driver.diff("a", "").await, Err(LayerError::Unimplemented(_))));
        assert!(matches!(driver.changes("a", "").await, Err(LayerError::Unimplemented(_))));
        assert!(matches!(driver.diff_size("a", "").await, Err(LayerError::Unimplemented(_))));
        let empty: DiffStream = Box::new(tokio::io::empty());
        assert!(matches!(
            driver.apply_diff("a", "", empty).await,
            Err(LayerError::Unimplemented(_))
        ));
    }

    #[tokio::test]
    async fn test_status_and_metadata() {
        let tmp = TempDir::new().unwrap();
        let driver = driver(&tmp);
        driver.create("base", "").await.unwrap();
        driver.create_read_write("rw", "base").await.unwrap();

        let status = driver.status().await;
        assert!(status.contains(&("Driver".to_string(), DRIVER_NAME.to_string())));
        assert!(status.contains(&("Layers".to_string(), "2".to_string())));

        let metadata = driver.metadata("rw").await.unwrap();
        assert_eq!(metadata.get("Parent").map(String::as_str), Some("base"));
        assert!(metadata["WorkDir"].ends_with("rw/work"));
        assert!(metadata["DiffDir"].ends_with("rw/diff"));

        let metadata = driver.metadata("base").await.unwrap();
        assert!(!metadata.contains_key("WorkDir"));
        assert!(!metadata.contains_key("Parent"));
    }

    #[tokio::test]
    async fn test_cleanup_is_ok_on_clean_store() {
        let tmp = TempDir::new().unwrap();
        let driver = driver(&tmp);
        driver.cleanup().await.unwrap();
        assert_eq!(driver.name(), DRIVER_NAME);
    }
}
