//! On-disk layout of a single layer.
//!
//! Every layer lives in `<root>/<id>/` and contains a link area, a diff
//! area, a parent area and a ref area. Read-write layers also carry a
//! work area holding the materialized ancestry.

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use strata_core::config::{LayoutConfig, StoreConfig};
use strata_core::error::{LayerError, Result};
use strata_core::layer::LayerId;

/// Prefix of the hidden directories layers are renamed to while being removed.
pub const TOMBSTONE_PREFIX: &str = ".removing-";

/// Path arithmetic and area creation for layers under one root.
#[derive(Debug, Clone)]
pub struct LayerLayout {
    root: PathBuf,
    names: LayoutConfig,
    dir_mode: u32,
}

impl LayerLayout {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            root: config.root.clone(),
            names: config.layout.clone(),
            dir_mode: config.dir_mode,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn names(&self) -> &LayoutConfig {
        &self.names
    }

    pub fn whiteout_prefix(&self) -> &str {
        &self.names.whiteout_prefix
    }

    pub fn layer_dir(&self, id: &LayerId) -> PathBuf {
        self.root.join(id.as_str())
    }

    pub fn link_dir(&self, id: &LayerId) -> PathBuf {
        self.layer_dir(id).join(&self.names.link_dir)
    }

    pub fn diff_dir(&self, id: &LayerId) -> PathBuf {
        self.layer_dir(id).join(&self.names.diff_dir)
    }

    pub fn parent_dir(&self, id: &LayerId) -> PathBuf {
        self.layer_dir(id).join(&self.names.parent_dir)
    }

    pub fn ref_dir(&self, id: &LayerId) -> PathBuf {
        self.layer_dir(id).join(&self.names.ref_dir)
    }

    pub fn work_dir(&self, id: &LayerId) -> PathBuf {
        self.layer_dir(id).join(&self.names.work_dir)
    }

    /// Create a single directory with the configured mode.
    ///
    /// Fails if the directory already exists.
    pub fn create_dir(&self, path: &Path) -> std::io::Result<()> {
        DirBuilder::new().mode(self.dir_mode).create(path)
    }

    /// Create the store root if missing.
    pub fn ensure_root(&self) -> Result<()> {
        DirBuilder::new()
            .recursive(true)
            .mode(self.dir_mode)
            .create(&self.root)
            .map_err(|e| LayerError::io("create store root", &self.root, e))
    }

    /// Create the four base areas inside an already claimed layer directory.
    pub fn create_areas(&self, id: &LayerId) -> Result<()> {
        let dir = self.layer_dir(id);
        for area in self.names.base_areas() {
            let path = dir.join(area);
            self.create_dir(&path)
                .map_err(|e| LayerError::io("create layer area", &path, e))?;
        }
        Ok(())
    }

    /// Whether `id` looks like a layer: its directory and parent area exist.
    pub fn is_well_formed(&self, id: &LayerId) -> bool {
        self.layer_dir(id).is_dir() && self.parent_dir(id).is_dir()
    }

    /// Sorted entry names of an area directory.
    ///
    /// Names that are not valid UTF-8 are returned lossily.
    pub fn entry_names(&self, dir: &Path) -> Result<Vec<String>> {
        let read_dir =
            std::fs::read_dir(dir).map_err(|e| LayerError::io("read directory", dir, e))?;

        let mut names = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| LayerError::io("read directory entry", dir, e))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

/// A layer directory being created.
///
/// Dropping it without calling [`PendingLayer::commit`] removes the layer
/// directory and any link entry registered in the parent, so a failed
/// creation never leaves a partial layer behind.
pub struct PendingLayer<'a> {
    layout: &'a LayerLayout,
    id: LayerId,
    linked_parent: Option<LayerId>,
    committed: bool,
}

impl<'a> PendingLayer<'a> {
    /// Claim `<root>/<id>` by creating it.
    pub fn claim(layout: &'a LayerLayout, id: &LayerId) -> Result<Self> {
        let dir = layout.layer_dir(id);
        layout.create_dir(&dir).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                LayerError::AlreadyExists { id: id.to_string() }
            } else {
                LayerError::io("create layer directory", &dir, e)
            }
        })?;

        Ok(Self {
            layout,
            id: id.clone(),
            linked_parent: None,
            committed: false,
        })
    }

    pub fn id(&self) -> &LayerId {
        &self.id
    }

    /// Record `parent` in this layer's parent area and register this layer
    /// in the parent's link area.
    pub fn link_parent(&mut self, parent: &LayerId) -> Result<()> {
        let record = self.layout.parent_dir(&self.id).join(parent.as_str());
        std::os::unix::fs::symlink(self.layout.layer_dir(parent), &record)
            .map_err(|e| LayerError::io("create parent link", &record, e))?;

        let child_link = self.layout.link_dir(parent).join(self.id.as_str());
        std::os::unix::fs::symlink(self.layout.layer_dir(&self.id), &child_link)
            .map_err(|e| LayerError::io("create child link", &child_link, e))?;
        self.linked_parent = Some(parent.clone());

        Ok(())
    }

    /// Keep the layer.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingLayer<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        if let Some(parent) = &self.linked_parent {
            let child_link = self.layout.link_dir(parent).join(self.id.as_str());
            if let Err(e) = std::fs::remove_file(&child_link) {
                tracing::warn!(
                    path = %child_link.display(),
                    error = %e,
                    "Failed to remove child link during rollback"
                );
            }
        }

        let dir = self.layout.layer_dir(&self.id);
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Failed to remove partial layer during rollback"
            );
        } else {
            tracing::debug!(id = %self.id, "Rolled back partial layer");
        }
    }
}
