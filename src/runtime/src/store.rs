//! Filesystem-backed layer store.
//!
//! Layers are directories under the store root; the filesystem is the only
//! source of truth. See [`crate::layout`] for the shape of a layer.

use std::path::{Path, PathBuf};

use strata_core::config::StoreConfig;
use strata_core::error::{LayerError, Result};
use strata_core::layer::{validate_name, LayerId, LayerInfo, LayerKind};

use crate::chain::ChainResolver;
use crate::layout::{LayerLayout, PendingLayer, TOMBSTONE_PREFIX};
use crate::lock::LockTable;
use crate::materialize::materialize;

/// Layer store rooted at one directory.
///
/// Operations on different layers may run concurrently. Within one process
/// the store serializes operations touching the same layer; callers in
/// different processes must serialize operations on the same ID themselves.
pub struct LayerStore {
    layout: LayerLayout,
    locks: LockTable,
}

impl LayerStore {
    /// Open (and create if needed) the store described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let layout = LayerLayout::new(config);
        layout.ensure_root()?;

        tracing::debug!(root = %layout.root().display(), "Opened layer store");

        Ok(Self {
            layout,
            locks: LockTable::new(),
        })
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn layout(&self) -> &LayerLayout {
        &self.layout
    }

    fn resolver(&self) -> ChainResolver<'_> {
        ChainResolver::new(&self.layout)
    }

    /// Whether a layer directory exists for `id`.
    pub fn exists(&self, id: &LayerId) -> bool {
        self.layout.layer_dir(id).is_dir()
    }

    /// Create a read-only layer, optionally on top of `parent`.
    pub fn create_read_only(&self, id: &LayerId, parent: Option<&LayerId>) -> Result<()> {
        tracing::info!(id = %id, parent = ?parent.map(LayerId::as_str), "Creating layer");

        let _locks = self.lock_with_parent(id, parent);
        self.check_preconditions(id, parent)?;
        self.allocate(id, parent)?.commit();
        Ok(())
    }

    /// Create a read-write layer whose work area holds the merged content
    /// of `parent` and all of its ancestors.
    ///
    /// If copy-up fails the layer is left in place with a partially merged
    /// work area; the caller is expected to [`remove`](Self::remove) it.
    pub fn create_read_write(&self, id: &LayerId, parent: Option<&LayerId>) -> Result<()> {
        tracing::info!(id = %id, parent = ?parent.map(LayerId::as_str), "Creating read-write layer");

        let _locks = self.lock_with_parent(id, parent);
        self.check_preconditions(id, parent)?;

        // Walk the ancestry before touching disk so a broken chain has no side effects.
        let chain = match parent {
            Some(parent) => self.resolver().resolve(parent)?,
            None => Vec::new(),
        };

        let pending = self.allocate(id, parent)?;
        let work = self.layout.work_dir(id);
        self.layout
            .create_dir(&work)
            .map_err(|e| LayerError::io("create work area", &work, e))?;
        pending.commit();

        let report = materialize(&self.layout, &chain, &work)?;

        tracing::info!(
            id = %id,
            layers = report.layers,
            files = report.copied.files,
            bytes = report.copied.bytes,
            whiteouts = report.whiteouts,
            "Materialized read-write layer"
        );
        Ok(())
    }

    /// Remove a layer and everything under it.
    ///
    /// Refuses with [`LayerError::LayerPinned`] while the layer has
    /// references or child links.
    pub fn remove(&self, id: &LayerId) -> Result<()> {
        let (parents, _locks) = self.lock_for_removal(id);

        let dir = self.layout.layer_dir(id);
        if !dir.is_dir() {
            return Err(LayerError::LayerNotFound { id: id.to_string() });
        }

        let references = self.layout.entry_names(&self.layout.ref_dir(id))?;
        let links = self.layout.entry_names(&self.layout.link_dir(id))?;
        if !references.is_empty() || !links.is_empty() {
            return Err(LayerError::LayerPinned {
                id: id.to_string(),
                references: references.len(),
                links: links.len(),
            });
        }

        // The rename makes the layer disappear atomically; the tree is deleted afterwards.
        let tombstone = self.layout.root().join(format!(
            "{}{}-{}",
            TOMBSTONE_PREFIX,
            id,
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::rename(&dir, &tombstone)
            .map_err(|e| LayerError::io("move layer to tombstone", &dir, e))?;

        for parent in &parents {
            let child_link = self.layout.link_dir(parent).join(id.as_str());
            match std::fs::remove_file(&child_link) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                // The layer is already gone; a stale link only keeps the parent pinned.
                Err(e) => tracing::warn!(
                    id = %id,
                    parent = %parent,
                    path = %child_link.display(),
                    error = %e,
                    "Failed to remove child link"
                ),
            }
        }

        if let Err(e) = std::fs::remove_dir_all(&tombstone) {
            tracing::warn!(
                id = %id,
                path = %tombstone.display(),
                error = %e,
                "Failed to delete removed layer; it will be retried on cleanup"
            );
        }

        tracing::info!(id = %id, "Removed layer");
        Ok(())
    }

    /// Parent of `id`, or `None` for a root layer.
    pub fn parent(&self, id: &LayerId) -> Result<Option<LayerId>> {
        self.require(id)?;
        self.resolver().read_parent(id)
    }

    /// Ancestry of `id`, leaf first and root last.
    pub fn chain(&self, id: &LayerId) -> Result<Vec<LayerId>> {
        self.require(id)?;
        self.resolver().resolve(id)
    }

    /// Record `holder` as a user of `id`.
    ///
    /// Returns `false` if the holder was already recorded.
    pub fn acquire(&self, id: &LayerId, holder: &str) -> Result<bool> {
        validate_name(holder)?;
        let _locks = self.locks.lock(&[id]);
        self.require(id)?;

        let path = self.layout.ref_dir(id).join(holder);
        let created = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path);
        match created {
            Ok(_) => {
                tracing::debug!(id = %id, holder, "Acquired layer reference");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(LayerError::io("create reference", &path, e)),
        }
    }

    /// Drop `holder` from the users of `id`.
    ///
    /// Returns `false` if the holder was not recorded.
    pub fn release(&self, id: &LayerId, holder: &str) -> Result<bool> {
        validate_name(holder)?;
        let _locks = self.locks.lock(&[id]);
        self.require(id)?;

        let path = self.layout.ref_dir(id).join(holder);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(id = %id, holder, "Released layer reference");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LayerError::io("remove reference", &path, e)),
        }
    }

    /// Holder tokens currently referencing `id`.
    pub fn references(&self, id: &LayerId) -> Result<Vec<String>> {
        self.require(id)?;
        self.layout.entry_names(&self.layout.ref_dir(id))
    }

    /// Children that name `id` as their parent.
    pub fn links(&self, id: &LayerId) -> Result<Vec<LayerId>> {
        self.require(id)?;
        Ok(self
            .layout
            .entry_names(&self.layout.link_dir(id))?
            .into_iter()
            .filter_map(|name| LayerId::new(name).ok())
            .collect())
    }

    /// All layer IDs in the store, sorted.
    pub fn list(&self) -> Result<Vec<LayerId>> {
        let root = self.layout.root();
        let read_dir =
            std::fs::read_dir(root).map_err(|e| LayerError::io("read store root", root, e))?;

        let mut ids = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| LayerError::io("read store root entry", root, e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !entry.path().is_dir() {
                continue;
            }
            // Tombstones and other hidden names are not layers.
            if let Ok(id) = LayerId::new(name) {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Describe the on-disk state of `id`.
    pub fn info(&self, id: &LayerId) -> Result<LayerInfo> {
        self.require(id)?;

        let dir = self.layout.layer_dir(id);
        let work = self.layout.work_dir(id);
        let read_write = work.is_dir();
        let created_at = std::fs::metadata(&dir)
            .and_then(|m| m.created().or_else(|_| m.modified()))
            .ok()
            .map(chrono::DateTime::<chrono::Utc>::from);

        Ok(LayerInfo {
            id: id.clone(),
            parent: self.resolver().read_parent(id)?,
            kind: if read_write {
                LayerKind::ReadWrite
            } else {
                LayerKind::ReadOnly
            },
            references: self.references(id)?,
            links: self.links(id)?,
            diff_dir: self.layout.diff_dir(id),
            work_dir: read_write.then_some(work),
            dir,
            created_at,
        })
    }

    /// Path of the diff area, for collaborators that populate layer content.
    pub fn diff_dir(&self, id: &LayerId) -> Result<PathBuf> {
        self.require(id)?;
        Ok(self.layout.diff_dir(id))
    }

    /// Path of the work area, or `None` for read-only layers.
    pub fn work_dir(&self, id: &LayerId) -> Result<Option<PathBuf>> {
        self.require(id)?;
        let work = self.layout.work_dir(id);
        Ok(work.is_dir().then_some(work))
    }

    /// Delete tombstones left behind by interrupted removals.
    ///
    /// Returns the number of tombstones deleted.
    pub fn cleanup(&self) -> Result<usize> {
        let root = self.layout.root();
        let read_dir =
            std::fs::read_dir(root).map_err(|e| LayerError::io("read store root", root, e))?;

        let mut removed = 0;
        for entry in read_dir {
            let entry = entry.map_err(|e| LayerError::io("read store root entry", root, e))?;
            let is_tombstone = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(TOMBSTONE_PREFIX));
            if !is_tombstone {
                continue;
            }

            let path = entry.path();
            std::fs::remove_dir_all(&path)
                .map_err(|e| LayerError::io("delete tombstone", &path, e))?;
            removed += 1;
        }

        if removed > 0 {
            tracing::info!(removed, "Cleaned up removed layers");
        }
        Ok(removed)
    }

    fn require(&self, id: &LayerId) -> Result<()> {
        if self.exists(id) {
            Ok(())
        } else {
            Err(LayerError::LayerNotFound { id: id.to_string() })
        }
    }

    fn lock_with_parent(&self, id: &LayerId, parent: Option<&LayerId>) -> crate::lock::LayerLocks {
        match parent {
            Some(parent) => self.locks.lock(&[id, parent]),
            None => self.locks.lock(&[id]),
        }
    }

    /// Checks that must pass before anything is written.
    fn check_preconditions(&self, id: &LayerId, parent: Option<&LayerId>) -> Result<()> {
        if self.layout.layer_dir(id).exists() {
            return Err(LayerError::AlreadyExists { id: id.to_string() });
        }

        if let Some(parent) = parent {
            if !self.layout.is_well_formed(parent) {
                return Err(LayerError::InvalidParent {
                    parent: parent.to_string(),
                    reason: "layer does not exist or is not a correctly formatted directory"
                        .to_string(),
                });
            }
        }

        Ok(())
    }

    /// Build the base layout for `id`; rolled back unless committed.
    fn allocate(&self, id: &LayerId, parent: Option<&LayerId>) -> Result<PendingLayer<'_>> {
        let mut pending = PendingLayer::claim(&self.layout, id)?;
        self.layout.create_areas(id)?;
        if let Some(parent) = parent {
            pending.link_parent(parent)?;
        }
        Ok(pending)
    }

    /// Lock `id` together with its parents.
    ///
    /// The parent area is read before locking, so it is read again under
    /// the locks; a creation of `id` that finished in between changes the
    /// set and the locks are retaken.
    fn lock_for_removal(&self, id: &LayerId) -> (Vec<LayerId>, crate::lock::LayerLocks) {
        let mut parents = self.parents_for_cleanup(id);
        loop {
            let mut lock_ids: Vec<&LayerId> = parents.iter().collect();
            lock_ids.push(id);
            let locks = self.locks.lock(&lock_ids);

            let current = self.parents_for_cleanup(id);
            if current == parents {
                return (parents, locks);
            }
            drop(locks);
            tracing::debug!(id = %id, "Parent set changed while locking; retrying");
            parents = current;
        }
    }

    /// Parents whose link area may name `id`.
    ///
    /// Falls back to every entry name in the parent area when the area is
    /// corrupt, so a damaged layer can still be removed cleanly.
    fn parents_for_cleanup(&self, id: &LayerId) -> Vec<LayerId> {
        match self.resolver().read_parent(id) {
            Ok(parent) => parent.into_iter().collect(),
            Err(_) => self
                .layout
                .entry_names(&self.layout.parent_dir(id))
                .unwrap_or_default()
                .into_iter()
                .filter_map(|name| LayerId::new(name).ok())
                .collect(),
        }
    }
}
