//! Ancestry resolution.
//!
//! A layer's parent area holds at most one symlink, named by the parent
//! ID and pointing at the parent's layer directory. The chain is always
//! recomputed from disk.

use std::collections::HashSet;

use strata_core::error::{LayerError, Result};
use strata_core::layer::LayerId;

use crate::layout::LayerLayout;

/// Walks parent links from a leaf layer to its root.
pub struct ChainResolver<'a> {
    layout: &'a LayerLayout,
}

impl<'a> ChainResolver<'a> {
    pub fn new(layout: &'a LayerLayout) -> Self {
        Self { layout }
    }

    /// Read the parent of `id` from its parent area.
    ///
    /// An empty area means `id` is a root. A single entry is dereferenced
    /// to obtain the parent ID. Anything else is reported as
    /// [`LayerError::ChainBroken`].
    pub fn read_parent(&self, id: &LayerId) -> Result<Option<LayerId>> {
        let parent_dir = self.layout.parent_dir(id);
        if !parent_dir.is_dir() {
            return Err(broken(id, "parent area is missing or not a directory"));
        }

        let mut entries = std::fs::read_dir(&parent_dir)
            .map_err(|e| LayerError::io("read parent area", &parent_dir, e))?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| LayerError::io("read parent area entry", &parent_dir, e))?;

        let entry = match entries.len() {
            0 => return Ok(None),
            1 => entries.remove(0),
            n => return Err(broken(id, format!("{} parent entries recorded", n))),
        };

        let record = entry.path();
        let target = std::fs::read_link(&record).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidInput {
                broken(id, format!("parent entry {} is not a link", record.display()))
            } else {
                LayerError::io("read parent link", &record, e)
            }
        })?;

        let parent = target
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| LayerId::new(name).ok())
            .ok_or_else(|| {
                broken(
                    id,
                    format!("parent link points at {}, not a layer", target.display()),
                )
            })?;

        if entry.file_name().to_str() != Some(parent.as_str()) {
            return Err(broken(
                id,
                format!(
                    "parent entry {} does not match link target {}",
                    entry.file_name().to_string_lossy(),
                    parent
                ),
            ));
        }

        Ok(Some(parent))
    }

    /// Resolve the ancestry of `leaf`, leaf first and root last.
    pub fn resolve(&self, leaf: &LayerId) -> Result<Vec<LayerId>> {
        if !self.layout.layer_dir(leaf).is_dir() {
            return Err(broken(leaf, "layer does not exist"));
        }

        let mut chain = vec![leaf.clone()];
        let mut seen: HashSet<LayerId> = HashSet::from([leaf.clone()]);
        let mut current = leaf.clone();

        while let Some(parent) = self.read_parent(&current)? {
            if !self.layout.layer_dir(&parent).is_dir() {
                return Err(broken(&current, format!("parent layer {} is missing", parent)));
            }
            if !seen.insert(parent.clone()) {
                return Err(broken(&current, format!("cycle through {}", parent)));
            }
            chain.push(parent.clone());
            current = parent;
        }

        tracing::trace!(leaf = %leaf, depth = chain.len(), "Resolved layer chain");
        Ok(chain)
    }
}

fn broken(id: &LayerId, reason: impl Into<String>) -> LayerError {
    LayerError::ChainBroken {
        id: id.to_string(),
        reason: reason.into(),
    }
}
