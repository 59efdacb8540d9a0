//! Layer identifiers and descriptive records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{LayerError, Result};

/// Opaque, caller-supplied layer identifier.
///
/// IDs name a directory under the store root, so they must be a single
/// path component. Names starting with `.` are reserved for the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LayerId(String);

impl LayerId {
    /// Validate and wrap a layer ID.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_name(&id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for LayerId {
    type Err = LayerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for LayerId {
    type Error = LayerError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<LayerId> for String {
    fn from(id: LayerId) -> Self {
        id.0
    }
}

impl AsRef<str> for LayerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check that `name` can be used as a layer ID or holder token.
pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.contains('/') {
        Some("must not contain '/'")
    } else if name.contains('\0') {
        Some("must not contain NUL")
    } else if name.starts_with('.') {
        Some("must not start with '.'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(LayerError::InvalidLayerId {
            id: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Parse an optional parent argument where the empty string means "no parent".
pub fn parse_parent(parent: &str) -> Result<Option<LayerId>> {
    if parent.is_empty() {
        Ok(None)
    } else {
        LayerId::new(parent).map(Some)
    }
}

/// Whether a layer was created with a work area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerKind {
    ReadOnly,
    ReadWrite,
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "ro"),
            Self::ReadWrite => write!(f, "rw"),
        }
    }
}

/// Snapshot of a layer's on-disk state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerInfo {
    pub id: LayerId,
    pub parent: Option<LayerId>,
    pub kind: LayerKind,
    /// Holder tokens in the ref area
    pub references: Vec<String>,
    /// Child layer IDs in the link area
    pub links: Vec<LayerId>,
    pub dir: PathBuf,
    pub diff_dir: PathBuf,
    pub work_dir: Option<PathBuf>,
    pub created_at: Option<DateTime<Utc>>,
}

impl LayerInfo {
    /// Pinned layers cannot be removed.
    pub fn is_pinned(&self) -> bool {
        !self.references.is_empty() || !self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_id_accepts_opaque_names() {
        for id in ["abc", "sha256:deadbeef", "layer-1_init", "0123456789abcdef"] {
            assert_eq!(LayerId::new(id).unwrap().as_str(), id);
        }
    }

    #[test]
    fn test_layer_id_rejects_path_like_names() {
        for id in ["", "a/b", "/abs", ".", "..", ".hidden", "nul\0byte"] {
            let err = LayerId::new(id).unwrap_err();
            assert!(
                matches!(err, LayerError::InvalidLayerId { .. }),
                "expected InvalidLayerId for {:?}",
                id
            );
        }
    }

    #[test]
    fn test_parse_parent() {
        assert_eq!(parse_parent("").unwrap(), None);
        assert_eq!(
            parse_parent("base").unwrap(),
            Some(LayerId::new("base").unwrap())
        );
        assert!(parse_parent("../escape").is_err());
    }

    #[test]
    fn test_layer_id_serde_validates() {
        let id: LayerId = serde_json::from_str("\"base\"").unwrap();
        assert_eq!(id.to_string(), "base");
        assert!(serde_json::from_str::<LayerId>("\"a/b\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"base\"");
    }

    #[test]
    fn test_layer_kind_display() {
        assert_eq!(LayerKind::ReadOnly.to_string(), "ro");
        assert_eq!(LayerKind::ReadWrite.to_string(), "rw");
    }

    #[test]
    fn test_layer_info_pinned() {
        let mut info = LayerInfo {
            id: LayerId::new("a").unwrap(),
            parent: None,
            kind: LayerKind::ReadOnly,
            references: vec![],
            links: vec![],
            dir: PathBuf::from("/r/a"),
            diff_dir: PathBuf::from("/r/a/diff"),
            work_dir: None,
            created_at: None,
        };
        assert!(!info.is_pinned());

        info.references.push("1234".to_string());
        assert!(info.is_pinned());

        info.references.clear();
        info.links.push(LayerId::new("b").unwrap());
        assert!(info.is_pinned());
    }
}
