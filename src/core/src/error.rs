use std::path::{Path, PathBuf};

use thiserror::Error;

/// Strata layer store error types
#[derive(Error, Debug)]
pub enum LayerError {
    /// A layer with this ID is already allocated
    #[error("Layer already exists: {id}")]
    AlreadyExists { id: String },

    /// The requested layer is not present in the store
    #[error("Layer not found: {id}")]
    LayerNotFound { id: String },

    /// The ID cannot be used as a layer or holder name
    #[error("Invalid layer ID '{id}': {reason}")]
    InvalidLayerId { id: String, reason: String },

    /// Parent is missing or structurally malformed
    #[error("Invalid parent layer {parent}: {reason}")]
    InvalidParent { parent: String, reason: String },

    /// Ancestry corruption detected while walking a chain
    #[error("Layer chain broken at {id}: {reason}")]
    ChainBroken { id: String, reason: String },

    /// Removal attempted while the layer is referenced or linked
    #[error("Layer {id} is pinned: {references} reference(s), {links} link(s)")]
    LayerPinned {
        id: String,
        references: usize,
        links: usize,
    },

    /// Underlying filesystem failure
    #[error("I/O error: failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Operation reserved for the surrounding driver
    #[error("Unimplemented: {0}")]
    Unimplemented(&'static str),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl LayerError {
    /// Wrap an I/O error with the operation and path it happened on.
    pub fn io(op: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        LayerError::Io {
            op,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether this error is an I/O failure whose cause is a missing path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LayerError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

impl From<serde_json::Error> for LayerError {
    fn from(err: serde_json::Error) -> Self {
        LayerError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for LayerError {
    fn from(err: serde_yaml::Error) -> Self {
        LayerError::SerializationError(err.to_string())
    }
}

/// Result type alias for layer store operations
pub type Result<T> = std::result::Result<T, LayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists_display() {
        let error = LayerError::AlreadyExists {
            id: "abc".to_string(),
        };
        assert_eq!(error.to_string(), "Layer already exists: abc");
    }

    #[test]
    fn test_invalid_parent_display() {
        let error = LayerError::InvalidParent {
            parent: "base".to_string(),
            reason: "layer does not exist".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid parent layer base: layer does not exist"
        );
    }

    #[test]
    fn test_chain_broken_display() {
        let error = LayerError::ChainBroken {
            id: "mid".to_string(),
            reason: "2 parent entries".to_string(),
        };
        assert_eq!(error.to_string(), "Layer chain broken at mid: 2 parent entries");
    }

    #[test]
    fn test_layer_pinned_display() {
        let error = LayerError::LayerPinned {
            id: "base".to_string(),
            references: 1,
            links: 2,
        };
        assert_eq!(
            error.to_string(),
            "Layer base is pinned: 1 reference(s), 2 link(s)"
        );
    }

    #[test]
    fn test_io_error_carries_op_and_path() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = LayerError::io("create directory", "/var/lib/strata/abc", source);
        let msg = error.to_string();
        assert!(msg.contains("create directory"));
        assert!(msg.contains("/var/lib/strata/abc"));
        assert!(msg.contains("denied"));
        assert!(!error.is_not_found());
    }

    #[test]
    fn test_is_not_found() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(LayerError::io("remove", "/x", source).is_not_found());
        assert!(!LayerError::Unimplemented("mount").is_not_found());
    }

    #[test]
    fn test_unimplemented_display() {
        let error = LayerError::Unimplemented("apply diff");
        assert_eq!(error.to_string(), "Unimplemented: apply diff");
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let error: LayerError = result.unwrap_err().into();
        assert!(matches!(error, LayerError::SerializationError(_)));
    }

    #[test]
    fn test_serde_yaml_error_conversion() {
        let result: std::result::Result<serde_yaml::Value, _> =
            serde_yaml::from_str("invalid: yaml: content:");
        let error: LayerError = result.unwrap_err().into();
        assert!(matches!(error, LayerError::SerializationError(_)));
    }

    #[test]
    fn test_error_is_debug() {
        let error = LayerError::LayerNotFound {
            id: "x".to_string(),
        };
        assert!(format!("{:?}", error).contains("LayerNotFound"));
    }
}
