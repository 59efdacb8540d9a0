//! Strata Core - Foundational Types
//!
//! This module provides the error type, configuration and layer identifiers
//! shared by the layer store runtime and the CLI.

pub mod config;
pub mod error;
pub mod layer;
pub mod log;

// Re-export commonly used types
pub use config::{LayoutConfig, StoreConfig};
pub use error::{LayerError, Result};
pub use layer::{LayerId, LayerInfo, LayerKind};
pub use log::{LogConfig, LogFormat, LogLevel};

/// Strata version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
