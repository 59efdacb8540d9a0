//! Strata Runtime - filesystem-backed layer store.
//!
//! This module implements the layer lifecycle: creating layers with
//! optional parents, resolving ancestry chains, materializing read-write
//! layers by copy-up, and reconciling whiteouts. The [`driver`] module
//! adapts the store to a graph-driver plugin host.

pub mod chain;
pub mod copy;
pub mod driver;
pub mod layout;
pub mod lock;
pub mod materialize;
pub mod store;
pub mod whiteout;

// Re-export common types
pub use chain::ChainResolver;
pub use copy::{copy_tree, CopyStats};
pub use driver::{Change, ChangeKind, GraphDriver, StrataDriver, DRIVER_NAME};
pub use layout::LayerLayout;
pub use materialize::{materialize, MaterializeReport};
pub use store::LayerStore;

/// Strata Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
