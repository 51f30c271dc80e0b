//! Corpus Fabric - Compact Storage and Unraveling for Annotated Text
//!
//! Copyright (c) 2025 Corpus Fabric Contributors
//! Licensed under MIT License
//!
//! Node-indexed feature columns in minimal integer widths, the canonical
//! order of corpus nodes, and the unraveling of a node into a tree of
//! properly nested slot chunks.

pub mod column;
pub mod config;
pub mod corpus;
pub mod edge;
pub mod error;
pub mod interop;
pub mod levels;
pub mod order;
pub mod snapshot;
pub mod unravel;
pub mod width;

// Re-export main types for convenience
pub use column::{Encoding, FeatureColumn, IntColumn, StrColumn, Value};
pub use config::{FabricConfig, UnravelOptions};
pub use corpus::{Corpus, CorpusBuilder, CorpusData};
pub use edge::EdgeColumn;
pub use error::{FabricError, Result};
pub use interop::{Locality, Node, NodeTypes, Slot};
pub use levels::Level;
pub use order::{Chunk, NodeOrder};
pub use unravel::{Boundary, BoundaryClass, Tree, TreeNode, Unraveler};
pub use width::{select, IntegerType};

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are ignored.
#[cfg(feature = "logging")]
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
