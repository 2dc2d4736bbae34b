#![deny(clippy::all)]

/**
 * mend engine
 *
 * Layered modernization pipeline for front-end component sources: validated
 * tree transforms with regex fallback, hash-verified backups, categorized
 * error recovery and learned rewrite rules.
 */
pub mod api;
pub mod backup;
pub mod config;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod layers;
pub mod learning;
pub mod logging;
pub mod pipeline;
pub mod recovery;
pub mod transform;

pub use api::{
    Change, ChangeKind, LayerResult, LayerSelection, LayerStrategy, Location, TransformRequest,
    TransformResponse,
};
pub use config::EngineConfig;
pub use engine::{CloseReport, Engine};
pub use error::{EngineError, Result};
pub use layers::{LayerId, LayerSet};

/// Engine version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
