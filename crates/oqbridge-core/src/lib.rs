//! Shared foundation for the oqbridge workspace: the canonical error type,
//! the uniform search wire shapes, and the configuration schema used by both
//! the query proxy and the migration worker.

pub mod config;
pub mod error;
pub mod response;
pub mod telemetry;

pub use config::{Config, ConfigError};
pub use error::{BridgeError, BridgeResult};
pub use response::{hit_score, HitsEnvelope, ScrollPage, SearchResponse, TotalHits};
