//! Error types for the trellis engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Topology mismatch: {0}")]
    Topology(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Query plan {0} not registered")]
    PlanNotFound(u32),
}
