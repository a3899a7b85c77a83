//! Error types for gkan-core.

use thiserror::Error;

/// Error type for graph construction and dataset loading.
#[derive(Error, Debug)]
pub enum Error {
    /// A buffer does not have the length its declared shape implies.
    #[error("Shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// An edge or split index points past the last node.
    #[error("Node index {index} out of range for graph with {num_nodes} nodes")]
    NodeOutOfRange { index: usize, num_nodes: usize },

    /// Graph with no nodes.
    #[error("Graph has no nodes")]
    Empty,

    /// Split sets overlap.
    #[error("Node {0} appears in more than one split")]
    OverlappingSplit(usize),

    /// Dataset file is missing an array or has an unsupported layout.
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    /// Unknown dataset file extension.
    #[error("Unsupported dataset format: {0}")]
    UnsupportedFormat(String),

    /// Candle tensor error (NPZ loading, tensor export).
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for gkan-core operations.
pub type Result<T> = std::result::Result<T, Error>;
