//! Error types for gkan-train.

use thiserror::Error;

/// Error type for training and hyperparameter search.
#[derive(Error, Debug)]
pub enum Error {
    /// Graph data error.
    #[error("Graph error: {0}")]
    Core(#[from] gkan_core::Error),

    /// Model construction or forward pass error.
    #[error("Model error: {0}")]
    Nn(#[from] gkan_nn::Error),

    /// Candle tensor error.
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Experiment or search configuration rejected.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Training requires train/val/test node sets.
    #[error("Graph {0} has no train/val/test split")]
    MissingSplit(String),

    /// Training loss became NaN or infinite.
    #[error("Training diverged at epoch {epoch} (loss = {loss})")]
    Diverged { epoch: usize, loss: f32 },

    /// Sampled parameters do not fit the search space.
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParam { name: String, reason: String },

    /// Every trial of a study failed.
    #[error("No completed trials")]
    NoCompletedTrials,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for gkan-train operations.
pub type Result<T> = std::result::Result<T, Error>;
