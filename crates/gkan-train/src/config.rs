//! Experiment configuration.

use crate::error::{Error, Result};
use gkan_nn::{Architecture, ConvType, ModelConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything needed to train one model on one dataset.
///
/// Serializes to JSON; missing fields take their defaults, so a config file
/// only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Dataset name, used for log file names (default: "Cora").
    pub dataset: String,
    /// Update function family (default: mlp).
    pub architecture: Architecture,
    /// Message-passing scheme (default: gin).
    pub conv_type: ConvType,
    /// Message-passing layers including the output layer (default: 2).
    pub mp_layers: usize,
    /// Node embedding width (default: 16).
    pub hidden_channels: usize,
    /// Update network depth (default: 2).
    pub hidden_layers: usize,
    /// Spline grid intervals (default: 4).
    pub grid_size: usize,
    /// B-spline order (default: 3).
    pub spline_order: usize,
    /// Skip connections by concatenation (default: true).
    pub skip: bool,
    /// Dropout before each convolution (default: 0.0).
    pub dropout: f64,
    /// Learning rate (default: 0.01).
    pub lr: f64,
    /// Decoupled weight decay; 0 trains with plain Adam (default: 0.0).
    pub weight_decay: f64,
    /// Maximum number of epochs (default: 10000).
    pub epochs: usize,
    /// Epochs without validation loss improvement before stopping, at least 1 (default: 100).
    pub patience: usize,
    /// Log every `rate_print` epochs (default: 1000).
    pub rate_print: usize,
    /// Seed for parameter initialization and dropout masks (default: 12345).
    pub seed: u64,
    /// Weight of the KAN spline regularization term (default: 0.0).
    pub kan_regularization: f64,
    /// Row-normalize node features before training (default: true).
    pub normalize_features: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            dataset: "Cora".to_string(),
            architecture: Architecture::Mlp,
            conv_type: ConvType::Gin,
            mp_layers: 2,
            hidden_channels: 16,
            hidden_layers: 2,
            grid_size: 4,
            spline_order: 3,
            skip: true,
            dropout: 0.0,
            lr: 0.01,
            weight_decay: 0.0,
            epochs: 10_000,
            patience: 100,
            rate_print: 1000,
            seed: 12_345,
            kan_regularization: 0.0,
            normalize_features: true,
        }
    }
}

impl ExperimentConfig {
    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = dataset.into();
        self
    }

    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    pub fn with_conv_type(mut self, conv_type: ConvType) -> Self {
        self.conv_type = conv_type;
        self
    }

    pub fn with_hidden_channels(mut self, hidden_channels: usize) -> Self {
        self.hidden_channels = hidden_channels;
        self
    }

    pub fn with_hidden_layers(mut self, hidden_layers: usize) -> Self {
        self.hidden_layers = hidden_layers;
        self
    }

    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    pub fn with_rate_print(mut self, rate_print: usize) -> Self {
        self.rate_print = rate_print;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Read a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Check the training hyperparameters. Model shape is checked when the
    /// model is built, once the dataset's widths are known.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be at least 1".into()));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "lr must be positive, got {}",
                self.lr
            )));
        }
        if !(self.weight_decay.is_finite() && self.weight_decay >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "weight_decay must be non-negative, got {}",
                self.weight_decay
            )));
        }
        if !(self.kan_regularization.is_finite() && self.kan_regularization >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "kan_regularization must be non-negative, got {}",
                self.kan_regularization
            )));
        }
        Ok(())
    }

    /// Model shape for a dataset with the given widths.
    pub fn to_model_config(&self, num_features: usize, num_classes: usize) -> ModelConfig {
        ModelConfig::new(self.architecture, self.conv_type, num_features, num_classes)
            .with_mp_layers(self.mp_layers)
            .with_hidden_channels(self.hidden_channels)
            .with_hidden_layers(self.hidden_layers)
            .with_grid_size(self.grid_size)
            .with_spline_order(self.spline_order)
            .with_skip(self.skip)
            .with_dropout(self.dropout)
    }
}
