//! Full-batch training with early stopping.
//!
//! Every epoch is one optimizer step on the cross-entropy of the training
//! nodes, followed by an evaluation pass over the whole graph:
//!
//! 1. Forward all nodes in training mode (dropout on)
//! 2. Cross-entropy on the training nodes (+ KAN regularization)
//! 3. AdamW step
//! 4. Forward all nodes in eval mode, score validation and test nodes
//! 5. Stop once validation loss has not improved for `patience` epochs
//!
//! The reported accuracies are those of the epoch with the lowest
//! validation loss, not of the last epoch.

use crate::config::ExperimentConfig;
use crate::error::{Error, Result};
use crate::metrics::accuracy;
use candle_core::{DType, Device, Tensor};
use candle_nn::{loss, AdamW, Optimizer, ParamsAdamW, VarMap};
use gkan_core::NodeGraph;
use gkan_nn::{seeded_var_builder, NodeClassifier};
use serde::{Deserialize, Serialize};

/// Metrics of one finished epoch, passed to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    /// 1-based epoch number.
    pub epoch: usize,
    pub train_loss: f32,
    pub val_loss: f32,
    pub val_acc: f64,
    pub test_acc: f64,
}

/// Result of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentOutcome {
    /// Lowest validation loss seen.
    pub best_val_loss: f64,
    /// Validation accuracy at the best epoch.
    pub val_acc: f64,
    /// Training accuracy at the best epoch.
    pub train_acc: f64,
    /// Test accuracy at the best epoch.
    pub test_acc: f64,
    /// Epoch (1-based) with the lowest validation loss.
    pub best_epoch: usize,
    /// Epochs actually run.
    pub epochs_run: usize,
    /// Whether training ended through early stopping.
    pub stopped_early: bool,
    /// Training loss per epoch.
    pub loss_history: Vec<f32>,
}

/// Node classification trainer.
pub struct Trainer {
    config: ExperimentConfig,
    device: Device,
}

impl Trainer {
    pub fn new(config: ExperimentConfig) -> Self {
        Self {
            config,
            device: Device::Cpu,
        }
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Train a fresh model on `graph`, which must carry a split.
    pub fn run(&self, graph: &NodeGraph) -> Result<ExperimentOutcome> {
        self.run_with(graph, |_| {})
    }

    /// Like [`Trainer::run`], calling `on_epoch` after every epoch.
    pub fn run_with<F>(&self, graph: &NodeGraph, mut on_epoch: F) -> Result<ExperimentOutcome>
    where
        F: FnMut(&EpochMetrics),
    {
        let cfg = &self.config;
        cfg.validate()?;
        let split = graph
            .split()
            .ok_or_else(|| Error::MissingSplit(graph.name().to_string()))?;
        if split.train.is_empty() || split.val.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "split of {} needs training and validation nodes (train {}, val {})",
                graph.name(),
                split.train.len(),
                split.val.len()
            )));
        }

        let device = &self.device;
        let tensors = graph.to_tensors(device)?;
        let index = |nodes: &[u32]| Tensor::from_slice(nodes, nodes.len(), device);
        let train_idx = index(&split.train)?;
        let val_idx = index(&split.val)?;
        let test_idx = index(&split.test)?;
        let y_train = tensors.y.index_select(&train_idx, 0)?;
        let y_val = tensors.y.index_select(&val_idx, 0)?;
        let y_test = tensors.y.index_select(&test_idx, 0)?;

        let model_config = cfg.to_model_config(graph.num_features(), graph.num_classes());
        let varmap = VarMap::new();
        let vb = seeded_var_builder(&varmap, cfg.seed, DType::F32, device);
        let model = NodeClassifier::new(&model_config, vb)?.with_seed(cfg.seed);
        let prop = model.propagation(graph.edges(), graph.num_nodes(), device)?;

        let params = ParamsAdamW {
            lr: cfg.lr,
            weight_decay: cfg.weight_decay,
            ..Default::default()
        };
        let mut opt = AdamW::new(varmap.all_vars(), params)?;

        tracing::info!(
            dataset = graph.name(),
            architecture = %cfg.architecture,
            conv = %cfg.conv_type,
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            train = split.train.len(),
            val = split.val.len(),
            test = split.test.len(),
            "training"
        );

        let mut best = ExperimentOutcome {
            best_val_loss: f64::INFINITY,
            val_acc: 0.0,
            train_acc: 0.0,
            test_acc: 0.0,
            best_epoch: 0,
            epochs_run: 0,
            stopped_early: false,
            loss_history: Vec::new(),
        };
        let mut bad_epochs = 0;

        for epoch in 1..=cfg.epochs {
            let logits = model.forward_t(&tensors.x, &prop, true)?;
            let mut train_loss = loss::cross_entropy(&logits.index_select(&train_idx, 0)?, &y_train)?;
            if cfg.kan_regularization > 0.0 {
                let reg = model.regularization_loss(1.0, 1.0)?;
                train_loss = (train_loss + (reg * cfg.kan_regularization)?)?;
            }
            let loss_value = train_loss.to_scalar::<f32>()?;
            if !loss_value.is_finite() {
                return Err(Error::Diverged {
                    epoch,
                    loss: loss_value,
                });
            }
            opt.backward_step(&train_loss)?;
            best.loss_history.push(loss_value);
            best.epochs_run = epoch;

            let logits = model.forward_t(&tensors.x, &prop, false)?;
            let val_logits = logits.index_select(&val_idx, 0)?;
            let val_loss = loss::cross_entropy(&val_logits, &y_val)?.to_scalar::<f32>()?;
            let val_acc = accuracy(&val_logits, &y_val)?;
            let test_acc = accuracy(&logits.index_select(&test_idx, 0)?, &y_test)?;

            if f64::from(val_loss) < best.best_val_loss {
                best.best_val_loss = f64::from(val_loss);
                best.val_acc = val_acc;
                best.test_acc = test_acc;
                best.train_acc = accuracy(&logits.index_select(&train_idx, 0)?, &y_train)?;
                best.best_epoch = epoch;
                bad_epochs = 0;
            } else {
                bad_epochs += 1;
            }

            let metrics = EpochMetrics {
                epoch,
                train_loss: loss_value,
                val_loss,
                val_acc,
                test_acc,
            };
            on_epoch(&metrics);

            if cfg.rate_print > 0 && epoch % cfg.rate_print == 0 {
                tracing::info!(
                    epoch,
                    loss = loss_value,
                    val_loss,
                    val_acc,
                    test_acc,
                    "epoch"
                );
            }

            if bad_epochs >= cfg.patience.max(1) {
                tracing::info!(epoch, best_epoch = best.best_epoch, "early stopping");
                best.stopped_early = true;
                break;
            }
        }

        tracing::info!(
            best_val_loss = best.best_val_loss,
            val_acc = best.val_acc,
            test_acc = best.test_acc,
            best_epoch = best.best_epoch,
            "finished"
        );
        Ok(best)
    }
}

/// Validate `config`, optionally row-normalize features, and train.
pub fn run_experiment(config: &ExperimentConfig, graph: &NodeGraph) -> Result<ExperimentOutcome> {
    config.validate()?;
    let graph = if config.normalize_features {
        graph.clone().row_normalize_features()
    } else {
        graph.clone()
    };
    Trainer::new(config.clone()).run(&graph)
}
