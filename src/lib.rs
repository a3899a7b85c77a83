//! `gkan`: graph neural networks with Kolmogorov-Arnold update functions.
//!
//! Node classification with message passing, where the update applied after
//! aggregation is an MLP, a B-spline KAN or a FastKAN (Gaussian RBF) network.
//!
//! | Crate | Contents |
//! |-------|----------|
//! | [`core`] | Attributed graphs, splits, dataset formats, synthetic CSBM graphs |
//! | [`nn`] | KAN / FastKAN / MLP layers, GCN and GIN convolutions, the node classifier |
//! | [`train`] | Full-batch training with early stopping, hyperparameter search |
//!
//! # Example
//!
//! ```rust,no_run
//! use gkan::core::synthetic::{csbm, CsbmConfig};
//! use gkan::core::SplitConfig;
//! use gkan::nn::{Architecture, ConvType};
//! use gkan::train::{run_experiment, ExperimentConfig};
//!
//! let graph = csbm(&CsbmConfig::default())?
//!     .planetoid_split(&SplitConfig::default().with_num_val(60).with_num_test(120))?;
//! let config = ExperimentConfig::default()
//!     .with_architecture(Architecture::FastKan)
//!     .with_conv_type(ConvType::Gcn)
//!     .with_epochs(200);
//! let outcome = run_experiment(&config, &graph)?;
//! println!("test accuracy {:.3}", outcome.test_acc);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use gkan_core as core;
pub use gkan_nn as nn;
pub use gkan_train as train;

pub use gkan_core::{NodeGraph, Split, SplitConfig};
pub use gkan_nn::{Architecture, ConvType, ModelConfig, NodeClassifier};
pub use gkan_train::{run_experiment, run_search, ExperimentConfig, SearchConfig};
