// Allow minor clippy style warnings at crate level
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::doc_markdown)]

//! Training and hyperparameter search for gkan node classifiers.
//!
//! - [`Trainer`] / [`run_experiment`] - full-batch AdamW with early stopping
//!   on validation loss
//! - [`search`] - random / TPE search over learning rate, dropout and the
//!   architecture's shape parameters, then repeated retraining of the best
//!
//! # Example
//!
//! ```rust,no_run
//! use gkan_core::synthetic::{csbm, CsbmConfig};
//! use gkan_core::SplitConfig;
//! use gkan_nn::{Architecture, ConvType};
//! use gkan_train::{run_experiment, ExperimentConfig};
//!
//! let graph = csbm(&CsbmConfig::default())
//!     .unwrap()
//!     .planetoid_split(&SplitConfig::default().with_num_val(60).with_num_test(120))
//!     .unwrap();
//!
//! let config = ExperimentConfig::default()
//!     .with_architecture(Architecture::Kan)
//!     .with_conv_type(ConvType::Gin)
//!     .with_epochs(200);
//! let outcome = run_experiment(&config, &graph).unwrap();
//! println!("test accuracy {:.3}", outcome.test_acc);
//! ```

mod config;
mod error;
pub mod metrics;
pub mod search;
mod trainer;

pub use config::ExperimentConfig;
pub use error::{Error, Result};
pub use search::{run_search, run_search_with, SearchConfig, SearchReport};
pub use trainer::{run_experiment, EpochMetrics, ExperimentOutcome, Trainer};
