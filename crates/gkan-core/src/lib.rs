// Allow minor clippy style warnings at crate level
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::doc_markdown)]

//! Graph data for transductive node classification.
//!
//! - [`NodeGraph`] - node features, labels and a directed edge list
//! - [`Split`] - train / validation / test node sets
//! - [`formats`] - JSON and NPZ dataset readers
//! - [`synthetic`] - contextual stochastic block model generator
//!
//! Citation benchmarks (Cora, CiteSeer, PubMed) are usually exported from
//! Python loaders as `.npz`; [`formats::load`] reads them directly.
//!
//! # Example
//!
//! ```rust
//! use gkan_core::synthetic::{csbm, CsbmConfig};
//! use gkan_core::SplitConfig;
//!
//! let graph = csbm(&CsbmConfig::default().with_nodes(120))
//!     .unwrap()
//!     .planetoid_split(&SplitConfig::default().with_num_val(30).with_num_test(30))
//!     .unwrap();
//!
//! let split = graph.split().unwrap();
//! assert_eq!(split.train.len(), 60); // 20 per class
//! ```

mod error;
pub mod formats;
mod graph;
mod split;
pub mod synthetic;

pub use error::{Error, Result};
pub use graph::{GraphStats, GraphTensors, NodeGraph};
pub use split::{Split, SplitConfig};
