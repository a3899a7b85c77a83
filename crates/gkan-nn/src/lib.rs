// Allow minor clippy style warnings at crate level
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::doc_markdown)]

//! Kolmogorov-Arnold message passing on candle.
//!
//! # Layers
//!
//! | Layer | Update function | Aggregation |
//! |-------|-----------------|-------------|
//! | [`GcnConv`] | linear | `D^-1/2 (A+I) D^-1/2` |
//! | [`GcKanConv`] | KAN / FastKAN | `D^-1/2 (A+I) D^-1/2` |
//! | [`GinConv`] | MLP / KAN / FastKAN | `(1+eps) x_i + Σ x_j` |
//!
//! Update networks:
//!
//! - [`Mlp`] - Linear + ReLU stack
//! - [`Kan`] / [`KanLinear`] - B-spline KAN (efficient formulation)
//! - [`FastKan`] / [`FastKanLayer`] - Gaussian RBF KAN with LayerNorm
//!
//! [`NodeClassifier`] wires them into a full model from a [`ModelConfig`].
//!
//! # Example
//!
//! ```rust
//! use candle_core::{DType, Device, Tensor};
//! use candle_nn::{VarBuilder, VarMap};
//! use gkan_nn::{Architecture, ConvType, ModelConfig, NodeClassifier};
//!
//! let device = Device::Cpu;
//! let varmap = VarMap::new();
//! let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
//!
//! let config = ModelConfig::new(Architecture::Kan, ConvType::Gin, 8, 3);
//! let model = NodeClassifier::new(&config, vb).unwrap();
//!
//! let edges = [(0, 1), (1, 0), (1, 2), (2, 1)];
//! let prop = model.propagation(&edges, 3, &device).unwrap();
//! let x = Tensor::randn(0f32, 1f32, (3, 8), &device).unwrap();
//! let logits = model.forward_t(&x, &prop, false).unwrap();
//! assert_eq!(logits.dims(), &[3, 3]);
//! ```
//!
//! # References
//!
//! - Liu et al. (2024): "KAN: Kolmogorov-Arnold Networks"
//! - Li (2024): "Kolmogorov-Arnold Networks are Radial Basis Function Networks"
//! - Bresson et al. (2024): "KAGNNs: Kolmogorov-Arnold Networks meet Graph Learning"

pub mod conv;
mod error;
pub mod fastkan;
pub mod init;
pub mod kan;
mod mlp;
pub mod model;
pub mod propagate;
mod update;

pub use conv::{Conv, GcKanConv, GcnConv, GinConv};
pub use error::{Error, Result};
pub use fastkan::{FastKan, FastKanConfig, FastKanLayer};
pub use init::seeded_var_builder;
pub use kan::{kan_widths, Kan, KanConfig, KanLinear};
pub use mlp::Mlp;
pub use model::{Architecture, ConvType, ModelConfig, NodeClassifier};
pub use propagate::{gcn_norm, Propagation};
pub use update::UpdateNet;
