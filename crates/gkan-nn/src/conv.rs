//! Message-passing convolutional layers.
//!
//! Implements the two aggregation schemes compared in the benchmarks, each
//! parameterized by its update function:
//! - [`GcnConv`]: Graph Convolutional Network (Kipf & Welling, 2017)
//! - [`GinConv`]: Graph Isomorphism Network (Xu et al., 2019) with an MLP,
//!   KAN or FastKAN update
//! - [`GcKanConv`]: graph convolution with a KAN update instead of a linear map
//!   (Bresson et al., 2024)
//!
//! # Message Passing Framework
//!
//! ```text
//! h_i^{(l+1)} = UPDATE(h_i^{(l)}, AGGREGATE({MESSAGE(h_j^{(l)}) : j in N(i)}))
//! ```
//!
//! Aggregation is delegated to a prebuilt [`Propagation`] so the same layer
//! works on any graph with the right operator.

use crate::propagate::Propagation;
use crate::update::UpdateNet;
use candle_core::{Result, Tensor};
use candle_nn::{Init, ModuleT, VarBuilder};

/// Graph Convolutional Network layer.
///
/// Implements: H' = D^{-1/2} (A + I) D^{-1/2} H W + b
///
/// Where:
/// - A is the adjacency matrix
/// - D is the degree matrix of A + I
/// - H is the node feature matrix
/// - W is the learnable weight matrix
///
/// The bias is added after aggregation, so it is not smoothed over
/// neighbors. Expects a [`Propagation::gcn`] operator.
///
/// # Reference
///
/// Kipf & Welling, "Semi-Supervised Classification with Graph Convolutional
/// Networks", ICLR 2017.
pub struct GcnConv {
    /// `(out, in)`
    weight: Tensor,
    bias: Option<Tensor>,
}

impl GcnConv {
    /// Create a new GCN layer.
    ///
    /// # Arguments
    /// - `in_features`: Input feature dimension
    /// - `out_features`: Output feature dimension
    /// - `bias`: Whether to include bias term
    /// - `vb`: Variable builder for parameter initialization
    pub fn new(in_features: usize, out_features: usize, bias: bool, vb: VarBuilder) -> Result<Self> {
        // Glorot uniform
        let bound = (6.0 / (in_features + out_features) as f64).sqrt();
        let weight = vb.get_with_hints(
            (out_features, in_features),
            "weight",
            Init::Uniform {
                lo: -bound,
                up: bound,
            },
        )?;
        let bias = if bias {
            Some(vb.get_with_hints(out_features, "bias", Init::Const(0.0))?)
        } else {
            None
        };
        Ok(Self { weight, bias })
    }

    /// Forward pass.
    ///
    /// # Arguments
    /// - `x`: Node features (N x in_features)
    /// - `prop`: Normalized propagation operator
    ///
    /// # Returns
    /// - Node embeddings (N x out_features)
    pub fn forward(&self, x: &Tensor, prop: &Propagation) -> Result<Tensor> {
        // Transform first, then aggregate the narrower features
        let h = x.matmul(&self.weight.t()?)?;
        let h = prop.propagate(&h)?;
        match &self.bias {
            Some(b) => h.broadcast_add(b),
            None => Ok(h),
        }
    }
}

/// Graph Isomorphism Network layer.
///
/// GIN update rule:
///
/// ```text
/// h_v^{(k)} = UPDATE^{(k)}((1 + ε^{(k)}) · h_v^{(k-1)} + Σ_{u∈N(v)} h_u^{(k-1)})
/// ```
///
/// Sum aggregation is injective on multisets, which is what gives GIN its
/// Weisfeiler-Lehman expressiveness. `UPDATE` is an MLP in the original
/// paper; replacing it with a KAN gives GIKAN. Expects a
/// [`Propagation::sum`] operator.
///
/// # Reference
///
/// Xu et al., "How Powerful are Graph Neural Networks?", ICLR 2019.
pub struct GinConv {
    update: UpdateNet,
    eps: Tensor,
    learn_eps: bool,
}

impl GinConv {
    /// Create a new GIN layer around an update network.
    ///
    /// `ε` starts at 0 and is only trained when `learn_eps` is set.
    pub fn new(update: UpdateNet, learn_eps: bool, vb: VarBuilder) -> Result<Self> {
        let eps = if learn_eps {
            vb.get_with_hints(1, "eps", Init::Const(0.0))?
        } else {
            Tensor::zeros(1, vb.dtype(), vb.device())?
        };
        Ok(Self {
            update,
            eps,
            learn_eps,
        })
    }

    pub fn update(&self) -> &UpdateNet {
        &self.update
    }

    pub fn learn_eps(&self) -> bool {
        self.learn_eps
    }

    /// Forward pass.
    ///
    /// # Arguments
    /// - `x`: Node features (N x in_features)
    /// - `prop`: Sum propagation operator
    /// - `train`: Training mode (batch norm statistics)
    pub fn forward_t(&self, x: &Tensor, prop: &Propagation, train: bool) -> Result<Tensor> {
        let neighbor_sum = prop.propagate(x)?;
        let self_contrib = x.broadcast_mul(&(&self.eps + 1.0)?)?;
        let combined = (self_contrib + neighbor_sum)?;
        self.update.forward_t(&combined, train)
    }
}

/// Graph-convolutional KAN layer.
///
/// ```text
/// H' = KAN(D^{-1/2} (A + I) D^{-1/2} H)
/// ```
///
/// Aggregation comes first, then a (single-layer) KAN replaces the GCN's
/// linear map. Expects a [`Propagation::gcn`] operator.
///
/// # Reference
///
/// Bresson et al., "KAGNNs: Kolmogorov-Arnold Networks meet Graph
/// Learning", 2024.
pub struct GcKanConv {
    update: UpdateNet,
}

impl GcKanConv {
    pub fn new(update: UpdateNet) -> Self {
        Self { update }
    }

    pub fn update(&self) -> &UpdateNet {
        &self.update
    }

    pub fn forward_t(&self, x: &Tensor, prop: &Propagation, train: bool) -> Result<Tensor> {
        let aggregated = prop.propagate(x)?;
        self.update.forward_t(&aggregated, train)
    }
}

/// Any of the convolutions above.
pub enum Conv {
    Gcn(GcnConv),
    Gin(GinConv),
    GcKan(GcKanConv),
}

impl Conv {
    pub fn forward_t(&self, x: &Tensor, prop: &Propagation, train: bool) -> Result<Tensor> {
        match self {
            Conv::Gcn(conv) => conv.forward(x, prop),
            Conv::Gin(conv) => conv.forward_t(x, prop, train),
            Conv::GcKan(conv) => conv.forward_t(x, prop, train),
        }
    }

    /// KAN regularization of the layer's update network, if any.
    pub fn regularization_loss(&self, act: f64, entropy: f64) -> Result<Option<Tensor>> {
        match self {
            Conv::Gcn(_) => Ok(None),
            Conv::Gin(conv) => conv.update().regularization_loss(act, entropy),
            Conv::GcKan(conv) => conv.update().regularization_loss(act, entropy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fastkan::{FastKan, FastKanConfig};
    use crate::kan::{Kan, KanConfig};
    use crate::mlp::Mlp;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn star() -> Vec<(u32, u32)> {
        // node 0 connected to nodes 1, 2
        vec![(0, 1), (1, 0), (0, 2), (2, 0)]
    }

    #[test]
    fn test_gcn_forward_shape() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let gcn = GcnConv::new(64, 32, true, vb).unwrap();
        let prop = Propagation::gcn(&star(), 3, true, &device).unwrap();
        let x = Tensor::randn(0f32, 1f32, (3, 64), &device).unwrap();

        let out = gcn.forward(&x, &prop).unwrap();
        assert_eq!(out.dims(), &[3, 32]);
    }

    #[test]
    fn test_gcn_matches_dense_formula() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let gcn = GcnConv::new(4, 2, false, vb).unwrap();
        let prop = Propagation::gcn(&star(), 3, true, &device).unwrap();
        let x = Tensor::randn(0f32, 1f32, (3, 4), &device).unwrap();

        let out = gcn.forward(&x, &prop).unwrap();
        let expected = prop
            .dense_adjacency()
            .unwrap()
            .matmul(&x)
            .unwrap()
            .matmul(&gcn.weight.t().unwrap())
            .unwrap();
        let diff = (out - expected)
            .unwrap()
            .abs()
            .unwrap()
            .max_all()
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!(diff < 1e-5);
    }

    #[test]
    fn test_gin_sum_aggregation() {
        // Test that GIN uses sum aggregation (not mean)
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        // Single linear layer with ReLU; weights set so the output is the input
        let mlp = Mlp::new(1, 1, 1, 1, false, vb.pp("mlp")).unwrap();
        let gin = GinConv::new(mlp.into(), false, vb).unwrap();
        for var in varmap.all_vars() {
            let ones = Tensor::ones(var.shape(), DType::F32, &device).unwrap();
            let value = if var.dims().len() == 2 {
                ones
            } else {
                ones.zeros_like().unwrap()
            };
            var.set(&value).unwrap();
        }

        let x = Tensor::new(&[[1f32], [2.], [4.]], &device).unwrap();
        let prop = Propagation::sum(&star(), 3, &device).unwrap();
        let out = gin.forward_t(&x, &prop, false).unwrap();
        // node 0: 1 + 2 + 4, node 1: 2 + 1, node 2: 4 + 1
        assert_eq!(
            out.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
            vec![7.0, 3.0, 5.0]
        );
    }

    #[test]
    fn test_gin_learnable_eps_registers_var() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let mlp = Mlp::new(4, 8, 2, 2, false, vb.pp("mlp")).unwrap();
        let before = varmap.all_vars().len();
        let gin = GinConv::new(mlp.into(), true, vb).unwrap();
        assert!(gin.learn_eps());
        assert_eq!(varmap.all_vars().len(), before + 1);
    }

    #[test]
    fn test_gin_kan_forward_shape() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let kan = Kan::new(&[8, 4, 3], KanConfig::default(), vb.pp("kan")).unwrap();
        let gin = GinConv::new(kan.into(), false, vb).unwrap();
        let x = Tensor::randn(0f32, 0.3f32, (3, 8), &device).unwrap();
        let prop = Propagation::sum(&star(), 3, &device).unwrap();

        let out = gin.forward_t(&x, &prop, true).unwrap();
        assert_eq!(out.dims(), &[3, 3]);
        assert!(gin
            .update()
            .regularization_loss(1.0, 1.0)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_gckan_forward_shape() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let fastkan = FastKan::new(&[8, 5], FastKanConfig::default(), vb).unwrap();
        let conv = Conv::GcKan(GcKanConv::new(fastkan.into()));
        let x = Tensor::randn(0f32, 1f32, (3, 8), &device).unwrap();
        let prop = Propagation::gcn(&star(), 3, true, &device).unwrap();

        let out = conv.forward_t(&x, &prop, false).unwrap();
        assert_eq!(out.dims(), &[3, 5]);
        assert!(conv.regularization_loss(1.0, 1.0).unwrap().is_none());
    }
}
