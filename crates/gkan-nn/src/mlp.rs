//! Multilayer perceptron update network.

use candle_core::{Result, Tensor};
use candle_nn::{batch_norm, linear, BatchNorm, Linear, Module, ModuleT, VarBuilder};

struct Block {
    linear: Linear,
    relu: bool,
    norm: Option<BatchNorm>,
}

/// MLP used as the GIN update function.
///
/// With `hidden_layers >= 2`:
///
/// ```text
/// [Linear -> ReLU (-> BatchNorm)] x (hidden_layers - 1) -> Linear
/// ```
///
/// With `hidden_layers <= 1` the network is a single `Linear -> ReLU`.
pub struct Mlp {
    blocks: Vec<Block>,
}

impl Mlp {
    /// Create a new MLP.
    ///
    /// # Arguments
    /// - `in_features`: Input dimension
    /// - `hidden`: Width of the hidden layers
    /// - `out_features`: Output dimension
    /// - `hidden_layers`: Number of linear layers (see type docs)
    /// - `use_batch_norm`: Insert BatchNorm after each hidden ReLU
    /// - `vb`: Variable builder
    pub fn new(
        in_features: usize,
        hidden: usize,
        out_features: usize,
        hidden_layers: usize,
        use_batch_norm: bool,
        vb: VarBuilder,
    ) -> Result<Self> {
        if hidden_layers <= 1 {
            let linear = linear(in_features, out_features, vb.pp("layers.0"))?;
            return Ok(Self {
                blocks: vec![Block {
                    linear,
                    relu: true,
                    norm: None,
                }],
            });
        }

        let mut blocks = Vec::with_capacity(hidden_layers);
        let mut fan_in = in_features;
        for i in 0..hidden_layers - 1 {
            let vb_i = vb.pp(format!("layers.{i}"));
            let linear = linear(fan_in, hidden, vb_i.pp("linear"))?;
            let norm = if use_batch_norm {
                Some(batch_norm(hidden, 1e-5, vb_i.pp("norm"))?)
            } else {
                None
            };
            blocks.push(Block {
                linear,
                relu: true,
                norm,
            });
            fan_in = hidden;
        }
        let last = linear(
            fan_in,
            out_features,
            vb.pp(format!("layers.{}", hidden_layers - 1)),
        )?;
        blocks.push(Block {
            linear: last,
            relu: false,
            norm: None,
        });
        Ok(Self { blocks })
    }

    /// Number of linear layers.
    pub fn depth(&self) -> usize {
        self.blocks.len()
    }
}

impl ModuleT for Mlp {
    fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let mut h = x.clone();
        for block in &self.blocks {
            h = block.linear.forward(&h)?;
            if block.relu {
                h = h.relu()?;
            }
            if let Some(norm) = &block.norm {
                h = norm.forward_t(&h, train)?;
            }
        }
        Ok(h)
    }
}
