//! Node classification models.
//!
//! A [`NodeClassifier`] stacks `mp_layers` message-passing convolutions. The
//! convolution type ([`ConvType`]) decides how neighbors are aggregated and
//! the [`Architecture`] decides the update function applied afterwards.
//!
//! ```text
//! h_0 = x
//! h_l = relu(conv_l(dropout(h_{l-1})))           l = 1 .. mp_layers - 1
//! z   = concat(h_0, ..., h_{mp_layers-1})         (or h_{mp_layers-1} without skip)
//! out = relu(conv_out(dropout(z)))
//! ```

use crate::conv::{Conv, GcKanConv, GcnConv, GinConv};
use crate::error::{Error, Result};
use crate::fastkan::{FastKan, FastKanConfig};
use crate::kan::{kan_widths, Kan, KanConfig};
use crate::mlp::Mlp;
use crate::propagate::Propagation;
use crate::update::accumulate;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

/// Message-passing scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvType {
    /// Symmetric-normalized aggregation with self loops.
    Gcn,
    /// Sum aggregation plus `(1 + eps)` self term.
    Gin,
}

impl ConvType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConvType::Gcn => "gcn",
            ConvType::Gin => "gin",
        }
    }

    /// Build the propagation operator this scheme aggregates with.
    pub fn propagation(
        &self,
        edges: &[(u32, u32)],
        num_nodes: usize,
        device: &Device,
    ) -> candle_core::Result<Propagation> {
        match self {
            ConvType::Gcn => Propagation::gcn(edges, num_nodes, true, device),
            ConvType::Gin => Propagation::sum(edges, num_nodes, device),
        }
    }
}

impl fmt::Display for ConvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConvType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gcn" => Ok(ConvType::Gcn),
            "gin" => Ok(ConvType::Gin),
            _ => Err(Error::UnknownVariant {
                kind: "conv type",
                value: s.to_string(),
            }),
        }
    }
}

/// Update function family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Mlp,
    Kan,
    FastKan,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Mlp => "mlp",
            Architecture::Kan => "kan",
            Architecture::FastKan => "fastkan",
        }
    }

    pub fn is_kan(&self) -> bool {
        !matches!(self, Architecture::Mlp)
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mlp" => Ok(Architecture::Mlp),
            "kan" => Ok(Architecture::Kan),
            "fastkan" => Ok(Architecture::FastKan),
            _ => Err(Error::UnknownVariant {
                kind: "architecture",
                value: s.to_string(),
            }),
        }
    }
}

/// Shape and hyperparameters of a [`NodeClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub architecture: Architecture,
    pub conv_type: ConvType,
    /// Number of message-passing layers, output layer included (default: 2).
    pub mp_layers: usize,
    pub num_features: usize,
    /// Width of node embeddings between convolutions (default: 16).
    pub hidden_channels: usize,
    pub num_classes: usize,
    /// Concatenate every layer's embedding before the output layer (default: true).
    pub skip: bool,
    /// Depth of the update networks (default: 2).
    pub hidden_layers: usize,
    /// Spline grid intervals; FastKAN uses `grid_size + 1` centres (default: 4).
    pub grid_size: usize,
    /// B-spline order (default: 3).
    pub spline_order: usize,
    /// Dropout probability before each convolution (default: 0).
    pub dropout: f64,
}

impl ModelConfig {
    pub fn new(
        architecture: Architecture,
        conv_type: ConvType,
        num_features: usize,
        num_classes: usize,
    ) -> Self {
        Self {
            architecture,
            conv_type,
            mp_layers: 2,
            num_features,
            hidden_channels: 16,
            num_classes,
            skip: true,
            hidden_layers: 2,
            grid_size: 4,
            spline_order: 3,
            dropout: 0.0,
        }
    }

    pub fn with_mp_layers(mut self, mp_layers: usize) -> Self {
        self.mp_layers = mp_layers;
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

    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size;
        self
    }

    pub fn with_spline_order(mut self, spline_order: usize) -> Self {
        self.spline_order = spline_order;
        self
    }

    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(Error::InvalidConfig(msg));
        if self.mp_layers == 0 {
            return bad("mp_layers must be at least 1".into());
        }
        if self.num_features == 0 || self.num_classes == 0 || self.hidden_channels == 0 {
            return bad(format!(
                "widths must be positive (features {}, hidden {}, classes {})",
                self.num_features, self.hidden_channels, self.num_classes
            ));
        }
        if self.architecture.is_kan() && self.grid_size == 0 {
            return bad("grid_size must be at least 1".into());
        }
        if self.architecture == Architecture::Kan && self.spline_order == 0 {
            return bad("spline_order must be at least 1".into());
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return bad(format!("dropout must be in [0, 1), got {}", self.dropout));
        }
        Ok(())
    }

    /// Input width of the output convolution.
    pub fn output_in_features(&self) -> usize {
        let hidden_convs = self.mp_layers.saturating_sub(1);
        match (hidden_convs, self.skip) {
            (0, _) => self.num_features,
            (n, true) => self.num_features + n * self.hidden_channels,
            (_, false) => self.hidden_channels,
        }
    }

    fn kan_config(&self) -> KanConfig {
        KanConfig::default()
            .with_grid_size(self.grid_size)
            .with_spline_order(self.spline_order)
    }

    fn fastkan_config(&self) -> FastKanConfig {
        FastKanConfig::default().with_num_grids(self.grid_size + 1)
    }

    fn build_conv(&self, in_features: usize, out_features: usize, vb: VarBuilder) -> Result<Conv> {
        let hidden = self.hidden_channels;
        let conv = match (self.architecture, self.conv_type) {
            (Architecture::Mlp, ConvType::Gcn) => {
                Conv::Gcn(GcnConv::new(in_features, out_features, true, vb)?)
            }
            (Architecture::Mlp, ConvType::Gin) => {
                let mlp = Mlp::new(
                    in_features,
                    hidden,
                    out_features,
                    self.hidden_layers,
                    false,
                    vb.pp("update"),
                )?;
                Conv::Gin(GinConv::new(mlp.into(), false, vb)?)
            }
            (Architecture::Kan, ConvType::Gcn) => {
                let kan = Kan::new(&[in_features, out_features], self.kan_config(), vb.pp("update"))?;
                Conv::GcKan(GcKanConv::new(kan.into()))
            }
            (Architecture::Kan, ConvType::Gin) => {
                let widths = kan_widths(in_features, hidden, out_features, self.hidden_layers);
                let kan = Kan::new(&widths, self.kan_config(), vb.pp("update"))?;
                Conv::Gin(GinConv::new(kan.into(), false, vb)?)
            }
            (Architecture::FastKan, ConvType::Gcn) => {
                let net = FastKan::new(
                    &[in_features, out_features],
                    self.fastkan_config(),
                    vb.pp("update"),
                )?;
                Conv::GcKan(GcKanConv::new(net.into()))
            }
            (Architecture::FastKan, ConvType::Gin) => {
                let widths = kan_widths(in_features, hidden, out_features, self.hidden_layers);
                let net = FastKan::new(&widths, self.fastkan_config(), vb.pp("update"))?;
                Conv::Gin(GinConv::new(net.into(), false, vb)?)
            }
        };
        Ok(conv)
    }
}

/// Graph neural network for node classification.
pub struct NodeClassifier {
    convs: Vec<Conv>,
    conv_out: Conv,
    config: ModelConfig,
    device: Device,
    /// Draws dropout masks.
    rng: Mutex<XorShiftRng>,
}

impl NodeClassifier {
    /// Build all layers under `vb` (`convs.{i}` and `conv_out`).
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        config.validate()?;
        let hidden_convs = config.mp_layers - 1;
        let mut convs = Vec::with_capacity(hidden_convs);
        let mut in_features = config.num_features;
        for i in 0..hidden_convs {
            convs.push(config.build_conv(
                in_features,
                config.hidden_channels,
                vb.pp(format!("convs.{i}")),
            )?);
            in_features = config.hidden_channels;
        }
        let conv_out = config.build_conv(
            config.output_in_features(),
            config.num_classes,
            vb.pp("conv_out"),
        )?;
        tracing::debug!(
            architecture = %config.architecture,
            conv = %config.conv_type,
            mp_layers = config.mp_layers,
            "built node classifier"
        );
        Ok(Self {
            convs,
            conv_out,
            config: config.clone(),
            device: vb.device().clone(),
            rng: Mutex::new(XorShiftRng::seed_from_u64(0)),
        })
    }

    /// Reseed the generator behind dropout masks.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(XorShiftRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Propagation operator matching this model's convolutions.
    pub fn propagation(
        &self,
        edges: &[(u32, u32)],
        num_nodes: usize,
        device: &Device,
    ) -> Result<Propagation> {
        Ok(self.config.conv_type.propagation(edges, num_nodes, device)?)
    }

    /// Class scores for every node, `(N, num_classes)`.
    pub fn forward_t(&self, x: &Tensor, prop: &Propagation, train: bool) -> Result<Tensor> {
        let (_, d) = x.dims2()?;
        if d != self.config.num_features {
            return Err(Error::DimensionMismatch {
                expected: self.config.num_features,
                got: d,
            });
        }

        let mut xs = vec![x.clone()];
        for conv in &self.convs {
            let h = self.dropout(xs.last().unwrap_or(x), train)?;
            let h = conv.forward_t(&h, prop, train)?.relu()?;
            xs.push(h);
        }

        let z = if self.config.skip {
            Tensor::cat(&xs, 1)?
        } else {
            xs.pop().unwrap_or_else(|| x.clone())
        };
        let z = self.dropout(&z, train)?;
        Ok(self.conv_out.forward_t(&z, prop, train)?.relu()?)
    }

    /// Summed regularization of every B-spline update network; zero when
    /// the model has none.
    pub fn regularization_loss(&self, act: f64, entropy: f64) -> Result<Tensor> {
        let mut total = None;
        for conv in self.convs.iter().chain(std::iter::once(&self.conv_out)) {
            total = accumulate(total, conv.regularization_loss(act, entropy)?)?;
        }
        match total {
            Some(t) => Ok(t),
            None => Ok(Tensor::zeros((), DType::F32, &self.device)?),
        }
    }

    /// Inverted dropout with a host-side mask, so runs repeat under a seed.
    fn dropout(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let p = self.config.dropout;
        if !train || p <= 0.0 {
            return Ok(x.clone());
        }
        let scale = (1.0 / (1.0 - p)) as f32;
        let mask: Vec<f32> = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            (0..x.elem_count())
                .map(|_| if rng.gen::<f64>() < p { 0.0 } else { scale })
                .collect()
        };
        let mask = Tensor::from_vec(mask, x.shape(), x.device())?.to_dtype(x.dtype())?;
        Ok(x.mul(&mask)?)
    }
}
