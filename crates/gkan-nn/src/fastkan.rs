//! Radial-basis KAN layers (FastKAN).
//!
//! FastKAN (Li, 2024) observes that third-order B-splines are well
//! approximated by Gaussian radial basis functions, which need no recursion:
//!
//! ```text
//! φ_c(x) = exp(-((x - c) / h)²),   c ∈ linspace(grid_min, grid_max, G)
//! y = W_spline · vec(φ(LayerNorm(x))) + W_base · silu(x) + b
//! ```
//!
//! LayerNorm keeps the inputs inside the span of the centres, playing the
//! role grid updates play for B-spline KANs.
//!
//! # Reference
//!
//! Z. Li, "Kolmogorov-Arnold Networks are Radial Basis Function Networks",
//! 2024.

use candle_core::{Result, Tensor};
use candle_nn::{layer_norm, linear, Init, LayerNorm, Linear, Module, VarBuilder};
use serde::{Deserialize, Serialize};

/// Hyperparameters of a FastKAN layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FastKanConfig {
    /// Lowest RBF centre (default: -2.0).
    pub grid_min: f64,
    /// Highest RBF centre (default: 2.0).
    pub grid_max: f64,
    /// Number of centres (default: 8, at least 2).
    pub num_grids: usize,
    /// Add the `Linear(silu(x))` residual path (default: true).
    pub use_base_update: bool,
    /// Normalize inputs before the basis (default: true). Ignored for
    /// single-feature inputs, where LayerNorm would zero everything.
    pub use_layernorm: bool,
    /// Std of the spline weight initialization (default: 0.1).
    pub spline_weight_init_scale: f64,
}

impl Default for FastKanConfig {
    fn default() -> Self {
        Self {
            grid_min: -2.0,
            grid_max: 2.0,
            num_grids: 8,
            use_base_update: true,
            use_layernorm: true,
            spline_weight_init_scale: 0.1,
        }
    }
}

impl FastKanConfig {
    pub fn with_num_grids(mut self, num_grids: usize) -> Self {
        self.num_grids = num_grids;
        self
    }

    pub fn with_grid_range(mut self, grid_min: f64, grid_max: f64) -> Self {
        self.grid_min = grid_min;
        self.grid_max = grid_max;
        self
    }

    pub fn with_base_update(mut self, on: bool) -> Self {
        self.use_base_update = on;
        self
    }

    pub fn with_layernorm(mut self, on: bool) -> Self {
        self.use_layernorm = on;
        self
    }

    /// RBF width: the spacing between centres.
    pub fn denominator(&self) -> f64 {
        (self.grid_max - self.grid_min) / (self.num_grids - 1) as f64
    }

    /// Evenly spaced RBF centres.
    pub fn centres(&self) -> Vec<f32> {
        let h = self.denominator();
        (0..self.num_grids)
            .map(|i| (self.grid_min + i as f64 * h) as f32)
            .collect()
    }
}

/// One FastKAN layer mapping `in_features -> out_features`.
pub struct FastKanLayer {
    layernorm: Option<LayerNorm>,
    /// `(num_grids,)`, fixed.
    centres: Tensor,
    /// `(out, in * num_grids)`, no bias.
    spline_weight: Tensor,
    base_linear: Option<Linear>,
    in_features: usize,
    config: FastKanConfig,
}

impl FastKanLayer {
    pub fn new(
        in_features: usize,
        out_features: usize,
        config: FastKanConfig,
        vb: VarBuilder,
    ) -> Result<Self> {
        if config.num_grids < 2 {
            candle_core::bail!("FastKAN needs at least 2 grids, got {}", config.num_grids);
        }
        if config.grid_max <= config.grid_min {
            candle_core::bail!(
                "FastKAN grid range is empty: [{}, {}]",
                config.grid_min,
                config.grid_max
            );
        }

        let layernorm = if config.use_layernorm && in_features > 1 {
            Some(layer_norm(in_features, 1e-5, vb.pp("layernorm"))?)
        } else {
            None
        };

        let centres = Tensor::from_vec(config.centres(), config.num_grids, vb.device())?
            .to_dtype(vb.dtype())?;

        let spline_weight = vb.get_with_hints(
            (out_features, in_features * config.num_grids),
            "spline_linear.weight",
            Init::Randn {
                mean: 0.0,
                stdev: config.spline_weight_init_scale,
            },
        )?;

        let base_linear = if config.use_base_update {
            Some(linear(in_features, out_features, vb.pp("base_linear"))?)
        } else {
            None
        };

        Ok(Self {
            layernorm,
            centres,
            spline_weight,
            base_linear,
            in_features,
            config,
        })
    }

    pub fn config(&self) -> &FastKanConfig {
        &self.config
    }

    /// Gaussian basis of `x` (N x in) -> `(N, in, num_grids)`, after the
    /// optional LayerNorm.
    pub fn basis(&self, x: &Tensor) -> Result<Tensor> {
        let (_, d) = x.dims2()?;
        if d != self.in_features {
            candle_core::bail!("FastKAN layer expects {} inputs, got {d}", self.in_features);
        }
        let h = match &self.layernorm {
            Some(ln) => ln.forward(x)?,
            None => x.clone(),
        };
        let diff = h.unsqueeze(2)?.broadcast_sub(&self.centres)?;
        (diff / self.config.denominator())?.sqr()?.neg()?.exp()
    }
}

impl Module for FastKanLayer {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (n, d) = x.dims2()?;
        let basis = self.basis(x)?.reshape((n, d * self.config.num_grids))?;
        let out = basis.matmul(&self.spline_weight.t()?)?;
        match &self.base_linear {
            Some(base) => out + base.forward(&candle_nn::ops::silu(x)?)?,
            None => Ok(out),
        }
    }
}

/// A stack of [`FastKanLayer`]s over a width list `[in, h1, ..., out]`.
pub struct FastKan {
    layers: Vec<FastKanLayer>,
}

impl FastKan {
    pub fn new(widths: &[usize], config: FastKanConfig, vb: VarBuilder) -> Result<Self> {
        if widths.len() < 2 {
            candle_core::bail!("FastKAN needs at least two widths, got {widths:?}");
        }
        let layers = widths
            .windows(2)
            .enumerate()
            .map(|(i, w)| FastKanLayer::new(w[0], w[1], config, vb.pp(format!("layers.{i}"))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[FastKanLayer] {
        &self.layers
    }
}

impl Module for FastKan {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let mut h = x.clone();
        for layer in &self.layers {
            h = layer.forward(&h)?;
        }
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_centres() {
        let c = FastKanConfig::default().with_num_grids(5);
        assert_eq!(c.centres(), vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert!((c.denominator() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_forward_shape() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let layer = FastKanLayer::new(8, 3, FastKanConfig::default(), vb).unwrap();
        let x = Tensor::randn(0f32, 1f32, (12, 8), &Device::Cpu).unwrap();
        assert_eq!(layer.forward(&x).unwrap().dims(), &[12, 3]);
    }

    #[test]
    fn test_basis_peaks_at_centre() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = FastKanConfig::default().with_num_grids(5).with_layernorm(false);
        let layer = FastKanLayer::new(1, 1, config, vb).unwrap();
        let x = Tensor::new(&[[1f32]], &Device::Cpu).unwrap();
        let basis = layer.basis(&x).unwrap().flatten_all().unwrap();
        let values = basis.to_vec1::<f32>().unwrap();
        assert!((values[3] - 1.0).abs() < 1e-6);
        assert!((values[2] - (-1f32).exp()).abs() < 1e-6);
    }

    #[test]
    fn test_single_feature_skips_layernorm() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let layer = FastKanLayer::new(1, 2, FastKanConfig::default(), vb).unwrap();
        assert!(layer.layernorm.is_none());
    }

    #[test]
    fn test_one_grid_rejected() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = FastKanConfig::default().with_num_grids(1);
        assert!(FastKanLayer::new(2, 2, config, vb).is_err());
    }

    #[test]
    fn test_stack_without_base_update() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = FastKanConfig::default().with_base_update(false);
        let net = FastKan::new(&[4, 6, 2], config, vb).unwrap();
        let x = Tensor::randn(0f32, 1f32, (3, 4), &Device::Cpu).unwrap();
        assert_eq!(net.forward(&x).unwrap().dims(), &[3, 2]);
        // two spline weights + two layernorms (weight, bias)
        assert_eq!(varmap.all_vars().len(), 6);
    }
}
