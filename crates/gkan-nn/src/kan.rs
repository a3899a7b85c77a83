//! B-spline Kolmogorov-Arnold layers.
//!
//! A KAN layer (Liu et al., 2024) puts a learnable univariate function on
//! every input-output edge instead of a fixed activation on every node:
//!
//! ```text
//! y_o = Σ_i φ_{o,i}(x_i)
//! φ_{o,i}(x) = w^base_{o,i} · silu(x) + s_{o,i} · Σ_c c_{o,i,c} B_c(x)
//! ```
//!
//! `B_c` are order-`k` B-spline bases over a uniform knot grid. This is the
//! "efficient" formulation: the spline term becomes one matrix product over
//! the flattened basis `(N, in · (G + k))`, so no per-edge loop is needed.
//!
//! # Knot grid
//!
//! With `G` intervals over `[lo, hi]` and step `h = (hi - lo) / G`, the grid
//! is extended by `k` knots on each side:
//!
//! ```text
//! t_j = lo + (j - k) · h,   j = 0 .. G + 2k
//! ```
//!
//! giving `G + k` bases that form a partition of unity on `[lo, hi)`.
//!
//! # Reference
//!
//! Liu et al., "KAN: Kolmogorov-Arnold Networks", 2024.

use candle_core::{Result, Tensor, D};
use candle_nn::{Init, Module, VarBuilder};
use serde::{Deserialize, Serialize};

/// Hyperparameters of a B-spline KAN layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KanConfig {
    /// Number of grid intervals `G` (default: 5).
    pub grid_size: usize,
    /// Spline order `k` (default: 3, cubic).
    pub spline_order: usize,
    /// Amplitude of the initial spline coefficients (default: 0.1).
    pub scale_noise: f64,
    /// Scale of the base weight initialization (default: 1.0).
    pub scale_base: f64,
    /// Scale of the spline scaler initialization (default: 1.0).
    pub scale_spline: f64,
    /// Grid span before extension (default: [-1, 1]).
    pub grid_range: (f64, f64),
}

impl Default for KanConfig {
    fn default() -> Self {
        Self {
            grid_size: 5,
            spline_order: 3,
            scale_noise: 0.1,
            scale_base: 1.0,
            scale_spline: 1.0,
            grid_range: (-1.0, 1.0),
        }
    }
}

impl KanConfig {
    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size;
        self
    }

    pub fn with_spline_order(mut self, spline_order: usize) -> Self {
        self.spline_order = spline_order;
        self
    }

    pub fn with_grid_range(mut self, lo: f64, hi: f64) -> Self {
        self.grid_range = (lo, hi);
        self
    }

    /// Number of bases per input: `G + k`.
    pub fn num_bases(&self) -> usize {
        self.grid_size + self.spline_order
    }

    /// Extended knot vector of length `G + 2k + 1`.
    pub fn knots(&self) -> Vec<f32> {
        let (lo, hi) = self.grid_range;
        let h = (hi - lo) / self.grid_size as f64;
        let k = self.spline_order as i64;
        (-k..=(self.grid_size as i64 + k))
            .map(|j| (lo + j as f64 * h) as f32)
            .collect()
    }
}

/// Kaiming-uniform bound for `fan_in` with negative slope `a`.
fn kaiming_bound(fan_in: usize, a: f64) -> f64 {
    let gain = (2.0 / (1.0 + a * a)).sqrt();
    gain * (3.0 / fan_in as f64).sqrt()
}

/// One B-spline KAN layer mapping `in_features -> out_features`.
pub struct KanLinear {
    /// `(out, in)`
    base_weight: Tensor,
    /// `(out, in, G + k)`
    spline_weight: Tensor,
    /// `(out, in)`
    spline_scaler: Tensor,
    /// `(in, G + 2k + 1)`, fixed.
    grid: Tensor,
    in_features: usize,
    out_features: usize,
    config: KanConfig,
}

impl KanLinear {
    /// Create a new KAN layer.
    ///
    /// # Arguments
    /// - `in_features`: Input dimension
    /// - `out_features`: Output dimension
    /// - `config`: Grid and initialization settings
    /// - `vb`: Variable builder for parameter initialization
    pub fn new(
        in_features: usize,
        out_features: usize,
        config: KanConfig,
        vb: VarBuilder,
    ) -> Result<Self> {
        if config.grid_size == 0 || config.spline_order == 0 {
            candle_core::bail!(
                "KAN layer needs grid_size >= 1 and spline_order >= 1, got {} and {}",
                config.grid_size,
                config.spline_order
            );
        }
        let sqrt5 = 5f64.sqrt();
        let bound = kaiming_bound(in_features, sqrt5 * config.scale_base);
        let base_weight = vb.get_with_hints(
            (out_features, in_features),
            "base_weight",
            Init::Uniform {
                lo: -bound,
                up: bound,
            },
        )?;

        let noise = config.scale_noise / (2.0 * config.grid_size as f64);
        let spline_weight = vb.get_with_hints(
            (out_features, in_features, config.num_bases()),
            "spline_weight",
            Init::Uniform {
                lo: -noise,
                up: noise,
            },
        )?;

        let bound = kaiming_bound(in_features, sqrt5 * config.scale_spline);
        let spline_scaler = vb.get_with_hints(
            (out_features, in_features),
            "spline_scaler",
            Init::Uniform {
                lo: -bound,
                up: bound,
            },
        )?;

        let knots = config.knots();
        let m = knots.len();
        let grid = Tensor::from_vec(knots, (1, m), vb.device())?
            .to_dtype(vb.dtype())?
            .broadcast_as((in_features, m))?
            .contiguous()?;

        Ok(Self {
            base_weight,
            spline_weight,
            spline_scaler,
            grid,
            in_features,
            out_features,
            config,
        })
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }

    pub fn config(&self) -> &KanConfig {
        &self.config
    }

    /// Evaluate the B-spline bases with the Cox-de Boor recursion.
    ///
    /// # Arguments
    /// - `x`: `(N, in_features)`
    ///
    /// # Returns
    /// - `(N, in_features, G + k)`
    pub fn b_splines(&self, x: &Tensor) -> Result<Tensor> {
        let (_, d) = x.dims2()?;
        if d != self.in_features {
            candle_core::bail!("KAN layer expects {} inputs, got {d}", self.in_features);
        }
        let dtype = x.dtype();
        let x = x.unsqueeze(2)?;
        let grid = self.grid.unsqueeze(0)?;
        let m = grid.dim(2)?;

        // Order 0: indicator of [t_j, t_{j+1})
        let lo = grid.narrow(2, 0, m - 1)?;
        let hi = grid.narrow(2, 1, m - 1)?;
        let mut bases =
            (x.broadcast_ge(&lo)?.to_dtype(dtype)? * x.broadcast_lt(&hi)?.to_dtype(dtype)?)?;

        for k in 1..=self.config.spline_order {
            let len = m - k - 1;
            let t_j = grid.narrow(2, 0, len)?;
            let t_jk = grid.narrow(2, k, len)?;
            let t_j1 = grid.narrow(2, 1, len)?;
            let t_jk1 = grid.narrow(2, k + 1, len)?;

            let left = x.broadcast_sub(&t_j)?.broadcast_div(&(&t_jk - &t_j)?)?;
            let right = t_jk1.broadcast_sub(&x)?.broadcast_div(&(&t_jk1 - &t_j1)?)?;

            let nb = bases.dim(2)?;
            bases = ((left * bases.narrow(2, 0, nb - 1)?)?
                + (right * bases.narrow(2, 1, nb - 1)?)?)?;
        }
        Ok(bases)
    }

    /// Spline coefficients multiplied by their per-edge scaler.
    pub fn scaled_spline_weight(&self) -> Result<Tensor> {
        self.spline_weight
            .broadcast_mul(&self.spline_scaler.unsqueeze(2)?)
    }

    /// KAN regularization (Liu et al., 2024, eq. 2.17-2.19).
    ///
    /// `l1` is the mean absolute spline coefficient of each edge. Returns
    /// `act · Σ l1 + entropy · H(l1 / Σ l1)`.
    pub fn regularization_loss(&self, act: f64, entropy: f64) -> Result<Tensor> {
        let l1 = self.spline_weight.abs()?.mean(D::Minus1)?;
        let total = l1.sum_all()?;
        let p = l1.broadcast_div(&total)?;
        let h = (p.clone() * (p + 1e-12)?.log()?)?.sum_all()?.neg()?;
        (total * act)? + (h * entropy)?
    }
}

impl Module for KanLinear {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (n, _) = x.dims2()?;
        let base = candle_nn::ops::silu(x)?.matmul(&self.base_weight.t()?)?;

        let flat = self.in_features * self.config.num_bases();
        let bases = self.b_splines(x)?.reshape((n, flat))?;
        let weight = self
            .scaled_spline_weight()?
            .reshape((self.out_features, flat))?;
        let spline = bases.matmul(&weight.t()?)?;

        base + spline
    }
}

/// A stack of [`KanLinear`] layers over a width list `[in, h1, ..., out]`.
///
/// No activation is inserted between layers: each KAN layer already
/// carries its own nonlinearity.
pub struct Kan {
    layers: Vec<KanLinear>,
}

impl Kan {
    pub fn new(widths: &[usize], config: KanConfig, vb: VarBuilder) -> Result<Self> {
        if widths.len() < 2 {
            candle_core::bail!("KAN needs at least two widths, got {widths:?}");
        }
        let layers = widths
            .windows(2)
            .enumerate()
            .map(|(i, w)| KanLinear::new(w[0], w[1], config, vb.pp(format!("layers.{i}"))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[KanLinear] {
        &self.layers
    }

    /// Sum of the per-layer regularization terms.
    pub fn regularization_loss(&self, act: f64, entropy: f64) -> Result<Tensor> {
        let mut total: Option<Tensor> = None;
        for layer in &self.layers {
            let r = layer.regularization_loss(act, entropy)?;
            total = Some(match total {
                Some(t) => (t + r)?,
                None => r,
            });
        }
        // widths.len() >= 2 guarantees one layer
        total.ok_or_else(|| candle_core::Error::Msg("empty KAN".to_string()))
    }
}

impl Module for Kan {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let mut h = x.clone();
        for layer in &self.layers {
            h = layer.forward(&h)?;
        }
        Ok(h)
    }
}

/// Width list used by the graph models: `[in] + [hidden] * (hidden_layers - 2) + [out]`.
///
/// One or two hidden layers both give a single KAN layer `[in, out]`.
pub fn kan_widths(
    in_features: usize,
    hidden: usize,
    out_features: usize,
    hidden_layers: usize,
) -> Vec<usize> {
    let mut widths = vec![in_features];
    widths.extend(std::iter::repeat(hidden).take(hidden_layers.saturating_sub(2)));
    widths.push(out_features);
    widths
}
