//! Reproducible parameter initialization.
//!
//! Candle's CPU backend draws `Init::Randn` / `Init::Uniform` values from
//! an unseeded generator, so two runs of the same experiment start from
//! different weights. [`seeded_var_builder`] puts a [`VarMap`] behind a
//! backend that samples every new variable on the host from a seeded
//! [`XorShiftRng`], in the order layers request them.
//!
//! ```rust
//! use candle_core::{DType, Device};
//! use candle_nn::VarMap;
//! use gkan_nn::init::seeded_var_builder;
//!
//! let a = VarMap::new();
//! let b = VarMap::new();
//! let wa = seeded_var_builder(&a, 7, DType::F32, &Device::Cpu)
//!     .get_with_hints((2, 3), "w", candle_nn::Init::Randn { mean: 0.0, stdev: 1.0 })
//!     .unwrap();
//! let wb = seeded_var_builder(&b, 7, DType::F32, &Device::Cpu)
//!     .get_with_hints((2, 3), "w", candle_nn::Init::Randn { mean: 0.0, stdev: 1.0 })
//!     .unwrap();
//! assert_eq!(wa.to_vec2::<f32>().unwrap(), wb.to_vec2::<f32>().unwrap());
//! ```

use candle_core::{DType, Device, Result, Shape, Tensor, Var};
use candle_nn::init::NormalOrUniform;
use candle_nn::var_builder::SimpleBackend;
use candle_nn::{Init, VarBuilder, VarMap};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_xorshift::XorShiftRng;
use std::sync::Mutex;

/// A [`VarBuilder`] that stores variables in `varmap` and initializes new
/// ones from a generator seeded with `seed`.
pub fn seeded_var_builder(
    varmap: &VarMap,
    seed: u64,
    dtype: DType,
    device: &Device,
) -> VarBuilder<'static> {
    let backend = SeededVarMap {
        varmap: varmap.clone(),
        rng: Mutex::new(XorShiftRng::seed_from_u64(seed)),
    };
    VarBuilder::from_backend(Box::new(backend), dtype, device.clone())
}

struct SeededVarMap {
    varmap: VarMap,
    rng: Mutex<XorShiftRng>,
}

impl SeededVarMap {
    fn sample(&self, shape: &Shape, init: Init) -> Result<Vec<f32>> {
        let n = shape.elem_count();
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let values = match init {
            Init::Const(c) => vec![c as f32; n],
            Init::Uniform { lo, up } => uniform(&mut *rng, lo, up, n),
            Init::Randn { mean, stdev } => normal(&mut *rng, mean, stdev, n)?,
            Init::Kaiming {
                dist,
                fan,
                non_linearity,
            } => {
                let std = non_linearity.gain() / (fan.for_shape(shape) as f64).sqrt();
                match dist {
                    NormalOrUniform::Uniform => {
                        let bound = 3f64.sqrt() * std;
                        uniform(&mut *rng, -bound, bound, n)
                    }
                    NormalOrUniform::Normal => normal(&mut *rng, 0.0, std, n)?,
                }
            }
        };
        Ok(values)
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, lo: f64, up: f64, n: usize) -> Vec<f32> {
    (0..n)
        .map(|_| (lo + (up - lo) * rng.gen::<f64>()) as f32)
        .collect()
}

fn normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, stdev: f64, n: usize) -> Result<Vec<f32>> {
    let dist = Normal::new(mean, stdev)
        .map_err(|e| candle_core::Error::Msg(format!("normal init ({mean}, {stdev}): {e}")))?;
    Ok((0..n).map(|_| dist.sample(rng) as f32).collect())
}

impl SimpleBackend for SeededVarMap {
    fn get(&self, s: Shape, name: &str, h: Init, dtype: DType, dev: &Device) -> Result<Tensor> {
        let mut vars = self.varmap.data().lock().unwrap_or_else(|e| e.into_inner());
        if let Some(var) = vars.get(name) {
            if var.shape() != &s {
                candle_core::bail!("shape mismatch on {name}: {s:?} <> {:?}", var.shape());
            }
            return Ok(var.as_tensor().clone());
        }
        let values = self.sample(&s, h)?;
        let tensor = Tensor::from_vec(values, s, dev)?.to_dtype(dtype)?;
        let var = Var::from_tensor(&tensor)?;
        let out = var.as_tensor().clone();
        vars.insert(name.to_string(), var);
        Ok(out)
    }

    fn contains_tensor(&self, name: &str) -> bool {
        self.varmap
            .data()
            .lock()
            .map(|vars| vars.contains_key(name))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Architecture, ConvType, ModelConfig, NodeClassifier};

    fn weights(varmap: &VarMap) -> Vec<(String, Vec<f32>)> {
        let vars = varmap.data().lock().unwrap();
        let mut out: Vec<(String, Vec<f32>)> = vars
            .iter()
            .map(|(k, v)| (k.clone(), v.flatten_all().unwrap().to_vec1::<f32>().unwrap()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn build(seed: u64, architecture: Architecture) -> VarMap {
        let varmap = VarMap::new();
        let vb = seeded_var_builder(&varmap, seed, DType::F32, &Device::Cpu);
        let config = ModelConfig::new(architecture, ConvType::Gin, 5, 3).with_hidden_channels(4);
        NodeClassifier::new(&config, vb).unwrap();
        varmap
    }

    #[test]
    fn test_same_seed_same_weights() {
        for arch in [Architecture::Mlp, Architecture::Kan, Architecture::FastKan] {
            let a = weights(&build(3, arch));
            let b = weights(&build(3, arch));
            assert!(!a.is_empty());
            assert_eq!(a, b, "{arch}");
        }
    }

    #[test]
    fn test_different_seed_different_weights() {
        let a = weights(&build(3, Architecture::Mlp));
        let b = weights(&build(4, Architecture::Mlp));
        assert_ne!(a, b);
    }

    #[test]
    fn test_init_distributions() {
        let varmap = VarMap::new();
        let vb = seeded_var_builder(&varmap, 0, DType::F32, &Device::Cpu);
        let c = vb.get_with_hints(4, "c", Init::Const(0.5)).unwrap();
        assert_eq!(c.to_vec1::<f32>().unwrap(), vec![0.5; 4]);

        let u = vb
            .get_with_hints(1000, "u", Init::Uniform { lo: -0.2, up: 0.3 })
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert!(u.iter().all(|v| (-0.2..=0.3).contains(v)));

        let n = vb
            .get_with_hints(4000, "n", Init::Randn { mean: 1.0, stdev: 0.5 })
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        let mean = n.iter().sum::<f32>() / n.len() as f32;
        assert!((mean - 1.0).abs() < 0.05, "{mean}");
    }

    #[test]
    fn test_existing_variable_is_reused() {
        let varmap = VarMap::new();
        let vb = seeded_var_builder(&varmap, 0, DType::F32, &Device::Cpu);
        let init = Init::Randn { mean: 0.0, stdev: 1.0 };
        let first = vb.get_with_hints((2, 2), "w", init).unwrap();
        let again = vb.get_with_hints((2, 2), "w", init).unwrap();
        assert_eq!(first.to_vec2::<f32>().unwrap(), again.to_vec2::<f32>().unwrap());
        assert!(vb.get_with_hints((3, 2), "w", init).is_err());
    }
}
