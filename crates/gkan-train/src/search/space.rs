//! Search space definitions.

use crate::error::{Error, Result};
use gkan_nn::{Architecture, ConvType};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One tunable hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamSpec {
    /// Real value in `[low, high]`, sampled log-uniformly when `log` is set.
    Float {
        name: String,
        low: f64,
        high: f64,
        #[serde(default)]
        log: bool,
    },
    /// Integer in `[low, high]`, both inclusive.
    Int { name: String, low: i64, high: i64 },
}

impl ParamSpec {
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        ParamSpec::Float {
            name: name.into(),
            low,
            high,
            log: false,
        }
    }

    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Self {
        ParamSpec::Float {
            name: name.into(),
            low,
            high,
            log: true,
        }
    }

    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        ParamSpec::Int {
            name: name.into(),
            low,
            high,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ParamSpec::Float { name, .. } | ParamSpec::Int { name, .. } => name,
        }
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| {
            Err(Error::InvalidParam {
                name: self.name().to_string(),
                reason,
            })
        };
        match *self {
            ParamSpec::Float { low, high, log, .. } => {
                if !(low.is_finite() && high.is_finite() && low <= high) {
                    return invalid(format!("empty range [{low}, {high}]"));
                }
                if log && low <= 0.0 {
                    return invalid(format!("log range must be positive, got low = {low}"));
                }
            }
            ParamSpec::Int { low, high, .. } => {
                if low > high {
                    return invalid(format!("empty range [{low}, {high}]"));
                }
            }
        }
        Ok(())
    }

    /// Draw a value uniformly (log-uniformly for log floats).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamValue {
        let (lo, hi) = self.internal_bounds();
        match self {
            ParamSpec::Float { .. } => self.from_internal(lo + (hi - lo) * rng.gen::<f64>()),
            ParamSpec::Int { low, high, .. } => ParamValue::Int(rng.gen_range(*low..=*high)),
        }
    }

    pub fn contains(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (ParamSpec::Float { low, high, .. }, ParamValue::Float(v)) => *low <= *v && *v <= *high,
            (ParamSpec::Int { low, high, .. }, ParamValue::Int(v)) => *low <= *v && *v <= *high,
            _ => false,
        }
    }

    /// Bounds of the space density estimators work in: log-scale for log
    /// floats, widened by half a step on each side for integers.
    pub fn internal_bounds(&self) -> (f64, f64) {
        match *self {
            ParamSpec::Float {
                low, high, log, ..
            } => {
                if log {
                    (low.ln(), high.ln())
                } else {
                    (low, high)
                }
            }
            ParamSpec::Int { low, high, .. } => (low as f64 - 0.5, high as f64 + 0.5),
        }
    }

    /// Map a value into the estimator space. `None` on a type mismatch.
    pub fn to_internal(&self, value: &ParamValue) -> Option<f64> {
        match (self, value) {
            (ParamSpec::Float { log: true, .. }, ParamValue::Float(v)) => Some(v.ln()),
            (ParamSpec::Float { .. }, ParamValue::Float(v)) => Some(*v),
            (ParamSpec::Int { .. }, ParamValue::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }

    /// Inverse of [`ParamSpec::to_internal`], clamped to the range.
    pub fn from_internal(&self, x: f64) -> ParamValue {
        match *self {
            ParamSpec::Float {
                low, high, log, ..
            } => {
                let v = if log { x.exp() } else { x };
                ParamValue::Float(v.clamp(low, high))
            }
            ParamSpec::Int { low, high, .. } => {
                ParamValue::Int((x.round() as i64).clamp(low, high))
            }
        }
    }
}

/// A sampled hyperparameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
}

impl ParamValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            ParamValue::Int(v) => v as f64,
            ParamValue::Float(v) => v,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            ParamValue::Int(v) => Some(v),
            ParamValue::Float(_) => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v:.6}"),
        }
    }
}

/// Parameter name -> value, ordered by name.
pub type Params = BTreeMap<String, ParamValue>;

/// The set of hyperparameters a study explores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    params: Vec<ParamSpec>,
}

impl SearchSpace {
    pub fn new(params: Vec<ParamSpec>) -> Result<Self> {
        let space = Self { params };
        space.validate()?;
        Ok(space)
    }

    /// Add a parameter, replacing any previous one with the same name.
    pub fn with(mut self, spec: ParamSpec) -> Self {
        self.params.retain(|p| p.name() != spec.name());
        self.params.push(spec);
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name() == name)
    }

    pub fn validate(&self) -> Result<()> {
        self.params.iter().try_for_each(ParamSpec::validate)
    }

    /// Independent draw of every parameter.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Params {
        self.params
            .iter()
            .map(|p| (p.name().to_string(), p.sample(rng)))
            .collect()
    }

    /// Whether `params` has exactly this space's names, each in range.
    pub fn contains(&self, params: &Params) -> bool {
        params.len() == self.params.len()
            && self
                .params
                .iter()
                .all(|p| params.get(p.name()).is_some_and(|v| p.contains(v)))
    }

    /// The space searched for one architecture / convolution pair.
    ///
    /// | Parameter | Range | When |
    /// |-----------|-------|------|
    /// | `lr` | 1e-5 .. 1e-2, log | always |
    /// | `dropout` | 0 .. 0.9 | always |
    /// | `hidden_layers` | 1 .. 4 | GIN |
    /// | `hidden_channels` | 1 .. 256 / 32 / 16 | MLP / FastKAN / KAN |
    /// | `grid_size` | 1 .. 8 / 1 .. 4 | FastKAN / KAN |
    /// | `spline_order` | 1 .. 3 | KAN |
    pub fn for_experiment(architecture: Architecture, conv_type: ConvType) -> Self {
        let mut space = Self::default()
            .with(ParamSpec::log_float("lr", 1e-5, 1e-2))
            .with(ParamSpec::float("dropout", 0.0, 0.9));
        if conv_type == ConvType::Gin {
            space = space.with(ParamSpec::int("hidden_layers", 1, 4));
        }
        match architecture {
            Architecture::Mlp => space.with(ParamSpec::int("hidden_channels", 1, 256)),
            Architecture::FastKan => space
                .with(ParamSpec::int("hidden_channels", 1, 32))
                .with(ParamSpec::int("grid_size", 1, 8)),
            Architecture::Kan => space
                .with(ParamSpec::int("hidden_channels", 1, 16))
                .with(ParamSpec::int("grid_size", 1, 4))
                .with(ParamSpec::int("spline_order", 1, 3)),
        }
    }
}
