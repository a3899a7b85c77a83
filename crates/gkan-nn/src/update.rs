//! Node update functions shared by the message-passing layers.

use crate::fastkan::FastKan;
use crate::kan::Kan;
use crate::mlp::Mlp;
use candle_core::{Result, Tensor};
use candle_nn::{Module, ModuleT};

/// The learnable function applied to aggregated node features.
pub enum UpdateNet {
    /// Linear layers with ReLU.
    Mlp(Mlp),
    /// B-spline KAN layers.
    Kan(Kan),
    /// Radial-basis KAN layers.
    FastKan(FastKan),
}

impl UpdateNet {
    /// KAN regularization term, zero for other update functions.
    pub fn regularization_loss(&self, act: f64, entropy: f64) -> Result<Option<Tensor>> {
        match self {
            UpdateNet::Kan(kan) => kan.regularization_loss(act, entropy).map(Some),
            UpdateNet::Mlp(_) | UpdateNet::FastKan(_) => Ok(None),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            UpdateNet::Mlp(_) => "mlp",
            UpdateNet::Kan(_) => "kan",
            UpdateNet::FastKan(_) => "fastkan",
        }
    }
}

impl ModuleT for UpdateNet {
    fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        match self {
            UpdateNet::Mlp(mlp) => mlp.forward_t(x, train),
            UpdateNet::Kan(kan) => kan.forward(x),
            UpdateNet::FastKan(fastkan) => fastkan.forward(x),
        }
    }
}

impl From<Mlp> for UpdateNet {
    fn from(m: Mlp) -> Self {
        UpdateNet::Mlp(m)
    }
}

impl From<Kan> for UpdateNet {
    fn from(k: Kan) -> Self {
        UpdateNet::Kan(k)
    }
}

impl From<FastKan> for UpdateNet {
    fn from(k: FastKan) -> Self {
        UpdateNet::FastKan(k)
    }
}

/// Add an optional term to a running total.
pub(crate) fn accumulate(total: Option<Tensor>, term: Option<Tensor>) -> Result<Option<Tensor>> {
    Ok(match (total, term) {
        (Some(a), Some(b)) => Some((a + b)?),
        (a, None) => a,
        (None, b) => b,
    })
}
