//! Contextual stochastic block model (CSBM) generator.
//!
//! A CSBM couples a stochastic block model with Gaussian node features
//! (Deshpande et al., 2018). Each class `c` gets a mean `mu_c` pointing in
//! a random direction with norm `sqrt(num_features)`, so a single coordinate
//! has unit scale on average; node features are
//! `signal * mu_c + noise * N(0, I)`. Edges appear with
//! probability `p_intra` inside a class and `p_inter` across classes, so
//! `p_intra > p_inter` gives a homophilous graph where message passing helps.
//!
//! Used for tests, benchmarks and smoke runs without a citation dataset.

use crate::{Error, NodeGraph, Result};
use rand::prelude::*;
use rand_distr::StandardNormal;
use rand_xorshift::XorShiftRng;
use serde::{Deserialize, Serialize};

/// CSBM parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsbmConfig {
    /// Number of nodes (default: 300).
    pub num_nodes: usize,
    /// Number of classes (default: 3).
    pub num_classes: usize,
    /// Feature dimension (default: 16).
    pub num_features: usize,
    /// Edge probability within a class (default: 0.05).
    pub p_intra: f64,
    /// Edge probability across classes (default: 0.005).
    pub p_inter: f64,
    /// Scale of the class mean in the features (default: 1.0).
    pub signal: f32,
    /// Standard deviation of the feature noise (default: 1.0).
    pub noise: f32,
    /// Random seed (default: 42).
    pub seed: u64,
}

impl Default for CsbmConfig {
    fn default() -> Self {
        Self {
            num_nodes: 300,
            num_classes: 3,
            num_features: 16,
            p_intra: 0.05,
            p_inter: 0.005,
            signal: 1.0,
            noise: 1.0,
            seed: 42,
        }
    }
}

impl CsbmConfig {
    pub fn with_nodes(mut self, n: usize) -> Self {
        self.num_nodes = n;
        self
    }

    pub fn with_classes(mut self, c: usize) -> Self {
        self.num_classes = c;
        self
    }

    pub fn with_features(mut self, f: usize) -> Self {
        self.num_features = f;
        self
    }

    pub fn with_edge_probabilities(mut self, p_intra: f64, p_inter: f64) -> Self {
        self.p_intra = p_intra;
        self.p_inter = p_inter;
        self
    }

    pub fn with_signal(mut self, signal: f32) -> Self {
        self.signal = signal;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Generate an undirected CSBM graph. Labels are assigned round-robin so
/// classes are balanced.
pub fn csbm(config: &CsbmConfig) -> Result<NodeGraph> {
    if config.num_nodes == 0 {
        return Err(Error::Empty);
    }
    if config.num_classes == 0 || config.num_features == 0 {
        return Err(Error::InvalidDataset(
            "csbm needs at least one class and one feature".to_string(),
        ));
    }
    for p in [config.p_intra, config.p_inter] {
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::InvalidDataset(format!(
                "edge probability {p} outside [0, 1]"
            )));
        }
    }

    let mut rng = XorShiftRng::seed_from_u64(config.seed);
    let n = config.num_nodes;
    let f = config.num_features;

    let means: Vec<Vec<f32>> = (0..config.num_classes)
        .map(|_| {
            let v: Vec<f32> = (0..f).map(|_| rng.sample(StandardNormal)).collect();
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
            v.into_iter().map(|x| x / norm * (f as f32).sqrt()).collect()
        })
        .collect();

    let labels: Vec<u32> = (0..n).map(|i| (i % config.num_classes) as u32).collect();

    let mut features = Vec::with_capacity(n * f);
    for &label in &labels {
        let mu = &means[label as usize];
        for &m in mu {
            let eps: f32 = rng.sample(StandardNormal);
            features.push(config.signal * m + config.noise * eps);
        }
    }

    let mut edges = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let p = if labels[i] == labels[j] {
                config.p_intra
            } else {
                config.p_inter
            };
            if rng.gen_bool(p) {
                edges.push((i as u32, j as u32));
                edges.push((j as u32, i as u32));
            }
        }
    }

    tracing::debug!(nodes = n, edges = edges.len(), "generated csbm graph");
    NodeGraph::new("csbm", features, f, labels, edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes() {
        let g = csbm(&CsbmConfig::default().with_nodes(60).with_features(4)).unwrap();
        assert_eq!(g.num_nodes(), 60);
        assert_eq!(g.num_features(), 4);
        assert_eq!(g.num_classes(), 3);
        assert!(g.stats().undirected);
    }

    #[test]
    fn test_homophily() {
        let g = csbm(
            &CsbmConfig::default()
                .with_nodes(200)
                .with_edge_probabilities(0.2, 0.01),
        )
        .unwrap();
        let same = g
            .edges()
            .iter()
            .filter(|&&(s, d)| g.labels()[s as usize] == g.labels()[d as usize])
            .count();
        assert!(same as f64 / g.num_edges() as f64 > 0.7);
    }

    #[test]
    fn test_deterministic() {
        let config = CsbmConfig::default().with_nodes(50);
        let a = csbm(&config).unwrap();
        let b = csbm(&config).unwrap();
        assert_eq!(a.features(), b.features());
        assert_eq!(a.edges(), b.edges());
    }

    #[test]
    fn test_class_mean_norm() {
        let config = CsbmConfig {
            noise: 0.0,
            ..CsbmConfig::default()
        }
        .with_nodes(9)
        .with_features(16)
        .with_signal(2.0);
        let g = csbm(&config).unwrap();
        for i in 0..g.num_nodes() {
            let norm = g.feature_row(i).iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 2.0 * 4.0).abs() < 1e-4, "{norm}");
        }
    }

    #[test]
    fn test_rejects_bad_probability() {
        let config = CsbmConfig::default().with_edge_probabilities(1.5, 0.0);
        assert!(csbm(&config).is_err());
    }
}
