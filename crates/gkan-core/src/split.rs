//! Train / validation / test node splits.
//!
//! Citation benchmarks are evaluated transductively: the whole graph is
//! visible during training, but the loss only sees labels of the training
//! nodes. The Planetoid protocol (Yang et al., 2016) samples a fixed number
//! of labelled nodes per class, then a validation and a test pool.

use crate::{Error, NodeGraph, Result};
use rand::prelude::*;
use rand_xorshift::XorShiftRng;
use serde::{Deserialize, Serialize};

/// Node index sets for transductive training.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<u32>,
    pub val: Vec<u32>,
    pub test: Vec<u32>,
}

impl Split {
    pub fn new(train: Vec<u32>, val: Vec<u32>, test: Vec<u32>) -> Self {
        Self { train, val, test }
    }

    /// Build a split from per-node boolean masks.
    pub fn from_masks(train: &[bool], val: &[bool], test: &[bool]) -> Self {
        let pick = |mask: &[bool]| {
            mask.iter()
                .enumerate()
                .filter_map(|(i, &m)| m.then_some(i as u32))
                .collect::<Vec<_>>()
        };
        Self {
            train: pick(train),
            val: pick(val),
            test: pick(test),
        }
    }

    /// Check that every index is `< num_nodes` and the three sets are disjoint.
    pub fn validate(&self, num_nodes: usize) -> Result<()> {
        let mut seen = vec![false; num_nodes];
        for &i in self.train.iter().chain(&self.val).chain(&self.test) {
            let i = i as usize;
            if i >= num_nodes {
                return Err(Error::NodeOutOfRange {
                    index: i,
                    num_nodes,
                });
            }
            if seen[i] {
                return Err(Error::OverlappingSplit(i));
            }
            seen[i] = true;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Planetoid-style split parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Labelled training nodes per class (default: 20).
    pub per_class: usize,
    /// Validation nodes (default: 500).
    pub num_val: usize,
    /// Test nodes (default: 1000).
    pub num_test: usize,
    /// Random seed (default: 12345).
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            per_class: 20,
            num_val: 500,
            num_test: 1000,
            seed: 12345,
        }
    }
}

impl SplitConfig {
    pub fn with_per_class(mut self, per_class: usize) -> Self {
        self.per_class = per_class;
        self
    }

    pub fn with_num_val(mut self, num_val: usize) -> Self {
        self.num_val = num_val;
        self
    }

    pub fn with_num_test(mut self, num_test: usize) -> Self {
        self.num_test = num_test;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl NodeGraph {
    /// Sample a Planetoid split and attach it.
    ///
    /// Each class contributes up to `per_class` training nodes. The
    /// remaining nodes are shuffled; the first `num_val` become validation
    /// and the next `num_test` become test. Counts are truncated to what is
    /// available, so tiny graphs still get a valid (smaller) split.
    pub fn planetoid_split(self, config: &SplitConfig) -> Result<Self> {
        let mut rng = XorShiftRng::seed_from_u64(config.seed);
        let num_classes = self.num_classes();

        let mut by_class: Vec<Vec<u32>> = vec![Vec::new(); num_classes];
        for (i, &label) in self.labels().iter().enumerate() {
            by_class[label as usize].push(i as u32);
        }

        let mut train = Vec::with_capacity(num_classes * config.per_class);
        let mut rest = Vec::with_capacity(self.num_nodes());
        for mut members in by_class {
            members.shuffle(&mut rng);
            let take = config.per_class.min(members.len());
            train.extend_from_slice(&members[..take]);
            rest.extend_from_slice(&members[take..]);
        }

        rest.shuffle(&mut rng);
        let num_val = config.num_val.min(rest.len());
        let num_test = config.num_test.min(rest.len() - num_val);
        let val = rest[..num_val].to_vec();
        let test = rest[num_val..num_val + num_test].to_vec();

        train.sort_unstable();
        tracing::debug!(
            train = train.len(),
            val = val.len(),
            test = test.len(),
            "planetoid split"
        );
        self.with_split(Split::new(train, val, test))
    }

    /// Shuffle all nodes and cut them by fraction. The test set gets the
    /// remainder.
    pub fn random_split(self, train_frac: f64, val_frac: f64, seed: u64) -> Result<Self> {
        if !(0.0..=1.0).contains(&train_frac)
            || !(0.0..=1.0).contains(&val_frac)
            || train_frac + val_frac > 1.0
        {
            return Err(Error::InvalidDataset(format!(
                "split fractions out of range: train={train_frac}, val={val_frac}"
            )));
        }
        let n = self.num_nodes();
        let mut nodes: Vec<u32> = (0..n as u32).collect();
        let mut rng = XorShiftRng::seed_from_u64(seed);
        nodes.shuffle(&mut rng);

        let n_train = (n as f64 * train_frac).round() as usize;
        let n_val = ((n as f64 * val_frac).round() as usize).min(n - n_train);
        let test = nodes.split_off(n_train + n_val);
        let val = nodes.split_off(n_train);
        self.with_split(Split::new(nodes, val, test))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(n: usize, classes: u32) -> NodeGraph {
        let labels = (0..n as u32).map(|i| i % classes).collect();
        NodeGraph::new("g", vec![0.0; n], 1, labels, vec![]).unwrap()
    }

    #[test]
    fn test_validate_overlap() {
        let split = Split::new(vec![0, 1], vec![1], vec![]);
        assert!(matches!(split.validate(3), Err(Error::OverlappingSplit(1))));
    }

    #[test]
    fn test_validate_range() {
        let split = Split::new(vec![0], vec![], vec![7]);
        assert!(matches!(
            split.validate(3),
            Err(Error::NodeOutOfRange { index: 7, .. })
        ));
    }

    #[test]
    fn test_from_masks() {
        let split = Split::from_masks(
            &[true, false, false, false],
            &[false, true, false, false],
            &[false, false, true, true],
        );
        assert_eq!(split, Split::new(vec![0], vec![1], vec![2, 3]));
    }

    #[test]
    fn test_planetoid_counts() {
        let g = labelled(300, 3)
            .planetoid_split(&SplitConfig::default().with_num_val(50).with_num_test(100))
            .unwrap();
        let split = g.split().unwrap();
        assert_eq!(split.train.len(), 60);
        assert_eq!(split.val.len(), 50);
        assert_eq!(split.test.len(), 100);

        let per_class = split
            .train
            .iter()
            .filter(|&&i| g.labels()[i as usize] == 2)
            .count();
        assert_eq!(per_class, 20);
    }

    #[test]
    fn test_planetoid_truncates_small_graphs() {
        let g = labelled(10, 2).planetoid_split(&SplitConfig::default()).unwrap();
        let split = g.split().unwrap();
        assert_eq!(split.train.len(), 10);
        assert!(split.val.is_empty());
        assert!(split.test.is_empty());
    }

    #[test]
    fn test_planetoid_deterministic() {
        let config = SplitConfig::default().with_per_class(5).with_num_val(10).with_num_test(10);
        let a = labelled(100, 4).planetoid_split(&config).unwrap();
        let b = labelled(100, 4).planetoid_split(&config).unwrap();
        assert_eq!(a.split(), b.split());
    }

    #[test]
    fn test_random_split() {
        let g = labelled(100, 2).random_split(0.6, 0.2, 7).unwrap();
        let split = g.split().unwrap();
        assert_eq!(split.train.len(), 60);
        assert_eq!(split.val.len(), 20);
        assert_eq!(split.test.len(), 20);
        assert!(labelled(10, 2).random_split(0.8, 0.5, 0).is_err());
    }
}
