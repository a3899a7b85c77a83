use crate::{Error, Result, Split};
use candle_core::{Device, Tensor};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// An attributed graph for transductive node classification.
///
/// Features are stored row-major (`num_nodes x num_features`). Edges are
/// directed `(src, dst)` pairs: a message flows from `src` into `dst`.
/// Citation benchmarks ship both directions of every link, so an undirected
/// graph simply contains each pair twice.
///
/// # Example
///
/// ```rust
/// use gkan_core::NodeGraph;
///
/// let g = NodeGraph::new(
///     "toy",
///     vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0],
///     2,
///     vec![0, 1, 1],
///     vec![(0, 1), (1, 2)],
/// )
/// .unwrap()
/// .to_undirected();
///
/// assert_eq!(g.num_nodes(), 3);
/// assert_eq!(g.num_edges(), 4);
/// assert_eq!(g.num_classes(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeGraph {
    name: String,
    num_nodes: usize,
    num_features: usize,
    features: Vec<f32>,
    labels: Vec<u32>,
    edges: Vec<(u32, u32)>,
    split: Option<Split>,
}

/// Summary statistics about a [`NodeGraph`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    pub num_nodes: usize,
    /// Directed edge count (an undirected link counts twice).
    pub num_edges: usize,
    pub num_features: usize,
    pub num_classes: usize,
    /// Mean in-degree.
    pub avg_degree: f64,
    pub isolated_nodes: usize,
    pub self_loops: usize,
    /// Every edge has its reverse.
    pub undirected: bool,
    /// Label -> node count.
    pub class_counts: BTreeMap<u32, usize>,
}

/// Node features and labels as candle tensors.
#[derive(Debug, Clone)]
pub struct GraphTensors {
    /// `(num_nodes, num_features)`, f32.
    pub x: Tensor,
    /// `(num_nodes,)`, u32.
    pub y: Tensor,
}

impl NodeGraph {
    /// Build a graph, validating buffer shapes and edge endpoints.
    pub fn new(
        name: impl Into<String>,
        features: Vec<f32>,
        num_features: usize,
        labels: Vec<u32>,
        edges: Vec<(u32, u32)>,
    ) -> Result<Self> {
        let num_nodes = labels.len();
        if num_nodes == 0 {
            return Err(Error::Empty);
        }
        if features.len() != num_nodes * num_features {
            return Err(Error::ShapeMismatch {
                what: "features",
                expected: num_nodes * num_features,
                got: features.len(),
            });
        }
        for &(s, d) in &edges {
            let worst = s.max(d) as usize;
            if worst >= num_nodes {
                return Err(Error::NodeOutOfRange {
                    index: worst,
                    num_nodes,
                });
            }
        }
        Ok(Self {
            name: name.into(),
            num_nodes,
            num_features,
            features,
            labels,
            edges,
            split: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Directed edge count.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// `max(label) + 1`.
    pub fn num_classes(&self) -> usize {
        self.labels.iter().copied().max().map_or(0, |m| m as usize + 1)
    }

    pub fn features(&self) -> &[f32] {
        &self.features
    }

    /// Feature row of one node.
    pub fn feature_row(&self, node: usize) -> &[f32] {
        let start = node * self.num_features;
        &self.features[start..start + self.num_features]
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    pub fn split(&self) -> Option<&Split> {
        self.split.as_ref()
    }

    /// Attach a split after checking it is in range and disjoint.
    pub fn with_split(mut self, split: Split) -> Result<Self> {
        split.validate(self.num_nodes)?;
        self.split = Some(split);
        Ok(self)
    }

    /// Compute summary statistics.
    pub fn stats(&self) -> GraphStats {
        let mut in_degree = vec![0usize; self.num_nodes];
        let mut touched = vec![false; self.num_nodes];
        let mut self_loops = 0;
        let edge_set: HashSet<(u32, u32)> = self.edges.iter().copied().collect();

        for &(s, d) in &self.edges {
            in_degree[d as usize] += 1;
            touched[s as usize] = true;
            touched[d as usize] = true;
            if s == d {
                self_loops += 1;
            }
        }

        let undirected = self
            .edges
            .iter()
            .all(|&(s, d)| edge_set.contains(&(d, s)));

        let mut class_counts = BTreeMap::new();
        for &label in &self.labels {
            *class_counts.entry(label).or_insert(0) += 1;
        }

        GraphStats {
            num_nodes: self.num_nodes,
            num_edges: self.edges.len(),
            num_features: self.num_features,
            num_classes: self.num_classes(),
            avg_degree: in_degree.iter().sum::<usize>() as f64 / self.num_nodes as f64,
            isolated_nodes: touched.iter().filter(|t| !**t).count(),
            self_loops,
            undirected,
            class_counts,
        }
    }

    /// Add every missing reverse edge and drop duplicates.
    ///
    /// Edge order is canonicalized (sorted) so the result is deterministic.
    pub fn to_undirected(mut self) -> Self {
        let mut set: HashSet<(u32, u32)> = HashSet::with_capacity(self.edges.len() * 2);
        for &(s, d) in &self.edges {
            set.insert((s, d));
            set.insert((d, s));
        }
        let mut edges: Vec<(u32, u32)> = set.into_iter().collect();
        edges.sort_unstable();
        self.edges = edges;
        self
    }

    /// Drop `(i, i)` edges.
    pub fn remove_self_loops(mut self) -> Self {
        self.edges.retain(|&(s, d)| s != d);
        self
    }

    /// Divide each feature row by its L1 norm (sum of absolute values).
    /// All-zero rows are left alone.
    ///
    /// On non-negative features such as bag-of-words rows this is what
    /// PyG's `NormalizeFeatures` does. That transform shifts rows by their
    /// minimum and clamps the sum at 1 instead, so on signed features (CSBM
    /// output) the two differ.
    pub fn row_normalize_features(mut self) -> Self {
        let f = self.num_features;
        if f == 0 {
            return self;
        }
        for row in self.features.chunks_mut(f) {
            let sum: f32 = row.iter().map(|v| v.abs()).sum();
            if sum > 0.0 {
                for v in row.iter_mut() {
                    *v /= sum;
                }
            }
        }
        self
    }

    /// Export features and labels as tensors on `device`.
    pub fn to_tensors(&self, device: &Device) -> Result<GraphTensors> {
        let x = Tensor::from_slice(&self.features, (self.num_nodes, self.num_features), device)?;
        let y = Tensor::from_slice(&self.labels, self.num_nodes, device)?;
        Ok(GraphTensors { x, y })
    }
}
