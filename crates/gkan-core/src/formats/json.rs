//! JSON dataset format.
//!
//! ```json
//! {
//!   "name": "toy",
//!   "features": [[1.0, 0.0], [0.0, 1.0]],
//!   "labels": [0, 1],
//!   "edges": [[0, 1], [1, 0]],
//!   "split": { "train": [0], "val": [], "test": [1] }
//! }
//! ```
//!
//! `name` defaults to the file stem and `split` is optional.

use crate::{Error, NodeGraph, Result, Split};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct JsonGraph {
    #[serde(default)]
    name: Option<String>,
    features: Vec<Vec<f32>>,
    labels: Vec<u32>,
    edges: Vec<(u32, u32)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    split: Option<Split>,
}

/// Parse a graph from a JSON string.
pub fn from_str(text: &str, default_name: &str) -> Result<NodeGraph> {
    let raw: JsonGraph = serde_json::from_str(text)?;
    build(raw, default_name)
}

/// Read a graph from a JSON file.
pub fn read_file(path: impl AsRef<Path>) -> Result<NodeGraph> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let raw: JsonGraph = serde_json::from_reader(reader)?;
    build(raw, &super::stem(path))
}

/// Serialize a graph to a JSON string.
pub fn to_string(graph: &NodeGraph) -> Result<String> {
    Ok(serde_json::to_string(&to_raw(graph))?)
}

/// Write a graph to a JSON file.
pub fn write_file(graph: &NodeGraph, path: impl AsRef<Path>) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &to_raw(graph))?;
    Ok(())
}

fn to_raw(graph: &NodeGraph) -> JsonGraph {
    JsonGraph {
        name: Some(graph.name().to_string()),
        features: (0..graph.num_nodes())
            .map(|i| graph.feature_row(i).to_vec())
            .collect(),
        labels: graph.labels().to_vec(),
        edges: graph.edges().to_vec(),
        split: graph.split().cloned(),
    }
}

fn build(raw: JsonGraph, default_name: &str) -> Result<NodeGraph> {
    let num_features = raw.features.first().map_or(0, Vec::len);
    if let Some((i, row)) = raw
        .features
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != num_features)
    {
        return Err(Error::InvalidDataset(format!(
            "feature row {i} has {} values, expected {num_features}",
            row.len()
        )));
    }
    if raw.features.len() != raw.labels.len() {
        return Err(Error::ShapeMismatch {
            what: "labels",
            expected: raw.features.len(),
            got: raw.labels.len(),
        });
    }

    let name = raw.name.unwrap_or_else(|| default_name.to_string());
    let features = raw.features.into_iter().flatten().collect();
    let graph = NodeGraph::new(name, features, num_features, raw.labels, raw.edges)?;
    match raw.split {
        Some(split) => graph.with_split(split),
        None => Ok(graph),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOY: &str = r#"{
        "features": [[1.0, 0.0], [0.0, 1.0], [0.5, 0.5]],
        "labels": [0, 1, 1],
        "edges": [[0, 1], [1, 2]],
        "split": {"train": [0], "val": [1], "test": [2]}
    }"#;

    #[test]
    fn test_parse() {
        let g = from_str(TOY, "toy").unwrap();
        assert_eq!(g.name(), "toy");
        assert_eq!(g.num_nodes(), 3);
        assert_eq!(g.num_features(), 2);
        assert_eq!(g.edges(), &[(0, 1), (1, 2)]);
        assert_eq!(g.split().unwrap().test, vec![2]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let text = r#"{"features": [[1.0], [1.0, 2.0]], "labels": [0, 1], "edges": []}"#;
        assert!(matches!(
            from_str(text, "r"),
            Err(Error::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_label_count_mismatch() {
        let text = r#"{"features": [[1.0], [2.0]], "labels": [0], "edges": []}"#;
        assert!(matches!(
            from_str(text, "r"),
            Err(Error::ShapeMismatch { what: "labels", .. })
        ));
    }

    #[test]
    fn test_overlapping_split_rejected() {
        let text = r#"{"features": [[1.0], [2.0]], "labels": [0, 1], "edges": [],
                       "split": {"train": [0], "val": [0], "test": []}}"#;
        assert!(matches!(from_str(text, "r"), Err(Error::OverlappingSplit(0))));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toy.json");
        let g = from_str(TOY, "toy").unwrap();
        write_file(&g, &path).unwrap();
        let back = read_file(&path).unwrap();
        assert_eq!(back.features(), g.features());
        assert_eq!(back.split(), g.split());
    }
}
