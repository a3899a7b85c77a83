//! Dataset file formats.
//!
//! - [`json`]: human-readable, used for synthetic and hand-made graphs
//! - [`npz`]: NumPy archives exported from the usual Python citation loaders
//!
//! [`load`] picks the reader from the file extension.

pub mod json;
pub mod npz;

use crate::{Error, NodeGraph, Result};
use std::path::Path;

/// Load a graph, dispatching on the extension (`.json` or `.npz`).
pub fn load(path: impl AsRef<Path>) -> Result<NodeGraph> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => json::read_file(path),
        Some("npz") => npz::read_file(path),
        other => Err(Error::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

/// Write a graph as JSON.
pub fn save_json(graph: &NodeGraph, path: impl AsRef<Path>) -> Result<()> {
    json::write_file(graph, path)
}

/// Dataset name derived from a file path (`data/Cora.npz` -> `Cora`).
pub(crate) fn stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("graph")
        .to_string()
}
