//! NumPy `.npz` dataset format.
//!
//! Expected arrays:
//!
//! | Key | Shape | DType |
//! |-----|-------|-------|
//! | `x` | (N, F) | float |
//! | `y` | (N,) | integer |
//! | `edge_index` | (2, E) | integer, row 0 = source |
//! | `train_mask`, `val_mask`, `test_mask` | (N,) | bool / u8 (optional) |
//!
//! This matches what `np.savez(path, x=data.x, y=data.y, ...)` produces for a
//! Planetoid dataset. Masks are only used when all three are present.

use crate::{Error, NodeGraph, Result, Split};
use candle_core::{DType, Tensor};
use std::collections::HashMap;
use std::path::Path;

/// Read a graph from an `.npz` archive.
pub fn read_file(path: impl AsRef<Path>) -> Result<NodeGraph> {
    let path = path.as_ref();
    let arrays: HashMap<String, Tensor> = Tensor::read_npz(path)?.into_iter().collect();
    from_arrays(&arrays, &super::stem(path))
}

/// Assemble a graph from named arrays.
pub fn from_arrays(arrays: &HashMap<String, Tensor>, name: &str) -> Result<NodeGraph> {
    let x = get(arrays, "x")?;
    let y = get(arrays, "y")?;
    let edge_index = get(arrays, "edge_index")?;

    let (num_nodes, num_features) = x.dims2()?;
    let features = x.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;

    let labels = y
        .flatten_all()?
        .to_dtype(DType::I64)?
        .to_vec1::<i64>()?
        .into_iter()
        .map(|l| {
            u32::try_from(l).map_err(|_| Error::InvalidDataset(format!("negative label {l}")))
        })
        .collect::<Result<Vec<u32>>>()?;
    if labels.len() != num_nodes {
        return Err(Error::ShapeMismatch {
            what: "y",
            expected: num_nodes,
            got: labels.len(),
        });
    }

    let (rows, _) = edge_index.dims2()?;
    if rows != 2 {
        return Err(Error::InvalidDataset(format!(
            "edge_index must have 2 rows, got {rows}"
        )));
    }
    let ei = edge_index.to_dtype(DType::I64)?.to_vec2::<i64>()?;
    let edges = ei[0]
        .iter()
        .zip(&ei[1])
        .map(|(&s, &d)| match (u32::try_from(s), u32::try_from(d)) {
            (Ok(s), Ok(d)) => Ok((s, d)),
            _ => Err(Error::InvalidDataset(format!("invalid edge ({s}, {d})"))),
        })
        .collect::<Result<Vec<_>>>()?;

    let graph = NodeGraph::new(name, features, num_features, labels, edges)?;

    match (
        arrays.get("train_mask"),
        arrays.get("val_mask"),
        arrays.get("test_mask"),
    ) {
        (Some(train), Some(val), Some(test)) => {
            let train = mask(train, num_nodes, "train_mask")?;
            let val = mask(val, num_nodes, "val_mask")?;
            let test = mask(test, num_nodes, "test_mask")?;
            graph.with_split(Split::from_masks(&train, &val, &test))
        }
        _ => Ok(graph),
    }
}

fn get<'a>(arrays: &'a HashMap<String, Tensor>, key: &str) -> Result<&'a Tensor> {
    arrays
        .get(key)
        .ok_or_else(|| Error::InvalidDataset(format!("missing array `{key}`")))
}

fn mask(t: &Tensor, num_nodes: usize, what: &'static str) -> Result<Vec<bool>> {
    let values = t.flatten_all()?.to_dtype(DType::U8)?.to_vec1::<u8>()?;
    if values.len() != num_nodes {
        return Err(Error::ShapeMismatch {
            what,
            expected: num_nodes,
            got: values.len(),
        });
    }
    Ok(values.into_iter().map(|v| v != 0).collect())
}
