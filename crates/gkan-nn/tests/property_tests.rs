//! Property-based tests for gkan-nn layers.
//!
//! These tests verify invariants that should hold for any graph or input:
//! - Sparse propagation agrees with its dense matrix
//! - GCN normalization is symmetric on undirected graphs
//! - B-spline bases form a partition of unity inside the grid
//! - Models produce one non-negative score per node and class

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use gkan_nn::{
    kan_widths, Architecture, ConvType, KanConfig, KanLinear, ModelConfig, NodeClassifier,
    Propagation,
};
use proptest::prelude::*;

fn arb_edges() -> impl Strategy<Value = (usize, Vec<(u32, u32)>)> {
    (1usize..25).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::vec((0..n as u32, 0..n as u32), 0..(4 * n)),
        )
    })
}

fn max_abs_diff(a: &Tensor, b: &Tensor) -> f32 {
    (a - b)
        .unwrap()
        .abs()
        .unwrap()
        .flatten_all()
        .unwrap()
        .max(0)
        .unwrap()
        .to_scalar::<f32>()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sparse_propagation_matches_dense(
        (n, edges) in arb_edges(),
        gcn in any::<bool>(),
        f in 1usize..6,
    ) {
        let device = Device::Cpu;
        let prop = if gcn {
            Propagation::gcn(&edges, n, true, &device).unwrap()
        } else {
            Propagation::sum(&edges, n, &device).unwrap()
        };
        let x = Tensor::randn(0f32, 1f32, (n, f), &device).unwrap();
        let sparse = prop.propagate(&x).unwrap();
        let dense = prop.dense_adjacency().unwrap().matmul(&x).unwrap();
        prop_assert!(max_abs_diff(&sparse, &dense) < 1e-4);
    }

    #[test]
    fn gcn_operator_is_symmetric_on_undirected_graphs((n, edges) in arb_edges()) {
        let mut undirected: Vec<(u32, u32)> = edges
            .iter()
            .flat_map(|&(s, d)| [(s, d), (d, s)])
            .collect();
        undirected.sort_unstable();
        undirected.dedup();

        let prop = Propagation::gcn(&undirected, n, true, &Device::Cpu).unwrap();
        let a = prop.dense_adjacency().unwrap();
        let at = a.t().unwrap();
        prop_assert!(max_abs_diff(&a, &at) < 1e-6);
        // every node gets exactly one self loop
        prop_assert_eq!(
            prop.num_edges(),
            undirected.len() + (0..n as u32).filter(|i| !undirected.contains(&(*i, *i))).count()
        );
    }

    #[test]
    fn bsplines_partition_unity(
        grid_size in 1usize..8,
        spline_order in 1usize..4,
        values in prop::collection::vec(-0.999f32..0.999, 1..20),
    ) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = KanConfig::default()
            .with_grid_size(grid_size)
            .with_spline_order(spline_order);
        let layer = KanLinear::new(1, 1, config, vb).unwrap();

        let n = values.len();
        let x = Tensor::from_vec(values, (n, 1), &Device::Cpu).unwrap();
        let bases = layer.b_splines(&x).unwrap();
        prop_assert_eq!(bases.dims(), &[n, 1, grid_size + spline_order]);

        let sums = bases.sum(2).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        for s in sums {
            prop_assert!((s - 1.0).abs() < 1e-4, "sum = {}", s);
        }
    }

    #[test]
    fn kan_widths_shape(
        i in 1usize..50,
        h in 1usize..50,
        o in 1usize..10,
        hidden_layers in 0usize..6,
    ) {
        let widths = kan_widths(i, h, o, hidden_layers);
        prop_assert_eq!(widths.len(), hidden_layers.saturating_sub(2) + 2);
        prop_assert_eq!(widths[0], i);
        prop_assert_eq!(*widths.last().unwrap(), o);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn classifier_output_shape(
        (n, edges) in arb_edges(),
        arch in prop::sample::select(vec![Architecture::Mlp, Architecture::Kan, Architecture::FastKan]),
        conv in prop::sample::select(vec![ConvType::Gcn, ConvType::Gin]),
        mp_layers in 1usize..4,
        hidden_layers in 1usize..4,
        skip in any::<bool>(),
    ) {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let config = ModelConfig::new(arch, conv, 4, 3)
            .with_hidden_channels(5)
            .with_mp_layers(mp_layers)
            .with_hidden_layers(hidden_layers)
            .with_skip(skip)
            .with_grid_size(3)
            .with_spline_order(2);
        let model = NodeClassifier::new(&config, vb).unwrap();
        let prop = model.propagation(&edges, n, &device).unwrap();

        let x = Tensor::randn(0f32, 1f32, (n, 4), &device).unwrap();
        let out = model.forward_t(&x, &prop, false).unwrap();
        prop_assert_eq!(out.dims(), &[n, 3]);
        let min = out.flatten_all().unwrap().min(0).unwrap().to_scalar::<f32>().unwrap();
        prop_assert!(min >= 0.0);
    }
}
