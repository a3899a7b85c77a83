//! Property-based tests for gkan-core graph types.
//!
//! These tests verify invariants that should hold for any graph:
//! - Splits are disjoint and in range
//! - Undirected conversion is symmetric and idempotent
//! - Row normalization yields unit L1 rows

use gkan_core::{NodeGraph, SplitConfig};
use proptest::prelude::*;

/// Arbitrary small graph: (num_nodes, labels, edges).
fn arb_graph() -> impl Strategy<Value = NodeGraph> {
    (2usize..60, 1u32..5).prop_flat_map(|(n, classes)| {
        (
            prop::collection::vec(0..classes, n),
            prop::collection::vec((0..n as u32, 0..n as u32), 0..(3 * n)),
            prop::collection::vec(0.0f32..5.0, n * 3),
        )
            .prop_map(|(labels, edges, features)| {
                NodeGraph::new("prop", features, 3, labels, edges).unwrap()
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn planetoid_split_is_disjoint(
        g in arb_graph(),
        per_class in 0usize..10,
        num_val in 0usize..30,
        num_test in 0usize..30,
        seed in any::<u64>(),
    ) {
        let n = g.num_nodes();
        let config = SplitConfig { per_class, num_val, num_test, seed };
        let g = g.planetoid_split(&config).unwrap();
        let split = g.split().unwrap();

        prop_assert!(split.validate(n).is_ok());
        prop_assert!(split.len() <= n);
        prop_assert!(split.val.len() <= num_val);
        prop_assert!(split.test.len() <= num_test);
        prop_assert!(split.train.len() <= per_class * g.num_classes());
    }

    #[test]
    fn undirected_is_symmetric_and_idempotent(g in arb_graph()) {
        let once = g.to_undirected();
        prop_assert!(once.stats().undirected);
        let twice = once.clone().to_undirected();
        prop_assert_eq!(once.edges(), twice.edges());
    }

    #[test]
    fn row_normalized_rows_sum_to_one(g in arb_graph()) {
        let g = g.row_normalize_features();
        for i in 0..g.num_nodes() {
            let row = g.feature_row(i);
            let sum: f32 = row.iter().sum();
            prop_assert!(sum == 0.0 || (sum - 1.0).abs() < 1e-4, "row {} sums to {}", i, sum);
        }
    }
}
