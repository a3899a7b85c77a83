//! Property-based tests for the search components.
//!
//! - Sampled parameters always lie inside their space
//! - Applying sampled parameters yields a valid experiment config
//! - Sample standard deviation is non-negative and zero for constant input

use gkan_nn::{Architecture, ConvType};
use gkan_train::metrics::mean_std;
use gkan_train::search::{apply_params, gamma, SearchSpace};
use gkan_train::ExperimentConfig;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;

fn arb_pair() -> impl Strategy<Value = (Architecture, ConvType)> {
    (
        prop::sample::select(vec![Architecture::Mlp, Architecture::Kan, Architecture::FastKan]),
        prop::sample::select(vec![ConvType::Gcn, ConvType::Gin]),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn sampled_params_fit_the_space((arch, conv) in arb_pair(), seed in any::<u64>()) {
        let space = SearchSpace::for_experiment(arch, conv);
        let mut rng = XorShiftRng::seed_from_u64(seed);
        let params = space.sample(&mut rng);
        prop_assert!(space.contains(&params));

        let base = ExperimentConfig::default()
            .with_architecture(arch)
            .with_conv_type(conv);
        let config = apply_params(&base, &params).unwrap();
        prop_assert!(config.validate().is_ok());
        prop_assert!(config.to_model_config(10, 3).validate().is_ok());
    }

    #[test]
    fn mean_std_properties(values in prop::collection::vec(-10.0f64..10.0, 1..30), c in -5.0f64..5.0) {
        let (m, s) = mean_std(&values);
        prop_assert!(s >= 0.0);
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(m >= min - 1e-9 && m <= max + 1e-9);

        let constant = vec![c; values.len()];
        let (mc, sc) = mean_std(&constant);
        prop_assert!((mc - c).abs() < 1e-9);
        prop_assert!(sc.abs() < 1e-9);
    }

    #[test]
    fn gamma_is_bounded(n in 1usize..10_000) {
        let g = gamma(n);
        prop_assert!(g >= 1 && g <= 25 && g <= n);
    }
}
