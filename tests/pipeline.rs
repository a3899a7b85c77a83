use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use gkan::core::synthetic::{csbm, CsbmConfig};
use gkan::{Architecture, ConvType, ExperimentConfig, ModelConfig, NodeClassifier, SplitConfig};

fn graph() -> gkan::NodeGraph {
    csbm(
        &CsbmConfig::default()
            .with_nodes(60)
            .with_classes(3)
            .with_features(6)
            .with_seed(7),
    )
    .unwrap()
    .planetoid_split(
        &SplitConfig::default()
            .with_per_class(5)
            .with_num_val(15)
            .with_num_test(20),
    )
    .unwrap()
}

#[test]
fn test_classifier_on_generated_graph() {
    let graph = graph();
    let device = Device::Cpu;
    let tensors = graph.to_tensors(&device).unwrap();

    for architecture in [Architecture::Mlp, Architecture::Kan, Architecture::FastKan] {
        for conv_type in [ConvType::Gcn, ConvType::Gin] {
            let config = ModelConfig::new(architecture, conv_type, 6, 3)
                .with_hidden_channels(4)
                .with_grid_size(2);
            let varmap = VarMap::new();
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            let model = NodeClassifier::new(&config, vb).unwrap();
            let prop = model
                .propagation(graph.edges(), graph.num_nodes(), &device)
                .unwrap();
            let logits = model.forward_t(&tensors.x, &prop, false).unwrap();
            assert_eq!(logits.dims(), &[60, 3], "{architecture} / {conv_type}");
        }
    }
}

#[test]
fn test_experiment_through_facade() {
    let config = ExperimentConfig::default()
        .with_architecture(Architecture::FastKan)
        .with_conv_type(ConvType::Gin)
        .with_hidden_channels(4)
        .with_epochs(5);
    let outcome = gkan::run_experiment(&config, &graph()).unwrap();
    assert_eq!(outcome.epochs_run, 5);
    assert!(outcome.best_val_loss.is_finite());
    assert!((0.0..=1.0).contains(&outcome.test_acc));
}
