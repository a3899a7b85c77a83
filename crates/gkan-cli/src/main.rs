//! gkan CLI - KAN / FastKAN / MLP graph neural networks from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Generate a synthetic dataset and inspect it
//! gkan generate -o data/csbm.json --nodes 600 --classes 4
//! gkan stats csbm
//!
//! # Train one model (datasets resolve under --data-dir, default ./data)
//! gkan train Cora --architecture kan --conv-type gin --hidden-channels 8
//!
//! # Hyperparameter search, then 3 retrainings of the best parameters
//! gkan search Cora --architecture fastkan --conv-type gcn --trials 100
//! ```
//!
//! Logging goes to stderr and honours `RUST_LOG` (default `info`).

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use gkan_core::synthetic::{csbm, CsbmConfig};
use gkan_core::{formats, NodeGraph, SplitConfig};
use gkan_nn::{Architecture, ConvType};
use gkan_train::search::SamplerKind;
use gkan_train::{run_search_with, ExperimentConfig, SearchConfig, Trainer};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[derive(Parser)]
#[command(name = "gkan")]
#[command(about = "Graph Kolmogorov-Arnold Networks for node classification", long_about = None)]
struct Cli {
    /// Hide progress bars
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show statistics about a dataset
    Stats {
        #[command(flatten)]
        data: DataArgs,
    },

    /// Generate a synthetic CSBM dataset (JSON)
    Generate {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Number of nodes
        #[arg(long, default_value = "300")]
        nodes: usize,

        /// Number of classes
        #[arg(long, default_value = "3")]
        classes: usize,

        /// Feature dimension
        #[arg(long, default_value = "16")]
        features: usize,

        /// Edge probability within a class
        #[arg(long, default_value = "0.05")]
        p_intra: f64,

        /// Edge probability across classes
        #[arg(long, default_value = "0.005")]
        p_inter: f64,

        /// Distance of class means, in noise standard deviations
        #[arg(long, default_value = "1.0")]
        signal: f32,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Train and evaluate one model
    Train {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        schedule: ScheduleArgs,

        /// Hidden width
        #[arg(long, default_value = "16")]
        hidden_channels: usize,

        /// Depth of the update networks
        #[arg(long, default_value = "2")]
        hidden_layers: usize,

        /// Spline grid intervals (KAN, FastKAN)
        #[arg(long, default_value = "4")]
        grid_size: usize,

        /// B-spline order (KAN)
        #[arg(long, default_value = "3")]
        spline_order: usize,

        /// Dropout before each convolution
        #[arg(long, default_value = "0.0")]
        dropout: f64,

        /// Learning rate
        #[arg(long, default_value = "0.01")]
        lr: f64,

        /// Experiment config (JSON); model and schedule flags are ignored when set
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Hyperparameter search followed by repeated retraining
    Search {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        schedule: ScheduleArgs,

        /// Number of trials
        #[arg(long, default_value = "100")]
        trials: usize,

        /// Retrainings of the best parameters
        #[arg(long, default_value = "3")]
        repeats: usize,

        /// Sampler: tpe or random
        #[arg(long, default_value = "tpe")]
        sampler: SamplerKind,

        /// Directory for the result line and study summary
        #[arg(long, default_value = "finished_logs")]
        log_dir: PathBuf,
    },
}

#[derive(Args)]
struct DataArgs {
    /// Dataset file (.npz, .json) or name under --data-dir
    dataset: String,

    /// Directory searched for `{name}.npz` then `{name}.json`
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Random seed: split, parameter init, dropout and sampler. With
    /// `--config`, the config's `seed` takes its place
    #[arg(long, default_value = "12345")]
    seed: u64,

    /// Training nodes per class when the dataset has no split
    #[arg(long, default_value = "20")]
    per_class: usize,

    /// Validation nodes when the dataset has no split
    #[arg(long, default_value = "500")]
    num_val: usize,

    /// Test nodes when the dataset has no split
    #[arg(long, default_value = "1000")]
    num_test: usize,
}

#[derive(Args)]
struct ModelArgs {
    /// Update function: mlp, kan or fastkan
    #[arg(long, default_value = "mlp")]
    architecture: Architecture,

    /// Message passing: gin or gcn
    #[arg(long, default_value = "gin")]
    conv_type: ConvType,

    /// Message-passing layers, output layer included
    #[arg(long, default_value = "2")]
    mp_layers: usize,

    /// Disable skip connections
    #[arg(long)]
    no_skip: bool,
}

#[derive(Args)]
struct ScheduleArgs {
    /// Maximum number of epochs
    #[arg(long, default_value = "10000")]
    epochs: usize,

    /// Early stopping patience (epochs)
    #[arg(long, default_value = "100")]
    patience: usize,

    /// Log every N epochs
    #[arg(long, default_value = "1000")]
    rate_print: usize,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let quiet = cli.quiet;

    match cli.command {
        Commands::Stats { data } => cmd_stats(&data),
        Commands::Generate {
            output,
            nodes,
            classes,
            features,
            p_intra,
            p_inter,
            signal,
            seed,
        } => {
            let config = CsbmConfig::default()
                .with_nodes(nodes)
                .with_classes(classes)
                .with_features(features)
                .with_edge_probabilities(p_intra, p_inter)
                .with_signal(signal)
                .with_seed(seed);
            cmd_generate(&output, &config)
        }
        Commands::Train {
            data,
            model,
            schedule,
            hidden_channels,
            hidden_layers,
            grid_size,
            spline_order,
            dropout,
            lr,
            config,
        } => {
            let experiment = match config {
                Some(path) => ExperimentConfig::from_json_file(&path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?,
                None => {
                    let mut c = base_config(&model, &schedule, data.seed)
                        .with_hidden_channels(hidden_channels)
                        .with_hidden_layers(hidden_layers)
                        .with_lr(lr)
                        .with_dropout(dropout);
                    c.grid_size = grid_size;
                    c.spline_order = spline_order;
                    c
                }
            };
            cmd_train(&data, experiment, quiet)
        }
        Commands::Search {
            data,
            model,
            schedule,
            trials,
            repeats,
            sampler,
            log_dir,
        } => {
            let search = SearchConfig::new(base_config(&model, &schedule, data.seed))
                .with_trials(trials)
                .with_repeats(repeats)
                .with_sampler(sampler)
                .with_log_dir(log_dir);
            cmd_search(&data, search, quiet)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = Registry::default().with(filter).with(fmt_layer).try_init();
}

fn base_config(model: &ModelArgs, schedule: &ScheduleArgs, seed: u64) -> ExperimentConfig {
    let mut c = ExperimentConfig::default()
        .with_architecture(model.architecture)
        .with_conv_type(model.conv_type)
        .with_epochs(schedule.epochs)
        .with_patience(schedule.patience)
        .with_rate_print(schedule.rate_print)
        .with_seed(seed);
    c.mp_layers = model.mp_layers;
    c.skip = !model.no_skip;
    c
}

/// A path to an existing file, or `{data_dir}/{name}.npz`, or `{data_dir}/{name}.json`.
fn resolve_dataset(dataset: &str, data_dir: &Path) -> Result<PathBuf> {
    let direct = PathBuf::from(dataset);
    if direct.is_file() {
        return Ok(direct);
    }
    for ext in ["npz", "json"] {
        let candidate = data_dir.join(format!("{dataset}.{ext}"));
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    bail!(
        "Dataset {dataset} not found (no such file, and no {dataset}.npz or {dataset}.json in {})",
        data_dir.display()
    )
}

/// Load `data.dataset`, drawing a Planetoid split with `seed` if it has none.
fn load_graph(data: &DataArgs, seed: u64) -> Result<NodeGraph> {
    let path = resolve_dataset(&data.dataset, &data.data_dir)?;
    let start = Instant::now();
    let pb = ProgressBar::new_spinner();
    pb.set_message(format!("Loading {}...", path.display()));

    let graph =
        formats::load(&path).with_context(|| format!("Failed to load {}", path.display()))?;
    let graph = if graph.split().is_some() {
        graph
    } else {
        let split = SplitConfig::default()
            .with_per_class(data.per_class)
            .with_num_val(data.num_val)
            .with_num_test(data.num_test)
            .with_seed(seed);
        graph
            .planetoid_split(&split)
            .context("Failed to split dataset")?
    };

    pb.finish_with_message(format!("Loaded in {:.2?}", start.elapsed()));
    Ok(graph)
}

fn cmd_stats(data: &DataArgs) -> Result<()> {
    let graph = load_graph(data, data.seed)?;
    let stats = graph.stats();

    println!("Graph Statistics: {}", graph.name());
    println!("==========================");
    println!("Nodes:          {}", stats.num_nodes);
    println!("Edges:          {}", stats.num_edges);
    println!("Features:       {}", stats.num_features);
    println!("Classes:        {}", stats.num_classes);
    println!("Avg degree:     {:.2}", stats.avg_degree);
    println!("Isolated nodes: {}", stats.isolated_nodes);
    println!("Self loops:     {}", stats.self_loops);
    println!("Undirected:     {}", stats.undirected);
    if let Some(split) = graph.split() {
        println!(
            "Split:          {} train / {} val / {} test",
            split.train.len(),
            split.val.len(),
            split.test.len()
        );
    }
    for (class, count) in &stats.class_counts {
        println!("  class {class:>3}: {count}");
    }
    Ok(())
}

fn cmd_generate(output: &Path, config: &CsbmConfig) -> Result<()> {
    let graph = csbm(config).context("Failed to generate graph")?;
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    formats::save_json(&graph, output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Wrote {} nodes, {} edges -> {}",
        graph.num_nodes(),
        graph.num_edges(),
        output.display()
    );
    Ok(())
}

fn cmd_train(data: &DataArgs, config: ExperimentConfig, quiet: bool) -> Result<()> {
    let graph = load_graph(data, config.seed)?;
    let config = config.with_dataset(graph.name());

    config.validate()?;
    let graph = if config.normalize_features {
        graph.row_normalize_features()
    } else {
        graph
    };

    let start = Instant::now();
    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(config.epochs as u64)
    };
    pb.set_style(epoch_style());
    let outcome = Trainer::new(config.clone()).run_with(&graph, |m| {
        pb.set_position(m.epoch as u64);
        pb.set_message(format!("val loss {:.4}, val acc {:.3}", m.val_loss, m.val_acc));
    })?;
    pb.finish_and_clear();

    println!(
        "{} / {} on {} ({} epochs, best {}, {:.2?})",
        config.architecture,
        config.conv_type,
        config.dataset,
        outcome.epochs_run,
        outcome.best_epoch,
        start.elapsed()
    );
    println!("Val loss:       {:.4}", outcome.best_val_loss);
    println!("Train acc:      {:.4}", outcome.train_acc);
    println!("Val acc:        {:.4}", outcome.val_acc);
    println!("Test acc:       {:.4}", outcome.test_acc);
    Ok(())
}

fn cmd_search(data: &DataArgs, mut config: SearchConfig, quiet: bool) -> Result<()> {
    let graph = load_graph(data, config.base.seed)?;
    config.base = config.base.with_dataset(graph.name());

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(config.n_trials as u64)
    };
    pb.set_style(trial_style());
    let report = run_search_with(&config, &graph, |trial| {
        pb.inc(1);
        if let Some(v) = trial.value {
            pb.set_message(format!("trial {} -> {:.4}", trial.number, v));
        }
    })?;
    pb.finish_and_clear();

    println!(
        "Search: {} / {} on {} ({} of {} trials completed)",
        config.base.architecture,
        config.base.conv_type,
        config.base.dataset,
        report.study.n_complete,
        report.study.trials.len()
    );
    println!("Best val loss:  {:.4}", report.best_value);
    println!("Best params:");
    for (name, value) in &report.best_params {
        println!("  {name}: {value}");
    }
    println!(
        "Test acc:       {:.4} ± {:.4} over {} runs",
        report.test_mean,
        report.test_std,
        report.test_accs.len()
    );
    println!("Results:        {}", report.log_file.display());
    Ok(())
}

fn epoch_style() -> ProgressStyle {
    ProgressStyle::with_template("{bar:40} {pos}/{len} epochs {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn trial_style() -> ProgressStyle {
    ProgressStyle::with_template("{bar:40} {pos}/{len} trials {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
