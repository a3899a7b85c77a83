//! Hyperparameter search.
//!
//! [`run_search`] tunes one architecture / convolution pair on one dataset:
//!
//! 1. Run `n_trials` trials, each training a model with sampled parameters
//!    and scoring it by its best validation loss (minimized)
//! 2. Retrain the best parameters `repeats` times
//! 3. Report mean and sample standard deviation of test accuracy, appending
//!    `Mean: {m}, Std: {s}` to `{log_dir}/{dataset}_{architecture}_{conv}`
//!    and saving the study next to it as JSON

mod sampler;
mod space;
mod study;

pub use sampler::{gamma, RandomSampler, Sampler, TpeSampler};
pub use space::{ParamSpec, ParamValue, Params, SearchSpace};
pub use study::{Direction, Study, StudySummary, Trial, TrialState};

use crate::config::ExperimentConfig;
use crate::error::{Error, Result};
use crate::metrics::mean_std;
use crate::trainer::run_experiment;
use gkan_core::NodeGraph;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which [`Sampler`] drives a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerKind {
    #[default]
    Tpe,
    Random,
}

impl SamplerKind {
    pub fn build(&self, seed: u64) -> Box<dyn Sampler> {
        match self {
            SamplerKind::Tpe => Box::new(TpeSampler::new(seed)),
            SamplerKind::Random => Box::new(RandomSampler::new(seed)),
        }
    }
}

impl fmt::Display for SamplerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SamplerKind::Tpe => "tpe",
            SamplerKind::Random => "random",
        })
    }
}

impl FromStr for SamplerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tpe" => Ok(SamplerKind::Tpe),
            "random" => Ok(SamplerKind::Random),
            other => Err(Error::InvalidConfig(format!("unknown sampler: {other}"))),
        }
    }
}

/// Search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Values for every parameter the search space does not cover.
    pub base: ExperimentConfig,
    /// Trials to run (default: 100).
    pub n_trials: usize,
    /// Retrainings of the best parameters (default: 3).
    pub repeats: usize,
    pub sampler: SamplerKind,
    /// Sampler seed (default: 12345).
    pub seed: u64,
    /// Where the result line and study summary go (default: "finished_logs").
    pub log_dir: PathBuf,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base: ExperimentConfig::default(),
            n_trials: 100,
            repeats: 3,
            sampler: SamplerKind::Tpe,
            seed: 12_345,
            log_dir: PathBuf::from("finished_logs"),
        }
    }
}

impl SearchConfig {
    pub fn new(base: ExperimentConfig) -> Self {
        Self {
            seed: base.seed,
            base,
            ..Self::default()
        }
    }

    pub fn with_trials(mut self, n_trials: usize) -> Self {
        self.n_trials = n_trials;
        self
    }

    pub fn with_repeats(mut self, repeats: usize) -> Self {
        self.repeats = repeats;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerKind) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn space(&self) -> SearchSpace {
        SearchSpace::for_experiment(self.base.architecture, self.base.conv_type)
    }

    /// `{log_dir}/{dataset}_{architecture}_{conv}`
    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(format!(
            "{}_{}_{}",
            self.base.dataset, self.base.architecture, self.base.conv_type
        ))
    }

    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        if self.n_trials == 0 {
            return Err(Error::InvalidConfig("n_trials must be at least 1".into()));
        }
        if self.repeats == 0 {
            return Err(Error::InvalidConfig("repeats must be at least 1".into()));
        }
        Ok(())
    }
}

/// Outcome of [`run_search`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    pub best_params: Params,
    /// Best validation loss found.
    pub best_value: f64,
    /// Test accuracy of each retraining.
    pub test_accs: Vec<f64>,
    pub test_mean: f64,
    pub test_std: f64,
    pub log_file: PathBuf,
    pub summary_file: PathBuf,
    pub study: StudySummary,
}

/// Overwrite the fields of `base` named in `params`.
pub fn apply_params(base: &ExperimentConfig, params: &Params) -> Result<ExperimentConfig> {
    let mut config = base.clone();
    for (name, value) in params {
        let count = |v: &ParamValue| -> Result<usize> {
            v.as_i64()
                .and_then(|i| usize::try_from(i).ok())
                .ok_or_else(|| Error::InvalidParam {
                    name: name.clone(),
                    reason: format!("expected a non-negative integer, got {v}"),
                })
        };
        match name.as_str() {
            "lr" => config.lr = value.as_f64(),
            "dropout" => config.dropout = value.as_f64(),
            "weight_decay" => config.weight_decay = value.as_f64(),
            "hidden_channels" => config.hidden_channels = count(value)?,
            "hidden_layers" => config.hidden_layers = count(value)?,
            "mp_layers" => config.mp_layers = count(value)?,
            "grid_size" => config.grid_size = count(value)?,
            "spline_order" => config.spline_order = count(value)?,
            _ => {
                return Err(Error::InvalidParam {
                    name: name.clone(),
                    reason: "not an experiment parameter".into(),
                })
            }
        }
    }
    Ok(config)
}

/// Tune, retrain and log. See the module docs.
pub fn run_search(config: &SearchConfig, graph: &NodeGraph) -> Result<SearchReport> {
    run_search_with(config, graph, |_| {})
}

/// Like [`run_search`], calling `on_trial` after every trial.
pub fn run_search_with<C>(config: &SearchConfig, graph: &NodeGraph, on_trial: C) -> Result<SearchReport>
where
    C: FnMut(&Trial),
{
    config.validate()?;
    let base = &config.base;
    let mut study = Study::new(
        config.space(),
        Direction::Minimize,
        config.sampler.build(config.seed),
    );
    tracing::info!(
        dataset = %base.dataset,
        architecture = %base.architecture,
        conv = %base.conv_type,
        trials = config.n_trials,
        sampler = %config.sampler,
        "starting search"
    );

    study.optimize_with(
        |params| {
            let trial_config = apply_params(base, params)?;
            Ok(run_experiment(&trial_config, graph)?.best_val_loss)
        },
        config.n_trials,
        on_trial,
    )?;

    let best_params = study.best_params()?.clone();
    let best_value = study.best_value().ok_or(Error::NoCompletedTrials)?;
    tracing::info!(best_value, params = ?best_params, "search finished");

    let best_config = apply_params(base, &best_params)?;
    let mut test_accs = Vec::with_capacity(config.repeats);
    for i in 0..config.repeats {
        let repeat_config = best_config.clone().with_seed(base.seed.wrapping_add(i as u64));
        let outcome = run_experiment(&repeat_config, graph)?;
        tracing::info!(repeat = i, test_acc = outcome.test_acc, "retrained best parameters");
        test_accs.push(outcome.test_acc);
    }
    let (test_mean, test_std) = mean_std(&test_accs);

    let log_file = config.log_file();
    let mut summary_file = log_file.clone().into_os_string();
    summary_file.push(".json");
    let summary_file = PathBuf::from(summary_file);
    let summary = study.summary();
    write_logs(&log_file, &summary_file, test_mean, test_std, &summary)?;
    tracing::info!(test_mean, test_std, log = %log_file.display(), "wrote search results");

    Ok(SearchReport {
        best_params,
        best_value,
        test_accs,
        test_mean,
        test_std,
        log_file,
        summary_file,
        study: summary,
    })
}

fn write_logs(
    log_file: &Path,
    summary_file: &Path,
    mean: f64,
    std: f64,
    summary: &StudySummary,
) -> Result<()> {
    if let Some(dir) = log_file.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;
    writeln!(file, "Mean: {mean}, Std: {std}")?;
    std::fs::write(summary_file, serde_json::to_string_pretty(summary)?)?;
    Ok(())
}
