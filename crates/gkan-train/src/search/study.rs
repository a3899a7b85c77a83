//! Sequential optimization studies.

use super::sampler::Sampler;
use super::space::{Params, SearchSpace};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Whether lower or higher objective values are better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Minimize,
    Maximize,
}

impl Direction {
    /// Orders `a` before `b` when `a` is the better value.
    pub fn ordering(&self, a: f64, b: f64) -> Ordering {
        match self {
            Direction::Minimize => a.total_cmp(&b),
            Direction::Maximize => b.total_cmp(&a),
        }
    }

    pub fn prefers(&self, candidate: f64, incumbent: f64) -> bool {
        self.ordering(candidate, incumbent) == Ordering::Less
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialState {
    Complete,
    Failed,
}

/// One evaluated parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// 0-based position in the study.
    pub number: usize,
    pub params: Params,
    /// Objective value; `None` for failed trials.
    pub value: Option<f64>,
    pub state: TrialState,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Trial {
    pub fn is_complete(&self) -> bool {
        self.state == TrialState::Complete
    }
}

/// Serializable snapshot of a study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySummary {
    pub direction: Direction,
    pub sampler: String,
    pub space: SearchSpace,
    pub n_complete: usize,
    pub n_failed: usize,
    pub best_value: Option<f64>,
    pub best_params: Option<Params>,
    pub trials: Vec<Trial>,
}

/// A search over one [`SearchSpace`].
///
/// Trials run one after another; each asks the sampler for parameters
/// given the full history so far.
pub struct Study {
    space: SearchSpace,
    direction: Direction,
    sampler: Box<dyn Sampler>,
    trials: Vec<Trial>,
}

impl Study {
    pub fn new(space: SearchSpace, direction: Direction, sampler: Box<dyn Sampler>) -> Self {
        Self {
            space,
            direction,
            sampler,
            trials: Vec::new(),
        }
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn completed(&self) -> impl Iterator<Item = &Trial> {
        self.trials.iter().filter(|t| t.is_complete())
    }

    /// Run `n_trials` more trials.
    ///
    /// An objective error or a non-finite value marks the trial failed; the
    /// study carries on with the next one.
    pub fn optimize<F>(&mut self, objective: F, n_trials: usize) -> Result<()>
    where
        F: FnMut(&Params) -> Result<f64>,
    {
        self.optimize_with(objective, n_trials, |_| {})
    }

    /// Like [`Study::optimize`], calling `on_trial` after every trial.
    pub fn optimize_with<F, C>(&mut self, mut objective: F, n_trials: usize, mut on_trial: C) -> Result<()>
    where
        F: FnMut(&Params) -> Result<f64>,
        C: FnMut(&Trial),
    {
        self.space.validate()?;
        for _ in 0..n_trials {
            let number = self.trials.len();
            let params = self.sampler.sample(&self.space, &self.trials, self.direction);
            let trial = match objective(&params) {
                Ok(value) if value.is_finite() => {
                    tracing::info!(trial = number, value, params = ?params, "trial complete");
                    Trial {
                        number,
                        params,
                        value: Some(value),
                        state: TrialState::Complete,
                        error: None,
                    }
                }
                Ok(value) => {
                    tracing::warn!(trial = number, value, "trial returned a non-finite value");
                    Trial {
                        number,
                        params,
                        value: None,
                        state: TrialState::Failed,
                        error: Some(format!("non-finite objective {value}")),
                    }
                }
                Err(e) => {
                    tracing::warn!(trial = number, error = %e, "trial failed");
                    Trial {
                        number,
                        params,
                        value: None,
                        state: TrialState::Failed,
                        error: Some(e.to_string()),
                    }
                }
            };
            on_trial(&trial);
            self.trials.push(trial);
            if let Some(best) = self.best_trial() {
                tracing::debug!(best_trial = best.number, best_value = ?best.value, "study progress");
            }
        }
        Ok(())
    }

    /// Completed trial with the best value; the earliest wins ties.
    pub fn best_trial(&self) -> Option<&Trial> {
        let mut best: Option<&Trial> = None;
        for t in self.completed() {
            let Some(v) = t.value else { continue };
            let improves = best
                .and_then(|b| b.value)
                .map_or(true, |bv| self.direction.prefers(v, bv));
            if improves {
                best = Some(t);
            }
        }
        best
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().and_then(|t| t.value)
    }

    pub fn best_params(&self) -> Result<&Params> {
        self.best_trial()
            .map(|t| &t.params)
            .ok_or(Error::NoCompletedTrials)
    }

    pub fn summary(&self) -> StudySummary {
        let n_complete = self.completed().count();
        StudySummary {
            direction: self.direction,
            sampler: self.sampler.name().to_string(),
            space: self.space.clone(),
            n_complete,
            n_failed: self.trials.len() - n_complete,
            best_value: self.best_value(),
            best_params: self.best_trial().map(|t| t.params.clone()),
            trials: self.trials.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::sampler::{RandomSampler, TpeSampler};
    use crate::search::space::ParamSpec;

    fn quadratic_space() -> SearchSpace {
        SearchSpace::new(vec![ParamSpec::float("x", -5.0, 5.0), ParamSpec::int("n", 0, 10)])
            .unwrap()
    }

    fn quadratic(p: &Params) -> Result<f64> {
        let x = p["x"].as_f64();
        let n = p["n"].as_f64();
        Ok((x - 1.0).powi(2) + (n - 7.0).powi(2))
    }

    #[test]
    fn test_direction() {
        assert!(Direction::Minimize.prefers(1.0, 2.0));
        assert!(Direction::Maximize.prefers(2.0, 1.0));
        assert!(!Direction::Minimize.prefers(2.0, 2.0));
    }

    #[test]
    fn test_failed_trials_are_recorded() {
        let mut study = Study::new(
            quadratic_space(),
            Direction::Minimize,
            Box::new(RandomSampler::new(1)),
        );
        let mut calls = 0;
        study
            .optimize(
                |p| {
                    calls += 1;
                    match calls % 3 {
                        0 => Err(Error::InvalidConfig("boom".into())),
                        1 => Ok(f64::NAN),
                        _ => quadratic(p),
                    }
                },
                9,
            )
            .unwrap();
        let summary = study.summary();
        assert_eq!(summary.trials.len(), 9);
        assert_eq!(summary.n_complete, 3);
        assert_eq!(summary.n_failed, 6);
        assert!(study.best_trial().unwrap().is_complete());
        assert_eq!(study.trials()[2].error.as_deref(), Some("Invalid config: boom"));
    }

    #[test]
    fn test_no_completed_trials() {
        let mut study = Study::new(
            quadratic_space(),
            Direction::Minimize,
            Box::new(RandomSampler::new(1)),
        );
        study
            .optimize(|_| Err(Error::InvalidConfig("never".into())), 3)
            .unwrap();
        assert!(matches!(study.best_params(), Err(Error::NoCompletedTrials)));
        assert!(study.summary().best_value.is_none());
    }

    #[test]
    fn test_best_trial_respects_direction() {
        let mut study = Study::new(
            quadratic_space(),
            Direction::Maximize,
            Box::new(RandomSampler::new(5)),
        );
        study.optimize(quadratic, 20).unwrap();
        let best = study.best_value().unwrap();
        assert!(study.completed().all(|t| t.value.unwrap() <= best));
    }

    #[test]
    fn test_tpe_beats_its_startup_phase() {
        let mut study = Study::new(
            quadratic_space(),
            Direction::Minimize,
            Box::new(TpeSampler::new(42)),
        );
        study.optimize(quadratic, 60).unwrap();
        let startup_best = study.trials()[..10]
            .iter()
            .filter_map(|t| t.value)
            .fold(f64::INFINITY, f64::min);
        let best = study.best_value().unwrap();
        assert!(best <= startup_best);
        assert!(best < 3.0, "best = {best}");
    }

    #[test]
    fn test_summary_serializes() {
        let mut study = Study::new(
            quadratic_space(),
            Direction::Minimize,
            Box::new(RandomSampler::new(2)),
        );
        study.optimize(quadratic, 4).unwrap();
        let json = serde_json::to_string(&study.summary()).unwrap();
        let back: StudySummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.trials.len(), 4);
        assert_eq!(back.sampler, "random");
    }
}
