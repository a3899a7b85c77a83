//! Parameter samplers.
//!
//! - [`RandomSampler`]: independent uniform draws
//! - [`TpeSampler`]: tree-structured Parzen estimator (Bergstra et al., 2011)
//!
//! # TPE
//!
//! After a random start-up phase, completed trials are split into the best
//! `γ(n) = min(⌈0.1 n⌉, 25)` ("good") and the rest ("bad"). Each parameter
//! gets two truncated Gaussian mixtures over its range, `l(x)` fitted to
//! the good values and `g(x)` to the bad ones, each with an extra wide
//! prior component. Candidates are drawn from `l` and the one maximizing
//! `log l(x) - log g(x)` is kept. Parameters are treated independently.
//!
//! # Reference
//!
//! Bergstra et al., "Algorithms for Hyper-Parameter Optimization",
//! NeurIPS 2011.

use super::space::{ParamSpec, Params, SearchSpace};
use super::study::{Direction, Trial};
use rand::distributions::Distribution;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

/// Proposes the next parameter set from the study history.
pub trait Sampler {
    fn sample(&mut self, space: &SearchSpace, history: &[Trial], direction: Direction) -> Params;

    fn name(&self) -> &'static str;
}

/// Uniform sampling, ignoring history.
pub struct RandomSampler {
    rng: XorShiftRng,
}

impl RandomSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: XorShiftRng::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn sample(&mut self, space: &SearchSpace, _history: &[Trial], _direction: Direction) -> Params {
        space.sample(&mut self.rng)
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Independent tree-structured Parzen estimator.
pub struct TpeSampler {
    rng: XorShiftRng,
    /// Completed trials sampled at random before modelling starts (default: 10).
    pub n_startup: usize,
    /// Candidates drawn from `l(x)` per parameter (default: 24).
    pub n_candidates: usize,
    /// Weight of the prior component in each mixture (default: 1.0).
    pub prior_weight: f64,
}

impl TpeSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: XorShiftRng::seed_from_u64(seed),
            n_startup: 10,
            n_candidates: 24,
            prior_weight: 1.0,
        }
    }

    pub fn with_n_startup(mut self, n_startup: usize) -> Self {
        self.n_startup = n_startup;
        self
    }

    pub fn with_n_candidates(mut self, n_candidates: usize) -> Self {
        self.n_candidates = n_candidates.max(1);
        self
    }

    fn sample_param(&mut self, spec: &ParamSpec, history: &[(f64, f64)]) -> Option<f64> {
        let n_good = gamma(history.len());
        let (good, bad) = history.split_at(n_good);
        let good: Vec<f64> = good.iter().map(|(x, _)| *x).collect();
        let bad: Vec<f64> = bad.iter().map(|(x, _)| *x).collect();

        let bounds = spec.internal_bounds();
        let l = ParzenEstimator::fit(&good, bounds, self.prior_weight)?;
        let g = ParzenEstimator::fit(&bad, bounds, self.prior_weight)?;

        let mut best: Option<(f64, f64)> = None;
        for _ in 0..self.n_candidates {
            let x = l.sample(&mut self.rng);
            let score = l.log_pdf(x) - g.log_pdf(x);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((x, score));
            }
        }
        best.map(|(x, _)| x)
    }
}

impl Sampler for TpeSampler {
    fn sample(&mut self, space: &SearchSpace, history: &[Trial], direction: Direction) -> Params {
        let mut completed: Vec<(&Params, f64)> = history
            .iter()
            .filter(|t| t.is_complete())
            .filter_map(|t| t.value.map(|v| (&t.params, v)))
            .collect();
        if completed.len() < self.n_startup.max(1) {
            return space.sample(&mut self.rng);
        }
        completed.sort_by(|a, b| direction.ordering(a.1, b.1));

        let mut params = Params::new();
        for spec in space.params() {
            let observed: Vec<(f64, f64)> = completed
                .iter()
                .filter_map(|(p, v)| {
                    let x = spec.to_internal(p.get(spec.name())?)?;
                    Some((x, *v))
                })
                .collect();
            let value = if observed.is_empty() {
                spec.sample(&mut self.rng)
            } else {
                match self.sample_param(spec, &observed) {
                    Some(x) => spec.from_internal(x),
                    None => spec.sample(&mut self.rng),
                }
            };
            params.insert(spec.name().to_string(), value);
        }
        params
    }

    fn name(&self) -> &'static str {
        "tpe"
    }
}

/// Number of trials treated as good out of `n`.
pub fn gamma(n: usize) -> usize {
    ((n as f64 * 0.1).ceil() as usize).min(25)
}

/// Mixture of Gaussians truncated to `[low, high]`.
#[derive(Debug, Clone)]
struct ParzenEstimator {
    weights: Vec<f64>,
    means: Vec<f64>,
    components: Vec<Normal>,
    /// Probability mass of each component inside `[low, high]`.
    masses: Vec<f64>,
    low: f64,
    high: f64,
}

impl ParzenEstimator {
    /// One component per observation plus a prior centred on the range
    /// with the range as its width. Each bandwidth is the larger gap to
    /// its sorted neighbours (range ends included), clipped to
    /// `[range / min(100, n + 1), range]`.
    ///
    /// `None` if a bound or observation is not finite.
    fn fit(observations: &[f64], (low, high): (f64, f64), prior_weight: f64) -> Option<Self> {
        let range = (high - low).max(f64::EPSILON);
        let n = observations.len();

        let mut sorted: Vec<f64> = observations.to_vec();
        sorted.sort_by(f64::total_cmp);
        let min_sigma = range / (100.0f64).min(n as f64 + 1.0);

        let mut means = Vec::with_capacity(n + 1);
        let mut components = Vec::with_capacity(n + 1);
        for (i, &mu) in sorted.iter().enumerate() {
            let left = if i == 0 { low } else { sorted[i - 1] };
            let right = if i + 1 == n { high } else { sorted[i + 1] };
            let sigma = (mu - left).max(right - mu).clamp(min_sigma, range);
            means.push(mu);
            components.push(Normal::new(mu, sigma).ok()?);
        }
        means.push(0.5 * (low + high));
        components.push(Normal::new(0.5 * (low + high), range).ok()?);

        let masses = components
            .iter()
            .map(|c| c.cdf(high) - c.cdf(low))
            .collect();

        let mut weights = vec![1.0; n];
        weights.push(prior_weight);
        let total: f64 = weights.iter().sum();
        weights.iter_mut().for_each(|w| *w /= total);

        Some(Self {
            weights,
            means,
            components,
            masses,
            low,
            high,
        })
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.gen();
        let mut acc = 0.0;
        let mut k = self.weights.len() - 1;
        for (i, w) in self.weights.iter().enumerate() {
            acc += w;
            if u < acc {
                k = i;
                break;
            }
        }
        // rejection sampling, falling back to the component mean
        for _ in 0..64 {
            let x = self.components[k].sample(rng);
            if (self.low..=self.high).contains(&x) {
                return x;
            }
        }
        self.means[k].clamp(self.low, self.high)
    }

    fn log_pdf(&self, x: f64) -> f64 {
        let density: f64 = self
            .weights
            .iter()
            .zip(&self.components)
            .zip(&self.masses)
            .filter(|(_, mass)| **mass > 0.0)
            .map(|((w, c), mass)| w * c.pdf(x) / mass)
            .sum();
        density.max(f64::MIN_POSITIVE).ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::space::ParamValue;
    use crate::search::study::TrialState;

    fn trial(number: usize, x: f64, value: f64) -> Trial {
        let mut params = Params::new();
        params.insert("x".into(), ParamValue::Float(x));
        Trial {
            number,
            params,
            value: Some(value),
            state: TrialState::Complete,
            error: None,
        }
    }

    #[test]
    fn test_gamma() {
        assert_eq!(gamma(1), 1);
        assert_eq!(gamma(10), 1);
        assert_eq!(gamma(11), 2);
        assert_eq!(gamma(100), 10);
        assert_eq!(gamma(1000), 25);
    }

    #[test]
    fn test_parzen_density_integrates_to_one() {
        let est = ParzenEstimator::fit(&[0.2, 0.25, 0.9], (0.0, 1.0), 1.0).unwrap();
        let steps = 10_000;
        let h = 1.0 / steps as f64;
        let integral: f64 = (0..steps)
            .map(|i| est.log_pdf((i as f64 + 0.5) * h).exp() * h)
            .sum();
        assert!((integral - 1.0).abs() < 1e-3, "{integral}");
    }

    #[test]
    fn test_parzen_rejects_non_finite_observations() {
        assert!(ParzenEstimator::fit(&[0.5, f64::NAN], (0.0, 1.0), 1.0).is_none());
    }

    #[test]
    fn test_parzen_samples_stay_in_bounds() {
        let est = ParzenEstimator::fit(&[-0.99, 0.99], (-1.0, 1.0), 1.0).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(0);
        for _ in 0..1000 {
            let x = est.sample(&mut rng);
            assert!((-1.0..=1.0).contains(&x));
        }
    }

    #[test]
    fn test_tpe_random_during_startup() {
        let space = SearchSpace::default().with(ParamSpec::float("x", 0.0, 1.0));
        let mut a = TpeSampler::new(9);
        let mut b = RandomSampler::new(9);
        let history: Vec<Trial> = (0..5).map(|i| trial(i, 0.5, 1.0)).collect();
        assert_eq!(
            a.sample(&space, &history, Direction::Minimize),
            b.sample(&space, &history, Direction::Minimize)
        );
    }

    #[test]
    fn test_tpe_concentrates_near_good_region() {
        let space = SearchSpace::default().with(ParamSpec::float("x", 0.0, 10.0));
        // objective (x - 2)^2 observed on a grid
        let history: Vec<Trial> = (0..40)
            .map(|i| {
                let x = i as f64 * 0.25;
                trial(i, x, (x - 2.0).powi(2))
            })
            .collect();
        let mut tpe = TpeSampler::new(1);
        let near = (0..50)
            .filter(|_| {
                let p = tpe.sample(&space, &history, Direction::Minimize);
                (p["x"].as_f64() - 2.0).abs() < 1.5
            })
            .count();
        assert!(near > 30, "{near}");
    }
}
