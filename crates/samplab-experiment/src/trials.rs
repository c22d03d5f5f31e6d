//! Repeated "draw a sample, compute its statistics" trials against a known truth.
//!
//! A trial draws one fresh sample of size `n` from a [`SampleSource`], computes its
//! [`SampleStatistics`] and records how far the sample mean and standard deviation
//! are from the source's true values. [`run_trials`] repeats this `T` times and
//! averages the errors into a [`TrialAggregate`].
//!
//! # Choosing the trial count
//!
//! The per-point cost is `T × n`. [`TrialCountPolicy::Auto`] keeps that product
//! roughly constant across sample sizes (about one million draws per point, with
//! `T` clamped to `[1000, 100000]`) so that small and large `n` get equally smooth
//! error estimates. Any count large enough for the reported error to stop jittering
//! between runs is acceptable; this is a smoothness trade-off, not a correctness
//! requirement.
//!
//! # Parallelism
//!
//! Trials share no mutable state. [`run_trials_parallel`] splits them across scoped
//! worker threads, each with its own generator [forked](SampleRng::fork) from the
//! caller's, and merges the per-worker sums. A worker budget should be imposed by
//! lowering `T`, never by interrupting a batch halfway (that would bias the average).

use std::{num::NonZeroUsize, thread};

use rand::Rng;
use samplab_engine::{SampleRng, SampleSource};
use samplab_stats::descriptive::{InsufficientSampleSizeError, SampleStatistics};
use serde::Serialize;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error, derive_more::From,
)]
pub enum TrialError {
    #[display("{_0}")]
    InsufficientSampleSize(InsufficientSampleSizeError),
    #[display("trial count must be positive")]
    #[from(ignore)]
    NoTrials,
}

/// A sample size for which the corrected standard deviation is defined (`n >= 2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SampleSize(pub(crate) usize);

impl SampleSize {
    pub const MIN: Self = Self(2);

    pub fn new(n: usize) -> Result<Self, InsufficientSampleSizeError> {
        if n < 2 {
            return Err(InsufficientSampleSizeError { len: n });
        }
        Ok(Self(n))
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

/// How many trials to run for a given sample size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum TrialCountPolicy {
    /// The same number of trials for every sample size.
    Fixed { trials: NonZeroUsize },
    /// `target_work / n` trials, clamped to `[min_trials, max_trials]`.
    Auto {
        target_work: usize,
        min_trials: usize,
        max_trials: usize,
    },
}

impl Default for TrialCountPolicy {
    fn default() -> Self {
        Self::AUTO
    }
}

impl TrialCountPolicy {
    pub const AUTO: Self = Self::Auto {
        target_work: 1_000_000,
        min_trials: 1_000,
        max_trials: 100_000,
    };

    #[must_use]
    pub const fn fixed(trials: NonZeroUsize) -> Self {
        Self::Fixed { trials }
    }

    /// Returns the number of trials to run at sample size `n`.
    ///
    /// # Examples
    ///
    /// ```
    /// use samplab_experiment::trials::{SampleSize, TrialCountPolicy};
    ///
    /// let policy = TrialCountPolicy::AUTO;
    /// assert_eq!(policy.trials_for(SampleSize::new(5).unwrap()).get(), 100_000);
    /// assert_eq!(policy.trials_for(SampleSize::new(100).unwrap()).get(), 10_000);
    /// assert_eq!(policy.trials_for(SampleSize::new(5_000).unwrap()).get(), 1_000);
    /// ```
    #[must_use]
    pub fn trials_for(&self, n: SampleSize) -> NonZeroUsize {
        match *self {
            Self::Fixed { trials } => trials,
            Self::Auto {
                target_work,
                min_trials,
                max_trials,
            } => {
                let trials = (target_work / n.get()).clamp(min_trials, max_trials.max(min_trials));
                NonZeroUsize::new(trials).unwrap_or(NonZeroUsize::MIN)
            }
        }
    }
}

/// Average error of the sample statistics over many trials at one sample size.
///
/// Percentage errors are `|estimate - truth| / |truth| × 100`, averaged over the
/// trials. They are `None` when the truth is zero (e.g. the mean of a standard
/// normal), in which case only the absolute errors are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrialAggregate {
    pub sample_size: usize,
    pub trials: usize,
    pub true_mean: f64,
    pub true_std: f64,
    /// Mean of the sample means.
    pub average_mean: f64,
    /// Mean of the (corrected) sample standard deviations.
    pub average_std: f64,
    pub mean_abs_error_of_mean: f64,
    pub mean_abs_error_of_std: f64,
    pub mean_abs_pct_error_of_mean: Option<f64>,
    pub mean_abs_pct_error_of_std: Option<f64>,
}

/// Running sums of one batch of trials; batches from different workers are merged.
#[derive(Debug, Clone, Copy, Default)]
struct TrialAccumulator {
    trials: usize,
    sum_mean: f64,
    sum_std: f64,
    sum_abs_error_mean: f64,
    sum_abs_error_std: f64,
}

impl TrialAccumulator {
    fn add(&mut self, stats: &SampleStatistics, true_mean: f64, true_std: f64) {
        self.trials += 1;
        self.sum_mean += stats.mean;
        self.sum_std += stats.std_dev;
        self.sum_abs_error_mean += (stats.mean - true_mean).abs();
        self.sum_abs_error_std += (stats.std_dev - true_std).abs();
    }

    fn merge(mut self, other: Self) -> Self {
        self.trials += other.trials;
        self.sum_mean += other.sum_mean;
        self.sum_std += other.sum_std;
        self.sum_abs_error_mean += other.sum_abs_error_mean;
        self.sum_abs_error_std += other.sum_abs_error_std;
        self
    }

    #[expect(clippy::cast_precision_loss)]
    fn finish(self, n: SampleSize, true_mean: f64, true_std: f64) -> TrialAggregate {
        let t = self.trials as f64;
        let mean_abs_error_of_mean = self.sum_abs_error_mean / t;
        let mean_abs_error_of_std = self.sum_abs_error_std / t;
        TrialAggregate {
            sample_size: n.get(),
            trials: self.trials,
            true_mean,
            true_std,
            average_mean: self.sum_mean / t,
            average_std: self.sum_std / t,
            mean_abs_error_of_mean,
            mean_abs_error_of_std,
            mean_abs_pct_error_of_mean: percent_of(mean_abs_error_of_mean, true_mean),
            mean_abs_pct_error_of_std: percent_of(mean_abs_error_of_std, true_std),
        }
    }
}

fn percent_of(error: f64, truth: f64) -> Option<f64> {
    (truth != 0.0).then(|| error / truth.abs() * 100.0)
}

fn accumulate<S, R>(source: &S, n: SampleSize, trials: usize, rng: &mut R) -> TrialAccumulator
where
    S: SampleSource + ?Sized,
    R: Rng + ?Sized,
{
    let true_mean = source.true_mean();
    let true_std = source.true_std();
    let mut acc = TrialAccumulator::default();
    let mut buffer = Vec::with_capacity(n.get());
    for _ in 0..trials {
        buffer.clear();
        buffer.extend((0..n.get()).map(|_| source.draw(rng)));
        let stats =
            SampleStatistics::compute(&buffer).expect("sample size is at least 2 by construction");
        acc.add(&stats, true_mean, true_std);
    }
    acc
}

/// Runs `trials` trials on the current thread with already validated inputs.
pub(crate) fn run_validated<S, R>(
    source: &S,
    n: SampleSize,
    trials: NonZeroUsize,
    rng: &mut R,
) -> TrialAggregate
where
    S: SampleSource + ?Sized,
    R: Rng + ?Sized,
{
    accumulate(source, n, trials.get(), rng).finish(n, source.true_mean(), source.true_std())
}

fn validate(n: usize, trials: usize) -> Result<(SampleSize, NonZeroUsize), TrialError> {
    let n = SampleSize::new(n)?;
    let trials = NonZeroUsize::new(trials).ok_or(TrialError::NoTrials)?;
    Ok((n, trials))
}

/// Runs `trials` independent trials of sample size `n` on the current thread.
///
/// # Errors
///
/// - [`TrialError::InsufficientSampleSize`] if `n < 2`
/// - [`TrialError::NoTrials`] if `trials == 0`
///
/// # Examples
///
/// ```
/// use samplab_engine::{DistributionSpec, SampleRng, SampleSeed};
/// use samplab_experiment::trials::run_trials;
///
/// let mut rng = SampleRng::new(SampleSeed::from_bytes([1; 16]));
/// let die = DistributionSpec::die();
/// let aggregate = run_trials(&die, 50, 2_000, &mut rng).unwrap();
/// assert_eq!(aggregate.trials, 2_000);
/// assert!((aggregate.average_mean - 3.5).abs() < 0.05);
/// assert!(aggregate.mean_abs_pct_error_of_mean.unwrap() < 10.0);
/// ```
pub fn run_trials<S, R>(
    source: &S,
    n: usize,
    trials: usize,
    rng: &mut R,
) -> Result<TrialAggregate, TrialError>
where
    S: SampleSource + ?Sized,
    R: Rng + ?Sized,
{
    let (n, trials) = validate(n, trials)?;
    Ok(run_validated(source, n, trials, rng))
}

/// Like [`run_trials`], but spreads the trials over up to `workers` threads.
///
/// Each worker gets a generator forked from `rng` before any thread starts, so the
/// result is reproducible for a given seed and worker count.
pub fn run_trials_parallel<S>(
    source: &S,
    n: usize,
    trials: usize,
    workers: NonZeroUsize,
    rng: &mut SampleRng,
) -> Result<TrialAggregate, TrialError>
where
    S: SampleSource + Sync + ?Sized,
{
    let (n, trials) = validate(n, trials)?;
    let workers = workers.get().min(trials.get());
    let base = trials.get() / workers;
    let extra = trials.get() % workers;
    let batches: Vec<(usize, SampleRng)> = (0..workers)
        .map(|i| (base + usize::from(i < extra), rng.fork()))
        .collect();

    let total = thread::scope(|s| {
        let handles: Vec<_> = batches
            .into_iter()
            .map(|(count, mut worker_rng)| {
                s.spawn(move || accumulate(source, n, count, &mut worker_rng))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .fold(TrialAccumulator::default(), TrialAccumulator::merge)
    });
    Ok(total.finish(n, source.true_mean(), source.true_std()))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;
    use samplab_engine::{DistributionSpec, EmpiricalPopulation, SampleSeed};

    use super::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_invalid_inputs() {
        let mut rng = Pcg32::seed_from_u64(0);
        let die = DistributionSpec::die();
        assert_eq!(
            run_trials(&die, 1, 10, &mut rng).unwrap_err(),
            TrialError::InsufficientSampleSize(InsufficientSampleSizeError { len: 1 })
        );
        assert_eq!(
            run_trials(&die, 10, 0, &mut rng).unwrap_err(),
            TrialError::NoTrials
        );
        assert!(matches!(
            TrialError::from(InsufficientSampleSizeError { len: 0 }),
            TrialError::InsufficientSampleSize(_)
        ));
    }

    #[test]
    fn test_auto_policy_targets_constant_work() {
        let policy = TrialCountPolicy::default();
        assert_eq!(policy.trials_for(SampleSize::MIN).get(), 100_000);
        assert_eq!(policy.trials_for(SampleSize::new(500).unwrap()).get(), 2_000);
        assert_eq!(policy.trials_for(SampleSize::new(2_000).unwrap()).get(), 1_000);

        let fixed = TrialCountPolicy::fixed(nz(321));
        assert_eq!(fixed.trials_for(SampleSize::new(7).unwrap()).get(), 321);
    }

    #[test]
    fn test_mean_of_estimates_is_close_to_truth() {
        let mut rng = Pcg32::seed_from_u64(1);
        let spec = DistributionSpec::normal(10.0, 3.0).unwrap();
        let aggregate = run_trials(&spec, 20, 10_000, &mut rng).unwrap();
        assert!((aggregate.average_mean - 10.0).abs() < 0.05);
        // the corrected std is still biased low, by roughly 1.3% at n = 20
        assert!((aggregate.average_std - 3.0).abs() < 0.1);
        assert_eq!(aggregate.sample_size, 20);
        assert_eq!(aggregate.trials, 10_000);
    }

    #[test]
    fn test_percentage_errors() {
        let mut rng = Pcg32::seed_from_u64(2);
        let spec = DistributionSpec::exponential(1.0).unwrap();
        let aggregate = run_trials(&spec, 100, 5_000, &mut rng).unwrap();
        let pct_mean = aggregate.mean_abs_pct_error_of_mean.unwrap();
        let pct_std = aggregate.mean_abs_pct_error_of_std.unwrap();
        // E|mean - 1| = sqrt(2 / pi) / sqrt(100) ≈ 8%
        assert!((5.0..11.0).contains(&pct_mean), "{pct_mean}");
        assert!(pct_std > 0.0);
        assert!((pct_mean - aggregate.mean_abs_error_of_mean * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_truth_has_no_percentage() {
        let mut rng = Pcg32::seed_from_u64(3);
        let aggregate =
            run_trials(&DistributionSpec::standard_normal(), 10, 1_000, &mut rng).unwrap();
        assert_eq!(aggregate.mean_abs_pct_error_of_mean, None);
        assert!(aggregate.mean_abs_pct_error_of_std.is_some());
        assert!(aggregate.mean_abs_error_of_mean > 0.0);
    }

    #[test]
    fn test_error_shrinks_with_sample_size() {
        let mut rng = Pcg32::seed_from_u64(4);
        let spec = DistributionSpec::poisson(4.0).unwrap();
        let small = run_trials(&spec, 10, 5_000, &mut rng).unwrap();
        let large = run_trials(&spec, 400, 5_000, &mut rng).unwrap();
        assert!(large.mean_abs_error_of_mean < small.mean_abs_error_of_mean);
        assert!(large.mean_abs_error_of_std < small.mean_abs_error_of_std);
    }

    #[test]
    fn test_empirical_source() {
        let mut rng = Pcg32::seed_from_u64(5);
        let observations: Vec<f64> = (1..=100).map(f64::from).collect();
        let population = EmpiricalPopulation::new(observations).unwrap();
        let aggregate = run_trials(&population, 50, 4_000, &mut rng).unwrap();
        assert!((aggregate.average_mean - 50.5).abs() < 0.5);
        assert_eq!(aggregate.true_mean, 50.5);
    }

    #[test]
    fn test_parallel_matches_serial_statistically() {
        let spec = DistributionSpec::die();
        let mut rng = SampleRng::new(SampleSeed::from_bytes([9; 16]));
        let parallel = run_trials_parallel(&spec, 30, 20_001, nz(4), &mut rng).unwrap();
        assert_eq!(parallel.trials, 20_001);
        assert!((parallel.average_mean - 3.5).abs() < 0.02);

        let serial = run_trials(&spec, 30, 20_000, &mut rng).unwrap();
        assert!((parallel.mean_abs_error_of_mean - serial.mean_abs_error_of_mean).abs() < 0.02);
    }

    #[test]
    fn test_parallel_is_reproducible_from_seed() {
        let spec = DistributionSpec::bernoulli(0.3).unwrap();
        let seed = SampleSeed::from_bytes([4; 16]);
        let a = run_trials_parallel(&spec, 12, 999, nz(3), &mut SampleRng::new(seed)).unwrap();
        let b = run_trials_parallel(&spec, 12, 999, nz(3), &mut SampleRng::new(seed)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_more_workers_than_trials() {
        let mut rng = SampleRng::new(SampleSeed::from_bytes([0; 16]));
        let aggregate =
            run_trials_parallel(&DistributionSpec::die(), 5, 3, nz(16), &mut rng).unwrap();
        assert_eq!(aggregate.trials, 3);
    }
}
