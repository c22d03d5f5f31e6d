//! Confidence intervals for the mean and their empirical coverage rate.
//!
//! An interval is `sample_mean ± multiplier × standard_error`. Whether it captures
//! the true mean is decided once, when it is built, and stored with it. A
//! [`CoverageTracker`] collects intervals from repeated experiments and reports the
//! fraction that captured the truth; for a correct 95% procedure that fraction
//! settles near 0.95.
//!
//! The engine never picks a confidence level on its own: the multiplier is always
//! supplied by the caller (1.96 for an exact 95% normal interval, 2.0 as the
//! classroom rounding).

use rand::Rng;
use samplab_engine::SampleSource;
use samplab_stats::descriptive::InsufficientSampleSizeError;
use serde::Serialize;

use crate::trials::SampleSize;

#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display, derive_more::Error)]
pub enum IntervalError {
    #[display("standard error must be positive and finite, got {standard_error}")]
    InvalidStandardError { standard_error: f64 },
    #[display("multiplier must be positive and finite, got {multiplier}")]
    InvalidMultiplier { multiplier: f64 },
}

/// One interval estimate of a mean, with its capture flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub sample_mean: f64,
    pub standard_error: f64,
    pub multiplier: f64,
    pub lower: f64,
    pub upper: f64,
    /// Whether `lower <= true_mean <= upper` held at construction.
    pub captured: bool,
}

impl ConfidenceInterval {
    /// Builds `sample_mean ± multiplier × standard_error` and checks it against `true_mean`.
    ///
    /// # Errors
    ///
    /// - [`IntervalError::InvalidStandardError`] if `standard_error` is not positive and finite
    /// - [`IntervalError::InvalidMultiplier`] if `multiplier` is not a positive finite number
    ///
    /// # Examples
    ///
    /// ```
    /// use samplab_experiment::interval::ConfidenceInterval;
    ///
    /// let ci = ConfidenceInterval::build(10.0, 0.5, 2.0, 10.8).unwrap();
    /// assert_eq!((ci.lower, ci.upper), (9.0, 11.0));
    /// assert!(ci.captured);
    ///
    /// assert!(ConfidenceInterval::build(10.0, 0.0, 2.0, 10.0).is_err());
    /// ```
    pub fn build(
        sample_mean: f64,
        standard_error: f64,
        multiplier: f64,
        true_mean: f64,
    ) -> Result<Self, IntervalError> {
        if !(standard_error.is_finite() && standard_error > 0.0) {
            return Err(IntervalError::InvalidStandardError { standard_error });
        }
        if !(multiplier.is_finite() && multiplier > 0.0) {
            return Err(IntervalError::InvalidMultiplier { multiplier });
        }
        let half_width = multiplier * standard_error;
        let lower = sample_mean - half_width;
        let upper = sample_mean + half_width;
        Ok(Self {
            sample_mean,
            standard_error,
            multiplier,
            lower,
            upper,
            captured: lower <= true_mean && true_mean <= upper,
        })
    }

    #[must_use]
    pub fn half_width(&self) -> f64 {
        self.multiplier * self.standard_error
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum CoverageState {
    Empty,
    Accumulating,
}

/// Point-in-time summary of a [`CoverageTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageSummary {
    pub total: usize,
    pub captured: usize,
    /// `None` until the first interval is recorded.
    pub capture_rate: Option<f64>,
}

/// Append-only record of constructed intervals and their capture rate.
///
/// Owned by a single experiment; callers sharing one across threads must serialise
/// access themselves.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoverageTracker {
    intervals: Vec<ConfidenceInterval>,
    captured: usize,
}

impl CoverageTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, interval: ConfidenceInterval) {
        self.captured += usize::from(interval.captured);
        self.intervals.push(interval);
    }

    pub fn reset(&mut self) {
        self.intervals.clear();
        self.captured = 0;
    }

    #[must_use]
    pub fn state(&self) -> CoverageState {
        if self.intervals.is_empty() {
            CoverageState::Empty
        } else {
            CoverageState::Accumulating
        }
    }

    #[must_use]
    pub fn intervals(&self) -> &[ConfidenceInterval] {
        &self.intervals
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    #[must_use]
    pub fn captured_count(&self) -> usize {
        self.captured
    }

    /// Fraction of recorded intervals that captured the true mean.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn capture_rate(&self) -> Option<f64> {
        (!self.intervals.is_empty()).then(|| self.captured as f64 / self.intervals.len() as f64)
    }

    #[must_use]
    pub fn summary(&self) -> CoverageSummary {
        CoverageSummary {
            total: self.len(),
            captured: self.captured,
            capture_rate: self.capture_rate(),
        }
    }
}

/// Where the standard error of each interval comes from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, derive_more::FromStr)]
#[serde(rename_all = "kebab-case")]
pub enum StandardErrorMode {
    /// `σ / √n` using the source's true standard deviation.
    #[default]
    Known,
    /// `s / √n` using each sample's corrected standard deviation.
    Estimated,
}

#[derive(
    Debug, Clone, Copy, PartialEq, derive_more::Display, derive_more::Error, derive_more::From,
)]
pub enum CoverageError {
    #[display("{_0}")]
    InsufficientSampleSize(InsufficientSampleSizeError),
    #[display("{_0}")]
    Interval(IntervalError),
}

/// Parameters of a repeated interval-construction experiment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageExperiment {
    pub sample_size: usize,
    pub intervals: usize,
    pub multiplier: f64,
    pub standard_error: StandardErrorMode,
}

impl CoverageExperiment {
    /// Draws `intervals` samples, builds one interval from each and records them all
    /// into `tracker`.
    ///
    /// Existing intervals in `tracker` are kept; call [`CoverageTracker::reset`] first
    /// for a fresh rate.
    ///
    /// # Errors
    ///
    /// Fails before drawing anything if `sample_size < 2` or the multiplier is invalid.
    /// Fails with [`IntervalError::InvalidStandardError`] when a standard error is zero,
    /// which happens with [`StandardErrorMode::Estimated`] whenever a sample has no
    /// spread (e.g. a small Bernoulli sample of all zeros). Intervals recorded before the
    /// failure stay in the tracker.
    ///
    /// # Examples
    ///
    /// ```
    /// use samplab_engine::{DistributionSpec, SampleRng, SampleSeed};
    /// use samplab_experiment::interval::{CoverageExperiment, CoverageTracker, StandardErrorMode};
    ///
    /// let experiment = CoverageExperiment {
    ///     sample_size: 25,
    ///     intervals: 500,
    ///     multiplier: 1.96,
    ///     standard_error: StandardErrorMode::Known,
    /// };
    /// let mut tracker = CoverageTracker::new();
    /// let mut rng = SampleRng::new(SampleSeed::from_bytes([6; 16]));
    /// let summary = experiment
    ///     .run(&DistributionSpec::standard_normal(), &mut tracker, &mut rng)
    ///     .unwrap();
    /// assert_eq!(summary.total, 500);
    /// assert!((summary.capture_rate.unwrap() - 0.95).abs() < 0.05);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    pub fn run<S, R>(
        &self,
        source: &S,
        tracker: &mut CoverageTracker,
        rng: &mut R,
    ) -> Result<CoverageSummary, CoverageError>
    where
        S: SampleSource + ?Sized,
        R: Rng + ?Sized,
    {
        let n = SampleSize::new(self.sample_size)?;
        if !(self.multiplier.is_finite() && self.multiplier > 0.0) {
            return Err(IntervalError::InvalidMultiplier {
                multiplier: self.multiplier,
            }
            .into());
        }
        let sqrt_n = (n.get() as f64).sqrt();
        let true_mean = source.true_mean();

        for _ in 0..self.intervals {
            let stats = source.draw_sample(n.get(), rng).statistics()?;
            let std_dev = match self.standard_error {
                StandardErrorMode::Known => source.true_std(),
                StandardErrorMode::Estimated => stats.std_dev,
            };
            let interval = ConfidenceInterval::build(
                stats.mean,
                std_dev / sqrt_n,
                self.multiplier,
                true_mean,
            )?;
            tracker.record(interval);
        }
        Ok(tracker.summary())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;
    use samplab_engine::DistributionSpec;

    use super::*;

    fn experiment(
        mode: StandardErrorMode,
        multiplier: f64,
        intervals: usize,
    ) -> CoverageExperiment {
        CoverageExperiment {
            sample_size: 30,
            intervals,
            multiplier,
            standard_error: mode,
        }
    }

    #[test]
    fn test_build_bounds_and_capture() {
        let ci = ConfidenceInterval::build(5.0, 1.0, 1.96, 6.0).unwrap();
        assert!((ci.lower - 3.04).abs() < 1e-12);
        assert!((ci.upper - 6.96).abs() < 1e-12);
        assert!(ci.captured);
        assert!((ci.half_width() - 1.96).abs() < 1e-12);

        let miss = ConfidenceInterval::build(5.0, 1.0, 1.96, 7.0).unwrap();
        assert!(!miss.captured);
        assert!(miss.contains(5.0));
    }

    #[test]
    fn test_capture_is_inclusive_at_bounds() {
        let ci = ConfidenceInterval::build(0.0, 1.0, 2.0, 2.0).unwrap();
        assert!(ci.captured);
        let ci = ConfidenceInterval::build(0.0, 1.0, 2.0, -2.0).unwrap();
        assert!(ci.captured);
    }

    #[test]
    fn test_invalid_standard_error() {
        for se in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                ConfidenceInterval::build(0.0, se, 1.96, 0.0),
                Err(IntervalError::InvalidStandardError { .. })
            ));
        }
        assert!(matches!(
            ConfidenceInterval::build(0.0, 1.0, -1.0, 0.0),
            Err(IntervalError::InvalidMultiplier { .. })
        ));
    }

    #[test]
    fn test_tracker_state_machine() {
        let mut tracker = CoverageTracker::new();
        assert!(tracker.state().is_empty());
        assert_eq!(tracker.capture_rate(), None);

        tracker.record(ConfidenceInterval::build(0.0, 1.0, 2.0, 0.0).unwrap());
        tracker.record(ConfidenceInterval::build(0.0, 1.0, 2.0, 5.0).unwrap());
        assert!(tracker.state().is_accumulating());
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.captured_count(), 1);
        assert_eq!(tracker.capture_rate(), Some(0.5));

        tracker.reset();
        assert!(tracker.state().is_empty());
        assert!(tracker.is_empty());
        assert_eq!(tracker.summary().captured, 0);
    }

    #[test]
    fn test_known_standard_error_coverage_is_near_95_percent() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut tracker = CoverageTracker::new();
        let summary = experiment(StandardErrorMode::Known, 1.96, 2_000)
            .run(&DistributionSpec::normal(50.0, 10.0).unwrap(), &mut tracker, &mut rng)
            .unwrap();
        assert_eq!(summary.total, 2_000);
        let rate = summary.capture_rate.unwrap();
        assert!((rate - 0.95).abs() < 0.03, "capture rate {rate}");
    }

    #[test]
    fn test_estimated_standard_error_coverage() {
        let mut rng = Pcg32::seed_from_u64(2);
        let mut tracker = CoverageTracker::new();
        // t-quantile for 29 degrees of freedom is 2.045, so 1.96 slightly undercovers
        let rate = experiment(StandardErrorMode::Estimated, 1.96, 2_000)
            .run(&DistributionSpec::exponential(0.5).unwrap(), &mut tracker, &mut rng)
            .unwrap()
            .capture_rate
            .unwrap();
        assert!((0.88..0.97).contains(&rate), "capture rate {rate}");
    }

    #[test]
    fn test_narrow_multiplier_lowers_coverage() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut tracker = CoverageTracker::new();
        let rate = experiment(StandardErrorMode::Known, 1.0, 2_000)
            .run(&DistributionSpec::die(), &mut tracker, &mut rng)
            .unwrap()
            .capture_rate
            .unwrap();
        // P(|Z| <= 1) ≈ 0.683
        assert!((rate - 0.683).abs() < 0.04, "capture rate {rate}");
    }

    #[test]
    fn test_reset_and_rerun_is_statistically_equivalent() {
        let mut rng = Pcg32::seed_from_u64(4);
        let source = DistributionSpec::binomial(20, 0.4).unwrap();
        let run = experiment(StandardErrorMode::Known, 2.0, 1_000);
        let mut tracker = CoverageTracker::new();

        let first = run.run(&source, &mut tracker, &mut rng).unwrap();
        tracker.reset();
        assert_eq!(tracker.len(), 0);
        let second = run.run(&source, &mut tracker, &mut rng).unwrap();

        assert_eq!(first.total, second.total);
        let (a, b) = (first.capture_rate.unwrap(), second.capture_rate.unwrap());
        assert!((a - b).abs() < 0.04, "{a} vs {b}");
    }

    #[test]
    fn test_run_rejects_invalid_inputs_before_sampling() {
        let mut rng = Pcg32::seed_from_u64(5);
        let mut tracker = CoverageTracker::new();
        let mut run = experiment(StandardErrorMode::Known, 1.96, 10);
        run.sample_size = 1;
        assert!(matches!(
            run.run(&DistributionSpec::die(), &mut tracker, &mut rng),
            Err(CoverageError::InsufficientSampleSize(_))
        ));
        run.sample_size = 10;
        run.multiplier = 0.0;
        assert!(matches!(
            run.run(&DistributionSpec::die(), &mut tracker, &mut rng),
            Err(CoverageError::Interval(IntervalError::InvalidMultiplier { .. }))
        ));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_degenerate_estimated_standard_error_is_reported() {
        let mut rng = Pcg32::seed_from_u64(6);
        let mut tracker = CoverageTracker::new();
        let run = CoverageExperiment {
            sample_size: 2,
            intervals: 1_000,
            multiplier: 1.96,
            standard_error: StandardErrorMode::Estimated,
        };
        // with p = 0.01 both draws are almost always zero
        let result = run.run(&DistributionSpec::bernoulli(0.01).unwrap(), &mut tracker, &mut rng);
        assert!(matches!(
            result,
            Err(CoverageError::Interval(IntervalError::InvalidStandardError { .. }))
        ));
    }

    #[test]
    fn test_standard_error_mode_from_str() {
        assert_eq!("known".parse::<StandardErrorMode>().unwrap(), StandardErrorMode::Known);
        assert_eq!(
            "Estimated".parse::<StandardErrorMode>().unwrap(),
            StandardErrorMode::Estimated
        );
    }
}
