//! Error curves of sample statistics as the sample size grows.
//!
//! A [`ConvergenceGenerator`] runs the trial runner once per entry of a strictly
//! increasing [`SampleSizeSchedule`] and produces one [`TrialAggregate`] per sample
//! size. By the Law of Large Numbers the errors trend towards zero as `n` grows,
//! but consecutive points are Monte Carlo estimates and are not guaranteed to
//! decrease monotonically.
//!
//! # Generation modes
//!
//! - [`ConvergenceGenerator::steps`] - a lazy iterator yielding one point at a time,
//!   so a caller can render partial progress (e.g. one point per frame) or stop early.
//!   Every call starts a fresh run.
//! - [`ConvergenceGenerator::generate`] - drains the iterator into a new curve.
//! - [`ConvergenceGenerator::generate_into`] - fills a caller-owned curve, checking a
//!   [`CancelToken`] between sample sizes.
//! - [`ConvergenceGenerator::generate_parallel`] - computes sample sizes concurrently
//!   and exposes them in schedule order.
//!
//! Cancellation is only observed between sample sizes. A cancelled run leaves the
//! curve holding the completed prefix of the schedule and never a partial point.

use std::{
    iter::FusedIterator,
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
};

use rand::Rng;
use samplab_engine::{SampleRng, SampleSource};
use serde::Serialize;

use crate::trials::{self, SampleSize, TrialAggregate, TrialCountPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ScheduleError {
    #[display("sample-size schedule must not be empty")]
    Empty,
    #[display("sample size {size} is too small, at least 2 is required")]
    TooSmall { size: usize },
    #[display("sample sizes must be strictly increasing, got {next} after {previous}")]
    NotIncreasing { previous: usize, next: usize },
}

/// A non-empty, strictly increasing list of sample sizes, each at least 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SampleSizeSchedule(Vec<SampleSize>);

impl SampleSizeSchedule {
    /// Sample sizes used by the lecture's convergence charts.
    pub const LECTURE: [usize; 20] = [
        5, 8, 10, 12, 15, 20, 25, 30, 40, 50, 60, 75, 100, 125, 150, 200, 250, 300, 400, 500,
    ];

    /// Validates and wraps `sizes`.
    ///
    /// # Examples
    ///
    /// ```
    /// use samplab_experiment::convergence::SampleSizeSchedule;
    ///
    /// let schedule = SampleSizeSchedule::new([10, 50, 200, 500]).unwrap();
    /// assert_eq!(schedule.len(), 4);
    ///
    /// assert!(SampleSizeSchedule::new([10, 10]).is_err());
    /// assert!(SampleSizeSchedule::new([1, 10]).is_err());
    /// ```
    pub fn new<I>(sizes: I) -> Result<Self, ScheduleError>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut validated: Vec<SampleSize> = vec![];
        for size in sizes {
            let next = SampleSize::new(size).map_err(|_| ScheduleError::TooSmall { size })?;
            if let Some(&previous) = validated.last()
                && previous >= next
            {
                return Err(ScheduleError::NotIncreasing {
                    previous: previous.get(),
                    next: size,
                });
            }
            validated.push(next);
        }
        if validated.is_empty() {
            return Err(ScheduleError::Empty);
        }
        Ok(Self(validated))
    }

    #[must_use]
    pub fn lecture() -> Self {
        Self(Self::LECTURE.iter().map(|&n| SampleSize(n)).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; an empty schedule cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sizes(&self) -> impl ExactSizeIterator<Item = usize> + '_ {
        self.0.iter().map(|n| n.get())
    }

    fn get(&self, index: usize) -> Option<SampleSize> {
        self.0.get(index).copied()
    }
}

impl Default for SampleSizeSchedule {
    fn default() -> Self {
        Self::lecture()
    }
}

/// Ordered `(n, aggregate)` points of one run, owned by the caller's session.
///
/// Points are only ever appended in increasing sample-size order; [`reset`](Self::reset)
/// discards the whole curve.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConvergenceCurve {
    points: Vec<TrialAggregate>,
}

impl ConvergenceCurve {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a point.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::NotIncreasing`] if the point's sample size does not
    /// exceed the last one already on the curve.
    pub fn push(&mut self, point: TrialAggregate) -> Result<(), ScheduleError> {
        if let Some(last) = self.points.last()
            && last.sample_size >= point.sample_size
        {
            return Err(ScheduleError::NotIncreasing {
                previous: last.sample_size,
                next: point.sample_size,
            });
        }
        self.points.push(point);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.points.clear();
    }

    #[must_use]
    pub fn points(&self) -> &[TrialAggregate] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &TrialAggregate)> + '_ {
        self.points.iter().map(|p| (p.sample_size, p))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&TrialAggregate> {
        self.points.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&TrialAggregate> {
        self.points.last()
    }
}

/// Cooperative cancellation flag shared between a running generation and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::IsVariant)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum GenerationOutcome {
    Completed,
    Cancelled { completed: usize },
}

/// Produces convergence curves for one source, schedule and trial-count policy.
#[derive(Debug, Clone)]
pub struct ConvergenceGenerator<S> {
    source: S,
    schedule: SampleSizeSchedule,
    policy: TrialCountPolicy,
}

impl<S> ConvergenceGenerator<S>
where
    S: SampleSource,
{
    pub fn new(source: S, schedule: SampleSizeSchedule, policy: TrialCountPolicy) -> Self {
        Self {
            source,
            schedule,
            policy,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn schedule(&self) -> &SampleSizeSchedule {
        &self.schedule
    }

    pub fn policy(&self) -> &TrialCountPolicy {
        &self.policy
    }

    fn point(&self, n: SampleSize, rng: &mut (impl Rng + ?Sized)) -> TrialAggregate {
        trials::run_validated(&self.source, n, self.policy.trials_for(n), rng)
    }

    /// Returns a lazy iterator over the points of a fresh run.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroUsize;
    ///
    /// use samplab_engine::{DistributionSpec, SampleRng, SampleSeed};
    /// use samplab_experiment::{
    ///     convergence::{ConvergenceGenerator, SampleSizeSchedule},
    ///     trials::TrialCountPolicy,
    /// };
    ///
    /// let generator = ConvergenceGenerator::new(
    ///     DistributionSpec::die(),
    ///     SampleSizeSchedule::new([5, 50, 500]).unwrap(),
    ///     TrialCountPolicy::fixed(NonZeroUsize::new(500).unwrap()),
    /// );
    /// let mut rng = SampleRng::new(SampleSeed::from_bytes([5; 16]));
    ///
    /// // take only the first point, e.g. to render it before continuing
    /// let first = generator.steps(&mut rng).next().unwrap();
    /// assert_eq!(first.sample_size, 5);
    /// ```
    pub fn steps<'a, R>(&'a self, rng: &'a mut R) -> ConvergenceSteps<'a, S, R>
    where
        R: Rng + ?Sized,
    {
        ConvergenceSteps {
            generator: self,
            rng,
            index: 0,
        }
    }

    /// Runs the whole schedule on the current thread.
    pub fn generate<R>(&self, rng: &mut R) -> ConvergenceCurve
    where
        R: Rng + ?Sized,
    {
        ConvergenceCurve {
            points: self.steps(rng).collect(),
        }
    }

    /// Replaces the contents of `curve` with a fresh run, stopping early if `cancel`
    /// is signalled.
    ///
    /// The token is checked before each sample size, so at most one in-flight point
    /// is finished after cancellation is requested.
    pub fn generate_into<R>(
        &self,
        curve: &mut ConvergenceCurve,
        cancel: &CancelToken,
        rng: &mut R,
    ) -> GenerationOutcome
    where
        R: Rng + ?Sized,
    {
        curve.reset();
        for n in self.schedule.0.iter().copied() {
            if cancel.is_cancelled() {
                return GenerationOutcome::Cancelled {
                    completed: curve.len(),
                };
            }
            curve.points.push(self.point(n, rng));
        }
        GenerationOutcome::Completed
    }

    /// Computes the schedule on up to `workers` threads.
    ///
    /// Every sample size gets its own generator forked from `rng` up front, so the
    /// curve does not depend on which worker finishes first. Workers claim sample
    /// sizes in schedule order and stop claiming once `cancel` is signalled; the
    /// returned curve is the completed prefix, in schedule order.
    pub fn generate_parallel(
        &self,
        workers: NonZeroUsize,
        cancel: &CancelToken,
        rng: &mut SampleRng,
    ) -> (ConvergenceCurve, GenerationOutcome)
    where
        S: Sync,
    {
        let rngs: Vec<SampleRng> = self.schedule.0.iter().map(|_| rng.fork()).collect();
        let next_index = AtomicUsize::new(0);
        let workers = workers.get().min(self.schedule.len());

        let mut slots: Vec<Option<TrialAggregate>> = vec![None; self.schedule.len()];
        let finished = thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    s.spawn(|| {
                        let mut done = vec![];
                        while !cancel.is_cancelled() {
                            let index = next_index.fetch_add(1, Ordering::Relaxed);
                            let Some(n) = self.schedule.get(index) else {
                                break;
                            };
                            let mut rng = rngs[index].clone();
                            done.push((index, self.point(n, &mut rng)));
                        }
                        done
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect::<Vec<_>>()
        });
        for (index, point) in finished {
            slots[index] = Some(point);
        }

        let points: Vec<TrialAggregate> = slots.into_iter().map_while(|slot| slot).collect();
        let outcome = if points.len() == self.schedule.len() {
            GenerationOutcome::Completed
        } else {
            GenerationOutcome::Cancelled {
                completed: points.len(),
            }
        };
        (ConvergenceCurve { points }, outcome)
    }
}

/// Lazy, finite sequence of convergence points; see [`ConvergenceGenerator::steps`].
#[derive(Debug)]
pub struct ConvergenceSteps<'a, S, R: ?Sized> {
    generator: &'a ConvergenceGenerator<S>,
    rng: &'a mut R,
    index: usize,
}

impl<S, R> Iterator for ConvergenceSteps<'_, S, R>
where
    S: SampleSource,
    R: Rng + ?Sized,
{
    type Item = TrialAggregate;

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.generator.schedule.get(self.index)?;
        self.index += 1;
        Some(self.generator.point(n, &mut *self.rng))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.generator.schedule.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<S, R> ExactSizeIterator for ConvergenceSteps<'_, S, R>
where
    S: SampleSource,
    R: Rng + ?Sized,
{
}

impl<S, R> FusedIterator for ConvergenceSteps<'_, S, R>
where
    S: SampleSource,
    R: Rng + ?Sized,
{
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;
    use samplab_engine::{DistributionSpec, SampleSeed};

    use super::*;

    fn fixed(trials: usize) -> TrialCountPolicy {
        TrialCountPolicy::fixed(NonZeroUsize::new(trials).unwrap())
    }

    fn normal_generator() -> ConvergenceGenerator<DistributionSpec> {
        ConvergenceGenerator::new(
            DistributionSpec::standard_normal(),
            SampleSizeSchedule::new([10, 50, 200, 500]).unwrap(),
            fixed(400),
        )
    }

    #[test]
    fn test_schedule_validation() {
        assert_eq!(
            SampleSizeSchedule::new([]).unwrap_err(),
            ScheduleError::Empty
        );
        assert_eq!(
            SampleSizeSchedule::new([5, 1]).unwrap_err(),
            ScheduleError::TooSmall { size: 1 }
        );
        assert_eq!(
            SampleSizeSchedule::new([5, 8, 8]).unwrap_err(),
            ScheduleError::NotIncreasing {
                previous: 8,
                next: 8
            }
        );
        let lecture = SampleSizeSchedule::lecture();
        assert_eq!(lecture.len(), SampleSizeSchedule::LECTURE.len());
        assert!(
            lecture
                .sizes()
                .collect::<Vec<_>>()
                .is_sorted_by(|a, b| a < b)
        );
        assert_eq!(SampleSizeSchedule::new(SampleSizeSchedule::LECTURE), Ok(lecture));
    }

    #[test]
    fn test_curve_follows_schedule_order() {
        let mut rng = Pcg32::seed_from_u64(1);
        let curve = normal_generator().generate(&mut rng);
        let sizes: Vec<usize> = curve.iter().map(|(n, _)| n).collect();
        assert_eq!(sizes, vec![10, 50, 200, 500]);
        assert!(curve.points().iter().all(|p| p.trials == 400));
    }

    #[test]
    fn test_error_at_largest_size_beats_smallest_in_most_runs() {
        let generator = normal_generator();
        let mut rng = Pcg32::seed_from_u64(2);
        let wins = (0..10)
            .filter(|_| {
                let curve = generator.generate(&mut rng);
                let first = curve.first().unwrap();
                let last = curve.last().unwrap();
                last.mean_abs_error_of_mean < first.mean_abs_error_of_mean
                    && last.mean_abs_pct_error_of_std < first.mean_abs_pct_error_of_std
            })
            .count();
        assert!(wins >= 9, "only {wins} of 10 runs decreased");
    }

    #[test]
    fn test_steps_are_lazy_and_restartable() {
        let generator = normal_generator();
        let mut rng = Pcg32::seed_from_u64(3);

        let mut steps = generator.steps(&mut rng);
        assert_eq!(steps.len(), 4);
        assert_eq!(steps.next().unwrap().sample_size, 10);
        assert_eq!(steps.len(), 3);
        drop(steps);

        let again: Vec<_> = generator.steps(&mut rng).collect();
        assert_eq!(again.len(), 4);
        assert_eq!(again[0].sample_size, 10);
    }

    #[test]
    fn test_same_seed_same_curve() {
        let generator = normal_generator();
        let seed = SampleSeed::from_bytes([8; 16]);
        let a = generator.generate(&mut SampleRng::new(seed));
        let b = generator.generate(&mut SampleRng::new(seed));
        assert_eq!(a, b);
    }

    #[test]
    fn test_cancel_before_start_leaves_empty_curve() {
        let generator = normal_generator();
        let mut curve = ConvergenceCurve::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = generator.generate_into(&mut curve, &cancel, &mut Pcg32::seed_from_u64(4));
        assert_eq!(outcome, GenerationOutcome::Cancelled { completed: 0 });
        assert!(curve.is_empty());
    }

    #[test]
    fn test_cancel_mid_run_keeps_completed_prefix() {
        let generator = normal_generator();
        let cancel = CancelToken::new();
        let mut rng = Pcg32::seed_from_u64(5);

        // emulate a paced consumer that cancels after receiving two points
        let mut curve = ConvergenceCurve::new();
        for point in generator.steps(&mut rng) {
            curve.push(point).unwrap();
            if curve.len() == 2 {
                cancel.cancel();
            }
            if cancel.is_cancelled() {
                break;
            }
        }
        assert_eq!(curve.len(), 2);
        assert_eq!(curve.last().unwrap().sample_size, 50);

        let mut other = ConvergenceCurve::new();
        let outcome = generator.generate_into(&mut other, &cancel, &mut rng);
        assert!(outcome.is_cancelled());
        assert!(other.is_empty());
    }

    #[test]
    fn test_reset_then_rerun() {
        let generator = normal_generator();
        let mut rng = Pcg32::seed_from_u64(6);
        let cancel = CancelToken::new();
        let mut curve = ConvergenceCurve::new();

        assert!(
            generator
                .generate_into(&mut curve, &cancel, &mut rng)
                .is_completed()
        );
        let first_run = curve.clone();
        curve.reset();
        assert!(curve.is_empty());

        generator.generate_into(&mut curve, &cancel, &mut rng);
        assert_eq!(curve.len(), first_run.len());
        for (a, b) in first_run.points().iter().zip(curve.points()) {
            assert_eq!(a.sample_size, b.sample_size);
            assert!((a.mean_abs_error_of_mean - b.mean_abs_error_of_mean).abs() < 0.1);
        }
    }

    #[test]
    fn test_push_rejects_out_of_order_points() {
        let mut rng = Pcg32::seed_from_u64(7);
        let curve = normal_generator().generate(&mut rng);
        let mut copy = ConvergenceCurve::new();
        copy.push(curve.points()[1]).unwrap();
        assert!(copy.push(curve.points()[0]).is_err());
        assert!(copy.push(curve.points()[1]).is_err());
        assert_eq!(copy.len(), 1);
    }

    #[test]
    fn test_parallel_generation_is_ordered_and_reproducible() {
        let generator = ConvergenceGenerator::new(
            DistributionSpec::poisson(3.0).unwrap(),
            SampleSizeSchedule::lecture(),
            fixed(200),
        );
        let seed = SampleSeed::from_bytes([2; 16]);
        let workers = NonZeroUsize::new(4).unwrap();
        let cancel = CancelToken::new();

        let (a, outcome) = generator.generate_parallel(workers, &cancel, &mut SampleRng::new(seed));
        assert_eq!(outcome, GenerationOutcome::Completed);
        assert_eq!(
            a.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            SampleSizeSchedule::LECTURE.to_vec()
        );

        let single = NonZeroUsize::new(1).unwrap();
        let (b, _) = generator.generate_parallel(single, &cancel, &mut SampleRng::new(seed));
        assert_eq!(a, b);
    }

    #[test]
    fn test_parallel_generation_cancelled_up_front() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let (curve, outcome) = normal_generator().generate_parallel(
            NonZeroUsize::new(2).unwrap(),
            &cancel,
            &mut SampleRng::new(SampleSeed::from_bytes([1; 16])),
        );
        assert!(curve.is_empty());
        assert_eq!(outcome, GenerationOutcome::Cancelled { completed: 0 });
    }

    #[test]
    fn test_generator_over_borrowed_source() {
        let spec = DistributionSpec::die();
        let generator =
            ConvergenceGenerator::new(&spec, SampleSizeSchedule::new([4, 40]).unwrap(), fixed(50));
        let curve = generator.generate(&mut Pcg32::seed_from_u64(8));
        assert_eq!(curve.len(), 2);
        assert_eq!(curve.first().unwrap().true_mean, 3.5);
    }
}
