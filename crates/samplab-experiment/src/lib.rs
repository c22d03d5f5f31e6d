//! Monte Carlo experiments on top of the Samplab random sources.
//!
//! Three experiments are provided, each owning its state explicitly so the caller
//! decides how it is paced, shared or reset:
//!
//! - [`trials`] - repeat "draw a sample of size `n`, compute its statistics" many
//!   times and average the error against the known truth
//! - [`convergence`] - run the trials over an increasing schedule of sample sizes to
//!   show the errors shrinking (Law of Large Numbers)
//! - [`interval`] - build confidence intervals for the mean and track how often they
//!   capture the true mean
//!
//! # Architecture
//!
//! ```text
//! DistributionSpec / EmpiricalPopulation   (samplab-engine)
//!     ↓ draw_sample
//! SampleStatistics                          (samplab-stats)
//!     ↓                         ↓
//! run_trials → ConvergenceCurve    ConfidenceInterval → CoverageTracker
//! ```
//!
//! All functions are synchronous and take the random generator as an argument.
//! Nothing here keeps process-wide mutable state: a [`convergence::ConvergenceCurve`] or a
//! [`interval::CoverageTracker`] belongs to whoever created it.
//!
//! # Example
//!
//! ```
//! use samplab_engine::{DistributionSpec, SampleRng, SampleSeed};
//! use samplab_experiment::{
//!     convergence::{ConvergenceGenerator, SampleSizeSchedule},
//!     trials::TrialCountPolicy,
//! };
//!
//! let generator = ConvergenceGenerator::new(
//!     DistributionSpec::exponential(1.0).unwrap(),
//!     SampleSizeSchedule::new([10, 100]).unwrap(),
//!     TrialCountPolicy::default(),
//! );
//! let curve = generator.generate(&mut SampleRng::new(SampleSeed::from_bytes([0; 16])));
//! let first = curve.first().unwrap().mean_abs_pct_error_of_mean.unwrap();
//! let last = curve.last().unwrap().mean_abs_pct_error_of_mean.unwrap();
//! assert!(last < first);
//! ```

pub mod convergence;
pub mod interval;
pub mod trials;
