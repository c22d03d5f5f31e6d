//! Random sources for the Samplab Monte Carlo engine.
//!
//! This crate provides everything that produces random values:
//!
//! - [`random`] - [`SampleSeed`] and [`SampleRng`], the injectable, reproducible random source
//! - [`distribution`] - the catalog of seven parametric distributions with closed-form truth
//! - [`population`] - resampling with replacement from a fixed empirical dataset
//! - [`source`] - the [`SampleSource`] trait, the drawn [`Sample`] and the runtime
//!   [`Source`] choice
//!
//! Distributions and populations are immutable once built and can be read from any
//! number of threads; all mutable state lives in the random generator the caller
//! passes in.
//!
//! # Example
//!
//! ```
//! use samplab_engine::{DistributionSpec, SampleRng, SampleSeed, SampleSource};
//!
//! let mut rng = SampleRng::new(SampleSeed::from_bytes([42; 16]));
//! let die = DistributionSpec::die();
//! let sample = die.draw_sample(1000, &mut rng);
//! let stats = sample.statistics().unwrap();
//! assert!((stats.mean - die.true_mean()).abs() < 0.3);
//! ```

pub use self::{
    distribution::{DistributionParams, DistributionSpec, InvalidParameterError},
    population::{EmpiricalPopulation, PopulationError},
    random::{SampleRng, SampleSeed},
    source::{Sample, SampleSource, Source},
};

pub mod distribution;
pub mod population;
pub mod random;
pub mod source;
