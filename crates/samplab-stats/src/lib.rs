//! Finite-sample statistics for the Samplab Monte Carlo engine.
//!
//! This crate is the numerical leaf of the workspace. It knows nothing about
//! random sources; it only turns a slice of observations into summary values.
//!
//! - [`descriptive::SampleStatistics`]: mean, Bessel-corrected standard deviation and
//!   skewness of one drawn sample (requires at least two values)
//! - [`descriptive::PopulationMoments`]: mean, standard deviation and skewness of a
//!   complete finite population (divide-by-N throughout)
//!
//! # Examples
//!
//! ```
//! use samplab_stats::descriptive::SampleStatistics;
//!
//! let stats = SampleStatistics::compute(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
//! assert_eq!(stats.mean, 5.0);
//! assert!((stats.std_dev - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
//! ```
//!
//! ```
//! use samplab_stats::descriptive::PopulationMoments;
//!
//! let moments = PopulationMoments::compute(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
//! assert_eq!(moments.std_dev, 2.0);
//! ```

pub mod descriptive;
