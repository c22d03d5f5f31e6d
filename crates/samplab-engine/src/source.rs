//! The seam between random sources and the experiments that consume them.

use std::sync::Arc;

use rand::{Rng, distr::Distribution as _};
use samplab_stats::descriptive::{InsufficientSampleSizeError, SampleStatistics};
use serde::Serialize;

use crate::{distribution::DistributionSpec, population::EmpiricalPopulation};

/// Something that can be sampled and whose true mean and standard deviation are known.
///
/// Implementations must be free of interior mutability so they can be read from
/// several threads at once; all randomness comes from the injected `rng`.
pub trait SampleSource {
    /// Draws a single value.
    fn draw<R>(&self, rng: &mut R) -> f64
    where
        R: Rng + ?Sized;

    /// Ground-truth mean the sample statistics are compared against.
    fn true_mean(&self) -> f64;

    /// Ground-truth standard deviation the sample statistics are compared against.
    fn true_std(&self) -> f64;

    /// Draws `len` independent values.
    fn draw_sample<R>(&self, len: usize, rng: &mut R) -> Sample
    where
        R: Rng + ?Sized,
    {
        Sample {
            values: (0..len).map(|_| self.draw(rng)).collect(),
        }
    }
}

impl<S> SampleSource for &S
where
    S: SampleSource + ?Sized,
{
    fn draw<R>(&self, rng: &mut R) -> f64
    where
        R: Rng + ?Sized,
    {
        (**self).draw(rng)
    }

    fn true_mean(&self) -> f64 {
        (**self).true_mean()
    }

    fn true_std(&self) -> f64 {
        (**self).true_std()
    }
}

impl SampleSource for DistributionSpec {
    fn draw<R>(&self, rng: &mut R) -> f64
    where
        R: Rng + ?Sized,
    {
        self.sample(rng)
    }

    fn true_mean(&self) -> f64 {
        DistributionSpec::true_mean(self)
    }

    fn true_std(&self) -> f64 {
        DistributionSpec::true_std(self)
    }
}

/// An ordered set of values drawn in one go. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Sample {
    values: Vec<f64>,
}

impl Sample {
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean, corrected standard deviation and skewness of this sample.
    pub fn statistics(&self) -> Result<SampleStatistics, InsufficientSampleSizeError> {
        SampleStatistics::compute(&self.values)
    }

    #[must_use]
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

impl From<Vec<f64>> for Sample {
    fn from(values: Vec<f64>) -> Self {
        Self { values }
    }
}

/// Either a parametric distribution or a shared empirical population.
///
/// This is the runtime choice the command line (or any other caller) makes. The
/// population is held behind an [`Arc`] so that the single process-wide copy can
/// be handed to worker threads without cloning its observations.
#[derive(Debug, Clone, derive_more::From)]
pub enum Source {
    Parametric(DistributionSpec),
    Empirical(Arc<EmpiricalPopulation>),
}

impl Source {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Parametric(spec) => spec.name(),
            Self::Empirical(_) => "empirical",
        }
    }
}

impl SampleSource for Source {
    fn draw<R>(&self, rng: &mut R) -> f64
    where
        R: Rng + ?Sized,
    {
        match self {
            Self::Parametric(spec) => spec.draw(rng),
            Self::Empirical(population) => population.draw(rng),
        }
    }

    fn true_mean(&self) -> f64 {
        match self {
            Self::Parametric(spec) => spec.true_mean(),
            Self::Empirical(population) => population.population_mean(),
        }
    }

    fn true_std(&self) -> f64 {
        match self {
            Self::Parametric(spec) => spec.true_std(),
            Self::Empirical(population) => population.population_std(),
        }
    }
}
