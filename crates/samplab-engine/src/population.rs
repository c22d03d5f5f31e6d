use rand::Rng;
use samplab_stats::descriptive::PopulationMoments;

use crate::source::SampleSource;

#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display, derive_more::Error)]
pub enum PopulationError {
    #[display("population must contain at least one observation")]
    Empty,
    #[display("observation #{index} is not finite ({value})")]
    NonFinite { index: usize, value: f64 },
}

/// A fixed, finite dataset treated as a population to resample from.
///
/// The population moments are computed once at construction and cached; the
/// population is read-only afterwards, so one instance can be shared between
/// threads (typically behind an [`Arc`](std::sync::Arc)).
///
/// Draws are made uniformly **with replacement**: every draw picks an index in
/// `0..N` independently. For the sample sizes the experiments use (a few hundred
/// out of tens of thousands of observations) this is statistically
/// indistinguishable from sampling without replacement and costs `O(1)` per draw.
///
/// # Example
///
/// ```
/// use samplab_engine::{population::EmpiricalPopulation, source::SampleSource};
///
/// let population = EmpiricalPopulation::new(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
/// assert_eq!(population.true_mean(), 2.5);
///
/// let mut rng = rand::rng();
/// let sample = population.draw_sample(10, &mut rng);
/// assert!(sample.values().iter().all(|v| (1.0..=4.0).contains(v)));
/// ```
#[derive(Debug, Clone)]
pub struct EmpiricalPopulation {
    observations: Vec<f64>,
    moments: PopulationMoments,
}

impl EmpiricalPopulation {
    /// Builds a population from raw observations.
    ///
    /// # Errors
    ///
    /// - [`PopulationError::Empty`] if `observations` is empty
    /// - [`PopulationError::NonFinite`] if any observation is NaN or infinite
    pub fn new(observations: Vec<f64>) -> Result<Self, PopulationError> {
        if let Some((index, &value)) = observations
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite())
        {
            return Err(PopulationError::NonFinite { index, value });
        }
        let moments = PopulationMoments::compute(&observations).ok_or(PopulationError::Empty)?;
        Ok(Self {
            observations,
            moments,
        })
    }

    #[must_use]
    pub fn observations(&self) -> &[f64] {
        &self.observations
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Always `false`; an empty population cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    #[must_use]
    pub fn moments(&self) -> &PopulationMoments {
        &self.moments
    }

    #[must_use]
    pub fn population_mean(&self) -> f64 {
        self.moments.mean
    }

    /// Divide-by-`N` standard deviation.
    #[must_use]
    pub fn population_std(&self) -> f64 {
        self.moments.std_dev
    }

    #[must_use]
    pub fn population_skewness(&self) -> f64 {
        self.moments.skewness
    }
}

impl TryFrom<Vec<f64>> for EmpiricalPopulation {
    type Error = PopulationError;

    fn try_from(observations: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(observations)
    }
}

impl SampleSource for EmpiricalPopulation {
    fn draw<R>(&self, rng: &mut R) -> f64
    where
        R: Rng + ?Sized,
    {
        self.observations[rng.random_range(0..self.observations.len())]
    }

    fn true_mean(&self) -> f64 {
        self.population_mean()
    }

    fn true_std(&self) -> f64 {
        self.population_std()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    #[test]
    fn test_empty_dataset_is_rejected() {
        assert_eq!(
            EmpiricalPopulation::new(vec![]).unwrap_err(),
            PopulationError::Empty
        );
    }

    #[test]
    fn test_non_finite_observation_is_rejected() {
        let err = EmpiricalPopulation::new(vec![1.0, f64::INFINITY, 2.0]).unwrap_err();
        assert!(matches!(err, PopulationError::NonFinite { index: 1, .. }));
        assert!(EmpiricalPopulation::new(vec![f64::NAN]).is_err());
    }

    #[test]
    fn test_moments_are_cached_at_load() {
        let population =
            EmpiricalPopulation::try_from(vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(population.len(), 8);
        assert!(!population.is_empty());
        assert!((population.population_mean() - 5.0).abs() < 1e-12);
        assert!((population.population_std() - 2.0).abs() < 1e-12);
        assert!((population.population_skewness() - 0.65625).abs() < 1e-12);
        assert_eq!(population.true_std(), population.population_std());
    }

    #[test]
    fn test_single_observation_population() {
        let population = EmpiricalPopulation::new(vec![7.5]).unwrap();
        let mut rng = Pcg32::seed_from_u64(1);
        let sample = population.draw_sample(5, &mut rng);
        assert_eq!(sample.values(), &[7.5; 5]);
        assert_eq!(population.population_std(), 0.0);
    }

    #[test]
    fn test_sampling_is_with_replacement() {
        let population = EmpiricalPopulation::new(vec![0.0, 1.0, 2.0]).unwrap();
        let mut rng = Pcg32::seed_from_u64(2);
        // more draws than observations is only possible with replacement
        let sample = population.draw_sample(300, &mut rng);
        assert_eq!(sample.len(), 300);
        for value in [0.0, 1.0, 2.0] {
            let hits = sample.values().iter().filter(|&&v| v == value).count();
            assert!((70..=130).contains(&hits), "{value}: {hits}");
        }
    }

    #[test]
    fn test_resampled_mean_converges_to_population_mean() {
        let observations: Vec<f64> = (0..1000).map(|i| f64::from(i % 37) * 1.5).collect();
        let population = EmpiricalPopulation::new(observations).unwrap();
        let mut rng = Pcg32::seed_from_u64(3);
        let stats = population
            .draw_sample(100_000, &mut rng)
            .statistics()
            .unwrap();
        assert!((stats.mean - population.population_mean()).abs() < 0.2);
        assert!((stats.std_dev - population.population_std()).abs() < 0.2);
    }
}
