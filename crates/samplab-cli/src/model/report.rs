use chrono::{DateTime, Utc};
use samplab_engine::{DistributionSpec, Sample, SampleSeed, SampleSource as _, Source};
use samplab_experiment::{
    convergence::{ConvergenceCurve, GenerationOutcome},
    interval::{ConfidenceInterval, CoverageExperiment, CoverageSummary},
    trials::TrialCountPolicy,
};
use samplab_stats::descriptive::{PopulationMoments, SampleStatistics};
use serde::Serialize;

/// What was sampled, with its true moments.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<DistributionSpec>,
    pub true_mean: f64,
    pub true_std: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<PopulationMoments>,
}

impl SourceReport {
    pub fn new(source: &Source) -> Self {
        let (distribution, population) = match source {
            Source::Parametric(spec) => (Some(*spec), None),
            Source::Empirical(population) => (None, Some(*population.moments())),
        };
        Self {
            name: source.name(),
            distribution,
            true_mean: source.true_mean(),
            true_std: source.true_std(),
            population,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleReport {
    pub generated_at: DateTime<Utc>,
    pub seed: SampleSeed,
    pub source: SourceReport,
    pub statistics: SampleStatistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<ConfidenceInterval>,
    pub sample: Sample,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvergenceReport {
    pub generated_at: DateTime<Utc>,
    pub seed: SampleSeed,
    pub source: SourceReport,
    pub policy: TrialCountPolicy,
    pub workers: usize,
    pub outcome: GenerationOutcome,
    pub curve: ConvergenceCurve,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub generated_at: DateTime<Utc>,
    pub seed: SampleSeed,
    pub source: SourceReport,
    pub experiment: CoverageExperiment,
    pub summary: CoverageSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intervals: Option<Vec<ConfidenceInterval>>,
}
