use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use rand::Rng as _;
use samplab_engine::{EmpiricalPopulation, SampleRng, SampleSeed, Source};
use samplab_stats::descriptive::PopulationMoments;

use crate::{model::args::SourceArg, schema::star_catalog::CatalogPopulation, util};

const HEADER_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct SourceOptions {
    /// Source to sample from: die, discrete-uniform:K, bernoulli:P, binomial:N,P,
    /// poisson:LAMBDA, normal:MEAN,STD, exponential:RATE, uniform:LOW,HIGH or empirical
    #[arg(long, default_value = "die")]
    source: SourceArg,
    /// Star catalog JSON file backing the `empirical` source
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Seed as 32 hex digits; a random seed is chosen (and reported) when omitted
    #[arg(long)]
    seed: Option<SampleSeed>,
}

impl SourceOptions {
    pub(crate) fn load(&self) -> anyhow::Result<Source> {
        match &self.source {
            SourceArg::Parametric(spec) => Ok(Source::from(*spec)),
            SourceArg::Empirical => {
                let path = self
                    .catalog
                    .as_ref()
                    .context("The `empirical` source requires --catalog")?;
                let population = load_population(path)?;
                Ok(Source::from(Arc::new(population)))
            }
        }
    }

    pub(crate) fn rng(&self) -> (SampleSeed, SampleRng) {
        let seed = self.seed.unwrap_or_else(|| rand::rng().random());
        (seed, SampleRng::new(seed))
    }
}

fn load_population(path: &Path) -> anyhow::Result<EmpiricalPopulation> {
    let catalog = util::read_star_catalog_file(path)?;
    let luminosities = catalog.luminosities();
    eprintln!(
        "Loaded {} stars from {}, {} within the luminosity range",
        catalog.stars.len(),
        path.display(),
        luminosities.len()
    );
    let population = EmpiricalPopulation::new(luminosities)
        .with_context(|| format!("Failed to build population from {}", path.display()))?;

    let moments = population.moments();
    if let Some(header) = &catalog.population
        && header_disagrees(header, moments)
    {
        eprintln!(
            "Note: catalog header says n={} mean={:.4} std={:.4}, \
             using recomputed n={} mean={:.4} std={:.4}",
            header.n, header.mean, header.std, moments.len, moments.mean, moments.std_dev
        );
    }
    Ok(population)
}

fn header_disagrees(header: &CatalogPopulation, moments: &PopulationMoments) -> bool {
    header.n != moments.len
        || (header.mean - moments.mean).abs() > HEADER_TOLERANCE
        || (header.std - moments.std_dev).abs() > HEADER_TOLERANCE
}
