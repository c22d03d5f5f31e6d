use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use samplab_engine::SampleSource as _;
use samplab_experiment::interval::{CoverageExperiment, CoverageTracker, StandardErrorMode};

use crate::{
    command::source::SourceOptions,
    model::report::{CoverageReport, SourceReport},
    util,
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct CoverageArg {
    #[clap(flatten)]
    source: SourceOptions,
    /// Size of the sample behind each interval
    #[arg(long, default_value_t = 30)]
    sample_size: usize,
    /// Number of intervals to build
    #[arg(long, default_value_t = 100)]
    intervals: usize,
    /// Interval half-width in standard errors (1.96 for a nominal 95%)
    #[arg(long, default_value_t = 1.96)]
    multiplier: f64,
    /// Standard error from the true std (`known`) or the sample std (`estimated`)
    #[arg(long, default_value = "known")]
    standard_error: StandardErrorMode,
    /// Include every interval in the report
    #[arg(long)]
    include_intervals: bool,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &CoverageArg) -> anyhow::Result<()> {
    let source = arg.source.load()?;
    let (seed, mut rng) = arg.source.rng();
    let experiment = CoverageExperiment {
        sample_size: arg.sample_size,
        intervals: arg.intervals,
        multiplier: arg.multiplier,
        standard_error: arg.standard_error,
    };

    eprintln!(
        "Building {} intervals of n={} from {} (true mean {:.4}, seed {seed})",
        experiment.intervals,
        experiment.sample_size,
        source.name(),
        source.true_mean()
    );
    let mut tracker = CoverageTracker::new();
    let summary = experiment
        .run(&source, &mut tracker, &mut rng)
        .context("Coverage experiment failed")?;
    match summary.capture_rate {
        Some(rate) => eprintln!(
            "Captured {}/{} ({:.1}%) at {} standard errors",
            summary.captured,
            summary.total,
            rate * 100.0,
            experiment.multiplier
        ),
        None => eprintln!("No intervals were built"),
    }

    let report = CoverageReport {
        generated_at: Utc::now(),
        seed,
        source: SourceReport::new(&source),
        experiment,
        summary,
        intervals: arg
            .include_intervals
            .then(|| tracker.intervals().to_vec()),
    };
    util::write_report(&report, arg.output.as_deref())?;
    Ok(())
}
