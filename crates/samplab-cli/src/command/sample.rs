use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use samplab_engine::SampleSource as _;
use samplab_experiment::interval::ConfidenceInterval;

use crate::{
    command::source::SourceOptions,
    model::report::{SampleReport, SourceReport},
    util,
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct SampleArg {
    #[clap(flatten)]
    source: SourceOptions,
    /// Number of values to draw
    #[arg(long, default_value_t = 30)]
    sample_size: usize,
    /// Also build an interval of this many standard errors around the sample mean
    #[arg(long)]
    multiplier: Option<f64>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[expect(clippy::cast_precision_loss)]
pub(crate) fn run(arg: &SampleArg) -> anyhow::Result<()> {
    let source = arg.source.load()?;
    let (seed, mut rng) = arg.source.rng();

    let sample = source.draw_sample(arg.sample_size, &mut rng);
    let statistics = sample
        .statistics()
        .context("Cannot compute sample statistics")?;
    eprintln!(
        "Drew {} values from {} (seed {seed}): mean {:.4}, std {:.4}, skewness {:.4}",
        statistics.len,
        source.name(),
        statistics.mean,
        statistics.std_dev,
        statistics.skewness
    );
    eprintln!(
        "True mean {:.4}, true std {:.4}",
        source.true_mean(),
        source.true_std()
    );

    let interval = arg
        .multiplier
        .map(|multiplier| {
            let standard_error = statistics.std_dev / (statistics.len as f64).sqrt();
            ConfidenceInterval::build(
                statistics.mean,
                standard_error,
                multiplier,
                source.true_mean(),
            )
        })
        .transpose()
        .context("Cannot build confidence interval")?;
    if let Some(interval) = &interval {
        eprintln!(
            "Interval [{:.4}, {:.4}] {} the true mean",
            interval.lower,
            interval.upper,
            if interval.captured {
                "captures"
            } else {
                "misses"
            }
        );
    }

    let report = SampleReport {
        generated_at: Utc::now(),
        seed,
        source: SourceReport::new(&source),
        statistics,
        interval,
        sample,
    };
    util::write_report(&report, arg.output.as_deref())?;
    Ok(())
}
