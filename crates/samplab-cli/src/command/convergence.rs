use std::{num::NonZeroUsize, path::PathBuf, thread, time::Duration};

use anyhow::Context;
use chrono::Utc;
use samplab_engine::SampleSource as _;
use samplab_experiment::{
    convergence::{
        CancelToken, ConvergenceCurve, ConvergenceGenerator, GenerationOutcome,
        SampleSizeSchedule,
    },
    trials::{TrialAggregate, TrialCountPolicy},
};

use crate::{
    command::source::SourceOptions,
    model::{
        args::TrialsArg,
        report::{ConvergenceReport, SourceReport},
    },
    util,
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ConvergenceArg {
    #[clap(flatten)]
    source: SourceOptions,
    /// Comma-separated, strictly increasing sample sizes (default: 5,8,10,...,500)
    #[arg(long, value_delimiter = ',')]
    sizes: Vec<usize>,
    /// Trials per sample size: `auto` or a positive count
    #[arg(long, default_value = "auto")]
    trials: TrialsArg,
    /// Number of worker threads (default: available parallelism)
    #[arg(long)]
    workers: Option<NonZeroUsize>,
    /// Stop after this many seconds and keep the sample sizes finished so far
    #[arg(long)]
    budget_secs: Option<u64>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &ConvergenceArg) -> anyhow::Result<()> {
    let source = arg.source.load()?;
    let (seed, mut rng) = arg.source.rng();
    let schedule = if arg.sizes.is_empty() {
        SampleSizeSchedule::lecture()
    } else {
        SampleSizeSchedule::new(arg.sizes.iter().copied()).context("Invalid --sizes")?
    };
    let policy = TrialCountPolicy::from(arg.trials);
    let workers = arg.workers.unwrap_or_else(util::default_workers);

    let cancel = CancelToken::new();
    if let Some(secs) = arg.budget_secs {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            cancel.cancel();
        });
    }

    eprintln!(
        "Convergence of {} (true mean {:.4}, true std {:.4}) over {} sample sizes",
        source.name(),
        source.true_mean(),
        source.true_std(),
        schedule.len()
    );
    eprintln!("  workers: {workers}, seed: {seed}");

    let generator = ConvergenceGenerator::new(source, schedule, policy);
    let (curve, outcome) = if workers.get() == 1 {
        generate_streaming(&generator, &cancel, &mut rng)?
    } else {
        let (curve, outcome) = generator.generate_parallel(workers, &cancel, &mut rng);
        for point in curve.points() {
            print_point(point);
        }
        (curve, outcome)
    };
    if let GenerationOutcome::Cancelled { completed } = outcome {
        eprintln!(
            "Time budget reached after {completed} of {} sample sizes",
            generator.schedule().len()
        );
    }

    let report = ConvergenceReport {
        generated_at: Utc::now(),
        seed,
        source: SourceReport::new(generator.source()),
        policy,
        workers: workers.get(),
        outcome,
        curve,
    };
    util::write_report(&report, arg.output.as_deref())?;
    Ok(())
}

fn generate_streaming<S, R>(
    generator: &ConvergenceGenerator<S>,
    cancel: &CancelToken,
    rng: &mut R,
) -> anyhow::Result<(ConvergenceCurve, GenerationOutcome)>
where
    S: samplab_engine::SampleSource,
    R: rand::Rng,
{
    let mut curve = ConvergenceCurve::new();
    let mut steps = generator.steps(rng);
    while !cancel.is_cancelled() {
        let Some(point) = steps.next() else {
            break;
        };
        print_point(&point);
        curve.push(point)?;
    }
    let outcome = if curve.len() == generator.schedule().len() {
        GenerationOutcome::Completed
    } else {
        GenerationOutcome::Cancelled {
            completed: curve.len(),
        }
    };
    Ok((curve, outcome))
}

fn format_error(pct: Option<f64>, abs: f64) -> String {
    match pct {
        Some(pct) => format!("{pct:7.2}%"),
        None => format!("{abs:7.4} "),
    }
}

fn print_point(point: &TrialAggregate) {
    eprintln!(
        "  n={:4}  trials={:7}  mean error {}  std error {}",
        point.sample_size,
        point.trials,
        format_error(point.mean_abs_pct_error_of_mean, point.mean_abs_error_of_mean),
        format_error(point.mean_abs_pct_error_of_std, point.mean_abs_error_of_std),
    );
}
