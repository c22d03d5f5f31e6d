use std::path::PathBuf;

use crate::{command::source::SourceOptions, model::report::SourceReport, util};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct DescribeArg {
    #[clap(flatten)]
    source: SourceOptions,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &DescribeArg) -> anyhow::Result<()> {
    let source = arg.source.load()?;
    let report = SourceReport::new(&source);
    eprintln!(
        "{}: true mean {:.6}, true std {:.6}",
        report.name, report.true_mean, report.true_std
    );
    if let Some(population) = &report.population {
        eprintln!(
            "  {} observations, skewness {:.4}",
            population.len, population.skewness
        );
    }
    util::write_report(&report, arg.output.as_deref())?;
    Ok(())
}
