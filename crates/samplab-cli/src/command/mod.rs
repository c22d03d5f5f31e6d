use clap::{Parser, Subcommand};

use self::{
    convergence::ConvergenceArg, coverage::CoverageArg, describe::DescribeArg, sample::SampleArg,
};

mod convergence;
mod coverage;
mod describe;
mod sample;
mod source;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Show the true mean and standard deviation of a source
    Describe(#[clap(flatten)] DescribeArg),
    /// Draw one sample and compute its statistics
    Sample(#[clap(flatten)] SampleArg),
    /// Measure how the error of sample statistics shrinks as the sample grows
    Convergence(#[clap(flatten)] ConvergenceArg),
    /// Build many confidence intervals and count how often they capture the true mean
    Coverage(#[clap(flatten)] CoverageArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Describe(arg) => describe::run(&arg)?,
        Mode::Sample(arg) => sample::run(&arg)?,
        Mode::Convergence(arg) => convergence::run(&arg)?,
        Mode::Coverage(arg) => coverage::run(&arg)?,
    }
    Ok(())
}
