use std::{num::NonZeroUsize, str::FromStr};

use samplab_engine::{DistributionSpec, InvalidParameterError};
use samplab_experiment::trials::TrialCountPolicy;

const KINDS: &str = "die, discrete-uniform:K, bernoulli:P, binomial:N,P, poisson:LAMBDA, \
                     normal:MEAN,STD, exponential:RATE, uniform:LOW,HIGH, empirical";

/// Source selected on the command line.
///
/// Syntax is `kind[:p1[,p2]]`, e.g. `binomial:10,0.5` or `empirical`.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceArg {
    Parametric(DistributionSpec),
    Empirical,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ParseSourceError {
    #[display("unknown source {kind:?}, expected one of: {}", KINDS)]
    UnknownKind { kind: String },
    #[display("{kind} takes {expected} parameter(s), got {got}")]
    ParameterCount {
        kind: &'static str,
        expected: usize,
        got: usize,
    },
    #[display("invalid {expected} {value:?}")]
    InvalidNumber {
        expected: &'static str,
        value: String,
    },
    #[display("{_0}")]
    InvalidParameter(InvalidParameterError),
}

fn float(value: &str) -> Result<f64, ParseSourceError> {
    value.parse().map_err(|_| ParseSourceError::InvalidNumber {
        expected: "number",
        value: value.to_owned(),
    })
}

fn count(value: &str) -> Result<u32, ParseSourceError> {
    value.parse().map_err(|_| ParseSourceError::InvalidNumber {
        expected: "count",
        value: value.to_owned(),
    })
}

fn params<const N: usize>(
    kind: &'static str,
    raw: &[&str],
) -> Result<[String; N], ParseSourceError> {
    let params: [String; N] = raw
        .iter()
        .map(|p| p.trim().to_owned())
        .collect::<Vec<_>>()
        .try_into()
        .map_err(|_| ParseSourceError::ParameterCount {
            kind,
            expected: N,
            got: raw.len(),
        })?;
    Ok(params)
}

impl FromStr for SourceArg {
    type Err = ParseSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = s.split_once(':').unwrap_or((s, ""));
        let raw: Vec<&str> = if rest.trim().is_empty() {
            vec![]
        } else {
            rest.split(',').collect()
        };

        let spec = match kind.trim().to_ascii_lowercase().as_str() {
            "empirical" => {
                params::<0>("empirical", &raw)?;
                return Ok(Self::Empirical);
            }
            "die" => {
                params::<0>("die", &raw)?;
                Ok(DistributionSpec::die())
            }
            "discrete-uniform" => {
                let [k] = params("discrete-uniform", &raw)?;
                DistributionSpec::discrete_uniform(count(&k)?)
            }
            "bernoulli" => {
                let [p] = params("bernoulli", &raw)?;
                DistributionSpec::bernoulli(float(&p)?)
            }
            "binomial" => {
                let [n, p] = params("binomial", &raw)?;
                DistributionSpec::binomial(count(&n)?, float(&p)?)
            }
            "poisson" => {
                let [lambda] = params("poisson", &raw)?;
                DistributionSpec::poisson(float(&lambda)?)
            }
            "normal" => {
                let [mean, std_dev] = params("normal", &raw)?;
                DistributionSpec::normal(float(&mean)?, float(&std_dev)?)
            }
            "exponential" => {
                let [rate] = params("exponential", &raw)?;
                DistributionSpec::exponential(float(&rate)?)
            }
            "uniform" | "continuous-uniform" => {
                let [low, high] = params("uniform", &raw)?;
                DistributionSpec::continuous_uniform(float(&low)?, float(&high)?)
            }
            _ => {
                return Err(ParseSourceError::UnknownKind {
                    kind: kind.to_owned(),
                });
            }
        };
        spec.map(Self::Parametric)
            .map_err(ParseSourceError::InvalidParameter)
    }
}

/// Trial count given on the command line: `auto` or a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialsArg {
    Auto,
    Fixed(NonZeroUsize),
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("expected `auto` or a positive integer, got {input:?}")]
pub struct ParseTrialsError {
    input: String,
}

impl FromStr for TrialsArg {
    type Err = ParseTrialsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.parse().map(Self::Fixed).map_err(|_| ParseTrialsError {
            input: s.to_owned(),
        })
    }
}

impl From<TrialsArg> for TrialCountPolicy {
    fn from(arg: TrialsArg) -> Self {
        match arg {
            TrialsArg::Auto => TrialCountPolicy::AUTO,
            TrialsArg::Fixed(trials) => TrialCountPolicy::fixed(trials),
        }
    }
}

#[cfg(test)]
mod tests {
    use samplab_engine::DistributionParams;

    use super::*;

    fn parametric(s: &str) -> DistributionParams {
        match s.parse::<SourceArg>().unwrap() {
            SourceArg::Parametric(spec) => *spec.params(),
            SourceArg::Empirical => panic!("{s} parsed as empirical"),
        }
    }

    #[test]
    fn test_parse_every_kind() {
        assert_eq!(
            parametric("die"),
            DistributionParams::DiscreteUniform { outcomes: 6 }
        );
        assert_eq!(
            parametric("discrete-uniform:10"),
            DistributionParams::DiscreteUniform { outcomes: 10 }
        );
        assert_eq!(
            parametric("bernoulli:0.3"),
            DistributionParams::Bernoulli { p: 0.3 }
        );
        assert_eq!(
            parametric("binomial:10, 0.5"),
            DistributionParams::Binomial { trials: 10, p: 0.5 }
        );
        assert_eq!(
            parametric("Poisson:4"),
            DistributionParams::Poisson { lambda: 4.0 }
        );
        assert_eq!(
            parametric("normal:-1,2.5"),
            DistributionParams::Normal {
                mean: -1.0,
                std_dev: 2.5
            }
        );
        assert_eq!(
            parametric("exponential:2"),
            DistributionParams::Exponential { rate: 2.0 }
        );
        assert_eq!(
            parametric("uniform:0,10"),
            DistributionParams::ContinuousUniform {
                low: 0.0,
                high: 10.0
            }
        );
        assert_eq!(
            "empirical".parse::<SourceArg>().unwrap(),
            SourceArg::Empirical
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "cauchy:0,1".parse::<SourceArg>(),
            Err(ParseSourceError::UnknownKind { .. })
        ));
        assert!(matches!(
            "normal:0".parse::<SourceArg>(),
            Err(ParseSourceError::ParameterCount {
                expected: 2,
                got: 1,
                ..
            })
        ));
        assert!(matches!(
            "binomial:2.5,0.5".parse::<SourceArg>(),
            Err(ParseSourceError::InvalidNumber { .. })
        ));
        assert!(matches!(
            "bernoulli:1.5".parse::<SourceArg>(),
            Err(ParseSourceError::InvalidParameter(_))
        ));
        assert!("die:6".parse::<SourceArg>().is_err());
    }

    #[test]
    fn test_parse_trials() {
        assert_eq!("auto".parse::<TrialsArg>().unwrap(), TrialsArg::Auto);
        assert_eq!(
            TrialCountPolicy::from("250".parse::<TrialsArg>().unwrap()),
            TrialCountPolicy::fixed(NonZeroUsize::new(250).unwrap())
        );
        assert!("0".parse::<TrialsArg>().is_err());
        assert!("many".parse::<TrialsArg>().is_err());
    }
}
