//! Catalog of the parametric distributions the experiments sample from.
//!
//! Each [`DistributionSpec`] is validated on construction and immutable afterwards.
//! It knows its closed-form mean and standard deviation and can be sampled through
//! [`rand::distr::Distribution<f64>`], using the classic textbook samplers:
//!
//! | Variant | Sampler | Mean | Std |
//! |---|---|---|---|
//! | `DiscreteUniform { outcomes: k }` | uniform integer in `1..=k` | `(k+1)/2` | `sqrt((k²-1)/12)` |
//! | `Bernoulli { p }` | `1` with probability `p` | `p` | `sqrt(p(1-p))` |
//! | `Binomial { trials: n, p }` | successes in `n` Bernoulli trials | `np` | `sqrt(np(1-p))` |
//! | `Poisson { lambda }` | product of uniforms | `λ` | `sqrt(λ)` |
//! | `Normal { mean, std_dev }` | Box–Muller | `μ` | `σ` |
//! | `Exponential { rate }` | inverse transform | `1/λ` | `1/λ` |
//! | `ContinuousUniform { low, high }` | `a + U(b-a)` | `(a+b)/2` | `(b-a)/sqrt(12)` |

use std::{f64::consts::TAU, fmt};

use rand::{Rng, distr::Distribution};
use serde::{Deserialize, Serialize};

/// Largest accepted Poisson rate; beyond it `exp(-λ)` is no longer a normal `f64`
/// and the product-of-uniforms sampler cannot terminate correctly.
pub const MAX_POISSON_LAMBDA: f64 = 700.0;

/// Bound on the standardised draws of the normal and exponential samplers.
///
/// With `f64` uniforms in `[0, 1)`, `-ln(1 - U)` never exceeds `53 ln 2 ≈ 36.7` and the
/// Box–Muller radius never exceeds `sqrt(2 × 36.7) ≈ 8.6`.
const DRAW_TAIL: f64 = 40.0;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("invalid {distribution} parameter: {reason}")]
pub struct InvalidParameterError {
    distribution: &'static str,
    reason: String,
}

impl InvalidParameterError {
    fn new(distribution: &'static str, reason: impl Into<String>) -> Self {
        Self {
            distribution,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn distribution(&self) -> &'static str {
        self.distribution
    }
}

/// Raw defining parameters of each supported distribution.
///
/// Values of this type are not validated; turn them into a [`DistributionSpec`]
/// with [`DistributionSpec::new`] before sampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DistributionParams {
    DiscreteUniform { outcomes: u32 },
    Bernoulli { p: f64 },
    Binomial { trials: u32, p: f64 },
    Poisson { lambda: f64 },
    Normal { mean: f64, std_dev: f64 },
    Exponential { rate: f64 },
    ContinuousUniform { low: f64, high: f64 },
}

impl DistributionParams {
    /// Human readable name of the variant.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DiscreteUniform { .. } => "discrete uniform",
            Self::Bernoulli { .. } => "Bernoulli",
            Self::Binomial { .. } => "binomial",
            Self::Poisson { .. } => "Poisson",
            Self::Normal { .. } => "normal",
            Self::Exponential { .. } => "exponential",
            Self::ContinuousUniform { .. } => "continuous uniform",
        }
    }

    fn validate(&self) -> Result<(), InvalidParameterError> {
        let name = self.name();
        let fail = |reason: String| Err(InvalidParameterError::new(name, reason));
        match *self {
            Self::DiscreteUniform { outcomes } => {
                if outcomes < 2 {
                    return fail(format!("outcomes must be at least 2, got {outcomes}"));
                }
            }
            Self::Bernoulli { p } => check_probability(name, p)?,
            Self::Binomial { trials, p } => {
                if trials == 0 {
                    return fail("trials must be positive".to_owned());
                }
                check_probability(name, p)?;
            }
            Self::Poisson { lambda } => {
                if lambda.is_nan() || lambda <= 0.0 || lambda > MAX_POISSON_LAMBDA {
                    return fail(format!(
                        "lambda must lie in (0, {MAX_POISSON_LAMBDA}], got {lambda}"
                    ));
                }
            }
            Self::Normal { mean, std_dev } => {
                if !mean.is_finite() {
                    return fail(format!("mean must be finite, got {mean}"));
                }
                check_positive(name, "std_dev", std_dev)?;
                if !(mean.abs() + DRAW_TAIL * std_dev).is_finite() {
                    return fail(format!(
                        "draws overflow f64 with mean {mean} and std_dev {std_dev}"
                    ));
                }
            }
            Self::Exponential { rate } => {
                check_positive(name, "rate", rate)?;
                if !(DRAW_TAIL / rate).is_finite() {
                    return fail(format!("draws overflow f64 with rate {rate}"));
                }
            }
            Self::ContinuousUniform { low, high } => {
                if !low.is_finite() || !high.is_finite() || low >= high {
                    return fail(format!(
                        "bounds must be finite with low < high, got [{low}, {high}]"
                    ));
                }
                if !(high - low).is_finite() {
                    return fail(format!("width of [{low}, {high}] overflows f64"));
                }
            }
        }
        Ok(())
    }
}

fn check_probability(name: &'static str, p: f64) -> Result<(), InvalidParameterError> {
    if p > 0.0 && p < 1.0 {
        Ok(())
    } else {
        Err(InvalidParameterError::new(
            name,
            format!("p must lie strictly between 0 and 1, got {p}"),
        ))
    }
}

fn check_positive(
    name: &'static str,
    field: &str,
    value: f64,
) -> Result<(), InvalidParameterError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(InvalidParameterError::new(
            name,
            format!("{field} must be finite and positive, got {value}"),
        ))
    }
}

/// A validated, immutable parametric distribution.
///
/// # Example
///
/// ```
/// use samplab_engine::distribution::DistributionSpec;
///
/// let die = DistributionSpec::die();
/// assert_eq!(die.true_mean(), 3.5);
/// assert!((die.true_std() - (35.0_f64 / 12.0).sqrt()).abs() < 1e-12);
///
/// assert!(DistributionSpec::bernoulli(1.5).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DistributionParams", into = "DistributionParams")]
pub struct DistributionSpec(DistributionParams);

impl DistributionSpec {
    pub fn new(params: DistributionParams) -> Result<Self, InvalidParameterError> {
        params.validate()?;
        let spec = Self(params);
        let (mean, std_dev) = (spec.true_mean(), spec.true_std());
        if !mean.is_finite() || !std_dev.is_finite() || std_dev <= 0.0 {
            return Err(InvalidParameterError::new(
                params.name(),
                format!(
                    "moments must be finite with positive std, got mean {mean} and std {std_dev}"
                ),
            ));
        }
        Ok(spec)
    }

    /// A fair six-sided die.
    #[must_use]
    pub fn die() -> Self {
        Self(DistributionParams::DiscreteUniform { outcomes: 6 })
    }

    pub fn discrete_uniform(outcomes: u32) -> Result<Self, InvalidParameterError> {
        Self::new(DistributionParams::DiscreteUniform { outcomes })
    }

    pub fn bernoulli(p: f64) -> Result<Self, InvalidParameterError> {
        Self::new(DistributionParams::Bernoulli { p })
    }

    pub fn binomial(trials: u32, p: f64) -> Result<Self, InvalidParameterError> {
        Self::new(DistributionParams::Binomial { trials, p })
    }

    pub fn poisson(lambda: f64) -> Result<Self, InvalidParameterError> {
        Self::new(DistributionParams::Poisson { lambda })
    }

    pub fn normal(mean: f64, std_dev: f64) -> Result<Self, InvalidParameterError> {
        Self::new(DistributionParams::Normal { mean, std_dev })
    }

    #[must_use]
    pub fn standard_normal() -> Self {
        Self(DistributionParams::Normal {
            mean: 0.0,
            std_dev: 1.0,
        })
    }

    pub fn exponential(rate: f64) -> Result<Self, InvalidParameterError> {
        Self::new(DistributionParams::Exponential { rate })
    }

    pub fn continuous_uniform(low: f64, high: f64) -> Result<Self, InvalidParameterError> {
        Self::new(DistributionParams::ContinuousUniform { low, high })
    }

    #[must_use]
    pub fn params(&self) -> &DistributionParams {
        &self.0
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Closed-form population mean.
    #[must_use]
    pub fn true_mean(&self) -> f64 {
        match self.0 {
            DistributionParams::DiscreteUniform { outcomes } => (f64::from(outcomes) + 1.0) / 2.0,
            DistributionParams::Bernoulli { p } => p,
            DistributionParams::Binomial { trials, p } => f64::from(trials) * p,
            DistributionParams::Poisson { lambda } => lambda,
            DistributionParams::Normal { mean, .. } => mean,
            DistributionParams::Exponential { rate } => 1.0 / rate,
            DistributionParams::ContinuousUniform { low, high } => (low + high) / 2.0,
        }
    }

    /// Closed-form population standard deviation. Always strictly positive.
    #[must_use]
    pub fn true_std(&self) -> f64 {
        match self.0 {
            DistributionParams::DiscreteUniform { outcomes } => {
                let k = f64::from(outcomes);
                ((k * k - 1.0) / 12.0).sqrt()
            }
            DistributionParams::Bernoulli { p } => (p * (1.0 - p)).sqrt(),
            DistributionParams::Binomial { trials, p } => {
                (f64::from(trials) * p * (1.0 - p)).sqrt()
            }
            DistributionParams::Poisson { lambda } => lambda.sqrt(),
            DistributionParams::Normal { std_dev, .. } => std_dev,
            DistributionParams::Exponential { rate } => 1.0 / rate,
            DistributionParams::ContinuousUniform { low, high } => (high - low) / 12.0_f64.sqrt(),
        }
    }
}

impl TryFrom<DistributionParams> for DistributionSpec {
    type Error = InvalidParameterError;

    fn try_from(params: DistributionParams) -> Result<Self, Self::Error> {
        Self::new(params)
    }
}

impl From<DistributionSpec> for DistributionParams {
    fn from(spec: DistributionSpec) -> Self {
        spec.0
    }
}

impl fmt::Display for DistributionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            DistributionParams::DiscreteUniform { outcomes } => {
                write!(f, "DiscreteUniform(k={outcomes})")
            }
            DistributionParams::Bernoulli { p } => write!(f, "Bernoulli(p={p})"),
            DistributionParams::Binomial { trials, p } => write!(f, "Binomial(n={trials}, p={p})"),
            DistributionParams::Poisson { lambda } => write!(f, "Poisson(lambda={lambda})"),
            DistributionParams::Normal { mean, std_dev } => {
                write!(f, "Normal(mean={mean}, std_dev={std_dev})")
            }
            DistributionParams::Exponential { rate } => write!(f, "Exponential(rate={rate})"),
            DistributionParams::ContinuousUniform { low, high } => {
                write!(f, "ContinuousUniform({low}, {high})")
            }
        }
    }
}

impl Distribution<f64> for DistributionSpec {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self.0 {
            DistributionParams::DiscreteUniform { outcomes } => {
                f64::from(rng.random_range(1..=outcomes))
            }
            DistributionParams::Bernoulli { p } => f64::from(u8::from(rng.random_bool(p))),
            DistributionParams::Binomial { trials, p } => {
                let successes = (0..trials)
                    .map(|_| u32::from(rng.random_bool(p)))
                    .sum::<u32>();
                f64::from(successes)
            }
            DistributionParams::Poisson { lambda } => sample_poisson(lambda, rng),
            DistributionParams::Normal { mean, std_dev } => {
                mean + std_dev * sample_standard_normal(rng)
            }
            DistributionParams::Exponential { rate } => {
                let u: f64 = rng.random();
                -(1.0 - u).ln() / rate
            }
            DistributionParams::ContinuousUniform { low, high } => {
                low + rng.random::<f64>() * (high - low)
            }
        }
    }
}

/// Knuth's product-of-uniforms sampler.
///
/// Multiplies uniform draws until the running product falls below `exp(-λ)`;
/// the number of multiplications minus one is Poisson distributed.
fn sample_poisson<R: Rng + ?Sized>(lambda: f64, rng: &mut R) -> f64 {
    let limit = (-lambda).exp();
    let mut count = 0_u32;
    let mut product = 1.0;
    loop {
        count += 1;
        product *= rng.random::<f64>();
        if product < limit {
            return f64::from(count - 1);
        }
    }
}

/// Box–Muller transform of two independent uniforms, keeping the cosine branch.
fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // ln(0) is undefined
    let u1 = loop {
        let u: f64 = rng.random();
        if u > 0.0 {
            break u;
        }
    };
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}
