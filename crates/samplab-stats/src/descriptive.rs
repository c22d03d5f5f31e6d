use serde::Serialize;

/// Returned when a statistic that needs a variance is requested on fewer than two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("sample of {len} value(s) is too small, at least 2 are required")]
pub struct InsufficientSampleSizeError {
    pub len: usize,
}

/// Summary statistics of a single drawn sample.
///
/// The two dispersion measures deliberately use different denominators:
///
/// - `std_dev` divides the sum of squared deviations by `n - 1` (Bessel's correction),
///   which makes the variance an unbiased estimator.
/// - `skewness` is the third central moment divided by `n`, standardised by the
///   divide-by-`n` standard deviation.
///
/// Consequently `std_dev` is not the value used inside `skewness`, and the two are
/// never numerically identical for the same sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleStatistics {
    /// Number of values the statistics were computed from.
    pub len: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Bessel-corrected standard deviation.
    pub std_dev: f64,
    /// Third standardised moment (divide-by-`n`).
    pub skewness: f64,
}

impl SampleStatistics {
    /// Computes the statistics of `values`.
    ///
    /// The mean is computed first; the second and third central moments are then
    /// accumulated in a single pass.
    ///
    /// # Errors
    ///
    /// Fails with [`InsufficientSampleSizeError`] when fewer than two values are given,
    /// because the corrected variance is undefined.
    ///
    /// # Examples
    ///
    /// ```
    /// # use samplab_stats::descriptive::SampleStatistics;
    /// let stats = SampleStatistics::compute(&[1.0, 3.0]).unwrap();
    /// assert_eq!(stats.mean, 2.0);
    /// assert!((stats.std_dev - 2.0_f64.sqrt()).abs() < 1e-12);
    /// assert_eq!(stats.skewness, 0.0);
    ///
    /// assert!(SampleStatistics::compute(&[1.0]).is_err());
    /// ```
    #[expect(clippy::cast_precision_loss)]
    pub fn compute(values: &[f64]) -> Result<Self, InsufficientSampleSizeError> {
        let len = values.len();
        if len < 2 {
            return Err(InsufficientSampleSizeError { len });
        }

        let n = len as f64;
        let mean = values.iter().sum::<f64>() / n;
        let (sum_sq, sum_cube) = central_sums(values, mean);
        let std_dev = (sum_sq / (n - 1.0)).sqrt();
        let skewness = standardized_skewness(sum_sq / n, sum_cube / n);

        Ok(Self {
            len,
            mean,
            std_dev,
            skewness,
        })
    }
}

/// Moments of a complete finite population.
///
/// Every moment divides by `N`; these are the ground-truth values that resampling
/// experiments are measured against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PopulationMoments {
    /// Number of observations in the population.
    pub len: usize,
    /// Population mean.
    pub mean: f64,
    /// Population standard deviation (divide-by-`N`).
    pub std_dev: f64,
    /// Third standardised moment (divide-by-`N`).
    pub skewness: f64,
}

impl PopulationMoments {
    /// Computes the population moments in `O(N)`.
    ///
    /// # Returns
    ///
    /// * `Some(PopulationMoments)` - if `values` holds at least one value
    /// * `None` - if `values` is empty
    ///
    /// # Examples
    ///
    /// ```
    /// # use samplab_stats::descriptive::PopulationMoments;
    /// let moments = PopulationMoments::compute(&[42.0]).unwrap();
    /// assert_eq!(moments.mean, 42.0);
    /// assert_eq!(moments.std_dev, 0.0);
    ///
    /// assert!(PopulationMoments::compute(&[]).is_none());
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let len = values.len();
        let n = len as f64;
        let mean = values.iter().sum::<f64>() / n;
        let (sum_sq, sum_cube) = central_sums(values, mean);
        let variance = sum_sq / n;

        Some(Self {
            len,
            mean,
            std_dev: variance.sqrt(),
            skewness: standardized_skewness(variance, sum_cube / n),
        })
    }
}

/// Returns the sums of squared and cubed deviations from `mean`.
fn central_sums(values: &[f64], mean: f64) -> (f64, f64) {
    values.iter().fold((0.0, 0.0), |(sum_sq, sum_cube), &x| {
        let d = x - mean;
        let d2 = d * d;
        (sum_sq + d2, sum_cube + d2 * d)
    })
}

/// Third central moment over the cubed standard deviation.
///
/// A zero variance means every value is identical, which has no asymmetry.
fn standardized_skewness(variance: f64, third_moment: f64) -> f64 {
    if variance > 0.0 {
        third_moment / variance.powf(1.5)
    } else {
        0.0
    }
}
