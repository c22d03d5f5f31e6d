use serde::{Deserialize, Serialize};

/// Luminosities outside this open interval are dropped when building the population.
pub const LUMINOSITY_RANGE: (f64, f64) = (0.0, 80.0);

/// Star catalog document as stored on disk.
///
/// ```json
/// {
///   "stars": [{ "x": 0.1, "y": 0.7, "mag": 4.2 }],
///   "population": { "n": 1, "mean": 58.0, "std": 0.0 }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarCatalog {
    pub stars: Vec<Star>,
    /// Summary the catalog was published with, if any.
    #[serde(default)]
    pub population: Option<CatalogPopulation>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Star {
    pub x: f64,
    pub y: f64,
    /// Apparent magnitude (smaller is brighter).
    pub mag: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CatalogPopulation {
    pub n: usize,
    pub mean: f64,
    pub std: f64,
}

impl Star {
    /// Brightness on a linear scale: `100 - 10 × magnitude`.
    #[must_use]
    pub fn luminosity(&self) -> f64 {
        100.0 - self.mag * 10.0
    }
}

impl StarCatalog {
    /// Luminosities of all stars strictly inside [`LUMINOSITY_RANGE`], in catalog order.
    #[must_use]
    pub fn luminosities(&self) -> Vec<f64> {
        let (low, high) = LUMINOSITY_RANGE;
        self.stars
            .iter()
            .map(Star::luminosity)
            .filter(|&l| low < l && l < high)
            .collect()
    }
}
