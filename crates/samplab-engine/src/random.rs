use std::{fmt, str::FromStr};

use rand::{
    Rng, RngCore, SeedableRng as _,
    distr::{Distribution, StandardUniform},
};
use rand_pcg::Pcg32;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Seed for a reproducible sampling run.
///
/// A 128-bit (16-byte) value that fully determines every draw made by a
/// [`SampleRng`] created from it, including the draws of worker threads that
/// were [forked](SampleRng::fork) from that generator.
///
/// Seeds are serialised (and parsed) as 32 hexadecimal characters, big-endian.
///
/// # Example
///
/// ```
/// use samplab_engine::random::{SampleRng, SampleSeed};
/// use rand::Rng as _;
///
/// let seed: SampleSeed = rand::rng().random();
/// let mut a = SampleRng::new(seed);
/// let mut b = SampleRng::new(seed);
/// assert_eq!(a.random::<u64>(), b.random::<u64>());
///
/// let parsed: SampleSeed = seed.to_string().parse().unwrap();
/// assert_eq!(parsed, seed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleSeed([u8; 16]);

impl SampleSeed {
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn to_bytes(self) -> [u8; 16] {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("invalid hex seed {input:?}: {reason}")]
pub struct ParseSeedError {
    input: String,
    reason: String,
}

impl FromStr for SampleSeed {
    type Err = ParseSeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = |reason: String| ParseSeedError {
            input: s.to_owned(),
            reason,
        };
        if s.len() != 32 {
            return Err(error(format!("expected 32 characters, got {}", s.len())));
        }
        // from_str_radix accepts a leading '+', which is not a hex digit
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(error("contains non-hex characters".to_owned()));
        }
        let num = u128::from_str_radix(s, 16).map_err(|e| error(e.to_string()))?;
        Ok(Self(num.to_be_bytes()))
    }
}

impl fmt::Display for SampleSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", u128::from_be_bytes(self.0))
    }
}

impl Serialize for SampleSeed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SampleSeed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        hex_str.parse().map_err(serde::de::Error::custom)
    }
}

/// Allows generating random `SampleSeed` values with `rng.random()`.
impl Distribution<SampleSeed> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> SampleSeed {
        let mut seed = [0; 16];
        rng.fill(&mut seed);
        SampleSeed(seed)
    }
}

/// The random source every sampler in the workspace draws from.
///
/// All sampling functions are generic over `R: Rng + ?Sized`, so any generator
/// can be injected; this type is the one the experiments and the CLI use, because
/// it is cheap, seedable and can be split across threads deterministically.
#[derive(Debug, Clone)]
pub struct SampleRng(Pcg32);

impl SampleRng {
    /// Creates a generator whose whole output is determined by `seed`.
    #[must_use]
    pub fn new(seed: SampleSeed) -> Self {
        Self(Pcg32::from_seed(seed.0))
    }

    /// Creates a generator seeded from the operating system's entropy source.
    #[must_use]
    pub fn from_os_rng() -> Self {
        Self(Pcg32::from_os_rng())
    }

    /// Derives an independent child generator.
    ///
    /// Forking advances `self`, so forking the same parent twice yields two
    /// different children, while replaying the parent from its seed replays every
    /// child in the same order.
    #[must_use]
    pub fn fork(&mut self) -> Self {
        Self(Pcg32::from_rng(&mut self.0))
    }
}

impl RngCore for SampleRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        self.0.fill_bytes(dst);
    }
}
