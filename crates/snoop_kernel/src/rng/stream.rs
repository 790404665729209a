//! Seeded normal-variate stream with deterministic substreams.
//!
//! This module provides [`SnoopRng`], a seeded PRNG wrapper that draws
//! standard-normal variates and can be split into per-trial substreams.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use super::NormalSource;

/// Stream id reserved for the shared (sequential) stream of a run.
const SHARED_STREAM: u64 = 0;

/// Simulation random number generator.
///
/// Wraps a ChaCha8 generator keyed from a 64-bit seed. ChaCha exposes
/// independent streams under one key, which gives each trial of a split run
/// its own non-overlapping sequence without any hashing of seeds.
///
/// # Examples
///
/// ```rust
/// use snoop_kernel::rng::SnoopRng;
///
/// let mut rng = SnoopRng::from_seed(42);
/// let n: f64 = rng.gen_normal();
/// assert!(n.is_finite());
///
/// let mut buffer = vec![0.0; 100];
/// rng.fill_normal(&mut buffer);
/// assert_eq!(rng.draws(), 101);
/// ```
#[derive(Clone, Debug)]
pub struct SnoopRng {
    /// The underlying PRNG instance.
    inner: ChaCha8Rng,
    /// The seed used for initialisation (stored for reproducibility tracking).
    seed: u64,
    /// ChaCha stream id selected under the seed's key.
    stream: u64,
    /// Number of variates drawn so far.
    draws: u64,
}

impl SnoopRng {
    /// Creates the shared stream for `seed`.
    ///
    /// The same seed always produces the same sequence of variates.
    ///
    /// ```rust
    /// use snoop_kernel::rng::SnoopRng;
    ///
    /// let mut rng1 = SnoopRng::from_seed(12345);
    /// let mut rng2 = SnoopRng::from_seed(12345);
    /// assert_eq!(rng1.gen_normal(), rng2.gen_normal());
    /// ```
    #[inline]
    pub fn from_seed(seed: u64) -> Self {
        Self::with_stream(seed, SHARED_STREAM)
    }

    /// Creates the substream for trial `index` of a run seeded with `seed`.
    ///
    /// Substreams never coincide with the shared stream of the same seed, nor
    /// with each other.
    #[inline]
    pub fn substream(seed: u64, index: usize) -> Self {
        Self::with_stream(seed, index as u64 + 1)
    }

    fn with_stream(seed: u64, stream: u64) -> Self {
        let mut inner = ChaCha8Rng::seed_from_u64(seed);
        inner.set_stream(stream);
        Self {
            inner,
            seed,
            stream,
            draws: 0,
        }
    }

    /// Returns the seed used for initialisation.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the ChaCha stream id (0 for the shared stream).
    #[inline]
    pub fn stream(&self) -> u64 {
        self.stream
    }

    /// Returns the number of variates drawn since construction.
    #[inline]
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Generates a single standard normal variate (mean=0, std=1).
    ///
    /// Uses the Ziggurat algorithm via `rand_distr::StandardNormal`.
    #[inline]
    pub fn gen_normal(&mut self) -> f64 {
        self.draws += 1;
        StandardNormal.sample(&mut self.inner)
    }

    /// Fills the buffer with standard normal variates.
    ///
    /// Zero-allocation; empty buffers are a no-op.
    #[inline]
    pub fn fill_normal(&mut self, buffer: &mut [f64]) {
        for value in buffer.iter_mut() {
            *value = StandardNormal.sample(&mut self.inner);
        }
        self.draws += buffer.len() as u64;
    }
}

impl NormalSource for SnoopRng {
    #[inline]
    fn next_normal(&mut self) -> f64 {
        self.gen_normal()
    }
}
