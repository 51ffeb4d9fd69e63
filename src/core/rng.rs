//! Deterministic random number generation as a pure value.
//!
//! ## Key Features
//!
//! - **Immutable**: `next_int` returns a new state next to the drawn value;
//!   there is no shared mutable generator.
//! - **Reproducible**: same seed plus same call sequence gives the same values.
//! - **Serializable**: the state is `{ algorithm, version, seed, word_pos }`,
//!   ChaCha8's seed word plus its 128-bit stream position, so a saved state
//!   replays on any engine build sharing the algorithm tag.
//!
//! ## Usage
//!
//! ```
//! use tabletop_kernel::core::{next_int, RngState};
//!
//! let rng = RngState::new(42);
//! let (a, rng_after) = next_int(&rng, 1, 6).unwrap();
//!
//! // Same input state, same draw.
//! let (b, _) = next_int(&rng, 1, 6).unwrap();
//! assert_eq!(a, b);
//! assert_ne!(rng, rng_after);
//! ```

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// Current version of the draw procedure for `RngAlgorithm::ChaCha8`.
pub const RNG_VERSION: u32 = 1;

/// Generator family recorded in every serialized RNG state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RngAlgorithm {
    #[default]
    ChaCha8,
}

/// Serializable generator state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RngState {
    pub algorithm: RngAlgorithm,
    pub version: u32,
    /// Seed word the ChaCha8 stream was keyed from.
    pub seed: u64,
    /// ChaCha8 word position (128-bit counter).
    pub word_pos: u128,
}

impl RngState {
    /// Create the state for a fresh seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            algorithm: RngAlgorithm::ChaCha8,
            version: RNG_VERSION,
            seed,
            word_pos: 0,
        }
    }

    fn generator(&self) -> Result<ChaCha8Rng, KernelError> {
        if self.version != RNG_VERSION {
            return Err(KernelError::UnsupportedRng {
                algorithm: self.algorithm,
                version: self.version,
            });
        }
        let mut inner = ChaCha8Rng::seed_from_u64(self.seed);
        inner.set_word_pos(self.word_pos);
        Ok(inner)
    }

    /// Draw an integer in `[min, max]` (inclusive).
    ///
    /// A zero-width range returns `min` and leaves the state untouched.
    pub fn next_int(&self, min: i64, max: i64) -> Result<(i64, RngState), KernelError> {
        if min > max {
            return Err(KernelError::RngRange { min, max });
        }
        if min == max {
            return Ok((min, self.clone()));
        }

        let mut inner = self.generator()?;
        let value = inner.gen_range(min..=max);
        let next = RngState {
            word_pos: inner.get_word_pos(),
            ..self.clone()
        };
        Ok((value, next))
    }

    /// Fisher-Yates shuffle driven by `next_int`.
    ///
    /// Consumes exactly `len - 1` draws, none for zero or one item.
    pub fn shuffle<T>(&self, items: &mut [T]) -> Result<RngState, KernelError> {
        let mut rng = self.clone();
        for i in (1..items.len()).rev() {
            let (j, next) = rng.next_int(0, i as i64)?;
            items.swap(i, j as usize);
            rng = next;
        }
        Ok(rng)
    }
}

/// Draw an integer in `[min, max]`, returning the value and the next state.
pub fn next_int(state: &RngState, min: i64, max: i64) -> Result<(i64, RngState), KernelError> {
    state.next_int(min, max)
}
