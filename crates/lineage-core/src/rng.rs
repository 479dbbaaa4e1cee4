//! Snapshot and restore of transformation RNG state
//!
//! Stochastic transformations draw from a `ChaCha8Rng`. Its full position is
//! `(seed, stream, word_pos)`, which is what gets persisted per application.

use crate::errors::{LineageError, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Generator type every stochastic transformation exposes
pub type TransformRng = ChaCha8Rng;

/// Build a generator from a small integer seed
pub fn seeded(seed: u64) -> TransformRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Borrowed access to a transformation's generator
pub struct RngHandle<'a> {
    /// Name of the attribute holding the generator, recorded for replay
    pub attr: &'a str,
    pub rng: &'a mut TransformRng,
}

/// Serialized generator position
///
/// `word_pos` is a `u128` and is kept as a decimal string so the JSON stays
/// portable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RngState {
    pub seed: String,
    pub stream: u64,
    pub word_pos: String,
}

impl RngState {
    pub fn capture(rng: &TransformRng) -> Self {
        Self {
            seed: hex::encode(rng.get_seed()),
            stream: rng.get_stream(),
            word_pos: rng.get_word_pos().to_string(),
        }
    }

    /// Rebuild a generator at exactly the captured position
    ///
    /// # Errors
    ///
    /// `CorruptProvenance` if the seed is not 32 hex-encoded bytes or the
    /// word position does not parse.
    pub fn restore(&self) -> Result<TransformRng> {
        let bytes = hex::decode(&self.seed)
            .map_err(|e| LineageError::corrupt(format!("rng seed is not hex: {}", e)))?;
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            LineageError::corrupt(format!("rng seed has {} bytes, expected 32", bytes.len()))
        })?;
        let word_pos: u128 = self.word_pos.parse().map_err(|_| {
            LineageError::corrupt(format!("rng word position '{}' is invalid", self.word_pos))
        })?;

        let mut rng = ChaCha8Rng::from_seed(seed);
        rng.set_stream(self.stream);
        rng.set_word_pos(word_pos);
        Ok(rng)
    }

    /// Overwrite `rng` with the captured position
    ///
    /// # Errors
    ///
    /// Same as [`restore`](Self::restore); `rng` is untouched on error.
    pub fn restore_into(&self, rng: &mut TransformRng) -> Result<()> {
        *rng = self.restore()?;
        Ok(())
    }
}
