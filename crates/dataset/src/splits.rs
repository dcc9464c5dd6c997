//! Train/validation index partitioning.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// A fixed train/validation partition of sample indices.
///
/// Computed once per run from a seeded shuffle; membership never changes for
/// the lifetime of the run (epoch-level shuffling reorders `train` only).
#[derive(Debug, Clone)]
pub struct IndexSplit {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
}

impl IndexSplit {
    /// Shuffle `0..len` with a seeded RNG and cut at `train_fraction`.
    pub fn split(len: usize, train_fraction: f32, seed: u64) -> Self {
        let mut indices: Vec<usize> = (0..len).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
        let cut = ((len as f32) * train_fraction.clamp(0.0, 1.0)).round() as usize;
        let cut = cut.min(len);
        let val = indices.split_off(cut);
        Self {
            train: indices,
            val,
        }
    }
}
