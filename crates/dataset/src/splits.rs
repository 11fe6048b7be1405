//! Seeded train/validation splitting.

use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Seed used for the train/validation split unless configured otherwise.
pub const DEFAULT_SPLIT_SEED: u64 = 42;
/// Fraction of the training tree held out for validation.
pub const DEFAULT_VAL_RATIO: f32 = 0.2;

/// Shuffle `items` with `seed` and hold out `round(len * val_ratio)` for validation.
///
/// At least one item stays in the training part whenever `items` is non-empty.
pub fn split_train_val<T>(mut items: Vec<T>, val_ratio: f32, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);
    let ratio = val_ratio.clamp(0.0, 1.0);
    let mut n_val = (items.len() as f32 * ratio).round() as usize;
    if n_val >= items.len() && !items.is_empty() {
        n_val = items.len() - 1;
    }
    let val = items.split_off(items.len() - n_val);
    (items, val)
}
