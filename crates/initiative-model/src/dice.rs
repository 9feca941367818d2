//! Dice rolling.

use rand::Rng;

/// Number of faces on the initiative die.
const D20_FACES: i32 = 20;

/// Rolls a twenty-sided die, returning a value in `1..=20`.
///
/// `random_range` draws uniformly, so every face is equally likely.
pub fn roll_d20() -> i32 {
    rand::rng().random_range(1..=D20_FACES)
}
