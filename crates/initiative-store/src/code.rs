//! Join-code generation.

use rand::Rng;

/// Characters a generated code may contain. `I`, `O`, `0` and `1` are left
/// out so codes can be read aloud and typed without confusion.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a generated code.
pub const CODE_LEN: usize = 5;

/// Generates a random join code, each character drawn uniformly from
/// [`CODE_ALPHABET`].
///
/// Uniqueness is the caller's job; see `GroupStore::get_or_create_group`.
pub fn random_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect()
}
