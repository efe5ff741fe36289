//! Short opaque codes for provider users
//!
//! Codes are 6 uppercase alphanumeric characters; the repository layer
//! re-rolls on collision at insert time.

use rand::Rng;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const CODE_LENGTH: usize = 6;

/// Generate a random code of [`CODE_LENGTH`] characters.
pub fn generate_unique_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
