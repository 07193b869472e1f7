use std::sync::OnceLock;

use rand::seq::SliceRandom;
use rand::thread_rng;
use regex::Regex;

/// URL-safe alphabet for generated codes.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

pub const DEFAULT_CODE_LENGTH: usize = 8;

/// Generate a random code of `length` URL-safe characters.
///
/// Uniqueness is not guaranteed; callers still have to go through the store.
pub fn generate_code(length: usize) -> String {
    let mut rng = thread_rng();
    (0..length)
        .map(|_| *ALPHABET.choose(&mut rng).unwrap_or(&b'a') as char)
        .collect()
}

/// Whether `candidate` is acceptable as a user-chosen code.
pub fn is_valid_custom_code(candidate: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{4,50}$").expect("valid regex"))
        .is_match(candidate)
}
