//! Human-readable unique code generation.
//!
//! Codes use an alphabet without visually ambiguous characters (no I, L,
//! O, 0, 1) so they survive being read over the phone or typed from a
//! receipt. Uniqueness is enforced at issuance time against the store;
//! the generator only guarantees unpredictability.

use rand::Rng;

/// Alphabet for generated codes.
const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Length of the random portion of a coupon code.
const CODE_LEN: usize = 10;

/// Length of an affiliate link token.
const TOKEN_LEN: usize = 12;

/// Prefix for affiliate coupon codes.
pub const AFFILIATE_PREFIX: &str = "AFF";

/// Prefix for content-meal coupon codes.
pub const CONTENT_MEAL_PREFIX: &str = "MEAL";

fn random_chars(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Generate a coupon code with the given type prefix, e.g. `AFF-K7Q2...`.
pub fn coupon_code(prefix: &str) -> String {
    format!("{prefix}-{}", random_chars(CODE_LEN))
}

/// Generate an affiliate link token.
pub fn link_token() -> String {
    random_chars(TOKEN_LEN)
}
