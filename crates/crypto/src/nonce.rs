use rand::{Rng, distributions::Alphanumeric, rngs::OsRng};

/// 17 alphanumeric characters carry a little over 101 bits of entropy.
pub const NONCE_LEN: usize = 17;

/// Generate a single-use, URL-safe nonce from the operating system RNG.
pub fn generate_nonce() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}
