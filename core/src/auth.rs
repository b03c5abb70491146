pub mod fallback;
pub mod siwe;

pub use fallback::{DelegateFallback, Erc1271Fallback, VerificationFallback};
pub use siwe::{VerificationMethod, VerifiedMessage, verify_siwe_message};

/// Fresh single-use nonce for a SIWE challenge.
pub fn generate_nonce() -> String {
    crypto::nonce::generate_nonce()
}
