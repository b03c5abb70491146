//! Cryptographic helpers shared by the SpruceKit server and SDK.
//! Nonce generation, hex handling and EIP-191 signer recovery live here so
//! both sides agree on the exact bytes being signed.

pub mod hex;
pub mod nonce;
pub mod sig;
