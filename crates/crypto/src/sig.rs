use alloy_primitives::{Address, B256, Signature, eip191_hash_message};
use thiserror::Error;

use crate::hex::decode_hex;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature is not valid hex")]
    InvalidHex,

    #[error("signature must be 65 bytes, got {0}")]
    InvalidLength(usize),

    #[error("signature recovery failed")]
    Recovery,
}

/// Digest signed by `personal_sign`: keccak256 of the EIP-191 prefixed message.
pub fn personal_message_hash(message: &str) -> B256 {
    eip191_hash_message(message.as_bytes())
}

/// Parse a 65-byte `r || s || v` signature; `v` may be 0/1 or 27/28.
pub fn parse_signature(signature_hex: &str) -> Result<(Signature, Vec<u8>), SignatureError> {
    let bytes = decode_hex(signature_hex).map_err(|_| SignatureError::InvalidHex)?;
    if bytes.len() != 65 {
        return Err(SignatureError::InvalidLength(bytes.len()));
    }
    let signature =
        Signature::try_from(bytes.as_slice()).map_err(|_| SignatureError::InvalidLength(65))?;
    Ok((signature, bytes))
}

/// Recover the address that produced `signature_hex` over `message` with `personal_sign`.
pub fn recover_personal_signer(
    message: &str,
    signature_hex: &str,
) -> Result<Address, SignatureError> {
    let (signature, _) = parse_signature(signature_hex)?;
    signature
        .recover_address_from_prehash(&personal_message_hash(message))
        .map_err(|_| SignatureError::Recovery)
}
