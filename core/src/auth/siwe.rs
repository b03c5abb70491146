use alloy_primitives::{Address, Signature};
use chrono::{DateTime, Utc};
use crypto::hex::decode_hex;
use crypto::sig::personal_message_hash;
use log::{debug, warn};
use rpc::SiweMessage;

use crate::auth::fallback::VerificationFallback;
use crate::error::{ServiceError, ServiceResult, VerificationError, VerificationErrorType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMethod {
    /// Raw ECDSA recovery matched the message address.
    Signature,
    /// The fallback verifier vouched for the signer.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedMessage {
    pub message: SiweMessage,
    /// Raw recovery result, if the signature was recoverable at all.
    pub recovered: Option<Address>,
    pub method: VerificationMethod,
}

/// Verify a SIWE message against the nonce bound to the caller's session.
///
/// The checks run in a fixed order: nonce presence, message shape, nonce
/// equality, time bounds, then signer recovery with an optional fallback.
pub async fn verify_siwe_message(
    message: &SiweMessage,
    signature_hex: &str,
    nonce: Option<&str>,
    fallback: Option<&dyn VerificationFallback>,
    now: DateTime<Utc>,
) -> ServiceResult<VerifiedMessage> {
    let nonce = nonce.ok_or(ServiceError::InvalidNonce)?;

    message.validate()?;

    if message.nonce != nonce {
        return Err(VerificationError::mismatch(
            VerificationErrorType::NonceMismatch,
            nonce,
            &message.nonce,
        )
        .into());
    }

    if let Some(expiration) = message.expiration()?
        && expiration <= now
    {
        return Err(VerificationError::mismatch(
            VerificationErrorType::ExpiredMessage,
            now.to_rfc3339(),
            message.expiration_time.clone().unwrap_or_default(),
        )
        .into());
    }

    if let Some(not_before) = message.not_before_time()?
        && not_before > now
    {
        return Err(VerificationError::mismatch(
            VerificationErrorType::NotYetValid,
            message.not_before.clone().unwrap_or_default(),
            now.to_rfc3339(),
        )
        .into());
    }

    let signature_bytes = decode_hex(signature_hex).unwrap_or_default();
    let recovered = recover(message, &signature_bytes);

    if recovered == Some(message.address) {
        return Ok(VerifiedMessage {
            message: message.clone(),
            recovered,
            method: VerificationMethod::Signature,
        });
    }

    let expected = message.address.to_checksum(None);
    let received = recovered
        .map(|a| a.to_checksum(None))
        .unwrap_or_else(|| "unrecoverable signature".into());

    let Some(fallback) = fallback else {
        debug!("signature for {expected} recovered to {received}");
        return Err(VerificationError::mismatch(
            VerificationErrorType::SignatureMismatch,
            expected,
            received,
        )
        .into());
    };

    match fallback.verify(message, &signature_bytes, recovered).await {
        Ok(true) => Ok(VerifiedMessage {
            message: message.clone(),
            recovered,
            method: VerificationMethod::Fallback,
        }),
        Ok(false) => Err(VerificationError::mismatch(fallback.failure_kind(), expected, received).into()),
        Err(err) => {
            warn!("fallback verification for {expected} failed: {err}");
            Err(VerificationError::mismatch(fallback.failure_kind(), expected, received).into())
        }
    }
}

fn recover(message: &SiweMessage, signature_bytes: &[u8]) -> Option<Address> {
    if signature_bytes.len() != 65 {
        return None;
    }
    let signature = Signature::try_from(signature_bytes).ok()?;
    let digest = personal_message_hash(&message.prepare_message());
    signature.recover_address_from_prehash(&digest).ok()
}
