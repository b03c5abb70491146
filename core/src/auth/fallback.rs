use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;
use blockchain::{ContractSignatureVerifier, DelegateOracle, ResolutionError};
use rpc::SiweMessage;

use crate::error::VerificationErrorType;

/// Second chance for a signature whose raw recovery does not match the
/// message address.
#[async_trait]
pub trait VerificationFallback: Send + Sync {
    /// `signer` is the raw recovery result, absent when the signature is not
    /// a plain 65-byte ECDSA signature.
    async fn verify(
        &self,
        message: &SiweMessage,
        signature: &[u8],
        signer: Option<Address>,
    ) -> Result<bool, ResolutionError>;

    /// Error reported when this fallback rejects.
    fn failure_kind(&self) -> VerificationErrorType {
        VerificationErrorType::SignatureMismatch
    }
}

/// DAO login: the signer must be a registered delegate of the message address.
pub struct DelegateFallback {
    oracle: Arc<dyn DelegateOracle>,
}

impl DelegateFallback {
    pub fn new(oracle: Arc<dyn DelegateOracle>) -> Self {
        Self { oracle }
    }
}

#[async_trait]
impl VerificationFallback for DelegateFallback {
    async fn verify(
        &self,
        message: &SiweMessage,
        _signature: &[u8],
        signer: Option<Address>,
    ) -> Result<bool, ResolutionError> {
        let Some(signer) = signer else {
            return Ok(false);
        };
        self.oracle
            .is_delegate(message.address, signer, message.chain_id)
            .await
    }

    fn failure_kind(&self) -> VerificationErrorType {
        VerificationErrorType::DelegateCheckFailed
    }
}

/// Contract wallets that implement ERC-1271 `isValidSignature`.
pub struct Erc1271Fallback {
    verifier: Arc<dyn ContractSignatureVerifier>,
}

impl Erc1271Fallback {
    pub fn new(verifier: Arc<dyn ContractSignatureVerifier>) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl VerificationFallback for Erc1271Fallback {
    async fn verify(
        &self,
        message: &SiweMessage,
        signature: &[u8],
        _signer: Option<Address>,
    ) -> Result<bool, ResolutionError> {
        let digest = crypto::sig::personal_message_hash(&message.prepare_message());
        self.verifier
            .is_valid_signature(message.address, digest, signature)
            .await
    }
}
