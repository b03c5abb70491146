use alloy::primitives::Address;
use alloy::signers::{Signer, local::PrivateKeySigner};
use async_trait::async_trait;
use crypto::hex::encode_hex;

use crate::error::ClientError;

/// The account that signs the SIWE message.
#[async_trait]
pub trait Wallet: Send + Sync {
    fn address(&self) -> Address;

    /// EIP-191 personal signature over `message`, 0x-prefixed hex.
    async fn sign_message(&self, message: &str) -> Result<String, ClientError>;
}

#[async_trait]
impl Wallet for PrivateKeySigner {
    fn address(&self) -> Address {
        Signer::address(self)
    }

    async fn sign_message(&self, message: &str) -> Result<String, ClientError> {
        let signature = Signer::sign_message(self, message.as_bytes())
            .await
            .map_err(|e| ClientError::Signer(e.to_string()))?;
        Ok(encode_hex(&signature.as_bytes()))
    }
}
