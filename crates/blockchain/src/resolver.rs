use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::error::Result;

/// Chain a provider is connected to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Network {
    pub chain_id: u64,
    pub name: String,
}

impl Network {
    /// Names follow the common provider naming so Lens can pick its endpoint.
    pub fn from_chain_id(chain_id: u64) -> Self {
        let name = match chain_id {
            1 => "homestead",
            5 => "goerli",
            10 => "optimism",
            137 => "matic",
            42161 => "arbitrum",
            80001 => "matic-mumbai",
            11155111 => "sepolia",
            _ => "unknown",
        };
        Self {
            chain_id,
            name: name.to_string(),
        }
    }
}

/// Read access to chain state used around login: name service lookups and a
/// few account/network queries.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Reverse-resolve an address to its primary ENS name.
    async fn lookup_address(&self, address: Address) -> Result<Option<String>>;

    /// Avatar URL of the name the address reverse-resolves to.
    async fn get_avatar(&self, address: Address) -> Result<Option<String>>;

    async fn get_balance(&self, address: Address) -> Result<U256>;

    async fn get_block_number(&self) -> Result<u64>;

    async fn get_network(&self) -> Result<Network>;
}

/// Confirms that `delegate` may act for `delegator` on a chain.
#[async_trait]
pub trait DelegateOracle: Send + Sync {
    async fn is_delegate(&self, delegator: Address, delegate: Address, chain_id: u64)
    -> Result<bool>;
}

/// ERC-1271 signature checks against contract wallets.
#[async_trait]
pub trait ContractSignatureVerifier: Send + Sync {
    async fn is_valid_signature(
        &self,
        contract: Address,
        hash: B256,
        signature: &[u8],
    ) -> Result<bool>;
}
