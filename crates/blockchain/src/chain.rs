use alloy::network::TransactionBuilder;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::{SolCall, sol};
use async_trait::async_trait;
use log::{debug, info};

use crate::ens::{ENS_REGISTRY, namehash, reverse_name};
use crate::error::{ResolutionError, Result};
use crate::resolver::{AddressResolver, ContractSignatureVerifier, DelegateOracle, Network};

/// Gnosis delegate registry, same address on every chain it is deployed to.
pub const DELEGATE_REGISTRY: Address =
    alloy_primitives::address!("469788fE6E9E9681C6ebF3bF78e7Fd26Fc015446");

pub const ERC1271_MAGIC_VALUE: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];

sol! {
    interface IEnsRegistry {
        function resolver(bytes32 node) external view returns (address);
    }

    interface IEnsResolver {
        function name(bytes32 node) external view returns (string);
        function addr(bytes32 node) external view returns (address);
        function text(bytes32 node, string key) external view returns (string);
    }

    interface IDelegateRegistry {
        function delegation(address delegator, bytes32 id) external view returns (address);
    }

    function isValidSignature(bytes32 hash, bytes signature) external view returns (bytes4);
}

/// Chain access over an alloy provider.
#[derive(Clone)]
pub struct ChainClient {
    provider: DynProvider,
    delegation_id: B256,
}

impl ChainClient {
    pub async fn connect(rpc_url: &str) -> Result<Self> {
        let provider = ProviderBuilder::new()
            .connect(rpc_url)
            .await
            .map_err(|e| ResolutionError::Provider(e.to_string()))?
            .erased();
        info!("connected chain provider at {rpc_url}");
        Ok(Self::new(provider))
    }

    pub fn new(provider: DynProvider) -> Self {
        Self {
            provider,
            delegation_id: B256::ZERO,
        }
    }

    /// Delegations are looked up under `id` in addition to the global one.
    pub fn with_delegation_id(mut self, id: B256) -> Self {
        self.delegation_id = id;
        self
    }

    async fn eth_call<C: SolCall>(&self, to: Address, call: C) -> Result<C::Return> {
        let tx = TransactionRequest::default()
            .with_to(to)
            .with_input(Bytes::from(call.abi_encode()));
        let data = self
            .provider
            .call(tx)
            .await
            .map_err(|e| ResolutionError::Provider(e.to_string()))?;
        C::abi_decode_returns(&data).map_err(|e| ResolutionError::Decode(e.to_string()))
    }

    async fn resolver_for(&self, node: B256) -> Result<Option<Address>> {
        let resolver = self
            .eth_call(ENS_REGISTRY, IEnsRegistry::resolverCall { node })
            .await?;
        Ok((!resolver.is_zero()).then_some(resolver))
    }

    /// Forward-resolve `name` and return its text record `key`.
    async fn text_record(&self, name: &str, key: &str) -> Result<Option<String>> {
        let node = namehash(name);
        let Some(resolver) = self.resolver_for(node).await? else {
            return Ok(None);
        };
        let value = self
            .eth_call(
                resolver,
                IEnsResolver::textCall {
                    node,
                    key: key.to_string(),
                },
            )
            .await?;
        Ok((!value.is_empty()).then_some(value))
    }
}

#[async_trait]
impl AddressResolver for ChainClient {
    async fn lookup_address(&self, address: Address) -> Result<Option<String>> {
        let node = namehash(&reverse_name(&address));
        let Some(resolver) = self.resolver_for(node).await? else {
            return Ok(None);
        };
        let name = self
            .eth_call(resolver, IEnsResolver::nameCall { node })
            .await?;
        if name.is_empty() {
            return Ok(None);
        }

        // A reverse record only counts if the name resolves back to the address.
        let forward = namehash(&name);
        let Some(forward_resolver) = self.resolver_for(forward).await? else {
            return Ok(None);
        };
        let resolved = self
            .eth_call(forward_resolver, IEnsResolver::addrCall { node: forward })
            .await?;
        debug!("ENS reverse lookup {address} -> {name} (forward {resolved})");
        Ok((resolved == address).then_some(name))
    }

    async fn get_avatar(&self, address: Address) -> Result<Option<String>> {
        match self.lookup_address(address).await? {
            Some(name) => self.text_record(&name, "avatar").await,
            None => Ok(None),
        }
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| ResolutionError::Provider(e.to_string()))
    }

    async fn get_block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ResolutionError::Provider(e.to_string()))
    }

    async fn get_network(&self) -> Result<Network> {
        let chain_id = self
            .provider
            .get_chain_id()
            .await
            .map_err(|e| ResolutionError::Provider(e.to_string()))?;
        Ok(Network::from_chain_id(chain_id))
    }
}

#[async_trait]
impl DelegateOracle for ChainClient {
    async fn is_delegate(
        &self,
        delegator: Address,
        delegate: Address,
        chain_id: u64,
    ) -> Result<bool> {
        let network = self.get_network().await?;
        if network.chain_id != chain_id {
            return Err(ResolutionError::UnsupportedNetwork {
                chain_id,
                name: network.name,
            });
        }

        let mut ids = vec![B256::ZERO];
        if !self.delegation_id.is_zero() {
            ids.push(self.delegation_id);
        }
        for id in ids {
            let registered = self
                .eth_call(
                    DELEGATE_REGISTRY,
                    IDelegateRegistry::delegationCall { delegator, id },
                )
                .await?;
            if registered == delegate {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[async_trait]
impl ContractSignatureVerifier for ChainClient {
    async fn is_valid_signature(
        &self,
        contract: Address,
        hash: B256,
        signature: &[u8],
    ) -> Result<bool> {
        let call = isValidSignatureCall {
            hash,
            signature: Bytes::copy_from_slice(signature),
        };
        let tx = TransactionRequest::default()
            .with_to(contract)
            .with_input(Bytes::from(call.abi_encode()));
        let response = self
            .provider
            .call(tx)
            .await
            .map_err(|e| ResolutionError::Provider(format!("erc1271 call failed: {e}")))?;

        Ok(response.len() >= 4 && response.as_ref()[0..4] == ERC1271_MAGIC_VALUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_calls_encode_with_selector() {
        let call = IDelegateRegistry::delegationCall {
            delegator: Address::repeat_byte(1),
            id: B256::ZERO,
        };
        let encoded = call.abi_encode();
        assert_eq!(encoded.len(), 4 + 32 + 32);
        assert_eq!(&encoded[..4], &IDelegateRegistry::delegationCall::SELECTOR);
    }

    #[test]
    fn erc1271_selector_is_magic_value() {
        assert_eq!(isValidSignatureCall::SELECTOR, ERC1271_MAGIC_VALUE);
    }
}
