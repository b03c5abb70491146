//! DAO login: sign with a delegate wallet on behalf of a delegator address
//! registered in the on-chain delegation registry.

use alloy::primitives::Address;
use async_trait::async_trait;
use rpc::constants::DELEGATION_NAMESPACE;

use crate::builder::SiweOverrides;
use crate::extension::{ConfigOverrides, ConnectedView, Extension};

/// Puts `delegator` in the message's address field. Registering it is what
/// sets `daoLogin` on the login call, so the server falls back to a delegate
/// check when the signature does not recover to `delegator`.
#[derive(Clone, Debug)]
pub struct DelegationExtension {
    delegator: Address,
}

impl DelegationExtension {
    pub fn new(delegator: Address) -> Self {
        Self { delegator }
    }

    pub fn delegator(&self) -> Address {
        self.delegator
    }
}

#[async_trait]
impl Extension for DelegationExtension {
    fn namespace(&self) -> Option<&str> {
        Some(DELEGATION_NAMESPACE)
    }

    async fn after_connect(
        &self,
        connection: &ConnectedView<'_>,
    ) -> anyhow::Result<Option<ConfigOverrides>> {
        if self.delegator == connection.wallet_address() {
            // Signing for yourself is a plain login.
            return Ok(None);
        }
        Ok(Some(ConfigOverrides {
            siwe: SiweOverrides {
                address: Some(self.delegator),
                ..Default::default()
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::primitives::address;

    use super::*;
    use crate::extension::{ConnectContext, apply_extensions, is_extension_enabled};
    use crate::session_key::SessionKey;

    const WALLET: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const DAO: Address = address!("4242424242424242424242424242424242424242");

    async fn overrides_for(delegator: Address) -> SiweOverrides {
        let key = SessionKey::generate();
        let extensions: Vec<Arc<dyn Extension>> =
            vec![Arc::new(DelegationExtension::new(delegator))];
        assert!(is_extension_enabled(&extensions, DELEGATION_NAMESPACE));
        apply_extensions(
            &extensions,
            ConnectContext {
                wallet_address: WALLET,
                domain: "example.com",
                chain_id: 1,
                session_key: &key,
            },
        )
        .await
        .unwrap()
        .siwe
    }

    #[tokio::test]
    async fn delegator_replaces_the_message_address() {
        assert_eq!(overrides_for(DAO).await.address, Some(DAO));
    }

    #[tokio::test]
    async fn own_address_is_left_alone() {
        assert_eq!(overrides_for(WALLET).await, SiweOverrides::default());
    }
}
