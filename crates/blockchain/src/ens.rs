use std::future::Future;
use std::pin::Pin;

use alloy_primitives::{Address, B256, keccak256};
use futures_util::future::join_all;
use log::warn;
use rpc::{EnsData, EnsResolveOptions};

use crate::error::{ResolutionError, Result};
use crate::resolver::AddressResolver;

pub const ENS_REGISTRY: Address =
    alloy_primitives::address!("00000000000C2E074eC69A0dFb2997BA6C7d2e1e");

/// EIP-137 namehash.
pub fn namehash(name: &str) -> B256 {
    let mut node = B256::ZERO;
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let label_hash = keccak256(label.as_bytes());
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(node.as_slice());
        buf[32..].copy_from_slice(label_hash.as_slice());
        node = keccak256(buf);
    }
    node
}

/// Name used for reverse records: `<lowercase hex>.addr.reverse`.
pub fn reverse_name(address: &Address) -> String {
    format!("{}.addr.reverse", hex::encode(address.as_slice()))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lookup {
    Domain,
    Avatar,
}

type LookupFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>>;

/// Resolve the requested ENS data. Only the enabled lookups are issued and
/// each one fails soft: an error leaves its field empty.
pub async fn resolve_ens(
    resolver: &dyn AddressResolver,
    address: Address,
    options: EnsResolveOptions,
) -> Result<EnsData> {
    if address.is_zero() {
        return Err(ResolutionError::MissingAddress);
    }

    let mut issued = Vec::with_capacity(2);
    let mut lookups: Vec<LookupFuture<'_>> = Vec::with_capacity(2);
    if options.domain {
        issued.push(Lookup::Domain);
        lookups.push(Box::pin(resolver.lookup_address(address)));
    }
    if options.avatar {
        issued.push(Lookup::Avatar);
        lookups.push(Box::pin(resolver.get_avatar(address)));
    }

    let mut ens = EnsData::default();
    // Results come back in issue order, so pair them with what was issued
    // rather than with fixed positions.
    for (kind, result) in issued.into_iter().zip(join_all(lookups).await) {
        let value = match result {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(err) => {
                warn!("ENS {kind:?} lookup for {address} failed: {err}");
                None
            }
        };
        match kind {
            Lookup::Domain => ens.domain = value,
            Lookup::Avatar => ens.avatar_url = value,
        }
    }
    Ok(ens)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Mutex;

    use alloy_primitives::U256;
    use async_trait::async_trait;

    use super::*;
    use crate::resolver::Network;

    #[derive(Default)]
    struct MockResolver {
        fail_domain: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl AddressResolver for MockResolver {
        async fn lookup_address(&self, _address: Address) -> Result<Option<String>> {
            self.calls.lock().unwrap().push("lookup_address");
            if self.fail_domain {
                return Err(ResolutionError::Provider("boom".into()));
            }
            Ok(Some("vitalik.eth".into()))
        }

        async fn get_avatar(&self, _address: Address) -> Result<Option<String>> {
            self.calls.lock().unwrap().push("get_avatar");
            Ok(Some("https://avatar/v.png".into()))
        }

        async fn get_balance(&self, _address: Address) -> Result<U256> {
            Ok(U256::ZERO)
        }

        async fn get_block_number(&self) -> Result<u64> {
            Ok(0)
        }

        async fn get_network(&self) -> Result<Network> {
            Ok(Network::from_chain_id(1))
        }
    }

    fn address() -> Address {
        Address::repeat_byte(0xab)
    }

    #[test]
    fn namehash_matches_known_values() {
        assert_eq!(namehash(""), B256::ZERO);
        assert_eq!(
            namehash("eth"),
            B256::from_str("0x93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae")
                .unwrap()
        );
        assert_eq!(
            namehash("addr.reverse"),
            B256::from_str("0x91d1777781884d03a6757a803996e38de2a42967fb37eeaca72729271025a9e2")
                .unwrap()
        );
    }

    #[test]
    fn reverse_name_is_lowercase_without_prefix() {
        assert_eq!(
            reverse_name(&address()),
            format!("{}.addr.reverse", "ab".repeat(20))
        );
    }

    #[test_log::test(tokio::test)]
    async fn avatar_only_lands_in_avatar_field() {
        let resolver = MockResolver::default();
        let options = EnsResolveOptions {
            domain: false,
            avatar: true,
        };
        let ens = resolve_ens(&resolver, address(), options).await.unwrap();

        assert_eq!(ens.domain, None);
        assert_eq!(ens.avatar_url.as_deref(), Some("https://avatar/v.png"));
        assert_eq!(*resolver.calls.lock().unwrap(), vec!["get_avatar"]);
    }

    #[test_log::test(tokio::test)]
    async fn both_lookups_are_issued() {
        let resolver = MockResolver::default();
        let ens = resolve_ens(&resolver, address(), EnsResolveOptions::ALL)
            .await
            .unwrap();
        assert_eq!(ens.domain.as_deref(), Some("vitalik.eth"));
        assert_eq!(ens.avatar_url.as_deref(), Some("https://avatar/v.png"));
        assert_eq!(resolver.calls.lock().unwrap().len(), 2);
    }

    #[test_log::test(tokio::test)]
    async fn failed_lookup_only_drops_its_field() {
        let resolver = MockResolver {
            fail_domain: true,
            ..Default::default()
        };
        let ens = resolve_ens(&resolver, address(), EnsResolveOptions::ALL)
            .await
            .unwrap();
        assert_eq!(ens.domain, None);
        assert_eq!(ens.avatar_url.as_deref(), Some("https://avatar/v.png"));
    }

    #[test_log::test(tokio::test)]
    async fn zero_address_is_rejected() {
        let resolver = MockResolver::default();
        let result = resolve_ens(&resolver, Address::ZERO, EnsResolveOptions::ALL).await;
        assert!(matches!(result, Err(ResolutionError::MissingAddress)));
    }
}
