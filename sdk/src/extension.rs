use std::collections::BTreeMap;
use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use log::debug;
use rpc::{ClientSession, Recap};
use serde_json::{Map, Value};

use crate::builder::SiweOverrides;
use crate::error::ClientError;
use crate::session_key::SessionKey;

/// Overrides an extension returns from `after_connect`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub siwe: SiweOverrides,
}

/// An add-on to the sign-in flow. Every method has a no-op default, so an
/// extension only implements the hooks it needs.
///
/// Capabilities (`default_actions`, `targeted_actions`, `extra_fields`) are
/// only collected from extensions that declare a `namespace`.
#[async_trait]
pub trait Extension: Send + Sync {
    fn namespace(&self) -> Option<&str> {
        None
    }

    /// Label used in errors and logs.
    fn name(&self) -> &str {
        self.namespace().unwrap_or("anonymous")
    }

    /// Actions granted over the namespace itself.
    async fn default_actions(&self) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn targeted_actions(&self) -> anyhow::Result<BTreeMap<String, Vec<String>>> {
        Ok(BTreeMap::new())
    }

    async fn extra_fields(&self) -> anyhow::Result<Map<String, Value>> {
        Ok(Map::new())
    }

    async fn after_connect(
        &self,
        _connection: &ConnectedView<'_>,
    ) -> anyhow::Result<Option<ConfigOverrides>> {
        Ok(None)
    }

    async fn after_sign_in(&self, _session: &mut ClientSession) -> anyhow::Result<()> {
        Ok(())
    }
}

/// What `after_connect` hooks can see of a connection that has not signed in.
pub struct ConnectedView<'a> {
    pub(crate) wallet_address: Address,
    pub(crate) domain: &'a str,
    pub(crate) chain_id: u64,
    pub(crate) session_key: &'a SessionKey,
    pub(crate) siwe: &'a SiweOverrides,
    pub(crate) extensions: &'a [Arc<dyn Extension>],
}

impl ConnectedView<'_> {
    pub fn wallet_address(&self) -> Address {
        self.wallet_address
    }

    pub fn domain(&self) -> &str {
        self.domain
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn session_key_did(&self) -> String {
        self.session_key.did(self.chain_id)
    }

    /// SIWE overrides contributed by the extensions that ran before this one.
    pub fn siwe(&self) -> &SiweOverrides {
        self.siwe
    }

    /// True when exactly one registered extension has `namespace`.
    pub fn is_extension_enabled(&self, namespace: &str) -> bool {
        is_extension_enabled(self.extensions, namespace)
    }
}

pub(crate) fn is_extension_enabled(extensions: &[Arc<dyn Extension>], namespace: &str) -> bool {
    extensions
        .iter()
        .filter(|e| e.namespace() == Some(namespace))
        .count()
        == 1
}

/// Result of running the connect-time half of the pipeline.
#[derive(Clone, Debug, Default)]
pub(crate) struct ExtensionGrants {
    pub siwe: SiweOverrides,
    pub recap: Recap,
}

pub(crate) struct ConnectContext<'a> {
    pub wallet_address: Address,
    pub domain: &'a str,
    pub chain_id: u64,
    pub session_key: &'a SessionKey,
}

/// Run `after_connect` and collect capabilities, one extension at a time in
/// registration order. Later overrides win per field; grants accumulate.
pub(crate) async fn apply_extensions(
    extensions: &[Arc<dyn Extension>],
    ctx: ConnectContext<'_>,
) -> Result<ExtensionGrants, ClientError> {
    let mut grants = ExtensionGrants::default();

    for extension in extensions {
        let name = extension.name();
        let overrides = {
            let view = ConnectedView {
                wallet_address: ctx.wallet_address,
                domain: ctx.domain,
                chain_id: ctx.chain_id,
                session_key: ctx.session_key,
                siwe: &grants.siwe,
                extensions,
            };
            extension
                .after_connect(&view)
                .await
                .map_err(|e| ClientError::extension(name, e))?
        };
        if let Some(overrides) = overrides {
            debug!("extension '{name}' overrides {:?}", overrides.siwe);
            grants.siwe.merge(&overrides.siwe);
        }

        let Some(namespace) = extension.namespace() else {
            continue;
        };
        let extra = extension
            .extra_fields()
            .await
            .map_err(|e| ClientError::extension(name, e))?;
        let defaults = extension
            .default_actions()
            .await
            .map_err(|e| ClientError::extension(name, e))?;
        grants.recap.grant(namespace, namespace, &defaults, &extra);

        let targeted = extension
            .targeted_actions()
            .await
            .map_err(|e| ClientError::extension(name, e))?;
        for (target, actions) in &targeted {
            grants.recap.grant(namespace, target, actions, &extra);
        }
    }

    Ok(grants)
}

/// Run `after_sign_in` hooks sequentially; the first failure stops the chain.
pub(crate) async fn after_sign_in(
    extensions: &[Arc<dyn Extension>],
    session: &mut ClientSession,
) -> Result<(), ClientError> {
    for extension in extensions {
        extension
            .after_sign_in(session)
            .await
            .map_err(|e| ClientError::extension(extension.name(), e))?;
    }
    Ok(())
}
