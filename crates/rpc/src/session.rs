use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::siwe::SiweMessage;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsResolveOptions {
    #[serde(default)]
    pub domain: bool,
    #[serde(default)]
    pub avatar: bool,
}

impl EnsResolveOptions {
    pub const ALL: Self = Self {
        domain: true,
        avatar: true,
    };

    pub fn any(&self) -> bool {
        self.domain || self.avatar
    }
}

/// `resolveEns` in a login body: `true` means both lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolveEns {
    Flag(bool),
    Options(EnsResolveOptions),
}

impl ResolveEns {
    /// The lookups to run, or `None` when nothing was requested.
    pub fn requested(&self) -> Option<EnsResolveOptions> {
        let options = match self {
            ResolveEns::Flag(true) => EnsResolveOptions::ALL,
            ResolveEns::Flag(false) => return None,
            ResolveEns::Options(options) => *options,
        };
        options.any().then_some(options)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl EnsData {
    pub fn is_empty(&self) -> bool {
        self.domain.is_none() && self.avatar_url.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LensProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Value>,
    #[serde(default)]
    pub follow_nft_address: Option<String>,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub picture: Option<Value>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub cover_picture: Option<Value>,
    #[serde(default)]
    pub owned_by: Option<String>,
    #[serde(default)]
    pub dispatcher: Option<Value>,
    #[serde(default)]
    pub stats: Option<Value>,
    #[serde(default)]
    pub follow_module: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LensPageInfo {
    #[serde(default)]
    pub prev: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LensProfilesResponse {
    pub items: Vec<LensProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_info: Option<LensPageInfo>,
}

/// Lens lookups either return profiles or a human readable reason they could
/// not run (unsupported network).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LensResolution {
    Profiles(LensProfilesResponse),
    Unavailable(String),
}

/// Session record held by the server and returned from the login endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSession {
    pub siwe: SiweMessage,
    pub signature: String,
    #[serde(default)]
    pub dao_login: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ens: Option<EnsData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens: Option<LensResolution>,
    #[serde(default)]
    pub verified: bool,
}

/// Session as the client sees it after sign-in. `address` is who the session
/// acts for, `wallet_address` is who signed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSession {
    #[serde(with = "crate::siwe::checksummed")]
    pub address: Address,
    #[serde(with = "crate::siwe::checksummed")]
    pub wallet_address: Address,
    pub chain_id: u64,
    pub session_key: String,
    pub siwe: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ens: Option<EnsData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens: Option<LensResolution>,
}
