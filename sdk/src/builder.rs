//! Challenge construction: computed defaults, extension overrides and caller
//! overrides folded into one canonical SIWE message.

use alloy::primitives::Address;
use chrono::{SecondsFormat, Utc};
use rpc::constants::SIWE_VERSION;
use rpc::{Recap, SiweMessage};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ConfigError};
use crate::session_key::SessionKey;

/// Partial SIWE message configuration. Unset fields leave the lower layer's
/// value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiweOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Replaces the resource list as a whole.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
}

impl SiweOverrides {
    /// Layer `upper` on top of `self`: every field `upper` sets wins.
    pub fn merge(&mut self, upper: &SiweOverrides) {
        fn take<T: Clone>(slot: &mut Option<T>, upper: &Option<T>) {
            if let Some(value) = upper {
                *slot = Some(value.clone());
            }
        }
        take(&mut self.address, &upper.address);
        take(&mut self.domain, &upper.domain);
        take(&mut self.statement, &upper.statement);
        take(&mut self.uri, &upper.uri);
        take(&mut self.chain_id, &upper.chain_id);
        take(&mut self.nonce, &upper.nonce);
        take(&mut self.issued_at, &upper.issued_at);
        take(&mut self.expiration_time, &upper.expiration_time);
        take(&mut self.not_before, &upper.not_before);
        take(&mut self.request_id, &upper.request_id);
        take(&mut self.resources, &upper.resources);
    }

    pub fn merged(mut self, upper: &SiweOverrides) -> Self {
        self.merge(upper);
        self
    }
}

/// Values computed at sign-in time, the lowest precedence layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDefaults {
    #[serde(with = "rpc::siwe::checksummed")]
    pub address: Address,
    #[serde(with = "rpc::siwe::checksummed")]
    pub wallet_address: Address,
    pub chain_id: u64,
    pub domain: String,
    pub issued_at: String,
    pub nonce: String,
}

impl MessageDefaults {
    /// Defaults for `wallet`, with a fresh local nonce and `issuedAt = now`.
    pub fn new(wallet: Address, domain: &str, chain_id: u64) -> Self {
        Self {
            address: wallet,
            wallet_address: wallet,
            chain_id,
            domain: domain.to_string(),
            issued_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            nonce: crypto::nonce::generate_nonce(),
        }
    }

    fn as_overrides(&self) -> SiweOverrides {
        SiweOverrides {
            address: Some(self.address),
            domain: Some(self.domain.clone()),
            chain_id: Some(self.chain_id),
            nonce: Some(self.nonce.clone()),
            issued_at: Some(self.issued_at.clone()),
            ..Default::default()
        }
    }
}

/// Builds the message a wallet signs.
///
/// Precedence, lowest first: `defaults`, `extension` (already folded in
/// registration order), `caller`. A server nonce replaces whatever nonce the
/// layers produced. Capability grants go last so the signature covers them.
pub struct ChallengeBuilder<'a> {
    pub defaults: &'a MessageDefaults,
    pub extension: &'a SiweOverrides,
    pub caller: &'a SiweOverrides,
    pub server_nonce: Option<&'a str>,
    pub recap: &'a Recap,
    pub session_key: &'a SessionKey,
}

impl ChallengeBuilder<'_> {
    pub fn build(&self) -> Result<SiweMessage, ClientError> {
        let mut fields = self
            .defaults
            .as_overrides()
            .merged(self.extension)
            .merged(self.caller);
        if let Some(nonce) = self.server_nonce {
            fields.nonce = Some(nonce.to_string());
        }

        let address = fields
            .address
            .filter(|a| !a.is_zero())
            .ok_or_else(|| ConfigError::Missing("address".into()))?;
        let domain = required(fields.domain, "domain")?;
        let chain_id = required(fields.chain_id, "chain_id")?;
        let uri = match fields.uri {
            Some(uri) => uri,
            None if !self.recap.is_empty() => self.session_key.did(chain_id),
            None => format!("https://{domain}"),
        };

        let mut resources = fields.resources.unwrap_or_default();
        let statement = self.recap.apply(fields.statement, &mut resources)?;

        let message = SiweMessage {
            domain,
            address,
            statement,
            uri,
            version: SIWE_VERSION.to_string(),
            chain_id,
            nonce: required(fields.nonce, "nonce")?,
            issued_at: required(fields.issued_at, "issued_at")?,
            expiration_time: fields.expiration_time,
            not_before: fields.not_before,
            request_id: fields.request_id,
            resources,
        };
        message.validate()?;
        Ok(message)
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::Missing(field.to_string()))
}
