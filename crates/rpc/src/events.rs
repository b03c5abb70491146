use alloy_primitives::Address;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::siwe::SiweMessage;

/// `did:pkh` identifier of an account on an EIP-155 chain.
pub fn did_pkh(chain_id: u64, address: &Address) -> String {
    format!("did:pkh:eip155:{chain_id}:{}", address.to_checksum(None))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "sprucekit-login")]
    Login,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginEventContent {
    pub signature: String,
    pub siwe: SiweMessage,
    pub is_gnosis: bool,
}

/// Body posted to the metrics API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub user_id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub content: Value,
}

impl LogEvent {
    pub fn new(user_id: String, event_type: EventType, content: Value) -> Self {
        Self {
            user_id,
            timestamp: Utc::now().to_rfc3339(),
            event_type,
            content,
        }
    }

    pub fn login(content: &LoginEventContent) -> Result<Self, serde_json::Error> {
        let user_id = did_pkh(content.siwe.chain_id, &content.siwe.address);
        Ok(Self::new(
            user_id,
            EventType::Login,
            serde_json::to_value(content)?,
        ))
    }
}
