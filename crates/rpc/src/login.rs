use serde::{Deserialize, Serialize};

use crate::error::MessageError;
use crate::session::ResolveEns;
use crate::siwe::SiweMessage;

/// A SIWE message as clients send it: either the signed canonical text or the
/// structured fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SiweInput {
    Text(String),
    Structured(SiweMessage),
}

impl SiweInput {
    pub fn into_message(self) -> Result<SiweMessage, MessageError> {
        match self {
            SiweInput::Text(raw) => SiweMessage::parse(&raw),
            SiweInput::Structured(message) => {
                message.validate()?;
                Ok(message)
            }
        }
    }
}

impl From<SiweMessage> for SiweInput {
    fn from(message: SiweMessage) -> Self {
        SiweInput::Structured(message)
    }
}

/// Body of `POST /sprucekit-login`. `siwe` and `signature` are optional at
/// the type level so the endpoint can answer 422 instead of a generic parse
/// failure.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub siwe: Option<SiweInput>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub dao_login: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_ens: Option<ResolveEns>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_lens: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnauthorizedResponse {
    pub success: bool,
    pub message: String,
}

impl Default for UnauthorizedResponse {
    fn default() -> Self {
        Self {
            success: false,
            message: "Unauthorized".into(),
        }
    }
}
