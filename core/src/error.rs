use std::fmt;

use rpc::MessageError;
use thiserror::Error;

/// Rule a SIWE message broke during verification. The wire strings are what
/// clients see in the 400 body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationErrorType {
    NonceMismatch,
    ExpiredMessage,
    NotYetValid,
    InvalidMessage,
    SignatureMismatch,
    DelegateCheckFailed,
}

impl VerificationErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonceMismatch => "Nonce does not match provided nonce for verification.",
            Self::ExpiredMessage => "Expired message.",
            Self::NotYetValid => "Message is not valid yet.",
            Self::InvalidMessage => "Invalid message.",
            Self::SignatureMismatch => "Signature does not match address of the message.",
            Self::DelegateCheckFailed => "Delegate verification failed.",
        }
    }
}

impl fmt::Display for VerificationErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.message())]
pub struct VerificationError {
    pub kind: VerificationErrorType,
    pub expected: Option<String>,
    pub received: Option<String>,
}

impl VerificationError {
    pub fn new(kind: VerificationErrorType) -> Self {
        Self {
            kind,
            expected: None,
            received: None,
        }
    }

    pub fn mismatch(
        kind: VerificationErrorType,
        expected: impl Into<String>,
        received: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            expected: Some(expected.into()),
            received: Some(received.into()),
        }
    }

    /// Type string, suffixed with the expected/received pair when both are known.
    pub fn message(&self) -> String {
        match (&self.expected, &self.received) {
            (Some(expected), Some(received)) => {
                format!("{} Expected: {expected}. Received: {received}.", self.kind)
            }
            _ => self.kind.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("Invalid nonce.")]
    InvalidNonce,

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("session error: {0}")]
    Session(#[from] SessionStoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<MessageError> for ServiceError {
    fn from(err: MessageError) -> Self {
        log::debug!("rejecting malformed siwe message: {err}");
        ServiceError::Verification(VerificationError::new(
            VerificationErrorType::InvalidMessage,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_without_values_is_the_type() {
        let err = VerificationError::new(VerificationErrorType::ExpiredMessage);
        assert_eq!(err.message(), "Expired message.");
    }

    #[test]
    fn message_with_values_is_suffixed() {
        let err = VerificationError::mismatch(VerificationErrorType::NonceMismatch, "abc", "xyz");
        assert_eq!(
            err.to_string(),
            "Nonce does not match provided nonce for verification. Expected: abc. Received: xyz."
        );
    }

    #[test]
    fn malformed_message_maps_to_invalid_message() {
        let err: ServiceError = MessageError::Malformed("bad".into()).into();
        assert!(matches!(
            err,
            ServiceError::Verification(VerificationError {
                kind: VerificationErrorType::InvalidMessage,
                ..
            })
        ));
    }
}
