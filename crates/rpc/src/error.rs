use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("invalid siwe message: {0}")]
    Malformed(String),

    #[error("invalid {field} timestamp: {value}")]
    InvalidTimestamp { field: &'static str, value: String },
}

pub(crate) fn invalid_siwe(msg: impl Into<String>) -> MessageError {
    MessageError::Malformed(msg.into())
}
