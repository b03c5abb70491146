use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolutionError>;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Missing address.")]
    MissingAddress,

    /// RPC call failed or returned an error
    #[error("RPC/provider error: {0}")]
    Provider(String),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unsupported network {name} (chain id {chain_id})")]
    UnsupportedNetwork { chain_id: u64, name: String },

    /// Response could not be decoded
    #[error("decode error: {0}")]
    Decode(String),
}
