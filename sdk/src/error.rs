use blockchain::ResolutionError;
use rpc::MessageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid config value: {0}")]
    InvalidValue(String),
    #[error("missing config: {0}")]
    Missing(String),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("not connected: {0}")]
    NotConnected(&'static str),

    #[error("extension '{name}' failed: {source:#}")]
    Extension {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("signer error: {0}")]
    Signer(String),

    #[error("server responded with {status}: {message}")]
    Server { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl ClientError {
    pub(crate) fn extension(name: &str, source: anyhow::Error) -> Self {
        ClientError::Extension {
            name: name.to_string(),
            source,
        }
    }
}
