pub mod builder;
pub mod client;
pub mod config;
pub mod delegation;
pub mod error;
pub mod extension;
pub mod session_key;
mod validators;
pub mod wallet;

pub use alloy::primitives::Address;
pub use rpc::{ClientSession, EnsData, EnsResolveOptions, LensResolution, SiweMessage};

pub use builder::{ChallengeBuilder, MessageDefaults, SiweOverrides};
pub use client::{
    AuthStatus, ClientRoute, ClientRoutes, CustomOperation, ServerApi, UserAuthorization,
};
pub use config::{Config, ConfigBuilder, ResolveEnsMode, ResolveLensMode};
pub use delegation::DelegationExtension;
pub use error::{ClientError, ConfigError};
pub use extension::{ConfigOverrides, ConnectedView, Extension};
pub use session_key::{Jwk, SessionKey};
pub use wallet::Wallet;
