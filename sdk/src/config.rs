use std::sync::Arc;

use alloy::primitives::Address;
use blockchain::{AddressResolver, LensClient};
use rpc::EnsResolveOptions;
use url::Url;

use crate::{
    builder::SiweOverrides,
    client::api::{ClientRoute, ClientRoutes},
    error::ConfigError,
    validators::{validate_address, validate_chain_id, validate_domain, validate_url},
};

/// Where ENS data is resolved after sign-in, if at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResolveEnsMode {
    #[default]
    Off,
    OnClient(EnsResolveOptions),
    OnServer(EnsResolveOptions),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResolveLensMode {
    #[default]
    Off,
    OnClient,
    OnServer,
}

#[derive(Clone)]
pub struct Config {
    /// Server running the SpruceKit endpoints. Without one, sign-in stays
    /// local: the nonce is generated client side and no login call is made.
    pub server_host: Option<Url>,
    pub routes: ClientRoutes,
    pub domain: String,
    pub chain_id: u64,
    pub siwe: SiweOverrides,
    pub resolve_ens: ResolveEnsMode,
    pub resolve_lens: ResolveLensMode,
    /// Sign in on behalf of this address through the delegation registry.
    pub dao_login: Option<Address>,
    pub resolver: Option<Arc<dyn AddressResolver>>,
    pub lens: LensClient,
}

pub struct ConfigBuilder {
    server_host: Option<String>,
    routes: ClientRoutes,
    domain: Option<String>,
    chain_id: Option<String>,
    siwe: SiweOverrides,
    resolve_ens: ResolveEnsMode,
    resolve_lens: ResolveLensMode,
    dao_login: Option<String>,
    resolver: Option<Arc<dyn AddressResolver>>,
    lens: Option<LensClient>,
}

impl ConfigBuilder {
    fn empty() -> Self {
        Self {
            server_host: None,
            routes: ClientRoutes::default(),
            domain: None,
            chain_id: None,
            siwe: SiweOverrides::default(),
            resolve_ens: ResolveEnsMode::Off,
            resolve_lens: ResolveLensMode::Off,
            dao_login: None,
            resolver: None,
            lens: None,
        }
    }

    pub fn server_host(mut self, server_host: String) -> Self {
        self.server_host = Some(server_host);
        self
    }

    pub fn routes(mut self, routes: ClientRoutes) -> Self {
        self.routes = routes;
        self
    }

    pub fn nonce_route(mut self, route: ClientRoute) -> Self {
        self.routes.nonce = route;
        self
    }

    pub fn login_route(mut self, route: ClientRoute) -> Self {
        self.routes.login = route;
        self
    }

    pub fn logout_route(mut self, route: ClientRoute) -> Self {
        self.routes.logout = route;
        self
    }

    /// Host the user is signing in to, as it appears in the SIWE header.
    pub fn domain(mut self, domain: String) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id.to_string());
        self
    }

    /// Caller overrides for the SIWE message. These win over defaults and
    /// over anything extensions contribute.
    pub fn siwe(mut self, siwe: SiweOverrides) -> Self {
        self.siwe = siwe;
        self
    }

    pub fn resolve_ens(mut self, mode: ResolveEnsMode) -> Self {
        self.resolve_ens = mode;
        self
    }

    pub fn resolve_lens(mut self, mode: ResolveLensMode) -> Self {
        self.resolve_lens = mode;
        self
    }

    /// Enable DAO login for `delegator`, registering the delegation extension.
    pub fn dao_login(mut self, delegator: String) -> Self {
        self.dao_login = Some(delegator);
        self
    }

    /// Chain access for client-side ENS and Lens resolution.
    pub fn resolver(mut self, resolver: Arc<dyn AddressResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn lens_client(mut self, lens: LensClient) -> Self {
        self.lens = Some(lens);
        self
    }

    pub fn from_env(mut self) -> Self {
        if let Ok(v) = std::env::var("SPRUCEKIT_SERVER_HOST") {
            self = self.server_host(v);
        }
        if let Ok(v) = std::env::var("SPRUCEKIT_DOMAIN") {
            self = self.domain(v);
        }
        if let Ok(v) = std::env::var("SPRUCEKIT_CHAIN_ID") {
            self.chain_id = Some(v);
        }
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let domain = Self::required(self.domain, "domain")?;
        let domain =
            validate_domain(&domain).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        let chain_id = match self.chain_id {
            Some(raw) => {
                validate_chain_id(&raw).map_err(|e| ConfigError::InvalidValue(e.to_string()))?
            }
            None => 1,
        };

        let server_host = Self::optional(self.server_host, validate_url, "server_host")?;
        let dao_login = Self::optional(self.dao_login, validate_address, "dao_login")?;

        let client_side = matches!(self.resolve_ens, ResolveEnsMode::OnClient(_))
            || self.resolve_lens == ResolveLensMode::OnClient;
        if client_side && self.resolver.is_none() {
            return Err(ConfigError::Missing(
                "resolver (required for client-side ENS/Lens resolution)".to_string(),
            ));
        }

        Ok(Config {
            server_host,
            routes: self.routes,
            domain,
            chain_id,
            siwe: self.siwe,
            resolve_ens: self.resolve_ens,
            resolve_lens: self.resolve_lens,
            dao_login,
            resolver: self.resolver,
            lens: self.lens.unwrap_or_default(),
        })
    }

    fn required(value: Option<String>, field: &str) -> Result<String, ConfigError> {
        value
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing(field.to_string()))
    }

    fn optional<T>(
        value: Option<String>,
        parser: impl FnOnce(&str) -> anyhow::Result<T>,
        field: &str,
    ) -> Result<Option<T>, ConfigError> {
        match value {
            Some(raw) => parser(&raw)
                .map(Some)
                .map_err(|e| ConfigError::InvalidValue(format!("{field}: {e}"))),
            None => Ok(None),
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::empty()
    }
}
