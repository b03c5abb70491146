use anyhow::{Context, bail};
use envconfig::Envconfig;
use rpc::constants::{
    DEFAULT_COOKIE_NAME, DEFAULT_LOGIN_PATH, DEFAULT_LOGOUT_PATH, DEFAULT_METRICS_URL,
    DEFAULT_NONCE_PATH,
};
use url::Url;

pub const MIN_SIGNING_KEY_LEN: usize = 32;

#[derive(Debug, Clone, Envconfig)]
pub struct ServerConfig {
    #[envconfig(from = "SERVER_HOST", default = "127.0.0.1")]
    pub host: String,

    #[envconfig(from = "SERVER_PORT", default = "3000")]
    pub port: u16,

    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: log::Level,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Envconfig)]
pub struct SessionConfig {
    /// Signs the session cookie. A random key is used when unset, which
    /// invalidates every session on restart.
    #[envconfig(from = "SPRUCEKIT_SIGNING_KEY")]
    pub signing_key: Option<String>,

    #[envconfig(from = "SPRUCEKIT_SECURE_COOKIES", default = "false")]
    pub secure_cookies: bool,

    #[envconfig(from = "SPRUCEKIT_COOKIE_NAME", default = "sprucekit-session-storage")]
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            signing_key: None,
            secure_cookies: false,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Envconfig)]
pub struct EthereumConfig {
    #[envconfig(from = "ETHEREUM_RPC_URL")]
    pub rpc_url: Option<String>,
}

#[derive(Debug, Clone, Envconfig)]
pub struct MetricsConfig {
    #[envconfig(from = "SPRUCEKIT_METRICS_API_KEY")]
    pub api_key: Option<String>,

    #[envconfig(from = "SPRUCEKIT_METRICS_URL", default = "https://api.sprucekit.id")]
    pub url: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            url: DEFAULT_METRICS_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Envconfig)]
pub struct RoutesConfig {
    #[envconfig(from = "SPRUCEKIT_NONCE_PATH", default = "/sprucekit-nonce")]
    pub nonce_path: String,

    #[envconfig(from = "SPRUCEKIT_LOGIN_PATH", default = "/sprucekit-login")]
    pub login_path: String,

    #[envconfig(from = "SPRUCEKIT_LOGOUT_PATH", default = "/sprucekit-logout")]
    pub logout_path: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            nonce_path: DEFAULT_NONCE_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            logout_path: DEFAULT_LOGOUT_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_config: ServerConfig,
    pub session_config: SessionConfig,
    pub ethereum_config: EthereumConfig,
    pub metrics_config: MetricsConfig,
    pub routes_config: RoutesConfig,
}

impl AppConfig {
    pub fn fetch() -> anyhow::Result<Self> {
        let server_config =
            ServerConfig::init_from_env().context("Failed to load server config")?;
        let session_config =
            SessionConfig::init_from_env().context("Failed to load session config")?;
        let ethereum_config =
            EthereumConfig::init_from_env().context("Failed to load ethereum config")?;
        let metrics_config =
            MetricsConfig::init_from_env().context("Failed to load metrics config")?;
        let routes_config =
            RoutesConfig::init_from_env().context("Failed to load routes config")?;

        let config = Self {
            server_config,
            session_config,
            ethereum_config,
            metrics_config,
            routes_config,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        validate_route_path("SPRUCEKIT_NONCE_PATH", &self.routes_config.nonce_path)?;
        validate_route_path("SPRUCEKIT_LOGIN_PATH", &self.routes_config.login_path)?;
        validate_route_path("SPRUCEKIT_LOGOUT_PATH", &self.routes_config.logout_path)?;
        if let Some(key) = &self.session_config.signing_key {
            validate_signing_key(key)?;
        }
        if self.session_config.cookie_name.trim().is_empty() {
            bail!("SPRUCEKIT_COOKIE_NAME must not be blank");
        }
        if let Some(rpc_url) = &self.ethereum_config.rpc_url {
            Url::parse(rpc_url).context("ETHEREUM_RPC_URL is not a valid URL")?;
        }
        Url::parse(&self.metrics_config.url).context("SPRUCEKIT_METRICS_URL is not a valid URL")?;
        Ok(())
    }
}

fn validate_route_path(label: &str, path: &str) -> anyhow::Result<()> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        bail!("{label} must be set");
    }
    if !trimmed.starts_with('/') {
        bail!("{label} must start with '/', got {trimmed}");
    }
    Ok(())
}

fn validate_signing_key(key: &str) -> anyhow::Result<()> {
    if key.len() < MIN_SIGNING_KEY_LEN {
        bail!("SPRUCEKIT_SIGNING_KEY must be at least {MIN_SIGNING_KEY_LEN} bytes");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            server_config: ServerConfig {
                host: "127.0.0.1".into(),
                port: 3000,
                log_level: log::Level::Info,
            },
            session_config: SessionConfig::default(),
            ethereum_config: EthereumConfig::default(),
            metrics_config: MetricsConfig::default(),
            routes_config: RoutesConfig::default(),
        }
    }

    #[test]
    fn defaults_pass_validation() {
        config().validate().expect("defaults should be valid");
    }

    #[test]
    fn rejects_relative_route_path() {
        let err = validate_route_path("SPRUCEKIT_LOGIN_PATH", "login").unwrap_err();
        assert!(err.to_string().contains("must start with '/'"));
    }

    #[test]
    fn rejects_blank_route_path() {
        let err = validate_route_path("SPRUCEKIT_NONCE_PATH", "  ").unwrap_err();
        assert!(err.to_string().contains("must be set"));
    }

    #[test]
    fn rejects_short_signing_key() {
        let mut cfg = config();
        cfg.session_config.signing_key = Some("too-short".into());
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("at least 32 bytes"));
    }

    #[test]
    fn rejects_bad_rpc_url() {
        let mut cfg = config();
        cfg.ethereum_config.rpc_url = Some("not a url".into());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        assert_eq!(config().server_config.bind_addr(), "127.0.0.1:3000");
    }
}
