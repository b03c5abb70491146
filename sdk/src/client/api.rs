use std::fmt;
use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Response, StatusCode};
use rpc::constants::{DEFAULT_LOGIN_PATH, DEFAULT_LOGOUT_PATH, DEFAULT_NONCE_PATH};
use rpc::{ClientSession, MessageResponse, ResolveEns, ServerSession};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::builder::MessageDefaults;
use crate::error::ClientError;

/// Replaces the HTTP call for one route. Receives the payload the built-in
/// call would have sent and returns what the server would have answered.
#[async_trait]
pub trait CustomOperation: Send + Sync {
    async fn call(&self, payload: Value) -> anyhow::Result<Value>;
}

#[derive(Clone)]
pub enum ClientRoute {
    Path(String),
    Custom(Arc<dyn CustomOperation>),
}

impl ClientRoute {
    pub fn path(&self) -> Option<&str> {
        match self {
            ClientRoute::Path(path) => Some(path),
            ClientRoute::Custom(_) => None,
        }
    }
}

impl fmt::Debug for ClientRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientRoute::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ClientRoute::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<&str> for ClientRoute {
    fn from(path: &str) -> Self {
        ClientRoute::Path(path.to_string())
    }
}

#[derive(Clone, Debug)]
pub struct ClientRoutes {
    pub nonce: ClientRoute,
    pub login: ClientRoute,
    pub logout: ClientRoute,
}

impl Default for ClientRoutes {
    fn default() -> Self {
        Self {
            nonce: DEFAULT_NONCE_PATH.into(),
            login: DEFAULT_LOGIN_PATH.into(),
            logout: DEFAULT_LOGOUT_PATH.into(),
        }
    }
}

/// Body of the login call.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginBody<'a> {
    pub signature: &'a str,
    pub siwe: &'a str,
    #[serde(with = "rpc::siwe::checksummed")]
    pub address: Address,
    #[serde(with = "rpc::siwe::checksummed")]
    pub wallet_address: Address,
    pub chain_id: u64,
    pub dao_login: bool,
    pub resolve_ens: ResolveEns,
    pub resolve_lens: bool,
}

/// Calls to the SpruceKit server endpoints. The cookie store carries the
/// session between the nonce, login and logout calls.
#[derive(Clone)]
pub struct ServerApi {
    http: reqwest::Client,
    host: Option<Url>,
    routes: ClientRoutes,
}

impl ServerApi {
    pub fn new(host: Option<Url>, routes: ClientRoutes) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self { http, host, routes })
    }

    fn url(&self, path: &str) -> Result<Option<Url>, ClientError> {
        let Some(host) = &self.host else {
            return Ok(None);
        };
        // Routes are appended to the host path so a prefixed host keeps its prefix.
        let mut url = host.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Transport(format!("server host '{host}' cannot take a path")))?
            .pop_if_empty()
            .extend(path.trim_start_matches('/').split('/'));
        Ok(Some(url))
    }

    /// Nonce to put in the message, `None` when there is no server to ask.
    pub async fn nonce(&self, params: &MessageDefaults) -> Result<Option<String>, ClientError> {
        let nonce = match &self.routes.nonce {
            ClientRoute::Custom(op) => {
                let payload = serde_json::to_value(params)
                    .map_err(|e| ClientError::Transport(e.to_string()))?;
                let value = run_custom("nonce", op.as_ref(), payload).await?;
                value.as_str().map(str::to_string)
            }
            ClientRoute::Path(path) => {
                let Some(url) = self.url(path)? else {
                    return Ok(None);
                };
                let response = self.http.get(url).query(params).send().await?;
                Some(expect_success(response).await?.text().await?)
            }
        };

        match nonce.filter(|n| !n.trim().is_empty()) {
            Some(nonce) => Ok(Some(nonce)),
            None => Err(ClientError::Server {
                status: StatusCode::OK.as_u16(),
                message: "Unable to retrieve nonce from server.".into(),
            }),
        }
    }

    /// The server's view of the new session, `None` without a server.
    pub async fn login(&self, body: &LoginBody<'_>) -> Result<Option<ServerSession>, ClientError> {
        let value = match &self.routes.login {
            ClientRoute::Custom(op) => {
                let payload =
                    serde_json::to_value(body).map_err(|e| ClientError::Transport(e.to_string()))?;
                run_custom("login", op.as_ref(), payload).await?
            }
            ClientRoute::Path(path) => {
                let Some(url) = self.url(path)? else {
                    return Ok(None);
                };
                let response = self.http.post(url).json(body).send().await?;
                expect_success(response).await?.json::<Value>().await?
            }
        };

        if value.is_null() {
            return Ok(None);
        }
        match serde_json::from_value::<ServerSession>(value) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                // Custom operations may answer with anything; only a full
                // session is merged back.
                debug!("login response is not a session: {err}");
                Ok(None)
            }
        }
    }

    pub async fn logout(&self, session: &ClientSession) -> Result<(), ClientError> {
        match &self.routes.logout {
            ClientRoute::Custom(op) => {
                let payload = serde_json::to_value(session)
                    .map_err(|e| ClientError::Transport(e.to_string()))?;
                run_custom("logout", op.as_ref(), payload).await?;
            }
            ClientRoute::Path(path) => {
                if let Some(url) = self.url(path)? {
                    let response = self.http.post(url).json(session).send().await?;
                    expect_success(response).await?;
                }
            }
        }
        Ok(())
    }
}

async fn run_custom(
    route: &str,
    op: &dyn CustomOperation,
    payload: Value,
) -> Result<Value, ClientError> {
    op.call(payload)
        .await
        .map_err(|e| ClientError::Transport(format!("custom {route} operation failed: {e:#}")))
}

async fn expect_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<MessageResponse>(&body)
        .map(|m| m.message)
        .unwrap_or(body);
    warn!("server answered {status}: {message}");
    Err(ClientError::Server {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use alloy::primitives::address;

    use super::*;

    struct Echo {
        seen: Mutex<Vec<Value>>,
        reply: Value,
    }

    #[async_trait]
    impl CustomOperation for Echo {
        async fn call(&self, payload: Value) -> anyhow::Result<Value> {
            self.seen.lock().unwrap().push(payload);
            Ok(self.reply.clone())
        }
    }

    const WALLET: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    #[test]
    fn routes_keep_the_host_path() {
        let host = Url::parse("https://example.com/api").unwrap();
        let api = ServerApi::new(Some(host), ClientRoutes::default()).unwrap();
        assert_eq!(
            api.url("/sprucekit-nonce").unwrap().unwrap().as_str(),
            "https://example.com/api/sprucekit-nonce"
        );

        let host = Url::parse("https://example.com/api/").unwrap();
        let api = ServerApi::new(Some(host), ClientRoutes::default()).unwrap();
        assert_eq!(
            api.url("/auth/login").unwrap().unwrap().as_str(),
            "https://example.com/api/auth/login"
        );

        let host = Url::parse("https://example.com").unwrap();
        let api = ServerApi::new(Some(host), ClientRoutes::default()).unwrap();
        assert_eq!(
            api.url("/sprucekit-logout").unwrap().unwrap().as_str(),
            "https://example.com/sprucekit-logout"
        );
    }

    #[tokio::test]
    async fn without_host_nothing_is_called() {
        let api = ServerApi::new(None, ClientRoutes::default()).unwrap();
        let defaults = MessageDefaults::new(WALLET, "example.com", 1);
        assert_eq!(api.nonce(&defaults).await.unwrap(), None);
    }

    #[tokio::test]
    async fn custom_nonce_operation_gets_the_defaults() {
        let op = Arc::new(Echo {
            seen: Mutex::default(),
            reply: Value::from("customNonce12345"),
        });
        let routes = ClientRoutes {
            nonce: ClientRoute::Custom(op.clone()),
            ..Default::default()
        };
        let api = ServerApi::new(None, routes).unwrap();
        let defaults = MessageDefaults::new(WALLET, "example.com", 1);

        assert_eq!(
            api.nonce(&defaults).await.unwrap().as_deref(),
            Some("customNonce12345")
        );
        let seen = op.seen.lock().unwrap();
        assert_eq!(seen[0]["walletAddress"], WALLET.to_checksum(None));
        assert_eq!(seen[0]["domain"], "example.com");
    }

    #[tokio::test]
    async fn empty_custom_nonce_is_an_error() {
        let op = Arc::new(Echo {
            seen: Mutex::default(),
            reply: Value::Null,
        });
        let routes = ClientRoutes {
            nonce: ClientRoute::Custom(op),
            ..Default::default()
        };
        let api = ServerApi::new(None, routes).unwrap();
        let defaults = MessageDefaults::new(WALLET, "example.com", 1);
        assert!(matches!(
            api.nonce(&defaults).await,
            Err(ClientError::Server { .. })
        ));
    }

    #[test]
    fn login_body_shape() {
        let body = LoginBody {
            signature: "0xsig",
            siwe: "message",
            address: WALLET,
            wallet_address: WALLET,
            chain_id: 1,
            dao_login: false,
            resolve_ens: ResolveEns::Flag(false),
            resolve_lens: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["walletAddress"], WALLET.to_checksum(None));
        assert_eq!(json["daoLogin"], false);
        assert_eq!(json["resolveEns"], false);
        assert_eq!(json["resolveLens"], true);
    }
}
