use std::sync::Arc;

use alloy::primitives::Address;
use blockchain::{AddressResolver, resolve_ens, resolve_lens};
use log::{debug, info, warn};
use rpc::constants::DELEGATION_NAMESPACE;
use rpc::{ClientSession, EnsData, EnsResolveOptions, LensResolution, ResolveEns};

use crate::builder::{ChallengeBuilder, MessageDefaults};
use crate::client::api::{LoginBody, ServerApi};
use crate::config::{Config, ResolveEnsMode, ResolveLensMode};
use crate::delegation::DelegationExtension;
use crate::error::{ClientError, ConfigError};
use crate::extension::{
    ConnectContext, Extension, ExtensionGrants, after_sign_in, apply_extensions,
    is_extension_enabled,
};
use crate::session_key::SessionKey;
use crate::wallet::Wallet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStatus {
    Init,
    Connected,
    SignedIn,
}

#[derive(Clone)]
struct Connection {
    session_key: SessionKey,
    grants: ExtensionGrants,
}

#[derive(Clone)]
enum State {
    Init,
    Connected(Connection),
    SignedIn(Connection, Box<ClientSession>),
}

/// Client side of the sign-in flow: `Init -> Connected -> SignedIn`, and back
/// to `Init` on sign-out. A failed transition leaves the state untouched.
pub struct UserAuthorization {
    config: Config,
    wallet: Arc<dyn Wallet>,
    api: ServerApi,
    extensions: Vec<Arc<dyn Extension>>,
    state: State,
}

impl UserAuthorization {
    pub fn new(config: Config, wallet: Arc<dyn Wallet>) -> Result<Self, ClientError> {
        let api = ServerApi::new(config.server_host.clone(), config.routes.clone())?;
        let mut auth = Self {
            config,
            wallet,
            api,
            extensions: Vec::new(),
            state: State::Init,
        };
        if let Some(delegator) = auth.config.dao_login {
            auth.extend(Arc::new(DelegationExtension::new(delegator)));
        }
        Ok(auth)
    }

    /// Register an extension. Extensions run in registration order and only
    /// take part in connections opened after they were added.
    pub fn extend(&mut self, extension: Arc<dyn Extension>) {
        self.extensions.push(extension);
    }

    pub fn status(&self) -> AuthStatus {
        match self.state {
            State::Init => AuthStatus::Init,
            State::Connected(_) => AuthStatus::Connected,
            State::SignedIn(..) => AuthStatus::SignedIn,
        }
    }

    /// Open a connection: create the session key and run the extensions'
    /// connect hooks. A no-op when already connected.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if matches!(self.state, State::Init) {
            let connection = self.open_connection().await?;
            self.state = State::Connected(connection);
        }
        Ok(())
    }

    async fn open_connection(&self) -> Result<Connection, ClientError> {
        let session_key = SessionKey::generate();
        let grants = apply_extensions(
            &self.extensions,
            ConnectContext {
                wallet_address: self.wallet.address(),
                domain: &self.config.domain,
                chain_id: self.config.chain_id,
                session_key: &session_key,
            },
        )
        .await?;
        debug!(
            "connected {} with session key {}",
            self.wallet.address(),
            session_key.address()
        );
        Ok(Connection {
            session_key,
            grants,
        })
    }

    /// Build and sign the challenge, log in with the server when one is
    /// configured and run the post sign-in hooks. Connects first if needed.
    pub async fn sign_in(&mut self) -> Result<ClientSession, ClientError> {
        let connection = match &self.state {
            State::Init => self.open_connection().await?,
            State::Connected(connection) | State::SignedIn(connection, _) => connection.clone(),
        };

        let session = self.sign_in_with(&connection).await?;
        self.state = State::SignedIn(connection, Box::new(session.clone()));
        Ok(session)
    }

    async fn sign_in_with(&self, connection: &Connection) -> Result<ClientSession, ClientError> {
        let wallet_address = self.wallet.address();
        let defaults =
            MessageDefaults::new(wallet_address, &self.config.domain, self.config.chain_id);
        let server_nonce = self.api.nonce(&defaults).await?;

        let message = ChallengeBuilder {
            defaults: &defaults,
            extension: &connection.grants.siwe,
            caller: &self.config.siwe,
            server_nonce: server_nonce.as_deref(),
            recap: &connection.grants.recap,
            session_key: &connection.session_key,
        }
        .build()?;
        let siwe = message.to_string();
        let signature = self.wallet.sign_message(&siwe).await?;

        let mut session = ClientSession {
            address: message.address,
            wallet_address,
            chain_id: message.chain_id,
            session_key: connection
                .session_key
                .export()
                .map_err(|e| ClientError::Signer(format!("session key export failed: {e}")))?,
            siwe,
            signature,
            ens: None,
            lens: None,
        };

        let body = LoginBody {
            signature: &session.signature,
            siwe: &session.siwe,
            address: session.address,
            wallet_address,
            chain_id: session.chain_id,
            dao_login: is_extension_enabled(&self.extensions, DELEGATION_NAMESPACE),
            resolve_ens: match self.config.resolve_ens {
                ResolveEnsMode::OnServer(options) => ResolveEns::Options(options),
                _ => ResolveEns::Flag(false),
            },
            resolve_lens: self.config.resolve_lens == ResolveLensMode::OnServer,
        };
        if let Some(server) = self.api.login(&body).await? {
            session.ens = server.ens.filter(|ens| !ens.is_empty());
            session.lens = server.lens;
        }

        self.resolve_on_client(&mut session).await;
        if let Err(err) = after_sign_in(&self.extensions, &mut session).await {
            // The server already holds the session; drop it before giving up.
            if let Err(logout_err) = self.api.logout(&session).await {
                warn!("could not revoke server session after failed sign-in: {logout_err}");
            }
            return Err(err);
        }

        info!(
            "signed in as {} (wallet {})",
            session.address, session.wallet_address
        );
        Ok(session)
    }

    /// Client-side lookups. Failures only leave the field empty.
    async fn resolve_on_client(&self, session: &mut ClientSession) {
        let Some(resolver) = self.config.resolver.as_deref() else {
            return;
        };
        let address = session.address;

        let ens = async {
            match self.config.resolve_ens {
                ResolveEnsMode::OnClient(options) => {
                    fail_soft("ENS", resolve_ens(resolver, address, options).await)
                }
                _ => None,
            }
        };
        let lens = async {
            match self.config.resolve_lens {
                ResolveLensMode::OnClient => fail_soft(
                    "Lens",
                    resolve_lens(&self.config.lens, resolver, address).await,
                ),
                _ => None,
            }
        };
        let (ens, lens) = tokio::join!(ens, lens);

        if let Some(ens) = ens.filter(|ens| !ens.is_empty()) {
            session.ens = Some(ens);
        }
        if let Some(lens) = lens {
            session.lens = Some(lens);
        }
    }

    /// End the session on the server and return to `Init`.
    pub async fn sign_out(&mut self) -> Result<(), ClientError> {
        let State::SignedIn(_, session) = &self.state else {
            return Err(ClientError::NotConnected("not signed in"));
        };
        self.api.logout(session).await?;
        self.state = State::Init;
        Ok(())
    }

    pub fn session(&self) -> Option<&ClientSession> {
        match &self.state {
            State::SignedIn(_, session) => Some(session.as_ref()),
            _ => None,
        }
    }

    /// Address the session acts for. Under DAO login this is the delegator,
    /// not the signing wallet.
    pub fn address(&self) -> Option<Address> {
        self.session().map(|s| s.address)
    }

    pub fn chain_id(&self) -> u64 {
        self.session()
            .map(|s| s.chain_id)
            .unwrap_or(self.config.chain_id)
    }

    /// Sign arbitrary text with the connected wallet.
    pub async fn sign_message(&self, message: &str) -> Result<String, ClientError> {
        if matches!(self.state, State::Init) {
            return Err(ClientError::NotConnected("connect before signing"));
        }
        self.wallet.sign_message(message).await
    }

    pub async fn resolve_ens(
        &self,
        address: Address,
        options: EnsResolveOptions,
    ) -> Result<EnsData, ClientError> {
        Ok(resolve_ens(self.resolver()?, address, options).await?)
    }

    /// One page of Lens profiles for `address`, starting at `cursor`.
    pub async fn resolve_lens(
        &self,
        address: Address,
        cursor: Option<&str>,
    ) -> Result<LensResolution, ClientError> {
        let network = self.resolver()?.get_network().await?;
        Ok(self.config.lens.resolve(&network, address, cursor).await?)
    }

    fn resolver(&self) -> Result<&dyn AddressResolver, ClientError> {
        self.config
            .resolver
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("resolver".into()).into())
    }
}

fn fail_soft<T>(what: &str, result: blockchain::Result<T>) -> Option<T> {
    result
        .inspect_err(|err| warn!("{what} resolution failed: {err}"))
        .ok()
}
