use std::sync::Arc;

use blockchain::{
    AddressResolver, ChainClient, ContractSignatureVerifier, DelegateOracle, LensClient,
};
use log::{info, warn};
use rpc::ServerSession;

use crate::auth::{DelegateFallback, Erc1271Fallback, VerificationFallback};
use crate::config::AppConfig;
use crate::error::ServiceResult;
use crate::persist::{MemoryStore, SessionRecord, SessionStore};

pub mod events;
pub mod login;

pub use events::{EventLogSink, EventObserver, ServerEvent};
pub use login::LoginParams;

/// Server side of SpruceKit: nonce issue, login, logout and session checks.
#[derive(Clone)]
pub struct SpruceKitService {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn SessionStore>,
    resolver: Option<Arc<dyn AddressResolver>>,
    delegate_oracle: Option<Arc<dyn DelegateOracle>>,
    contract_verifier: Option<Arc<dyn ContractSignatureVerifier>>,
    lens: LensClient,
    log_sink: Option<EventLogSink>,
    observers: Vec<EventObserver>,
}

pub struct SpruceKitServiceBuilder {
    store: Arc<dyn SessionStore>,
    resolver: Option<Arc<dyn AddressResolver>>,
    delegate_oracle: Option<Arc<dyn DelegateOracle>>,
    contract_verifier: Option<Arc<dyn ContractSignatureVerifier>>,
    lens: Option<LensClient>,
    log_sink: Option<EventLogSink>,
    observers: Vec<EventObserver>,
}

impl SpruceKitServiceBuilder {
    pub fn resolver(mut self, resolver: Arc<dyn AddressResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn delegate_oracle(mut self, oracle: Arc<dyn DelegateOracle>) -> Self {
        self.delegate_oracle = Some(oracle);
        self
    }

    pub fn contract_verifier(mut self, verifier: Arc<dyn ContractSignatureVerifier>) -> Self {
        self.contract_verifier = Some(verifier);
        self
    }

    pub fn lens_client(mut self, lens: LensClient) -> Self {
        self.lens = Some(lens);
        self
    }

    pub fn log_sink(mut self, sink: EventLogSink) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Observers run synchronously, in registration order, after each login.
    pub fn on_event(mut self, observer: EventObserver) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> SpruceKitService {
        SpruceKitService {
            inner: Arc::new(Inner {
                store: self.store,
                resolver: self.resolver,
                delegate_oracle: self.delegate_oracle,
                contract_verifier: self.contract_verifier,
                lens: self.lens.unwrap_or_default(),
                log_sink: self.log_sink,
                observers: self.observers,
            }),
        }
    }
}

impl SpruceKitService {
    pub fn builder(store: Arc<dyn SessionStore>) -> SpruceKitServiceBuilder {
        SpruceKitServiceBuilder {
            store,
            resolver: None,
            delegate_oracle: None,
            contract_verifier: None,
            lens: None,
            log_sink: None,
            observers: Vec::new(),
        }
    }

    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let mut builder = Self::builder(Arc::new(MemoryStore::new()));

        match &config.ethereum_config.rpc_url {
            Some(rpc_url) => {
                let chain = Arc::new(ChainClient::connect(rpc_url).await?);
                builder = builder
                    .resolver(chain.clone())
                    .delegate_oracle(chain.clone())
                    .contract_verifier(chain);
            }
            None => warn!("ETHEREUM_RPC_URL not set, ENS/Lens resolution and DAO login are disabled"),
        }

        match EventLogSink::from_config(&config.metrics_config) {
            Some(sink) => {
                info!("login events are sent to {}", config.metrics_config.url);
                builder = builder.log_sink(sink);
            }
            None => info!("SPRUCEKIT_METRICS_API_KEY not set, event logging is disabled"),
        }

        Ok(builder.build())
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.inner.store
    }

    pub fn generate_nonce(&self) -> String {
        crate::auth::generate_nonce()
    }

    /// Bind a fresh nonce to the session, replacing any pending nonce or
    /// established session it had.
    pub async fn issue_nonce(&self, session_id: &str) -> ServiceResult<String> {
        let nonce = self.generate_nonce();
        self.inner
            .store
            .save(session_id, SessionRecord::with_nonce(nonce.clone()))
            .await?;
        Ok(nonce)
    }

    pub async fn load_session(&self, session_id: &str) -> ServiceResult<Option<ServerSession>> {
        Ok(self
            .inner
            .store
            .load(session_id)
            .await?
            .and_then(|record| record.session))
    }

    /// Drop the session. Logging out an unknown session succeeds.
    pub async fn logout(&self, session_id: &str) -> ServiceResult<bool> {
        self.inner.store.destroy(session_id).await?;
        Ok(true)
    }

    fn fallback_for(&self, dao_login: bool) -> Option<Box<dyn VerificationFallback>> {
        if dao_login {
            match &self.inner.delegate_oracle {
                Some(oracle) => Some(Box::new(DelegateFallback::new(oracle.clone()))),
                None => {
                    warn!("DAO login requested but no delegate oracle is configured");
                    None
                }
            }
        } else {
            self.inner
                .contract_verifier
                .as_ref()
                .map(|verifier| {
                    Box::new(Erc1271Fallback::new(verifier.clone())) as Box<dyn VerificationFallback>
                })
        }
    }
}
