#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use axum::Router;
use blockchain::{AddressResolver, DelegateOracle, Network, ResolutionError};
use sdk_sprucekit::{Config, ConfigBuilder};
use sprucekit_server::{
    http::{self, HttpOptions, signing_key},
    persist::MemoryStore,
    service::{ServerEvent, SpruceKitService, SpruceKitServiceBuilder},
};
use tokio::net::TcpListener;

pub const SIGNING_SECRET: &str = "sdk-integration-secret-0123456789abcdef";

pub fn http_options() -> HttpOptions {
    HttpOptions::new(signing_key(Some(SIGNING_SECRET)).expect("signing key"))
}

pub fn service_builder() -> SpruceKitServiceBuilder {
    SpruceKitService::builder(Arc::new(MemoryStore::new()))
}

/// Collects every server event so tests can check what the server saw.
pub fn recording(builder: SpruceKitServiceBuilder) -> (SpruceKitServiceBuilder, Arc<Mutex<Vec<ServerEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let builder = builder.on_event(Arc::new(move |event: &ServerEvent| {
        sink.lock().unwrap().push(event.clone());
    }));
    (builder, events)
}

pub async fn spawn_router(
    router: Router,
) -> Result<(String, tokio::task::JoinHandle<()>), std::io::Error> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router.into_make_service()).await {
            eprintln!("test server stopped: {err}");
        }
    });
    Ok((format!("http://{}", addr), handle))
}

pub async fn spawn_server(
    service: SpruceKitService,
    options: HttpOptions,
) -> (String, tokio::task::JoinHandle<()>) {
    spawn_router(http::router(service, options))
        .await
        .expect("bind test server")
}

pub fn client_config(server: &str) -> ConfigBuilder {
    ConfigBuilder::default()
        .server_host(server.to_string())
        .domain("localhost".to_string())
}

pub fn build(builder: ConfigBuilder) -> Config {
    builder.build().expect("client config")
}

pub fn wallet() -> Arc<PrivateKeySigner> {
    Arc::new(PrivateKeySigner::random())
}

#[derive(Default)]
pub struct RegistryOracle {
    pub delegations: HashSet<(Address, Address)>,
}

#[async_trait]
impl DelegateOracle for RegistryOracle {
    async fn is_delegate(
        &self,
        delegator: Address,
        delegate: Address,
        chain_id: u64,
    ) -> Result<bool, ResolutionError> {
        Ok(chain_id == 1 && self.delegations.contains(&(delegator, delegate)))
    }
}

pub struct NameService;

#[async_trait]
impl AddressResolver for NameService {
    async fn lookup_address(&self, _address: Address) -> Result<Option<String>, ResolutionError> {
        Ok(Some("alice.eth".into()))
    }

    async fn get_avatar(&self, _address: Address) -> Result<Option<String>, ResolutionError> {
        Ok(None)
    }

    async fn get_balance(&self, _address: Address) -> Result<U256, ResolutionError> {
        Ok(U256::ZERO)
    }

    async fn get_block_number(&self) -> Result<u64, ResolutionError> {
        Ok(1)
    }

    async fn get_network(&self) -> Result<Network, ResolutionError> {
        Ok(Network::from_chain_id(1))
    }
}
