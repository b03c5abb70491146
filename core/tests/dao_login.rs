use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, U256, address};
use alloy::signers::{Signer, local::PrivateKeySigner};
use async_trait::async_trait;
use axum::http::StatusCode;
use blockchain::{AddressResolver, DelegateOracle, Network, ResolutionError};
use serde_json::json;
use sprucekit_server::{
    http,
    persist::MemoryStore,
    service::{ServerEvent, SpruceKitService},
};
use test_log::test;

mod common;
use common::*;

#[derive(Default)]
struct RegistryOracle {
    delegations: HashSet<(Address, Address)>,
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

struct NameService {
    chain_id: u64,
    fail_avatar: bool,
}

#[async_trait]
impl AddressResolver for NameService {
    async fn lookup_address(&self, _address: Address) -> Result<Option<String>, ResolutionError> {
        Ok(Some("alice.eth".into()))
    }

    async fn get_avatar(&self, _address: Address) -> Result<Option<String>, ResolutionError> {
        if self.fail_avatar {
            return Err(ResolutionError::Provider("resolver reverted".into()));
        }
        Ok(Some("https://example.com/alice.png".into()))
    }

    async fn get_balance(&self, _address: Address) -> Result<U256, ResolutionError> {
        Ok(U256::ZERO)
    }

    async fn get_block_number(&self) -> Result<u64, ResolutionError> {
        Ok(1)
    }

    async fn get_network(&self) -> Result<Network, ResolutionError> {
        Ok(Network::from_chain_id(self.chain_id))
    }
}

const DAO: Address = address!("4242424242424242424242424242424242424242");

fn dao_service(
    delegate: Address,
    events: Arc<Mutex<Vec<ServerEvent>>>,
) -> SpruceKitService {
    let oracle = RegistryOracle {
        delegations: HashSet::from([(DAO, delegate)]),
    };
    SpruceKitService::builder(Arc::new(MemoryStore::new()))
        .delegate_oracle(Arc::new(oracle))
        .on_event(Arc::new(move |event: &ServerEvent| {
            events.lock().unwrap().push(event.clone());
        }))
        .build()
}

async fn dao_login(app: &axum::Router, signer: &PrivateKeySigner, dao_login: bool) -> TestResponse {
    let (nonce, cookie) = fetch_nonce(app, "/sprucekit-nonce").await;
    let message = message_for(DAO, &nonce);
    let signature = sign(signer, &message).await;
    post_json(
        app,
        "/sprucekit-login",
        Some(&cookie),
        &json!({
            "siwe": message.prepare_message(),
            "signature": signature,
            "daoLogin": dao_login,
        }),
    )
    .await
}

#[test(tokio::test)]
async fn registered_delegate_signs_in_for_the_dao() {
    let delegate = PrivateKeySigner::random();
    let events = Arc::default();
    let app = http::router(dao_service(delegate.address(), Arc::clone(&events)), http_options());

    let resp = dao_login(&app, &delegate, true).await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    let body = resp.json();
    assert_eq!(body["daoLogin"], true);
    assert_eq!(body["siwe"]["address"], DAO.to_checksum(None));

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    let ServerEvent::Login(event) = &events[0];
    assert_eq!(event.user_id, format!("did:pkh:eip155:1:{}", DAO.to_checksum(None)));
    assert_eq!(event.content["isGnosis"], true);
}

#[test(tokio::test)]
async fn unregistered_delegate_is_rejected() {
    let delegate = PrivateKeySigner::random();
    let stranger = PrivateKeySigner::random();
    let events: Arc<Mutex<Vec<ServerEvent>>> = Arc::default();
    let app = http::router(dao_service(delegate.address(), events.clone()), http_options());

    let resp = dao_login(&app, &stranger, true).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.message(),
        format!(
            "Delegate verification failed. Expected: {}. Received: {}.",
            DAO.to_checksum(None),
            stranger.address().to_checksum(None)
        )
    );
    assert!(events.lock().unwrap().is_empty());
}

#[test(tokio::test)]
async fn delegate_without_dao_flag_is_a_signature_mismatch() {
    let delegate = PrivateKeySigner::random();
    let app = http::router(dao_service(delegate.address(), Arc::default()), http_options());

    let resp = dao_login(&app, &delegate, false).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(
        resp.message()
            .starts_with("Signature does not match address of the message.")
    );
}

#[test(tokio::test)]
async fn plain_login_is_not_labelled_gnosis() {
    let signer = PrivateKeySigner::random();
    let events: Arc<Mutex<Vec<ServerEvent>>> = Arc::default();
    let app = http::router(dao_service(Address::ZERO, events.clone()), http_options());

    let (_, resp) = sign_in(&app, &signer).await;
    assert_eq!(resp.status, StatusCode::OK);
    let events = events.lock().unwrap();
    let ServerEvent::Login(event) = &events[0];
    assert_eq!(event.content["isGnosis"], false);
    assert_eq!(event.content["siwe"]["address"], signer.address().to_checksum(None));
}

async fn login_with_resolution(service: SpruceKitService, extra: serde_json::Value) -> serde_json::Value {
    let app = http::router(service, http_options());
    let signer = PrivateKeySigner::random();
    let (nonce, cookie) = fetch_nonce(&app, "/sprucekit-nonce").await;
    let message = message_for(signer.address(), &nonce);
    let mut body = json!({
        "siwe": message.prepare_message(),
        "signature": sign(&signer, &message).await,
    });
    for (k, v) in extra.as_object().unwrap() {
        body[k] = v.clone();
    }
    let resp = post_json(&app, "/sprucekit-login", Some(&cookie), &body).await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    resp.json()
}

#[test(tokio::test)]
async fn ens_is_resolved_when_requested() {
    let service = SpruceKitService::builder(Arc::new(MemoryStore::new()))
        .resolver(Arc::new(NameService {
            chain_id: 1,
            fail_avatar: false,
        }))
        .build();

    let body = login_with_resolution(service, json!({ "resolveEns": true })).await;
    assert_eq!(
        body["ens"],
        json!({ "domain": "alice.eth", "avatarUrl": "https://example.com/alice.png" })
    );
    assert!(body.get("lens").is_none());
}

#[test(tokio::test)]
async fn ens_lookups_fail_soft() {
    let service = SpruceKitService::builder(Arc::new(MemoryStore::new()))
        .resolver(Arc::new(NameService {
            chain_id: 1,
            fail_avatar: true,
        }))
        .build();

    let body = login_with_resolution(
        service,
        json!({ "resolveEns": { "domain": true, "avatar": true } }),
    )
    .await;
    assert_eq!(body["ens"], json!({ "domain": "alice.eth" }));
}

#[test(tokio::test)]
async fn ens_without_provider_leaves_field_empty() {
    let body = login_with_resolution(memory_service(), json!({ "resolveEns": true })).await;
    assert!(body.get("ens").is_none());
}

#[test(tokio::test)]
async fn lens_on_unsupported_network_reports_why() {
    let service = SpruceKitService::builder(Arc::new(MemoryStore::new()))
        .resolver(Arc::new(NameService {
            chain_id: 1,
            fail_avatar: false,
        }))
        .build();

    let body = login_with_resolution(service, json!({ "resolveLens": true })).await;
    let lens = body["lens"].as_str().expect("lens message");
    assert!(lens.contains("on network 'homestead'"));
}
