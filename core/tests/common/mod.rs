#![allow(dead_code)]

use std::sync::Arc;

use alloy::signers::{Signer, local::PrivateKeySigner};
use axum::{
    Router,
    body::{Body, Bytes, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::{Duration, SecondsFormat, Utc};
use crypto::hex::encode_hex;
use rpc::SiweMessage;
use serde_json::Value;
use sprucekit_server::{
    http::{HttpOptions, signing_key},
    persist::MemoryStore,
    service::SpruceKitService,
};
use tower::ServiceExt;

pub const SIGNING_SECRET: &str = "integration-test-secret-0123456789abcdef";

pub fn http_options() -> HttpOptions {
    HttpOptions::new(signing_key(Some(SIGNING_SECRET)).expect("test signing key"))
}

pub fn memory_service() -> SpruceKitService {
    SpruceKitService::builder(Arc::new(MemoryStore::new())).build()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub set_cookie: Option<String>,
    pub location: Option<String>,
    pub body: Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("json body")
    }

    pub fn message(&self) -> String {
        self.json()["message"]
            .as_str()
            .expect("message field")
            .to_string()
    }
}

pub async fn send(app: &Router, req: Request<Body>) -> TestResponse {
    let resp = app.clone().oneshot(req).await.expect("infallible router");
    let header_value = |name| {
        resp.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let set_cookie = header_value(header::SET_COOKIE)
        .and_then(|v| v.split(';').next().map(str::to_string));
    let location = header_value(header::LOCATION);
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    TestResponse {
        status,
        set_cookie,
        location,
        body,
    }
}

pub async fn get(app: &Router, path: &str, cookie: Option<&str>) -> TestResponse {
    let mut req = Request::builder().method("GET").uri(path);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    send(app, req.body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: &Router, path: &str, cookie: Option<&str>, body: &Value) -> TestResponse {
    let mut req = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    send(app, req.body(Body::from(body.to_string())).unwrap()).await
}

pub async fn post_empty(app: &Router, path: &str, cookie: Option<&str>) -> TestResponse {
    let mut req = Request::builder().method("POST").uri(path);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    send(app, req.body(Body::empty()).unwrap()).await
}

pub fn message_for(address: alloy::primitives::Address, nonce: &str) -> SiweMessage {
    let now = Utc::now();
    SiweMessage {
        domain: "localhost:3000".into(),
        address,
        statement: Some("Sign in with Ethereum to the app.".into()),
        uri: "http://localhost:3000".into(),
        version: "1".into(),
        chain_id: 1,
        nonce: nonce.into(),
        issued_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        expiration_time: Some((now + Duration::minutes(10)).to_rfc3339_opts(SecondsFormat::Millis, true)),
        not_before: None,
        request_id: None,
        resources: vec![],
    }
}

pub async fn sign(signer: &PrivateKeySigner, message: &SiweMessage) -> String {
    let signature = signer
        .sign_message(message.prepare_message().as_bytes())
        .await
        .expect("sign message");
    encode_hex(&signature.as_bytes())
}

/// Fetch a nonce, returning it with the session cookie that carries it.
pub async fn fetch_nonce(app: &Router, path: &str) -> (String, String) {
    let resp = get(app, path, None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let cookie = resp.set_cookie.clone().expect("session cookie");
    (resp.text(), cookie)
}

/// Nonce, sign and login with the default routes. Returns the session cookie.
pub async fn sign_in(app: &Router, signer: &PrivateKeySigner) -> (String, TestResponse) {
    let (nonce, cookie) = fetch_nonce(app, "/sprucekit-nonce").await;
    let message = message_for(signer.address(), &nonce);
    let signature = sign(signer, &message).await;
    let body = serde_json::json!({
        "siwe": message.prepare_message(),
        "signature": signature,
    });
    let resp = post_json(app, "/sprucekit-login", Some(&cookie), &body).await;
    (cookie, resp)
}
