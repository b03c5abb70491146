use std::sync::Arc;

use alloy_primitives::keccak256;
use axum::{
    Json, Router,
    extract::{FromRef, Request, State, rejection::JsonRejection},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{MethodRouter, get, post},
};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use futures_util::future::BoxFuture;
use log::{error, warn};
use rpc::{
    LoginRequest, LogoutResponse, MessageResponse, ServerSession, SiweMessage,
    UnauthorizedResponse, did_pkh,
};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{AppConfig, MIN_SIGNING_KEY_LEN, RoutesConfig};
use crate::error::{ServiceError, ServiceResult};
use crate::service::{LoginParams, SpruceKitService};

const MISSING_NONCE: &str = "Expected the field `nonce` to be set on this session.";
const MISSING_BODY: &str = "Expected body.";
const INTERNAL_ERROR: &str = "Internal server error.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteKind {
    Nonce,
    Login,
    Logout,
}

/// Passed to route callbacks after the built-in handler succeeded.
#[derive(Clone, Debug)]
pub struct RouteEvent {
    pub route: RouteKind,
    pub session_id: Option<String>,
    pub session: Option<ServerSession>,
    pub body: Option<Value>,
}

pub type RouteCallback = Arc<dyn Fn(&RouteEvent) + Send + Sync>;

#[derive(Clone)]
pub enum RouteConfig {
    Path(String),
    /// Built-in handler at `path`, then `callback`.
    WithCallback {
        path: String,
        callback: RouteCallback,
    },
    /// `handler` replaces the built-in endpoint entirely.
    Custom {
        path: String,
        handler: MethodRouter,
    },
}

impl RouteConfig {
    pub fn path(&self) -> &str {
        match self {
            RouteConfig::Path(path)
            | RouteConfig::WithCallback { path, .. }
            | RouteConfig::Custom { path, .. } => path,
        }
    }

    fn callback(&self) -> Option<&RouteCallback> {
        match self {
            RouteConfig::WithCallback { callback, .. } => Some(callback),
            _ => None,
        }
    }
}

impl From<&str> for RouteConfig {
    fn from(path: &str) -> Self {
        RouteConfig::Path(path.to_string())
    }
}

#[derive(Clone)]
pub struct ServerRoutes {
    pub nonce: RouteConfig,
    pub login: RouteConfig,
    pub logout: RouteConfig,
}

impl ServerRoutes {
    fn get(&self, kind: RouteKind) -> &RouteConfig {
        match kind {
            RouteKind::Nonce => &self.nonce,
            RouteKind::Login => &self.login,
            RouteKind::Logout => &self.logout,
        }
    }
}

impl Default for ServerRoutes {
    fn default() -> Self {
        Self::from(&RoutesConfig::default())
    }
}

impl From<&RoutesConfig> for ServerRoutes {
    fn from(config: &RoutesConfig) -> Self {
        Self {
            nonce: RouteConfig::Path(config.nonce_path.clone()),
            login: RouteConfig::Path(config.login_path.clone()),
            logout: RouteConfig::Path(config.logout_path.clone()),
        }
    }
}

/// Response style of the logout endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogoutReply {
    /// 204 with an empty body.
    #[default]
    NoContent,
    /// 200 with `{"success": true}`.
    Json,
}

#[derive(Clone, Debug)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: rpc::constants::DEFAULT_COOKIE_NAME.to_string(),
            secure: false,
        }
    }
}

pub struct HttpOptions {
    pub routes: ServerRoutes,
    pub logout_reply: LogoutReply,
    pub cookie: CookieSettings,
    pub key: Key,
}

impl HttpOptions {
    pub fn new(key: Key) -> Self {
        Self {
            routes: ServerRoutes::default(),
            logout_reply: LogoutReply::default(),
            cookie: CookieSettings::default(),
            key,
        }
    }

    pub fn from_config(config: &AppConfig) -> ServiceResult<Self> {
        Ok(Self {
            routes: ServerRoutes::from(&config.routes_config),
            logout_reply: LogoutReply::default(),
            cookie: CookieSettings {
                name: config.session_config.cookie_name.clone(),
                secure: config.session_config.secure_cookies,
            },
            key: signing_key(config.session_config.signing_key.as_deref())?,
        })
    }
}

/// Cookie signing key. Secrets are stretched to the 64 bytes the cookie
/// crate wants; without a secret a random key is generated.
pub fn signing_key(secret: Option<&str>) -> ServiceResult<Key> {
    let Some(secret) = secret else {
        warn!("SPRUCEKIT_SIGNING_KEY not set, sessions will not survive a restart");
        return Ok(Key::generate());
    };
    if secret.len() < MIN_SIGNING_KEY_LEN {
        return Err(ServiceError::Config(format!(
            "signing key must be at least {MIN_SIGNING_KEY_LEN} bytes"
        )));
    }
    let mut material = Vec::with_capacity(64);
    let labels = [
        b"sprucekit-cookie-signing:".as_slice(),
        b"sprucekit-cookie-encryption:".as_slice(),
    ];
    for label in labels {
        material.extend_from_slice(keccak256([label, secret.as_bytes()].concat()).as_slice());
    }
    Key::try_from(material.as_slice()).map_err(|e| ServiceError::Config(e.to_string()))
}

/// Per-request authentication state, inserted by the SpruceKit middleware.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpruceKitRequest {
    pub verified: bool,
    pub siwe: Option<SiweMessage>,
    pub user_id: Option<String>,
    pub dao_login: bool,
    pub signature: Option<String>,
}

impl SpruceKitRequest {
    fn verified(session: ServerSession, siwe: SiweMessage) -> Self {
        Self {
            verified: true,
            user_id: Some(did_pkh(siwe.chain_id, &siwe.address)),
            siwe: Some(siwe),
            dao_login: session.dao_login,
            signature: Some(session.signature),
        }
    }
}

#[derive(Clone)]
struct AppState {
    service: SpruceKitService,
    key: Key,
    cookie: Arc<CookieSettings>,
    routes: Arc<ServerRoutes>,
    logout_reply: LogoutReply,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

impl AppState {
    fn session_id(&self, jar: &SignedCookieJar) -> Option<String> {
        jar.get(&self.cookie.name)
            .map(|cookie| cookie.value().to_string())
            .filter(|id| !id.is_empty())
    }

    /// Existing session id, or a new one set on the returned jar.
    fn ensure_session(&self, jar: SignedCookieJar) -> (SignedCookieJar, String) {
        if let Some(id) = self.session_id(&jar) {
            return (jar, id);
        }
        let id = Uuid::new_v4().to_string();
        let cookie = Cookie::build((self.cookie.name.clone(), id.clone()))
            .path("/")
            .http_only(true)
            .secure(self.cookie.secure)
            .same_site(SameSite::Lax);
        (jar.add(cookie), id)
    }

    fn notify(
        &self,
        route: RouteKind,
        session_id: Option<String>,
        session: Option<ServerSession>,
        body: Option<Value>,
    ) {
        if let Some(callback) = self.routes.get(route).callback() {
            callback(&RouteEvent {
                route,
                session_id,
                session,
                body,
            });
        }
    }
}

/// Owns the endpoint state; mounts the endpoints and the session middleware.
pub struct SpruceKitHttp {
    state: AppState,
}

impl SpruceKitHttp {
    pub fn new(service: SpruceKitService, options: HttpOptions) -> Self {
        Self {
            state: AppState {
                service,
                key: options.key,
                cookie: Arc::new(options.cookie),
                routes: Arc::new(options.routes),
                logout_reply: options.logout_reply,
            },
        }
    }

    /// The nonce, login and logout endpoints alone.
    pub fn endpoints(&self) -> Router {
        let routes = self.state.routes.clone();
        let router = Router::new();
        let router = mount(router, &routes.nonce, get(get_nonce));
        let router = mount(router, &routes.login, post(post_login));
        let router = mount(router, &routes.logout, post(post_logout));
        router.with_state(self.state.clone())
    }

    /// Add the endpoints to `app` and run the session middleware on every
    /// route it has, so handlers can read `SpruceKitRequest`.
    pub fn attach(&self, app: Router) -> Router {
        app.merge(self.endpoints())
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                sprucekit_middleware,
            ))
    }
}

pub fn router(service: SpruceKitService, options: HttpOptions) -> Router {
    SpruceKitHttp::new(service, options).attach(Router::new())
}

fn mount(
    router: Router<AppState>,
    config: &RouteConfig,
    builtin: MethodRouter<AppState>,
) -> Router<AppState> {
    match config {
        RouteConfig::Custom { path, handler } => router.route(path, handler.clone().with_state(())),
        other => router.route(other.path(), builtin),
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Details stay in the server log.
    fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(MessageResponse::new(self.message))).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidNonce => ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, MISSING_NONCE),
            ServiceError::InvalidParams(msg) => ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, msg),
            ServiceError::Verification(e) => ApiError::new(StatusCode::BAD_REQUEST, e.message()),
            ServiceError::Config(msg) => {
                error!("configuration error: {msg}");
                ApiError::internal()
            }
            ServiceError::Session(e) => {
                error!("session store error: {e}");
                ApiError::internal()
            }
            ServiceError::Other(e) => {
                error!("internal error: {e:#}");
                ApiError::internal()
            }
        }
    }
}

async fn get_nonce(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, String), ApiError> {
    let (jar, session_id) = state.ensure_session(jar);
    let nonce = state.service.issue_nonce(&session_id).await?;
    state.notify(RouteKind::Nonce, Some(session_id), None, None);
    Ok((jar, nonce))
}

async fn post_login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(SignedCookieJar, Json<ServerSession>), ApiError> {
    let Ok(Json(body)) = body else {
        return Err(ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, MISSING_BODY));
    };
    if !body.get("signature").is_some_and(|v| !v.is_null()) {
        return Err(ServiceError::InvalidParams(crate::service::login::MISSING_SIGNATURE.into()).into());
    }
    if !body.get("siwe").is_some_and(|v| !v.is_null()) {
        return Err(ServiceError::InvalidParams(crate::service::login::MISSING_SIWE.into()).into());
    }
    let request: LoginRequest = serde_json::from_value(body.clone()).map_err(|err| {
        warn!("unreadable login body: {err}");
        ApiError::from(ServiceError::from(rpc::MessageError::Malformed(err.to_string())))
    })?;
    let params = LoginParams::try_from(request)?;

    let (jar, session_id) = state.ensure_session(jar);
    let session = state.service.login_session(&session_id, params).await?;
    state.notify(
        RouteKind::Login,
        Some(session_id),
        Some(session.clone()),
        Some(body),
    );
    Ok((jar, Json(session)))
}

async fn post_logout(State(state): State<AppState>, jar: SignedCookieJar) -> Result<Response, ApiError> {
    let session_id = state.session_id(&jar);
    if let Some(id) = &session_id {
        state.service.logout(id).await?;
    }
    let jar = jar.remove(Cookie::build((state.cookie.name.clone(), "")).path("/"));
    state.notify(RouteKind::Logout, session_id, None, None);

    Ok(match state.logout_reply {
        LogoutReply::NoContent => (jar, StatusCode::NO_CONTENT).into_response(),
        LogoutReply::Json => (jar, Json(LogoutResponse { success: true })).into_response(),
    })
}

/// Re-verifies the caller's session on every request. A session that no
/// longer verifies is destroyed and the request continues unauthenticated.
async fn sprucekit_middleware(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let mut context = SpruceKitRequest::default();

    if let Some(session_id) = state.session_id(&jar) {
        match state.service.load_session(&session_id).await {
            Ok(Some(session)) => match state.service.reverify(&session).await {
                Ok(verified) => context = SpruceKitRequest::verified(session, verified.message),
                Err(err) => {
                    warn!("session {session_id} failed verification, destroying it: {err}");
                    if let Err(err) = state.service.logout(&session_id).await {
                        error!("failed to destroy session {session_id}: {err}");
                    }
                }
            },
            Ok(None) => {}
            Err(err) => error!("failed to load session {session_id}: {err}"),
        }
    }

    req.extensions_mut().insert(context);
    next.run(req).await
}

/// Guard for routes that need a verified session. Unverified requests get a
/// 401 JSON body, or a redirect when `redirect` is set.
///
/// Use with `axum::middleware::from_fn(authenticated(None))` on routes served
/// behind [`SpruceKitHttp::attach`].
pub fn authenticated(
    redirect: Option<String>,
) -> impl Fn(Request, Next) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
    move |req: Request, next: Next| -> BoxFuture<'static, Response> {
        let redirect = redirect.clone();
        Box::pin(async move {
            let verified = req
                .extensions()
                .get::<SpruceKitRequest>()
                .is_some_and(|ctx| ctx.verified);
            if verified {
                return next.run(req).await;
            }
            match redirect {
                Some(to) => Redirect::to(&to).into_response(),
                None => (
                    StatusCode::UNAUTHORIZED,
                    Json(UnauthorizedResponse::default()),
                )
                    .into_response(),
            }
        })
    }
}
