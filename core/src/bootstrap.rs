use anyhow::Context;
use env_logger::Env;
use log::{info, warn};
use sprucekit_server::{
    config::{AppConfig, ServerConfig},
    http::{self, HttpOptions},
    service::SpruceKitService,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

fn load_config() -> anyhow::Result<AppConfig> {
    dotenv::dotenv()
        .map_err(|err| {
            eprintln!(".env file error: {err}");
            err
        })
        .ok();

    AppConfig::fetch()
}

pub async fn bootstrap() -> anyhow::Result<()> {
    let app_config = load_config()?;

    let ServerConfig { log_level, .. } = app_config.server_config.clone();
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level.as_str())).init();

    let cors_layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let service = SpruceKitService::from_config(&app_config).await?;
    let options = HttpOptions::from_config(&app_config)?;
    info!(
        "SpruceKit routes: nonce={}, login={}, logout={}",
        options.routes.nonce.path(),
        options.routes.login.path(),
        options.routes.logout.path()
    );

    let app = http::router(service, options).layer(cors_layer);
    let addr = app_config.server_config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Running server on {}...", listener.local_addr()?);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server exited unexpectedly")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed waiting for Ctrl+C signal: {err}");
    }
    info!("shutdown signal received");
}
