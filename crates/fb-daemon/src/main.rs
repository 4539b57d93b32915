//! fb-daemon entry point.
//!
//! This file is intentionally thin: it loads config, sets up tracing, builds
//! the shared state, wires middleware, and starts the HTTP server. All route
//! handlers live in `routes.rs`; all shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use fb_client::{ActorClient, HttpBackendConfig, HttpOrderBackend};
use fb_config::{report_unused_keys, Consumer, ConsoleSettings, UnusedKeyPolicy};
use fb_daemon::{routes, state};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

/// Comma-separated layered config paths, in merge order.
const ENV_CONFIG_PATHS: &str = "FB_CONFIG_PATHS";
/// Overrides `daemon.bind`.
const ENV_DAEMON_ADDR: &str = "FB_DAEMON_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience).
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let settings = load_settings()?;

    let timeout = Duration::from_millis(settings.backend.timeout_ms);
    let backend = HttpOrderBackend::new(HttpBackendConfig {
        base_url: settings.backend.base_url.clone(),
        graphql_path: settings.backend.graphql_path.clone(),
        timeout,
    })
    .context("order backend client")?;
    let actor_http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("actor backend client")?;
    let actors =
        ActorClient::new(actor_http, &settings.backend.base_url).context("actor backend client")?;

    let shared = Arc::new(
        state::AppState::new(
            Arc::new(backend),
            settings.gateway,
            settings.daemon.event_buffer,
        )
        .with_actors(
            actors,
            Duration::from_secs(settings.actors.institution_cache_ttl_secs),
        ),
    );

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr(&settings)?;
    info!(
        backend = %settings.backend.base_url,
        api = ?settings.gateway.api,
        "fb-daemon listening on http://{}",
        addr
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn load_settings() -> anyhow::Result<ConsoleSettings> {
    let raw = std::env::var(ENV_CONFIG_PATHS).unwrap_or_default();
    let paths: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if paths.is_empty() {
        warn!("{} not set; using built-in defaults", ENV_CONFIG_PATHS);
    }

    let loaded = fb_config::load_layered_yaml(&paths)?;
    let report = report_unused_keys(Consumer::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    for p in &report.unused_leaf_pointers {
        warn!(pointer = %p, "CONFIG_UNUSED_KEYS");
    }
    info!(config_hash = %loaded.config_hash, "config loaded");

    ConsoleSettings::from_config_json(&loaded.config_json)
}

fn bind_addr(settings: &ConsoleSettings) -> anyhow::Result<SocketAddr> {
    let raw = std::env::var(ENV_DAEMON_ADDR).unwrap_or_else(|_| settings.daemon.bind.clone());
    raw.parse()
        .with_context(|| format!("CONFIG_INVALID daemon bind address '{raw}'"))
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
