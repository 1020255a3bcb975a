//! Orbit Realtime server binary.

use std::sync::Arc;

use axum::Router;
use http::{header, HeaderName, HeaderValue, Method};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use orbit_realtime::adapters::websocket::{
    websocket_router, Authenticator, ClientSettings, Hub, WebSocketState,
};
use orbit_realtime::adapters::{JwtSessionValidator, PostgresAuthProvider, PostgresTenantDirectory};
use orbit_realtime::config::{AppConfig, ServerConfig, WebSocketConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "Orbit realtime starting"
    );

    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;

    let authenticator = Authenticator::new(
        Arc::new(JwtSessionValidator::new(
            &config.auth.jwt_secret,
            config.auth.token_ttl(),
        )),
        Arc::new(PostgresAuthProvider::new(pool.clone())),
        Arc::new(PostgresTenantDirectory::new(pool.clone())),
    );

    let hub = Hub::new(config.websocket.hub_queue_capacity);
    let hub_shutdown = CancellationToken::new();
    let hub_task = tokio::spawn({
        let hub = hub.clone();
        let shutdown = hub_shutdown.clone();
        async move { hub.run(shutdown).await }
    });

    let state = WebSocketState::new(hub, authenticator, client_settings(&config.websocket))
        .with_cookie_name(&config.auth.cookie_name);

    let app: Router = websocket_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.server));

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // HTTP is down; now stop routing and close the remaining sockets.
    hub_shutdown.cancel();
    if tokio::time::timeout(config.server.shutdown_timeout(), hub_task)
        .await
        .is_err()
    {
        tracing::warn!("Realtime hub did not stop within the shutdown timeout");
    }
    pool.close().await;

    tracing::info!("Orbit realtime stopped");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    if server.is_production() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn client_settings(websocket: &WebSocketConfig) -> ClientSettings {
    ClientSettings {
        ping_interval: websocket.ping_interval(),
        write_timeout: websocket.write_timeout(),
        queue_capacity: websocket.send_queue_capacity,
    }
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers([header::AUTHORIZATION, HeaderName::from_static("x-tenant-slug")]);

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins).allow_credentials(true)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
