use axum::{Router, http::HeaderValue, middleware, routing::get, routing::post};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::config::Settings;
use crate::handlers;
use crate::pos_db::PosDb;

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.allowed_origins);

    Router::new()
        .route("/", get(handlers::root::index))
        .route("/api", get(handlers::root::api_info))
        // Health
        .route("/api/health", get(handlers::health::health))
        // Product catalogue
        .route("/api/products", get(handlers::products::get_products))
        .route("/api/products/dev-seed", post(handlers::products::dev_seed))
        .route("/api/products/bulk", post(handlers::products::bulk_upsert))
        // Purchases
        .route("/api/purchase", post(handlers::purchase::create_purchase))
        .route("/api/purchase/ping", get(handlers::purchase::ping))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(crate::middleware::request_id_layer))
        .with_state(state)
}

/// Credentialed CORS for the configured origins. A `*` entry mirrors the
/// request origin, since a literal wildcard cannot be combined with credentials.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// Open the database, bind `host:port` and serve until Ctrl+C or SIGTERM.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let location = settings.database_location()?;
    let db = Arc::new(PosDb::open(&location)?);
    tracing::info!("database opened at {location}");

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers;
    let app_name = settings.app_name.clone();
    let state = AppState {
        db,
        settings: Arc::new(settings),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    tracing::info!(workers, "{app_name} listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

