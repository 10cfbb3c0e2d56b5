//! Router assembly and server entry point.

use axum::Router;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::routing::get;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::ws::handler::ws_handler;

/// Builds the CORS layer from the configured origin allow-list.
#[must_use]
pub fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Builds the full application router: REST, WebSocket, tracing and CORS.
pub fn build_app(state: AppState, config: &GatewayConfig) -> Router {
    let rest = api::build_router().layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        config.request_timeout,
    ));
    Router::new()
        .merge(rest)
        .route(&config.ws_path, get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config))
        .with_state(state)
}

/// Starts the bus connect attempt in the background and logs every
/// later bus state transition.
///
/// Requests that need the bus wait for it; nothing else does.
pub fn spawn_bus_connect(state: &AppState) {
    let mut states = state.gateway.bus().watch();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let bus_state = *states.borrow_and_update();
            tracing::info!(bus = %bus_state, "notification bus state changed");
        }
    });

    let gateway = std::sync::Arc::clone(&state.gateway);
    tokio::spawn(async move {
        gateway.bus().connect().await;
    });
}
