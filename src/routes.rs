use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::identify;
use crate::config::Config;
use crate::handlers::{health, log_types, logs, trackers, ws};
use crate::AppState;

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/readyz", get(health::readyz))
        .route("/ws", get(ws::ws_handler))
        // Log types
        .route(
            "/api/log-types",
            get(log_types::list_log_types).post(log_types::create_log_type),
        )
        .route(
            "/api/log-types/defaults",
            post(log_types::create_default_log_types),
        )
        .route(
            "/api/log-types/:id",
            put(log_types::update_log_type).delete(log_types::delete_log_type),
        )
        // Log entries
        .route("/api/logs", get(logs::list_logs).post(logs::create_log))
        .route("/api/logs/existing", get(logs::find_existing_log))
        .route("/api/logs/:id", put(logs::update_log).delete(logs::delete_log))
        // Trackers
        .route("/api/trackers", get(trackers::list_trackers))
        .route("/api/trackers/statuses", get(trackers::tracker_statuses))
        .route(
            "/api/trackers/:id",
            get(trackers::get_tracker).delete(trackers::delete_tracker),
        )
        .route("/api/trackers/:id/status", get(trackers::tracker_status))
        .route("/api/trackers/:id/history", get(trackers::tracker_history))
        .route("/api/trackers/:id/blocks", get(trackers::tracker_blocks))
        .route("/api/habits", post(trackers::create_habit))
        .route("/api/habits/:id", put(trackers::update_habit))
        .route("/api/streaks", post(trackers::create_streak))
        .layer(middleware::from_fn_with_state(state.clone(), identify))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = std::iter::once(&config.frontend_url)
        .chain(config.cors_extra_origins.iter())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(hv) => Some(hv),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}
