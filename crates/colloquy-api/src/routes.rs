//! Router setup with all routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use colloquy_core::error::ColloquyError;

use crate::handlers;
use crate::state::AppState;

/// Extra room on top of the image limit for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let port = state.config.general.port;
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", port),
        format!("http://localhost:{}", port),
    ]
    .iter()
    .filter_map(|origin| origin.parse().ok())
    .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let upload_limit = state
        .config
        .vision
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    // SSE responses must not be buffered by compression.
    let stream_routes = Router::new()
        .route("/api/sessions/{id}/ask", post(handlers::ask))
        .route("/api/sessions/{id}/speak", post(handlers::speak));

    let routes = Router::new()
        .route("/", get(handlers::ui))
        .route("/ui", get(handlers::ui))
        .route("/health", get(handlers::health))
        .route(
            "/api/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route("/api/sessions/{id}", delete(handlers::delete_session))
        .route(
            "/api/sessions/{id}/history",
            get(handlers::get_history).delete(handlers::clear_history),
        )
        .route(
            "/api/analyze-image",
            post(handlers::analyze_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .layer(CompressionLayer::new());

    routes
        .merge(stream_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB for JSON bodies
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on 127.0.0.1 at the configured port.
pub async fn start_server(state: AppState) -> Result<(), ColloquyError> {
    let addr = format!("127.0.0.1:{}", state.config.general.port);
    let router = create_router(state);

    tracing::info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ColloquyError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| ColloquyError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
