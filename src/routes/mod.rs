//! Router assembly. The API lives under `/api/v1`, the WebSocket at `/ws`,
//! and everything else falls through to the static SPA in `./static`.

use std::sync::Arc;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

const STATIC_DIR: &str = "./static";

pub fn build_router(state: Arc<AppState>) -> Router {
    let spa = ServeDir::new(STATIC_DIR)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(format!("{STATIC_DIR}/index.html")));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .nest("/api/v1", api())
        .with_state(state)
        .layer(cors)
        .layer(trace)
        .fallback_service(spa)
}

/// `/api/v1` routes. Game and content routes answer 503 until a key is configured.
fn api() -> Router<Arc<AppState>> {
    let sessions = Router::new()
        .route("/", post(http::http_create_session))
        .route("/:id", get(http::http_get_session).delete(http::http_delete_session))
        .route("/:id/actions", post(http::http_session_action));

    let content = Router::new()
        .route("/grammar-spotter", get(http::http_grammar_spotter))
        .route("/grammar-fill", get(http::http_grammar_fill))
        .route("/preposition-drop", get(http::http_preposition_drop))
        .route("/maze", get(http::http_maze))
        .route("/dialogue", post(http::http_dialogue));

    Router::new()
        .route("/health", get(http::http_health))
        .route("/diagnostics/test-connection", post(http::http_test_connection))
        .route("/categories", get(http::http_categories))
        .route("/scores", get(http::http_scores))
        .nest("/emoji/sessions", sessions)
        .nest("/content", content)
}
