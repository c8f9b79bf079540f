//! Grammar Galaxy · Game Backend
//!
//! - Axum HTTP + WebSocket API for the Emoji Guess Challenge and the sibling games
//! - Google Gemini integration for question generation and sentence validation
//! - File-backed progress storage
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   API_KEY             : Gemini API key (takes precedence)
//!   GEMINI_API_KEY      : Gemini API key (fallback)
//!   GEMINI_BASE_URL     : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL        : default "gemini-2.5-flash"
//!   GEMINI_TIMEOUT_SECS : request timeout (default 30)
//!   PROGRESS_DIR        : directory for stored progress (default "./data")
//!   PROMPTS_CONFIG_PATH : path to TOML prompt overrides
//!   SESSION_IDLE_SECS   : idle lifetime of HTTP game sessions (default 1800)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod error;
mod schemas;
mod gemini;
mod content;
mod progress;
mod session;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let config = AppConfig::from_env();

  // Build shared application state (content client, progress storage, sessions).
  let state = Arc::new(AppState::new(&config));
  state.clone().spawn_session_sweeper();

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "grammar_galaxy", %addr, configured = state.content.is_configured(), "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
