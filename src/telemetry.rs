//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! LOG_LEVEL holds the filter directives; when unset, `DEFAULT_DIRECTIVES` applies.
//! Targets used across the crate:
//!   grammar_galaxy  boot, sockets, score board
//!   session         state-machine transitions and refused actions
//!   content         prompts sent to the model and parsed replies
//!   progress        storage load/save
//! LOG_FORMAT=json switches to structured output; anything else is pretty text.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_DIRECTIVES: &str =
    "info,grammar_galaxy=debug,session=debug,content=debug,progress=info,tower_http=info,axum=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    match LogFormat::parse(std::env::var("LOG_FORMAT").ok().as_deref()) {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}
