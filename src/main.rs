//! EdMaster · English "-ed" pronunciation trainer backend
//!
//! - Axum HTTP + WebSocket API
//! - Per-connection quiz sessions (Idle → Loading → InQuiz → Results, plus Learning)
//! - Optional OpenAI word generation, rule examples and speech
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   OPENAI_API_KEY      : enables OpenAI integration if present
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL   : default "gpt-4o-mini" (rule examples)
//!   OPENAI_STRONG_MODEL : default "gpt-4o" (word batches)
//!   OPENAI_TTS_MODEL    : default "gpt-4o-mini-tts"
//!   OPENAI_TTS_VOICE    : default "coral"
//!   AGENT_CONFIG_PATH   : path to TOML config (prompts, quiz settings, optional word bank)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod seeds;
mod ledger;
mod session;
mod collaborator;
mod word_source;
mod controller;
mod share;
mod audio;
mod openai;
mod state;
mod protocol;
mod logic;
mod routes;

#[cfg(test)]
mod mock;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Word bank, quiz settings and the optional OpenAI collaborator.
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "edmaster_backend", %addr, generation = state.words.has_collaborator(), "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "edmaster_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "edmaster_backend", "Shutdown signal received");
}
