//! HTTP front end for queueing bot runs.
//!
//! Provides HTTP endpoints for:
//! - Submitting a meeting link (POST /api/meet)
//! - Downloading a recording (GET /api/recordings/:fname)
//! - Deleting a recording (DELETE /api/recordings/:fname/delete)

pub mod error;
pub mod launcher;
pub mod routes;

use anyhow::{Context, Result};
use axum::{response::Json, routing::get, Router};
use regex::Regex;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;

pub use launcher::{BotLauncher, LaunchRequest, ProcessLauncher};

const MEET_LINK_PATTERN: &str = r"(?i)^https?://meet\.google\.com/[a-z0-9-]+(\?.*)?$";

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub record_dir: PathBuf,
    pub public_base_url: Option<String>,
    pub launcher: Arc<dyn BotLauncher>,
    meet_link: Regex,
}

impl AppState {
    pub fn new(
        record_dir: PathBuf,
        public_base_url: Option<String>,
        launcher: Arc<dyn BotLauncher>,
    ) -> Result<Self> {
        Ok(Self {
            record_dir,
            public_base_url,
            launcher,
            meet_link: Regex::new(MEET_LINK_PATTERN)?,
        })
    }

    pub fn is_meet_link(&self, link: &str) -> bool {
        self.meet_link.is_match(link)
    }

    /// Download URL for `filename`; relative unless a public base URL is set.
    pub fn file_url(&self, filename: &str) -> String {
        let base = self
            .public_base_url
            .as_deref()
            .map(|b| b.trim_end_matches('/'))
            .unwrap_or("");
        format!("{}/api/recordings/{}", base, filename)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .merge(routes::meet::router(state.clone()))
        .merge(routes::recordings::router(state))
        .layer(ServiceBuilder::new())
}

pub struct ApiServer {
    host: String,
    port: u16,
    state: AppState,
}

impl ApiServer {
    pub fn new(host: impl Into<String>, port: u16, state: AppState) -> Self {
        Self {
            host: host.into(),
            port,
            state,
        }
    }

    pub async fn start(self) -> Result<()> {
        let address = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {}", address))?;

        info!("API server listening on http://{}", address);
        info!("Recordings directory: {:?}", self.state.record_dir);
        info!("Endpoints:");
        info!("  GET    /                              - Service info");
        info!("  POST   /api/meet                      - Queue a bot for a meeting link");
        info!("  GET    /api/recordings/:fname         - Download a recording");
        info!("  DELETE /api/recordings/:fname/delete  - Delete a recording");

        axum::serve(listener, router(self.state)).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "meetbot",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}
