use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::io;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::RunSettings;
use crate::constants::api::{TRIGGER_TOKEN_ENV, TRIGGER_TOKEN_HEADER};
use crate::error::{RunError, RunResult};
use crate::events::{RunResponse, TriggerEvent};
use crate::services::runner::{self, connect_live};

pub struct AppState {
    /// Defaults every trigger starts from.
    pub settings: RunSettings,
    /// One order in flight per process.
    pub run_lock: Mutex<()>,
    trigger_token: String,
}

impl AppState {
    /// The server refuses to start without a trigger secret.
    pub fn new(settings: RunSettings, trigger_token: impl Into<String>) -> RunResult<Self> {
        let trigger_token = trigger_token.into();
        if trigger_token.trim().is_empty() {
            return Err(RunError::Config(format!(
                "{} must be set to serve the trigger endpoint",
                TRIGGER_TOKEN_ENV
            )));
        }
        Ok(Self {
            settings,
            run_lock: Mutex::new(()),
            trigger_token,
        })
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get(TRIGGER_TOKEN_HEADER)
            .map(|presented| token_matches(self.trigger_token.as_bytes(), presented.as_bytes()))
            .unwrap_or(false)
    }
}

/// Compares without short-circuiting on the first differing byte.
fn token_matches(expected: &[u8], presented: &[u8]) -> bool {
    if expected.len() != presented.len() {
        return false;
    }
    expected
        .iter()
        .zip(presented)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/trigger", post(trigger))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn run_server(state: Arc<AppState>, addr: &str) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API Server listening on {}", addr);
    axum::serve(listener, router(state)).await
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Runs one job from the posted payload. An empty body uses the defaults.
async fn trigger(State(state): State<Arc<AppState>>, headers: HeaderMap, body: String) -> impl IntoResponse {
    if !state.authorized(&headers) {
        warn!("⚠️ [API] Trigger refused: missing or invalid {}", TRIGGER_TOKEN_HEADER);
        return respond(RunResponse {
            status_code: StatusCode::UNAUTHORIZED.as_u16(),
            body: Value::String("missing or invalid trigger token".to_string()).to_string(),
        });
    }

    let mut event = if body.trim().is_empty() {
        TriggerEvent::default()
    } else {
        match TriggerEvent::from_json(&body) {
            Ok(event) => event,
            Err(e) => return respond(RunResponse::failure(&e)),
        }
    };

    // Credentials path is fixed by whoever started the server
    if event.attributes.remove("config_file").is_some() {
        warn!("⚠️ [API] Ignoring config_file from trigger payload");
    }

    let mut settings = state.settings.clone().with_event(&event);
    // Nobody is at a terminal to answer a prompt
    settings.job = true;

    let _guard = state.run_lock.lock().await;
    info!("[API] Trigger accepted: {:?}", event.attributes);

    let response = match runner::run(&settings, &mut io::empty(), &mut io::sink(), connect_live).await {
        Ok(response) => response,
        Err(e) => {
            error!("❌ [API] Run failed: {}", e);
            RunResponse::failure(&e)
        }
    };
    respond(response)
}

fn respond(response: RunResponse) -> axum::response::Response {
    let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response)).into_response()
}
