use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use solboard_config::{AppConfig, WebConfig};
use solboard_core_types::{ChallengeWindow, LeaderboardSnapshot};
use solboard_storage::{
    register_wallet, JsonSnapshotStore, RegistrationError, WalletRegistration,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::cycle_worker::{CycleRunError, CycleTrigger, CycleWorkerHandle};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PublicConfig {
    pub api_base_url: String,
    pub update_interval_seconds: u64,
    pub timezone: String,
    pub challenge_end_date: DateTime<Utc>,
}

#[derive(Clone)]
pub(crate) struct WebRuntimeHandle {
    inner: Arc<WebRuntimeInner>,
}

struct WebRuntimeInner {
    auth_token: String,
    cache_timeout_seconds: i64,
    store: JsonSnapshotStore,
    wallets_path: PathBuf,
    start_values_path: PathBuf,
    registration_lock: Mutex<()>,
    worker: CycleWorkerHandle,
    public_config: PublicConfig,
}

impl WebRuntimeHandle {
    pub(crate) fn new(
        config: &AppConfig,
        window: &ChallengeWindow,
        worker: CycleWorkerHandle,
    ) -> Self {
        Self {
            inner: Arc::new(WebRuntimeInner {
                auth_token: config.web.auth_token.clone(),
                cache_timeout_seconds: i64::try_from(config.web.cache_timeout_seconds)
                    .unwrap_or(i64::MAX),
                store: JsonSnapshotStore::new(&config.paths.snapshot_path),
                wallets_path: PathBuf::from(&config.paths.wallets_path),
                start_values_path: PathBuf::from(&config.paths.start_values_path),
                registration_lock: Mutex::new(()),
                worker,
                public_config: PublicConfig {
                    api_base_url: config.web.public_base_url.clone(),
                    update_interval_seconds: config.system.refresh_seconds,
                    timezone: config.web.timezone.clone(),
                    challenge_end_date: window.end,
                },
            }),
        }
    }

    pub(crate) fn auth_token_is_configured(&self) -> bool {
        let token = self.inner.auth_token.trim();
        !token.is_empty() && !token.contains("REPLACE_ME")
    }

    pub(crate) async fn run_server(self, web_config: WebConfig) -> Result<()> {
        if !self.auth_token_is_configured() {
            warn!("web.auth_token is not configured, POST /api/update and /api/wallets are disabled");
        }
        let app = build_router(self);
        let bind = format!("{}:{}", web_config.host, web_config.port);
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .with_context(|| format!("failed to bind web server on {}", bind))?;
        info!(bind = %bind, "web server started");
        axum::serve(listener, app)
            .await
            .context("axum web server failed")?;
        Ok(())
    }

    async fn cached_snapshot(&self) -> Result<Option<LeaderboardSnapshot>, ApiError> {
        let store = self.inner.store.clone();
        tokio::task::spawn_blocking(move || store.load_snapshot())
            .await
            .map_err(|error| ApiError::internal(format!("snapshot read task failed: {error}")))?
            .map_err(|error| ApiError::internal(format!("{error:#}")))
    }

    fn is_fresh(&self, snapshot: &LeaderboardSnapshot, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(snapshot.updated).num_seconds()
            < self.inner.cache_timeout_seconds
    }
}

fn build_router(state: WebRuntimeHandle) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any);
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/leaderboard", get(api_leaderboard))
        .route("/api/update", post(api_update))
        .route("/api/wallets", post(api_register_wallet))
        .route("/api/public-config", get(api_public_config))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    fn service_unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<CycleRunError> for ApiError {
    fn from(error: CycleRunError) -> Self {
        match error {
            CycleRunError::Busy => Self::conflict(error.to_string()),
            CycleRunError::Unavailable => Self::service_unavailable(error.to_string()),
            CycleRunError::Failed(_) => Self::internal(error.to_string()),
        }
    }
}

impl From<RegistrationError> for ApiError {
    fn from(error: RegistrationError) -> Self {
        match error {
            RegistrationError::Invalid(_) => Self::bad_request(error.to_string()),
            RegistrationError::Duplicate(_) => Self::conflict(error.to_string()),
            RegistrationError::Storage(_) => Self::internal(error.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": self.message,
                "status": self.status.as_u16(),
            })),
        )
            .into_response()
    }
}

async fn healthz(State(state): State<WebRuntimeHandle>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "ts": Utc::now(),
        "update_running": state.inner.worker.is_busy(),
    }))
}

/// Serves the persisted snapshot while it is fresh; otherwise refreshes first.
/// A stale snapshot is still served when the refresh cannot run.
async fn api_leaderboard(
    State(state): State<WebRuntimeHandle>,
) -> Result<Json<LeaderboardSnapshot>, ApiError> {
    let cached = state.cached_snapshot().await?;
    if let Some(snapshot) = cached.as_ref() {
        if state.is_fresh(snapshot, Utc::now()) {
            return Ok(Json(snapshot.clone()));
        }
    }

    match state.inner.worker.run(CycleTrigger::StaleRead).await {
        Ok(report) => Ok(Json(report.snapshot)),
        Err(error) => match cached {
            Some(snapshot) => {
                warn!(error = %error, "serving stale leaderboard snapshot");
                Ok(Json(snapshot))
            }
            None => Err(match error {
                CycleRunError::Busy => {
                    ApiError::service_unavailable("leaderboard is being computed, retry shortly")
                }
                other => ApiError::from(other),
            }),
        },
    }
}

#[derive(Debug, Serialize)]
struct UpdateResponse {
    success: bool,
    timestamp: DateTime<Utc>,
    message: &'static str,
    status: &'static str,
    cycle_id: String,
    updated: DateTime<Utc>,
    wallets: usize,
    skipped: usize,
    elapsed_ms: u64,
}

async fn api_update(
    State(state): State<WebRuntimeHandle>,
    headers: HeaderMap,
) -> Result<Json<UpdateResponse>, ApiError> {
    ensure_authorized(&state, &headers)?;
    let report = state.inner.worker.run(CycleTrigger::Manual).await?;
    info!(cycle_id = %report.cycle_id, "manual leaderboard update completed");
    Ok(Json(UpdateResponse {
        success: true,
        timestamp: Utc::now(),
        message: "Leaderboard updated successfully",
        status: "updated",
        cycle_id: report.cycle_id.to_string(),
        updated: report.snapshot.updated,
        wallets: report.wallets_processed,
        skipped: report.wallets_skipped,
        elapsed_ms: report.elapsed_ms,
    }))
}

#[derive(Debug, Serialize)]
struct RegisterWalletResponse {
    success: bool,
    message: String,
    username: String,
    wallet: String,
}

/// Registered wallets join the leaderboard on the next cycle.
async fn api_register_wallet(
    State(state): State<WebRuntimeHandle>,
    headers: HeaderMap,
    Json(registration): Json<WalletRegistration>,
) -> Result<(StatusCode, Json<RegisterWalletResponse>), ApiError> {
    ensure_authorized(&state, &headers)?;
    let registered = {
        let state = state.clone();
        tokio::task::spawn_blocking(move || {
            let _guard = state
                .inner
                .registration_lock
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            register_wallet(
                &state.inner.wallets_path,
                &state.inner.start_values_path,
                &registration,
            )
        })
        .await
        .map_err(|error| ApiError::internal(format!("wallet registration task failed: {error}")))?
    };
    let entry = match registered {
        Ok(entry) => entry,
        Err(error) => {
            warn!(error = %error, "wallet registration rejected");
            return Err(error.into());
        }
    };
    let username = entry.display_name();
    Ok((
        StatusCode::CREATED,
        Json(RegisterWalletResponse {
            success: true,
            message: format!("Wallet added successfully: {} ({})", username, entry.wallet),
            username,
            wallet: entry.wallet,
        }),
    ))
}

async fn api_public_config(State(state): State<WebRuntimeHandle>) -> Json<PublicConfig> {
    Json(state.inner.public_config.clone())
}

fn ensure_authorized(state: &WebRuntimeHandle, headers: &HeaderMap) -> Result<(), ApiError> {
    if !state.auth_token_is_configured() {
        return Err(ApiError::service_unavailable(
            "web auth token is not configured",
        ));
    }
    let expected = state.inner.auth_token.trim();
    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);
    if provided == Some(expected) {
        return Ok(());
    }
    Err(ApiError::unauthorized("invalid bearer token"))
}
