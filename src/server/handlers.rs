//! HTTP request handlers

use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::PipelineError;
use crate::pipeline::{PreprocessSummary, Session, SessionStatus, SplitSummary, TrainSummary, UploadSummary};
use crate::preprocessing::{MissingStrategy, PreprocessingConfig, ScalerType};
use crate::training::{ModelKind, ModelParams, SplitConfig};

use super::error::{Result, ServerError};
use super::state::AppState;

/// Run a pipeline stage on the blocking pool while holding the session
/// write lock.
async fn with_session<T, F>(state: &AppState, stage: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Session) -> crate::error::Result<T> + Send + 'static,
{
    let mut session = Arc::clone(&state.session).write_owned().await;
    tokio::task::spawn_blocking(move || stage(&mut session))
        .await
        .map_err(|e| PipelineError::ComputationError(format!("stage task failed: {}", e)))?
        .map_err(ServerError::from)
}

// ============================================================================
// Data Handlers
// ============================================================================

/// Upload and parse a data file
pub async fn upload_data(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadSummary>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.body_text()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;

        info!(file = %file_name, bytes = data.len(), "Received file");

        return with_session(&state, move |session| session.upload(&file_name, &data))
            .await
            .map(Json);
    }

    Err(ServerError::BadRequest("No file uploaded".to_string()))
}

// ============================================================================
// Preprocessing Handlers
// ============================================================================

fn default_scaling() -> String {
    "standard".to_string()
}

fn default_handle_missing() -> String {
    "drop".to_string()
}

#[derive(Debug, Deserialize)]
pub struct PreprocessRequest {
    target: String,
    #[serde(default)]
    features: Option<Vec<String>>,
    #[serde(default = "default_scaling")]
    scaling: String,
    #[serde(default = "default_handle_missing")]
    handle_missing: String,
}

pub async fn run_preprocessing(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<PreprocessRequest>, JsonRejection>,
) -> Result<Json<PreprocessSummary>> {
    let Json(request) = payload?;

    with_session(&state, move |session| {
        if session.dataset().is_none() {
            return Err(PipelineError::NoDataset);
        }
        let config =
            PreprocessingConfig::new(request.target, request.features.unwrap_or_default())
                .with_scaler(request.scaling.parse::<ScalerType>()?)
                .with_missing(request.handle_missing.parse::<MissingStrategy>()?);
        session.preprocess(config)
    })
    .await
    .map(Json)
}

// ============================================================================
// Split Handlers
// ============================================================================

pub async fn run_split(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<SplitConfig>, JsonRejection>,
) -> Result<Json<SplitSummary>> {
    let Json(config) = payload?;

    with_session(&state, move |session| session.split(&config))
        .await
        .map(Json)
}

// ============================================================================
// Training Handlers
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TrainRequest {
    model_type: String,
    #[serde(default)]
    params: Option<Map<String, Value>>,
}

pub async fn start_training(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<TrainRequest>, JsonRejection>,
) -> Result<Json<TrainSummary>> {
    let Json(request) = payload?;

    with_session(&state, move |session| {
        // Stage order is checked before the request's own fields
        if session.partitions().is_none() {
            return Err(PipelineError::NotSplit);
        }
        let kind = request.model_type.parse::<ModelKind>()?;
        let params = ModelParams::from_json(&request.params.unwrap_or_default())?;
        session.train(kind, params)
    })
    .await
    .map(Json)
}

// ============================================================================
// System Handlers
// ============================================================================

pub async fn get_session_status(State(state): State<Arc<AppState>>) -> Json<SessionStatus> {
    Json(state.session.read().await.status())
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let uptime = chrono::Utc::now().signed_duration_since(state.started_at);
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime.num_seconds(),
    }))
}
