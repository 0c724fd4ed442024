//! HTTP surface and request pipeline.
//!
//! Every failure is recovered here and turned into a JSON body of the
//! shape `{"success": false, "error": "..."}` with a matching status
//! code; nothing in the pipeline can bring the process down.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use pipervox_audio::{concatenate_wav_files, AudioError};
use pipervox_queue::{clamp_capacity, TaskQueue};
use pipervox_text::{apply_replacements, split_sentences};
use pipervox_tts::{SynthesisOrchestrator, SynthesisOutcome, TtsError};

use crate::models::{self, VoiceModel};
use crate::settings::{self, Settings};

/// Shared service state handed to every handler.
///
/// There is deliberately no global: constructing one of these per
/// server instance keeps tests and multi-instance setups trivial.
pub struct ServiceState {
    pub models: RwLock<Vec<VoiceModel>>,
    pub model_paths: RwLock<Vec<PathBuf>>,
    pub settings: RwLock<Settings>,
    pub queue: Arc<TaskQueue<SynthesisOutcome>>,
    pub orchestrator: SynthesisOrchestrator,
    /// Maximum accepted text length in bytes; 0 disables the limit.
    pub max_text: usize,
    pub cpu_cores: usize,
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("no valid sentences found in text")]
    NoSentences,

    #[error(transparent)]
    Synthesis(#[from] TtsError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("{0}")]
    Internal(String),
}

impl ConvertError {
    fn status(&self) -> StatusCode {
        match self {
            ConvertError::InvalidInput(_) | ConvertError::NoSentences => StatusCode::BAD_REQUEST,
            ConvertError::ModelNotFound(_) => StatusCode::NOT_FOUND,
            ConvertError::Synthesis(_) | ConvertError::Audio(_) | ConvertError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ConvertError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(%status, error = %self, "request failed");
        (
            status,
            Json(json!({"success": false, "error": self.to_string()})),
        )
            .into_response()
    }
}

pub fn router(state: Arc<ServiceState>) -> Router {
    Router::new()
        .route("/models", get(get_models))
        .route("/model-paths", post(set_model_paths))
        .route("/rescan-models", get(rescan_models))
        .route("/convert", post(convert))
        .route("/settings", get(get_settings).post(update_settings))
        .route("/queue-status", get(queue_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ConvertRequest {
    #[serde(default)]
    text: String,
    #[serde(rename = "modelPath", default)]
    model_path: String,
    #[serde(default)]
    settings: Option<pipervox_tts::SynthesisOptions>,
}

async fn convert(
    State(state): State<Arc<ServiceState>>,
    Json(request): Json<ConvertRequest>,
) -> Result<Json<Value>, ConvertError> {
    if request.text.is_empty() {
        return Err(ConvertError::InvalidInput("text is required".into()));
    }
    if state.max_text > 0 && request.text.len() > state.max_text {
        return Err(ConvertError::InvalidInput(format!(
            "text exceeds maximum length of {} characters",
            state.max_text
        )));
    }
    if request.model_path.is_empty() {
        return Err(ConvertError::InvalidInput("model path is required".into()));
    }

    let model = {
        let models = state.models.read();
        models::find_by_onnx_path(&models, &request.model_path)
            .cloned()
            .ok_or_else(|| ConvertError::ModelNotFound(request.model_path.clone()))?
    };

    info!(
        model = %model.name,
        language = %model.language,
        text_len = request.text.len(),
        "conversion requested"
    );

    let processed = apply_replacements(&request.text, &model.replacements);
    let sentences = split_sentences(&processed);
    if sentences.is_empty() {
        return Err(ConvertError::NoSentences);
    }
    info!(sentences = sentences.len(), "text segmented for synthesis");

    let options = request.settings.unwrap_or_default();
    let artifacts = state
        .orchestrator
        .synthesize_batch(&sentences, &model.onnx_path, &options)
        .await?;

    let final_path = if artifacts.len() == 1 {
        artifacts.into_iter().next().ok_or_else(|| {
            ConvertError::Internal("synthesis returned no artifacts".into())
        })?
    } else {
        let merged = std::env::temp_dir().join(format!("final_{:08x}.wav", fastrand::u32(..)));
        let inputs = artifacts;
        let output = merged.clone();
        let spec = tokio::task::spawn_blocking(move || concatenate_wav_files(&inputs, &output))
            .await
            .map_err(|e| ConvertError::Internal(format!("concatenation task failed: {e}")))??;
        info!(
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            "audio concatenated"
        );
        merged
    };

    let bytes = tokio::fs::read(&final_path)
        .await
        .map_err(|e| ConvertError::Internal(format!("failed to read final audio: {e}")))?;
    if let Err(e) = tokio::fs::remove_file(&final_path).await {
        warn!(path = %final_path.display(), error = %e, "failed to remove final audio file");
    }

    info!(size_kb = bytes.len() / 1024, "conversion complete");
    Ok(Json(json!({
        "success": true,
        "audio": format!("data:audio/wav;base64,{}", BASE64.encode(&bytes)),
        "model": model.name,
        "sentenceCount": sentences.len(),
    })))
}

async fn get_models(State(state): State<Arc<ServiceState>>) -> Json<Value> {
    let models = state.models.read().clone();
    Json(json!({
        "success": true,
        "count": models.len(),
        "models": models,
    }))
}

#[derive(Debug, Deserialize)]
struct ModelPathsRequest {
    paths: Vec<PathBuf>,
}

async fn set_model_paths(
    State(state): State<Arc<ServiceState>>,
    Json(request): Json<ModelPathsRequest>,
) -> Json<Value> {
    *state.model_paths.write() = request.paths.clone();
    let models = models::scan_models(&request.paths);
    let count = models.len();
    *state.models.write() = models;
    Json(json!({
        "success": true,
        "message": "Model paths updated",
        "modelCount": count,
    }))
}

async fn rescan_models(State(state): State<Arc<ServiceState>>) -> Json<Value> {
    let paths = state.model_paths.read().clone();
    let models = models::scan_models(&paths);
    let count = models.len();
    *state.models.write() = models;
    Json(json!({
        "success": true,
        "message": "Models rescanned",
        "modelCount": count,
    }))
}

fn queue_status_json(state: &ServiceState) -> Value {
    let status = state.queue.status();
    json!({
        "maxConcurrent": status.capacity,
        "running": status.running,
        "queued": status.pending,
        "cpuCores": state.cpu_cores,
    })
}

async fn get_settings(State(state): State<Arc<ServiceState>>) -> Json<Value> {
    let settings = *state.settings.read();
    Json(json!({
        "success": true,
        "settings": {
            "maxThreads": settings.max_threads,
            "autoDetectThreads": settings.auto_detect,
            "cpuCores": state.cpu_cores,
            "currentMaxConcurrent": state.queue.capacity(),
            "recommendedThreads": settings::auto_thread_count(state.cpu_cores),
        },
        "queueStatus": queue_status_json(&state),
    }))
}

#[derive(Debug, Deserialize)]
struct SettingsUpdate {
    #[serde(rename = "maxThreads")]
    max_threads: Option<usize>,
    #[serde(rename = "autoDetectThreads")]
    auto_detect: Option<bool>,
}

async fn update_settings(
    State(state): State<Arc<ServiceState>>,
    Json(update): Json<SettingsUpdate>,
) -> Json<Value> {
    {
        let mut settings = state.settings.write();
        if let Some(auto) = update.auto_detect {
            settings.auto_detect = auto;
        }
        if let Some(requested) = update.max_threads {
            if requested > 0 {
                settings.max_threads = clamp_capacity(requested);
                if !settings.auto_detect {
                    state.queue.set_capacity(settings.max_threads);
                }
            }
        }
        if settings.auto_detect {
            let auto = settings::auto_thread_count(state.cpu_cores);
            settings.max_threads = auto;
            state.queue.set_capacity(auto);
        }
    }

    let settings = *state.settings.read();
    Json(json!({
        "success": true,
        "message": "Settings updated",
        "settings": {
            "maxThreads": settings.max_threads,
            "autoDetectThreads": settings.auto_detect,
            "cpuCores": state.cpu_cores,
            "currentMaxConcurrent": state.queue.capacity(),
        },
        "queueStatus": queue_status_json(&state),
    }))
}

async fn queue_status(State(state): State<Arc<ServiceState>>) -> Json<Value> {
    Json(json!({
        "success": true,
        "status": queue_status_json(&state),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipervox_tts_piper::PiperEngine;

    fn test_state(models: Vec<VoiceModel>, max_text: usize) -> Arc<ServiceState> {
        let queue = Arc::new(TaskQueue::new(2));
        let engine = Arc::new(PiperEngine::new("/nonexistent/piper"));
        let orchestrator = SynthesisOrchestrator::new(queue.clone(), engine);
        Arc::new(ServiceState {
            models: RwLock::new(models),
            model_paths: RwLock::new(Vec::new()),
            settings: RwLock::new(Settings {
                max_threads: 2,
                auto_detect: false,
            }),
            queue,
            orchestrator,
            max_text,
            cpu_cores: 4,
        })
    }

    fn test_model(dir: &std::path::Path) -> VoiceModel {
        std::fs::write(dir.join("voz.onnx"), b"onnx").unwrap();
        std::fs::write(dir.join("voz.onnx.json"), "{}").unwrap();
        crate::models::scan_models(&[dir.to_path_buf()])
            .into_iter()
            .next()
            .expect("fixture model")
    }

    #[tokio::test]
    async fn convert_rejects_empty_text() {
        let state = test_state(Vec::new(), 0);
        let err = convert(
            State(state),
            Json(ConvertRequest {
                text: String::new(),
                model_path: "x.onnx".into(),
                settings: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidInput(_)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn convert_rejects_oversized_text() {
        let state = test_state(Vec::new(), 10);
        let err = convert(
            State(state),
            Json(ConvertRequest {
                text: "este texto es más largo que el límite".into(),
                model_path: "x.onnx".into(),
                settings: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn convert_rejects_unknown_model() {
        let state = test_state(Vec::new(), 0);
        let err = convert(
            State(state),
            Json(ConvertRequest {
                text: "Hola mundo entero.".into(),
                model_path: "/no/such/model.onnx".into(),
                settings: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConvertError::ModelNotFound(_)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn convert_reports_empty_segmentation_as_user_error() {
        let dir = tempfile::tempdir().unwrap();
        let model = test_model(dir.path());
        let model_path = model.onnx_path.to_string_lossy().into_owned();
        let state = test_state(vec![model], 0);
        let err = convert(
            State(state),
            Json(ConvertRequest {
                // Survives the non-empty check but segments to nothing.
                text: "....".into(),
                model_path,
                settings: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConvertError::NoSentences), "got {err:?}");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_settings_clamps_and_applies_capacity() {
        let state = test_state(Vec::new(), 0);
        update_settings(
            State(state.clone()),
            Json(SettingsUpdate {
                max_threads: Some(500),
                auto_detect: Some(false),
            }),
        )
        .await;
        assert_eq!(state.queue.capacity(), 32);
        assert_eq!(state.settings.read().max_threads, 32);
    }

    #[tokio::test]
    async fn auto_detect_overrides_manual_threads() {
        let state = test_state(Vec::new(), 0);
        update_settings(
            State(state.clone()),
            Json(SettingsUpdate {
                max_threads: Some(4),
                auto_detect: Some(true),
            }),
        )
        .await;
        // cpu_cores is 4 in the fixture, so auto-detection lands on 8.
        assert_eq!(state.queue.capacity(), 8);
        assert_eq!(state.settings.read().max_threads, 8);
        assert!(state.settings.read().auto_detect);
    }

    #[tokio::test]
    async fn queue_status_reports_shape() {
        let state = test_state(Vec::new(), 0);
        let Json(body) = queue_status(State(state)).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["status"]["maxConcurrent"], 2);
        assert_eq!(body["status"]["running"], 0);
        assert_eq!(body["status"]["queued"], 0);
        assert_eq!(body["status"]["cpuCores"], 4);
    }

    #[tokio::test]
    async fn model_listing_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let model = test_model(dir.path());
        let state = test_state(vec![model], 0);
        let Json(body) = get_models(State(state)).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 1);
        assert_eq!(body["models"][0]["id"], "voz");
    }
}
