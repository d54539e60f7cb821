//! HTTP endpoint handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use vista_types::{CapabilityRequest, CapabilityResponse, TaskPlanRequest};

use crate::ServerState;
use crate::error::ApiError;

/// Flatten the canonical envelope into the wire shape the mobile client
/// expects: result fields at the top level alongside confidence and
/// processing_time.
fn flatten(resp: CapabilityResponse) -> Json<Value> {
    let mut map = match resp
        .result
        .and_then(|r| serde_json::to_value(r).ok())
    {
        Some(Value::Object(mut m)) => {
            m.remove("kind");
            m
        }
        _ => serde_json::Map::new(),
    };
    map.insert("confidence".to_string(), json!(resp.confidence));
    map.insert("processing_time".to_string(), json!(resp.processing_time));
    Json(Value::Object(map))
}

/// POST /scene/analyze — scene understanding over raw image bytes.
pub async fn analyze_scene(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req = CapabilityRequest::SceneAnalyze {
        image: body.to_vec(),
    };
    let resp = state.dispatcher.dispatch(&req).await?;
    Ok(flatten(resp))
}

/// POST /ocr/recognize — text recognition over raw image bytes.
pub async fn recognize_text(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req = CapabilityRequest::OcrRecognize {
        image: body.to_vec(),
        language: Some(state.default_language.clone()),
    };
    let resp = state.dispatcher.dispatch(&req).await?;
    Ok(flatten(resp))
}

/// POST /object/detect — object detection over raw image bytes.
pub async fn detect_objects(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req = CapabilityRequest::ObjectDetect {
        image: body.to_vec(),
    };
    let resp = state.dispatcher.dispatch(&req).await?;
    Ok(flatten(resp))
}

/// POST /api/perception/vision/detect — detection with the bare object
/// list response used by the perception module.
pub async fn perception_detect(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req = CapabilityRequest::ObjectDetect {
        image: body.to_vec(),
    };
    let resp = state.dispatcher.dispatch(&req).await?;
    let objects = match resp.result {
        Some(vista_types::CapabilityResult::Objects { objects, .. }) => {
            serde_json::to_value(objects).unwrap_or_else(|_| json!([]))
        }
        _ => json!([]),
    };
    Ok(Json(objects))
}

/// POST /voice/recognize — speech recognition over raw audio bytes (wav).
pub async fn recognize_voice(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req = CapabilityRequest::VoiceRecognize {
        audio: body.to_vec(),
        language: Some(state.default_language.clone()),
    };
    let resp = state.dispatcher.dispatch(&req).await?;
    Ok(flatten(resp))
}

/// Body of POST /api/interaction/speech/synthesize.
#[derive(Debug, Deserialize)]
pub struct SynthesizeBody {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub speed: Option<f64>,
    /// Accepted for client compatibility; voice selection already encodes
    /// the language.
    #[serde(default)]
    #[allow(dead_code)]
    pub language: Option<String>,
}

/// POST /api/interaction/speech/synthesize — text to speech.
pub async fn synthesize_speech(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: SynthesizeBody = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("invalid synthesis request: {e}")))?;
    let req = CapabilityRequest::VoiceSynthesize {
        text: body.text,
        voice: body.voice,
        speed: body.speed,
    };
    let resp = state.dispatcher.dispatch(&req).await?;
    Ok(flatten(resp))
}

/// GET /api/interaction/voices/list — available synthesis voices.
pub async fn list_voices() -> Json<Value> {
    Json(json!({
        "voices": [
            {"name": "zh-CN-XiaoxiaoNeural", "gender": "Female", "language": "zh-CN"},
            {"name": "zh-CN-YunxiNeural", "gender": "Male", "language": "zh-CN"},
            {"name": "en-US-JennyNeural", "gender": "Female", "language": "en-US"},
        ]
    }))
}

/// GET /api/perception/sensing/collect — aligned sensor snapshot.
pub async fn collect_sensors(State(state): State<Arc<ServerState>>) -> Json<Value> {
    let snapshot = state.sensors.snapshot();
    Json(serde_json::to_value(snapshot).unwrap_or_else(|_| json!([])))
}

/// POST /api/execution/task/plan — submit an asynchronous capability task.
///
/// The task is registered before this handler returns, so an immediate
/// status query always finds it. The dispatch runs in a background task and
/// is not cancelled if the client disconnects.
pub async fn plan_task(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let plan: TaskPlanRequest = serde_json::from_slice(&body).map_err(|e| {
        let msg = e.to_string();
        if msg.contains("unknown variant") {
            ApiError::from(vista_types::CapabilityError::UnsupportedCapability(msg))
        } else {
            ApiError::bad_request(format!("invalid task plan: {msg}"))
        }
    })?;

    let task = state.tracker.create(plan.request.capability()).await;
    info!(task_id = %task.id, capability = %task.capability, name = %plan.name, "task planned");

    let dispatcher = state.dispatcher.clone();
    let tracker = state.tracker.clone();
    let task_id = task.id.clone();
    tokio::spawn(async move {
        dispatcher
            .dispatch_tracked(&plan.request, &tracker, &task_id)
            .await;
    });

    Ok(Json(json!({
        "task_id": task.id,
        "status": task.status,
    })))
}

/// GET /api/execution/task/{id}/status — non-blocking task status read.
pub async fn task_status(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let task = state.tracker.get(&id).await?;
    Ok(Json(serde_json::to_value(&task).map_err(|e| {
        ApiError::from(vista_types::CapabilityError::Internal(e.to_string()))
    })?))
}

/// GET / — service banner.
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "VISTA API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

/// GET /health — health check.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
