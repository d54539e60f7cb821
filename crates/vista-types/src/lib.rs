use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ──────────────────── Capability Types ────────────────────

/// One discrete AI function exposed by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    SceneAnalyze,
    OcrRecognize,
    ObjectDetect,
    VoiceRecognize,
    VoiceSynthesize,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::SceneAnalyze => "scene_analyze",
            Capability::OcrRecognize => "ocr_recognize",
            Capability::ObjectDetect => "object_detect",
            Capability::VoiceRecognize => "voice_recognize",
            Capability::VoiceSynthesize => "voice_synthesize",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed request for one capability, carrying the raw sensor payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "capability", rename_all = "snake_case")]
pub enum CapabilityRequest {
    SceneAnalyze {
        #[serde(with = "serde_bytes_base64")]
        image: Vec<u8>,
    },
    OcrRecognize {
        #[serde(with = "serde_bytes_base64")]
        image: Vec<u8>,
        /// Language hint (e.g. "zh", "en").
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    ObjectDetect {
        #[serde(with = "serde_bytes_base64")]
        image: Vec<u8>,
    },
    VoiceRecognize {
        #[serde(with = "serde_bytes_base64")]
        audio: Vec<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    VoiceSynthesize {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        voice: Option<String>,
        /// Playback speed multiplier.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<f64>,
    },
}

impl CapabilityRequest {
    pub fn capability(&self) -> Capability {
        match self {
            CapabilityRequest::SceneAnalyze { .. } => Capability::SceneAnalyze,
            CapabilityRequest::OcrRecognize { .. } => Capability::OcrRecognize,
            CapabilityRequest::ObjectDetect { .. } => Capability::ObjectDetect,
            CapabilityRequest::VoiceRecognize { .. } => Capability::VoiceRecognize,
            CapabilityRequest::VoiceSynthesize { .. } => Capability::VoiceSynthesize,
        }
    }

    /// Size of the raw payload in bytes (text length for synthesis).
    pub fn payload_len(&self) -> usize {
        match self {
            CapabilityRequest::SceneAnalyze { image }
            | CapabilityRequest::OcrRecognize { image, .. }
            | CapabilityRequest::ObjectDetect { image } => image.len(),
            CapabilityRequest::VoiceRecognize { audio, .. } => audio.len(),
            CapabilityRequest::VoiceSynthesize { text, .. } => text.len(),
        }
    }
}

/// Base64 (de)serialization for binary payloads embedded in JSON bodies.
mod serde_bytes_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

// ──────────────────── Result Shapes ────────────────────

/// A single detected object with its bounding box.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    /// Object class label (e.g. "person", "chair").
    pub class: String,
    pub confidence: f64,
    /// [x1, y1, x2, y2] in pixel coordinates.
    pub bbox: [f64; 4],
}

/// One recognized text region from OCR.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextRegion {
    pub text: String,
    pub bbox: [f64; 4],
    pub confidence: f64,
}

/// A structured command extracted from recognized speech.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoiceCommand {
    /// Action identifier (e.g. "capture_photo").
    pub action: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, serde_json::Value>,
    pub confidence: f64,
}

/// Capability-specific result payload, one variant per capability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapabilityResult {
    Scene {
        scene_type: String,
        environment: String,
        lighting: String,
        objects: Vec<String>,
    },
    Text {
        text: String,
        language: String,
        text_regions: Vec<TextRegion>,
    },
    Objects {
        objects: Vec<Detection>,
        object_count: usize,
    },
    Transcript {
        text: String,
        language: String,
        /// Always serialized; unmatched speech reports an explicit null.
        #[serde(default)]
        command: Option<VoiceCommand>,
    },
    Speech {
        /// Base64-encoded synthesized audio.
        audio: String,
        mime_type: String,
        voice: String,
    },
}

/// Canonical response envelope shared by every capability.
///
/// `error` and a populated `result` are mutually exclusive; `confidence` and
/// `processing_time` are always reported, including on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CapabilityResult>,
    pub confidence: f64,
    /// End-to-end processing time in seconds.
    pub processing_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CapabilityResponse {
    pub fn success(result: CapabilityResult, confidence: f64, elapsed: Duration) -> Self {
        Self {
            result: Some(result),
            confidence: confidence.clamp(0.0, 1.0),
            processing_time: elapsed.as_secs_f64(),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            result: None,
            confidence: 0.0,
            processing_time: elapsed.as_secs_f64(),
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

// ──────────────────── Task Types ────────────────────

/// Lifecycle state of an asynchronous task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    /// Terminal states are absorbing: no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

/// A tracked asynchronous unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub capability: Capability,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CapabilityResponse>,
}

impl Task {
    pub fn new(capability: Capability) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            capability,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            result: None,
        }
    }
}

/// Body of `POST /api/execution/task/plan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPlanRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The capability invocation this task will run.
    pub request: CapabilityRequest,
}

// ──────────────────── Sensor Types ────────────────────

/// One sensor reading in a multimodal snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor_id: String,
    /// Sensor category (e.g. "accelerometer", "light").
    pub sensor_type: String,
    /// Unix timestamp in seconds, aligned across the snapshot.
    pub timestamp: f64,
    pub values: Vec<f64>,
    /// Data quality indicator in [0, 1].
    pub quality: f64,
}

// ──────────────────── Error Taxonomy ────────────────────

/// Failure taxonomy for capability dispatch.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("unsupported capability: {0}")]
    UnsupportedCapability(String),
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("deadline exceeded after {elapsed:?}")]
    Timeout { elapsed: Duration },
    #[error("provider error: {message}")]
    Provider { message: String, transient: bool },
    #[error("internal error: {0}")]
    Internal(String),
}

impl CapabilityError {
    /// Whether the dispatcher may retry this failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CapabilityError::Provider {
                transient: true,
                ..
            }
        )
    }

    pub fn provider(message: impl Into<String>, transient: bool) -> Self {
        CapabilityError::Provider {
            message: message.into(),
            transient,
        }
    }
}
