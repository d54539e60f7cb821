//! Response normalization.
//!
//! Total mapping from a provider's raw JSON to the canonical result shape.
//! Never fails: unexpected fields are dropped, missing fields get the
//! documented defaults (confidence 0.0, empty lists), and degraded input is
//! logged at debug level.

use serde_json::Value;
use tracing::debug;

use vista_types::{Capability, CapabilityResult, Detection, TextRegion, VoiceCommand};

/// Normalize a raw provider response for the given capability.
///
/// Returns the canonical result and the confidence to report. A provider
/// confidence field is surfaced as-is (clamped to [0, 1]); when the provider
/// supplied usable content without a confidence field, the default is 1.0;
/// an empty or unrecognizable response normalizes to the capability's empty
/// result with confidence 0.0.
pub fn normalize(capability: Capability, raw: &Value) -> (CapabilityResult, f64) {
    let (result, has_content) = match capability {
        Capability::SceneAnalyze => normalize_scene(raw),
        Capability::OcrRecognize => normalize_ocr(raw),
        Capability::ObjectDetect => normalize_detect(raw),
        Capability::VoiceRecognize => normalize_transcript(raw),
        Capability::VoiceSynthesize => normalize_speech(raw),
    };

    let confidence = match raw.get("confidence").and_then(Value::as_f64) {
        Some(c) => c.clamp(0.0, 1.0),
        None if has_content => 1.0,
        None => {
            debug!(capability = %capability, "provider response had no usable content");
            0.0
        }
    };
    (result, confidence)
}

fn str_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(String::from)
}

fn string_or_unknown(raw: &Value, key: &str) -> String {
    str_field(raw, key).unwrap_or_else(|| "unknown".to_string())
}

fn bbox_field(raw: &Value) -> [f64; 4] {
    let Some(items) = raw.get("bbox").and_then(Value::as_array) else {
        return [0.0; 4];
    };
    let mut bbox = [0.0; 4];
    for (slot, item) in bbox.iter_mut().zip(items.iter()) {
        *slot = item.as_f64().unwrap_or(0.0);
    }
    bbox
}

fn normalize_scene(raw: &Value) -> (CapabilityResult, bool) {
    let objects: Vec<String> = raw
        .get("objects")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|o| o.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    let scene_type = str_field(raw, "scene_type");
    let has_content = scene_type.is_some() || !objects.is_empty();
    (
        CapabilityResult::Scene {
            scene_type: scene_type.unwrap_or_else(|| "unknown".to_string()),
            environment: string_or_unknown(raw, "environment"),
            lighting: string_or_unknown(raw, "lighting"),
            objects,
        },
        has_content,
    )
}

fn normalize_ocr(raw: &Value) -> (CapabilityResult, bool) {
    let text = str_field(raw, "text").unwrap_or_default();
    let text_regions: Vec<TextRegion> = raw
        .get("text_regions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|r| {
                    let region_text = str_field(r, "text")?;
                    Some(TextRegion {
                        text: region_text,
                        bbox: bbox_field(r),
                        confidence: r
                            .get("confidence")
                            .and_then(Value::as_f64)
                            .unwrap_or(0.0)
                            .clamp(0.0, 1.0),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    let has_content = !text.is_empty() || !text_regions.is_empty();
    (
        CapabilityResult::Text {
            text,
            language: str_field(raw, "language").unwrap_or_default(),
            text_regions,
        },
        has_content,
    )
}

fn normalize_detect(raw: &Value) -> (CapabilityResult, bool) {
    let objects: Vec<Detection> = raw
        .get("objects")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|o| {
                    let class = str_field(o, "class").or_else(|| str_field(o, "label"))?;
                    Some(Detection {
                        class,
                        confidence: o
                            .get("confidence")
                            .and_then(Value::as_f64)
                            .unwrap_or(0.0)
                            .clamp(0.0, 1.0),
                        bbox: bbox_field(o),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    // The detect provider reports no detections on an empty scene; that is
    // still a successful answer, so content means the objects key existed.
    let has_content = raw.get("objects").is_some_and(Value::is_array);
    let object_count = objects.len();
    (
        CapabilityResult::Objects {
            objects,
            object_count,
        },
        has_content,
    )
}

fn normalize_transcript(raw: &Value) -> (CapabilityResult, bool) {
    let text = str_field(raw, "text").unwrap_or_default();
    let command = raw
        .get("command")
        .and_then(|c| serde_json::from_value::<VoiceCommand>(c.clone()).ok());
    let has_content = !text.is_empty();
    (
        CapabilityResult::Transcript {
            text,
            language: str_field(raw, "language").unwrap_or_default(),
            command,
        },
        has_content,
    )
}

fn normalize_speech(raw: &Value) -> (CapabilityResult, bool) {
    let audio = str_field(raw, "audio").unwrap_or_default();
    let has_content = !audio.is_empty();
    (
        CapabilityResult::Speech {
            audio,
            mime_type: str_field(raw, "mime_type").unwrap_or_else(|| "audio/mpeg".to_string()),
            voice: str_field(raw, "voice").unwrap_or_default(),
        },
        has_content,
    )
}
