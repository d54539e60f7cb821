//! Voice adapters: speech recognition (whisper-style transcription) and
//! speech synthesis.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::multipart;
use serde_json::Value;

use vista_types::{Capability, CapabilityError, CapabilityRequest};

use crate::command::CommandMatcher;
use crate::types::{
    AdapterContext, CapabilityAdapter, provider_status_error, transport_error, validate_payload,
    wrong_capability,
};

/// Speech recognition through a whisper-style transcription endpoint. The
/// transcript is additionally run through the command matcher so downstream
/// consumers get a structured command when one is recognized.
pub struct VoiceRecognizeAdapter {
    ctx: AdapterContext,
    url: String,
    model: String,
    matcher: CommandMatcher,
}

impl VoiceRecognizeAdapter {
    pub fn new(ctx: AdapterContext, url: String, model: String) -> Self {
        Self {
            ctx,
            url,
            model,
            matcher: CommandMatcher::default(),
        }
    }

    /// Replace the default command table.
    pub fn with_matcher(mut self, matcher: CommandMatcher) -> Self {
        self.matcher = matcher;
        self
    }
}

#[async_trait]
impl CapabilityAdapter for VoiceRecognizeAdapter {
    fn id(&self) -> &str {
        "voice-recognize"
    }

    fn capability(&self) -> Capability {
        Capability::VoiceRecognize
    }

    async fn invoke(&self, req: &CapabilityRequest) -> Result<Value, CapabilityError> {
        let CapabilityRequest::VoiceRecognize { audio, language } = req else {
            return Err(wrong_capability(self.id(), req));
        };
        validate_payload(audio, self.ctx.max_audio_bytes, "audio")?;

        let part = multipart::Part::bytes(audio.clone())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| CapabilityError::Internal(format!("multipart build failed: {e}")))?;
        let mut form = multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");
        if let Some(lang) = language {
            form = form.text("language", lang.clone());
        }

        let mut request = self.ctx.client.post(&self.url).multipart(form);
        if let Some(bearer) = self.ctx.bearer() {
            request = request.header("Authorization", bearer);
        }
        let resp = request.send().await.map_err(transport_error)?;

        let status = resp.status();
        let mut json: Value = resp.json().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(provider_status_error(status, &json));
        }

        // Attach the matched command to the raw value so normalization
        // stays a pure mapping over one input.
        let command = json
            .get("text")
            .and_then(Value::as_str)
            .and_then(|text| self.matcher.match_text(text));
        if let Some(command) = command
            && let Ok(value) = serde_json::to_value(&command)
            && let Some(obj) = json.as_object_mut()
        {
            obj.insert("command".to_string(), value);
        }
        Ok(json)
    }
}

/// Speech synthesis through an OpenAI-style `/audio/speech` endpoint. The
/// provider returns raw audio bytes, wrapped here as base64 for the
/// canonical envelope.
pub struct VoiceSynthesizeAdapter {
    ctx: AdapterContext,
    url: String,
    model: String,
    default_voice: String,
}

impl VoiceSynthesizeAdapter {
    pub fn new(ctx: AdapterContext, url: String, model: String, default_voice: String) -> Self {
        Self {
            ctx,
            url,
            model,
            default_voice,
        }
    }
}

#[async_trait]
impl CapabilityAdapter for VoiceSynthesizeAdapter {
    fn id(&self) -> &str {
        "voice-synthesize"
    }

    fn capability(&self) -> Capability {
        Capability::VoiceSynthesize
    }

    async fn invoke(&self, req: &CapabilityRequest) -> Result<Value, CapabilityError> {
        let CapabilityRequest::VoiceSynthesize { text, voice, speed } = req else {
            return Err(wrong_capability(self.id(), req));
        };
        if text.trim().is_empty() {
            return Err(CapabilityError::InvalidPayload(
                "empty synthesis text".to_string(),
            ));
        }

        let voice = voice.clone().unwrap_or_else(|| self.default_voice.clone());
        let mut body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": voice,
        });
        if let Some(speed) = speed {
            body["speed"] = serde_json::json!(speed);
        }

        let mut request = self.ctx.client.post(&self.url).json(&body);
        if let Some(bearer) = self.ctx.bearer() {
            request = request.header("Authorization", bearer);
        }
        let resp = request.send().await.map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let json: Value = resp.json().await.unwrap_or(Value::Null);
            return Err(provider_status_error(status, &json));
        }

        let mime_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();
        let bytes = resp.bytes().await.map_err(transport_error)?;
        if bytes.is_empty() {
            return Err(CapabilityError::provider("provider returned no audio", false));
        }

        Ok(serde_json::json!({
            "audio": STANDARD.encode(&bytes),
            "mime_type": mime_type,
            "voice": voice,
        }))
    }
}
