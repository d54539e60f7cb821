//! Vision adapters: scene understanding and object detection.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use tracing::debug;

use vista_types::{Capability, CapabilityError, CapabilityRequest};

use crate::types::{
    AdapterContext, CapabilityAdapter, provider_status_error, transport_error, validate_payload,
    wrong_capability,
};

const SCENE_PROMPT: &str = "You are the scene understanding service of a visual \
assistance system. Analyze the image and reply with strict JSON only, no prose: \
{\"scene_type\": string, \"environment\": string, \"lighting\": string, \
\"objects\": [string], \"confidence\": number between 0 and 1}";

/// Invoke an OpenAI-compatible vision chat completion with an inline image
/// and return the first choice's content parsed as JSON.
///
/// Shared by the scene and OCR adapters, which differ only in prompt.
pub(crate) async fn vision_chat(
    ctx: &AdapterContext,
    url: &str,
    model: &str,
    prompt: &str,
    image: &[u8],
) -> Result<Value, CapabilityError> {
    let data_url = format!("data:image/jpeg;base64,{}", STANDARD.encode(image));
    let body = serde_json::json!({
        "model": model,
        "messages": [{
            "role": "user",
            "content": [
                {"type": "text", "text": prompt},
                {"type": "image_url", "image_url": {"url": data_url}}
            ]
        }],
        "max_tokens": 1024
    });

    let mut req = ctx.client.post(url).json(&body);
    if let Some(bearer) = ctx.bearer() {
        req = req.header("Authorization", bearer);
    }
    let resp = req.send().await.map_err(transport_error)?;

    let status = resp.status();
    let json: Value = resp.json().await.map_err(transport_error)?;
    if !status.is_success() {
        return Err(provider_status_error(status, &json));
    }

    let content = json
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or("");
    Ok(parse_model_json(content))
}

/// Lenient parse of a model reply that should be JSON. Strips Markdown code
/// fences; anything unparseable degrades to an empty object so the
/// normalizer can apply defaults.
pub(crate) fn parse_model_json(content: &str) -> Value {
    let trimmed = content.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim();
    match serde_json::from_str(stripped) {
        Ok(v @ Value::Object(_)) => v,
        _ => {
            debug!("model reply was not a JSON object, normalizing to defaults");
            Value::Object(serde_json::Map::new())
        }
    }
}

/// Scene understanding via a vision-capable chat model.
pub struct SceneAdapter {
    ctx: AdapterContext,
    url: String,
    model: String,
}

impl SceneAdapter {
    pub fn new(ctx: AdapterContext, url: String, model: String) -> Self {
        Self { ctx, url, model }
    }
}

#[async_trait]
impl CapabilityAdapter for SceneAdapter {
    fn id(&self) -> &str {
        "vision-scene"
    }

    fn capability(&self) -> Capability {
        Capability::SceneAnalyze
    }

    async fn invoke(&self, req: &CapabilityRequest) -> Result<Value, CapabilityError> {
        let CapabilityRequest::SceneAnalyze { image } = req else {
            return Err(wrong_capability(self.id(), req));
        };
        validate_payload(image, self.ctx.max_image_bytes, "image")?;
        vision_chat(&self.ctx, &self.url, &self.model, SCENE_PROMPT, image).await
    }
}

/// Object detection via a dedicated detection service that accepts raw
/// image bytes and returns `{objects: [{class, confidence, bbox}]}`.
pub struct DetectAdapter {
    ctx: AdapterContext,
    url: String,
}

impl DetectAdapter {
    pub fn new(ctx: AdapterContext, url: String) -> Self {
        Self { ctx, url }
    }
}

#[async_trait]
impl CapabilityAdapter for DetectAdapter {
    fn id(&self) -> &str {
        "vision-detect"
    }

    fn capability(&self) -> Capability {
        Capability::ObjectDetect
    }

    async fn invoke(&self, req: &CapabilityRequest) -> Result<Value, CapabilityError> {
        let CapabilityRequest::ObjectDetect { image } = req else {
            return Err(wrong_capability(self.id(), req));
        };
        validate_payload(image, self.ctx.max_image_bytes, "image")?;

        let mut request = self
            .ctx
            .client
            .post(&self.url)
            .header("Content-Type", "application/octet-stream")
            .body(image.clone());
        if let Some(bearer) = self.ctx.bearer() {
            request = request.header("Authorization", bearer);
        }
        let resp = request.send().await.map_err(transport_error)?;

        let status = resp.status();
        let json: Value = resp.json().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(provider_status_error(status, &json));
        }
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn test_ctx() -> AdapterContext {
        AdapterContext::new(reqwest::Client::new(), Some("test-key".into()), 1024, 1024)
    }

    #[test]
    fn test_parse_model_json_plain() {
        let v = parse_model_json(r#"{"scene_type": "indoor"}"#);
        assert_eq!(v["scene_type"], "indoor");
    }

    #[test]
    fn test_parse_model_json_fenced() {
        let v = parse_model_json("```json\n{\"scene_type\": \"outdoor\"}\n```");
        assert_eq!(v["scene_type"], "outdoor");
    }

    #[test]
    fn test_parse_model_json_garbage() {
        let v = parse_model_json("I cannot see an image.");
        assert!(v.as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scene_adapter_rejects_empty_image() {
        let adapter = SceneAdapter::new(test_ctx(), "http://unused".into(), "gpt-4o-mini".into());
        let err = adapter
            .invoke(&CapabilityRequest::SceneAnalyze { image: vec![] })
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn test_scene_adapter_extracts_chat_content() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices": [{"message": {"content": "{\"scene_type\": \"indoor\", \"objects\": [\"desk\"], \"confidence\": 0.85}"}}]}"#,
            )
            .create_async()
            .await;

        let adapter = SceneAdapter::new(
            test_ctx(),
            format!("{}/v1/chat/completions", server.url()),
            "gpt-4o-mini".into(),
        );
        let raw = adapter
            .invoke(&CapabilityRequest::SceneAnalyze {
                image: vec![0xFF, 0xD8, 0xFF],
            })
            .await
            .unwrap();
        assert_eq!(raw["scene_type"], "indoor");
        assert_eq!(raw["confidence"], 0.85);
    }

    #[tokio::test]
    async fn test_detect_adapter_passthrough() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/detect")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"objects": [{"class": "person", "confidence": 0.96, "bbox": [1,2,3,4]}]}"#)
            .create_async()
            .await;

        let adapter = DetectAdapter::new(test_ctx(), format!("{}/detect", server.url()));
        let raw = adapter
            .invoke(&CapabilityRequest::ObjectDetect {
                image: vec![1, 2, 3],
            })
            .await
            .unwrap();
        assert_eq!(raw["objects"][0]["class"], "person");
    }

    #[tokio::test]
    async fn test_detect_adapter_5xx_is_transient() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/detect")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail": "model loading"}"#)
            .create_async()
            .await;

        let adapter = DetectAdapter::new(test_ctx(), format!("{}/detect", server.url()));
        let err = adapter
            .invoke(&CapabilityRequest::ObjectDetect {
                image: vec![1, 2, 3],
            })
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("model loading"));
    }

    #[tokio::test]
    async fn test_detect_adapter_4xx_is_not_transient() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/detect")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail": "not an image"}"#)
            .create_async()
            .await;

        let adapter = DetectAdapter::new(test_ctx(), format!("{}/detect", server.url()));
        let err = adapter
            .invoke(&CapabilityRequest::ObjectDetect {
                image: vec![1, 2, 3],
            })
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }
}
