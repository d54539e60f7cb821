//! OCR adapter: text recognition via a vision-capable chat model.

use async_trait::async_trait;
use serde_json::Value;

use vista_types::{Capability, CapabilityError, CapabilityRequest};

use crate::types::{AdapterContext, CapabilityAdapter, validate_payload, wrong_capability};
use crate::vision::vision_chat;

const OCR_PROMPT: &str = "You are the OCR service of a visual assistance system. \
Extract all readable text from the image and reply with strict JSON only, no \
prose: {\"text\": string with newlines between lines, \"language\": ISO 639-1 \
code, \"confidence\": number between 0 and 1, \"text_regions\": [{\"text\": \
string, \"bbox\": [x1, y1, x2, y2], \"confidence\": number}]}";

pub struct OcrAdapter {
    ctx: AdapterContext,
    url: String,
    model: String,
}

impl OcrAdapter {
    pub fn new(ctx: AdapterContext, url: String, model: String) -> Self {
        Self { ctx, url, model }
    }

    fn prompt_for(&self, language: Option<&str>) -> String {
        match language {
            Some(lang) => format!("{OCR_PROMPT} The expected language is \"{lang}\"."),
            None => OCR_PROMPT.to_string(),
        }
    }
}

#[async_trait]
impl CapabilityAdapter for OcrAdapter {
    fn id(&self) -> &str {
        "vision-ocr"
    }

    fn capability(&self) -> Capability {
        Capability::OcrRecognize
    }

    async fn invoke(&self, req: &CapabilityRequest) -> Result<Value, CapabilityError> {
        let CapabilityRequest::OcrRecognize { image, language } = req else {
            return Err(wrong_capability(self.id(), req));
        };
        validate_payload(image, self.ctx.max_image_bytes, "image")?;
        let prompt = self.prompt_for(language.as_deref());
        vision_chat(&self.ctx, &self.url, &self.model, &prompt, image).await
    }
}
