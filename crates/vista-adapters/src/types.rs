//! Adapter trait and shared request plumbing.

use async_trait::async_trait;

use vista_types::{Capability, CapabilityError, CapabilityRequest};

/// Shared construction context for adapters: HTTP client, credentials and
/// payload limits. One context is built at startup and cloned into each
/// adapter.
#[derive(Debug, Clone)]
pub struct AdapterContext {
    pub client: reqwest::Client,
    pub api_key: Option<String>,
    pub max_image_bytes: usize,
    pub max_audio_bytes: usize,
}

impl AdapterContext {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        max_image_bytes: usize,
        max_audio_bytes: usize,
    ) -> Self {
        Self {
            client,
            api_key,
            max_image_bytes,
            max_audio_bytes,
        }
    }

    /// Bearer header value, if an API key is configured.
    pub fn bearer(&self) -> Option<String> {
        self.api_key.as_ref().map(|k| format!("Bearer {k}"))
    }
}

/// Translates a canonical capability request into an external provider call
/// and returns the provider's raw JSON for normalization.
#[async_trait]
pub trait CapabilityAdapter: Send + Sync {
    /// Adapter identifier for logs.
    fn id(&self) -> &str;
    /// The single capability this adapter serves.
    fn capability(&self) -> Capability;
    /// Invoke the external provider. Implementations validate the payload
    /// first and never retry internally; retry policy belongs to the
    /// dispatcher.
    async fn invoke(&self, req: &CapabilityRequest)
    -> Result<serde_json::Value, CapabilityError>;
}

/// Validate a binary payload: non-empty and under the configured limit.
pub(crate) fn validate_payload(
    payload: &[u8],
    limit: usize,
    what: &str,
) -> Result<(), CapabilityError> {
    if payload.is_empty() {
        return Err(CapabilityError::InvalidPayload(format!("empty {what} payload")));
    }
    if payload.len() > limit {
        return Err(CapabilityError::InvalidPayload(format!(
            "{what} payload of {} bytes exceeds limit of {limit} bytes",
            payload.len()
        )));
    }
    Ok(())
}

/// A request routed to the wrong adapter is a dispatcher bug, not a client
/// error.
pub(crate) fn wrong_capability(adapter: &str, req: &CapabilityRequest) -> CapabilityError {
    CapabilityError::Internal(format!(
        "adapter {adapter} received a {} request",
        req.capability()
    ))
}

/// Map a provider's non-2xx response into the error taxonomy. 429 and 5xx
/// are transient; other client errors are surfaced verbatim and never
/// retried.
pub(crate) fn provider_status_error(
    status: reqwest::StatusCode,
    body: &serde_json::Value,
) -> CapabilityError {
    let message = body
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .or_else(|| body.get("detail").and_then(|d| d.as_str()))
        .or_else(|| body.get("message").and_then(|m| m.as_str()))
        .unwrap_or("unknown provider error");
    let transient = status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS;
    CapabilityError::provider(format!("{status}: {message}"), transient)
}

/// Map a reqwest transport failure. Network errors are transient by
/// definition; the dispatcher decides whether budget remains.
pub(crate) fn transport_error(err: reqwest::Error) -> CapabilityError {
    CapabilityError::provider(format!("request failed: {err}"), true)
}
