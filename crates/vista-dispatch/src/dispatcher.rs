//! Capability dispatch with deadline and retry policy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{info, warn};

use vista_adapters::CapabilityAdapter;
use vista_adapters::normalize::normalize;
use vista_config::{LimitsConfig, RetryConfig};
use vista_types::{Capability, CapabilityError, CapabilityRequest, CapabilityResponse};

use crate::tracker::TaskTracker;

/// The full adapter registry, one slot per capability. The closed shape
/// keeps dispatch exhaustive at compile time.
pub struct AdapterSet {
    pub scene: Arc<dyn CapabilityAdapter>,
    pub ocr: Arc<dyn CapabilityAdapter>,
    pub detect: Arc<dyn CapabilityAdapter>,
    pub voice_recognize: Arc<dyn CapabilityAdapter>,
    pub voice_synthesize: Arc<dyn CapabilityAdapter>,
}

impl AdapterSet {
    fn adapter_for(&self, capability: Capability) -> &dyn CapabilityAdapter {
        match capability {
            Capability::SceneAnalyze => self.scene.as_ref(),
            Capability::OcrRecognize => self.ocr.as_ref(),
            Capability::ObjectDetect => self.detect.as_ref(),
            Capability::VoiceRecognize => self.voice_recognize.as_ref(),
            Capability::VoiceSynthesize => self.voice_synthesize.as_ref(),
        }
    }
}

/// Routes capability requests to their adapter under a hard wall-clock
/// deadline, retrying transient provider failures with exponential backoff
/// and jitter. The deadline covers all attempts including backoff sleeps:
/// the caller gets a timeout rather than a late success.
pub struct Dispatcher {
    adapters: AdapterSet,
    deadline: Duration,
    retry: RetryConfig,
}

impl Dispatcher {
    pub fn new(adapters: AdapterSet, limits: &LimitsConfig) -> Self {
        Self {
            adapters,
            deadline: Duration::from_millis(limits.request_deadline_ms),
            retry: limits.retry.clone(),
        }
    }

    /// Dispatch one request and produce the canonical response.
    pub async fn dispatch(
        &self,
        req: &CapabilityRequest,
    ) -> Result<CapabilityResponse, CapabilityError> {
        let capability = req.capability();
        let payload_bytes = req.payload_len();
        let started = Instant::now();

        match self.invoke_with_retry(req, started).await {
            Ok((raw, attempts)) => {
                let (result, confidence) = normalize(capability, &raw);
                let elapsed = started.elapsed();
                info!(
                    capability = %capability,
                    payload_bytes,
                    attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "dispatch succeeded"
                );
                Ok(CapabilityResponse::success(result, confidence, elapsed))
            }
            Err(err) => {
                let elapsed = started.elapsed();
                warn!(
                    capability = %capability,
                    payload_bytes,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %err,
                    "dispatch failed"
                );
                Err(err)
            }
        }
    }

    /// Dispatch under task tracking: drives the pending → running →
    /// terminal transitions around the call. Failures are recorded on the
    /// task as a failure response so status queries can report them.
    pub async fn dispatch_tracked(&self, req: &CapabilityRequest, tracker: &TaskTracker, id: &str) {
        let started = Instant::now();
        tracker.mark_running(id).await;
        let response = match self.dispatch(req).await {
            Ok(response) => response,
            Err(err) => CapabilityResponse::failure(err.to_string(), started.elapsed()),
        };
        tracker.complete(id, response).await;
    }

    async fn invoke_with_retry(
        &self,
        req: &CapabilityRequest,
        started: Instant,
    ) -> Result<(serde_json::Value, u32), CapabilityError> {
        let adapter = self.adapters.adapter_for(req.capability());
        let max_attempts = self.retry.max_attempts.max(1);
        let mut backoff = Duration::from_millis(self.retry.initial_backoff_ms);
        let max_backoff = Duration::from_millis(self.retry.max_backoff_ms);

        for attempt in 1..=max_attempts {
            let Some(remaining) = self.deadline.checked_sub(started.elapsed()) else {
                return Err(CapabilityError::Timeout {
                    elapsed: started.elapsed(),
                });
            };

            match tokio::time::timeout(remaining, adapter.invoke(req)).await {
                Err(_) => {
                    // No partial result crosses a blown deadline.
                    return Err(CapabilityError::Timeout {
                        elapsed: started.elapsed(),
                    });
                }
                Ok(Ok(raw)) => return Ok((raw, attempt)),
                Ok(Err(err)) if err.is_transient() && attempt < max_attempts => {
                    let sleep = jittered(backoff);
                    warn!(
                        adapter = adapter.id(),
                        attempt,
                        backoff_ms = sleep.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(sleep).await;
                    backoff = (backoff * 2).min(max_backoff);
                }
                Ok(Err(err)) => return Err(err),
            }
        }

        // Loop always returns from the final attempt.
        Err(CapabilityError::Internal("retry loop exhausted".to_string()))
    }
}

/// Full jitter over the backoff interval, never below half of it.
fn jittered(backoff: Duration) -> Duration {
    let base = backoff.as_millis() as u64;
    let jitter = rand::thread_rng().gen_range(0..=base / 2 + 1);
    Duration::from_millis(base / 2 + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    /// Scripted adapter: the outcome of each call is taken from a fixed
    /// sequence; the last entry repeats.
    struct ScriptedAdapter {
        capability: Capability,
        calls: AtomicU32,
        script: Vec<Outcome>,
    }

    #[derive(Clone)]
    enum Outcome {
        Ok(serde_json::Value),
        Transient,
        Fatal,
        Hang,
    }

    impl ScriptedAdapter {
        fn new(capability: Capability, script: Vec<Outcome>) -> Self {
            Self {
                capability,
                calls: AtomicU32::new(0),
                script,
            }
        }
    }

    #[async_trait]
    impl CapabilityAdapter for ScriptedAdapter {
        fn id(&self) -> &str {
            "scripted"
        }

        fn capability(&self) -> Capability {
            self.capability
        }

        async fn invoke(
            &self,
            _req: &CapabilityRequest,
        ) -> Result<serde_json::Value, CapabilityError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let outcome = self.script.get(n).or(self.script.last()).cloned();
            match outcome {
                Some(Outcome::Ok(v)) => Ok(v),
                Some(Outcome::Transient) => Err(CapabilityError::provider("503", true)),
                Some(Outcome::Fatal) => Err(CapabilityError::provider("bad input", false)),
                Some(Outcome::Hang) | None => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("hang outcome never completes")
                }
            }
        }
    }

    fn limits(deadline_ms: u64, attempts: u32) -> LimitsConfig {
        LimitsConfig {
            request_deadline_ms: deadline_ms,
            retry: RetryConfig {
                max_attempts: attempts,
                initial_backoff_ms: 1,
                max_backoff_ms: 4,
            },
            ..LimitsConfig::default()
        }
    }

    fn dispatcher_with_detect(script: Vec<Outcome>, limits: &LimitsConfig) -> Dispatcher {
        let detect: Arc<dyn CapabilityAdapter> =
            Arc::new(ScriptedAdapter::new(Capability::ObjectDetect, script));
        let stub = |cap| -> Arc<dyn CapabilityAdapter> {
            Arc::new(ScriptedAdapter::new(cap, vec![Outcome::Fatal]))
        };
        Dispatcher::new(
            AdapterSet {
                scene: stub(Capability::SceneAnalyze),
                ocr: stub(Capability::OcrRecognize),
                detect,
                voice_recognize: stub(Capability::VoiceRecognize),
                voice_synthesize: stub(Capability::VoiceSynthesize),
            },
            limits,
        )
    }

    fn detect_request() -> CapabilityRequest {
        CapabilityRequest::ObjectDetect {
            image: vec![1, 2, 3],
        }
    }

    fn detect_payload() -> serde_json::Value {
        json!({"objects": [{"class": "person", "confidence": 0.9, "bbox": [1, 2, 3, 4]}]})
    }

    #[tokio::test]
    async fn test_first_try_success() {
        let dispatcher =
            dispatcher_with_detect(vec![Outcome::Ok(detect_payload())], &limits(1000, 3));
        let resp = dispatcher.dispatch(&detect_request()).await.unwrap();
        assert!(resp.is_success());
        assert!(resp.processing_time >= 0.0);
        assert!((0.0..=1.0).contains(&resp.confidence));
    }

    #[tokio::test]
    async fn test_fail_twice_then_succeed_matches_first_try() {
        let l = limits(1000, 3);
        let retried = dispatcher_with_detect(
            vec![
                Outcome::Transient,
                Outcome::Transient,
                Outcome::Ok(detect_payload()),
            ],
            &l,
        );
        let direct = dispatcher_with_detect(vec![Outcome::Ok(detect_payload())], &l);

        let a = retried.dispatch(&detect_request()).await.unwrap();
        let b = direct.dispatch(&detect_request()).await.unwrap();
        assert_eq!(a.result, b.result);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.error, b.error);
    }

    #[tokio::test]
    async fn test_retries_exhaust_to_provider_error() {
        let dispatcher = dispatcher_with_detect(vec![Outcome::Transient], &limits(1000, 3));
        let err = dispatcher.dispatch(&detect_request()).await.unwrap_err();
        assert!(matches!(err, CapabilityError::Provider { .. }));
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let dispatcher = dispatcher_with_detect(
            vec![Outcome::Fatal, Outcome::Ok(detect_payload())],
            &limits(1000, 3),
        );
        let err = dispatcher.dispatch(&detect_request()).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_deadline_yields_timeout() {
        let dispatcher = dispatcher_with_detect(vec![Outcome::Hang], &limits(20, 3));
        let err = dispatcher.dispatch(&detect_request()).await.unwrap_err();
        assert!(matches!(err, CapabilityError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_tracked_success_lifecycle() {
        let dispatcher =
            dispatcher_with_detect(vec![Outcome::Ok(detect_payload())], &limits(1000, 3));
        let tracker = TaskTracker::new(16);
        let task = tracker.create(Capability::ObjectDetect).await;

        dispatcher
            .dispatch_tracked(&detect_request(), &tracker, &task.id)
            .await;
        let done = tracker.get(&task.id).await.unwrap();
        assert_eq!(done.status, vista_types::TaskStatus::Succeeded);
        assert!(done.result.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_tracked_timeout_never_succeeds() {
        let dispatcher = dispatcher_with_detect(vec![Outcome::Hang], &limits(20, 3));
        let tracker = TaskTracker::new(16);
        let task = tracker.create(Capability::ObjectDetect).await;

        dispatcher
            .dispatch_tracked(&detect_request(), &tracker, &task.id)
            .await;
        let done = tracker.get(&task.id).await.unwrap();
        assert_eq!(done.status, vista_types::TaskStatus::Failed);
        let result = done.result.unwrap();
        assert!(result.error.as_deref().unwrap().contains("deadline"));
        assert_eq!(result.confidence, 0.0);
    }
}
