//! vista-server: the HTTP surface of the VISTA gateway.
//!
//! Builds the adapter set and dispatcher from configuration and exposes the
//! perception, inference, interaction and execution endpoints over axum.

pub mod error;
pub mod handlers;
pub mod sensing;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tracing::info;

use vista_adapters::AdapterContext;
use vista_adapters::ocr::OcrAdapter;
use vista_adapters::vision::{DetectAdapter, SceneAdapter};
use vista_adapters::voice::{VoiceRecognizeAdapter, VoiceSynthesizeAdapter};
use vista_config::VistaConfig;
use vista_dispatch::{AdapterSet, Dispatcher, TaskTracker};

use sensing::SensorHub;

/// Shared server state.
pub struct ServerState {
    pub dispatcher: Arc<Dispatcher>,
    pub tracker: Arc<TaskTracker>,
    pub sensors: SensorHub,
    pub default_language: String,
}

/// Wire the adapter set and dispatcher from configuration.
pub fn build_state(config: &VistaConfig) -> anyhow::Result<Arc<ServerState>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.limits.request_deadline_ms))
        .build()?;
    let ctx = AdapterContext::new(
        client,
        config.providers.resolve_api_key(),
        config.limits.max_image_bytes,
        config.limits.max_audio_bytes,
    );

    let providers = &config.providers;
    let adapters = AdapterSet {
        scene: Arc::new(SceneAdapter::new(
            ctx.clone(),
            providers.vision_url.clone(),
            providers.vision_model.clone(),
        )),
        ocr: Arc::new(OcrAdapter::new(
            ctx.clone(),
            providers.vision_url.clone(),
            providers.vision_model.clone(),
        )),
        detect: Arc::new(DetectAdapter::new(ctx.clone(), providers.detect_url.clone())),
        voice_recognize: Arc::new(VoiceRecognizeAdapter::new(
            ctx.clone(),
            providers.transcribe_url.clone(),
            providers.transcribe_model.clone(),
        )),
        voice_synthesize: Arc::new(VoiceSynthesizeAdapter::new(
            ctx,
            providers.speech_url.clone(),
            providers.speech_model.clone(),
            providers.default_voice.clone(),
        )),
    };

    Ok(Arc::new(ServerState {
        dispatcher: Arc::new(Dispatcher::new(adapters, &config.limits)),
        tracker: Arc::new(TaskTracker::new(config.tasks.max_retained)),
        sensors: SensorHub,
        default_language: providers.default_language.clone(),
    }))
}

/// Build the full route table.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/scene/analyze", post(handlers::analyze_scene))
        .route("/ocr/recognize", post(handlers::recognize_text))
        .route("/object/detect", post(handlers::detect_objects))
        .route("/voice/recognize", post(handlers::recognize_voice))
        .route(
            "/api/perception/vision/detect",
            post(handlers::perception_detect),
        )
        .route(
            "/api/perception/sensing/collect",
            get(handlers::collect_sensors),
        )
        .route(
            "/api/interaction/speech/synthesize",
            post(handlers::synthesize_speech),
        )
        .route("/api/interaction/voices/list", get(handlers::list_voices))
        .route("/api/execution/task/plan", post(handlers::plan_task))
        .route(
            "/api/execution/task/{id}/status",
            get(handlers::task_status),
        )
        .with_state(state)
}

/// Start the server. This is the main entry point: it builds the state and
/// router, binds the configured address and serves until shutdown.
pub async fn start_server(config: VistaConfig, port_override: Option<u16>) -> anyhow::Result<()> {
    let port = port_override.unwrap_or(config.server.port);
    let host = config.server.host.clone();

    let state = build_state(&config)?;
    let app = build_router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("VISTA API listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::Value;

    /// Boot the router on an ephemeral port with the detect provider
    /// pointed at a mockito server.
    async fn spawn_app(provider_url: &str) -> String {
        let config = VistaConfig {
            providers: vista_config::ProvidersConfig {
                detect_url: format!("{provider_url}/detect"),
                ..Default::default()
            },
            limits: vista_config::LimitsConfig {
                request_deadline_ms: 1000,
                retry: vista_config::RetryConfig {
                    max_attempts: 3,
                    initial_backoff_ms: 1,
                    max_backoff_ms: 4,
                },
                ..Default::default()
            },
            ..Default::default()
        };

        let state = build_state(&config).unwrap();
        let app = build_router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let base = spawn_app("http://127.0.0.1:1").await;
        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_object_detect_count_matches_objects() {
        let mut provider = Server::new_async().await;
        let _m = provider
            .mock("POST", "/detect")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"objects": [
                    {"class": "person", "confidence": 0.96, "bbox": [50, 30, 250, 380]},
                    {"class": "chair", "confidence": 0.87, "bbox": [300, 200, 450, 400]}
                ]}"#,
            )
            .create_async()
            .await;

        let base = spawn_app(&provider.url()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/object/detect"))
            .body(vec![0xFFu8, 0xD8, 0xFF])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(
            body["object_count"].as_u64().unwrap(),
            body["objects"].as_array().unwrap().len() as u64
        );
        assert!(body["processing_time"].as_f64().unwrap() >= 0.0);
        let confidence = body["confidence"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));
    }

    #[tokio::test]
    async fn test_empty_image_is_bad_request() {
        let base = spawn_app("http://127.0.0.1:1").await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/object/detect"))
            .body(Vec::<u8>::new())
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert!(body["detail"].as_str().unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn test_task_plan_then_immediate_status() {
        let mut provider = Server::new_async().await;
        let _m = provider
            .mock("POST", "/detect")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"objects": []}"#)
            .create_async()
            .await;

        let base = spawn_app(&provider.url()).await;
        let plan = serde_json::json!({
            "name": "scan the room",
            "request": {"capability": "object_detect", "image": "AAECAw=="},
        });
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/execution/task/plan"))
            .json(&plan)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        let task_id = body["task_id"].as_str().unwrap().to_string();
        assert_eq!(body["status"], "pending");

        // Submit-then-query never returns TaskNotFound for a valid id.
        let resp = reqwest::get(format!("{base}/api/execution/task/{task_id}/status"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let status: Value = resp.json().await.unwrap();
        assert!(matches!(
            status["status"].as_str().unwrap(),
            "pending" | "running" | "succeeded"
        ));
    }

    #[tokio::test]
    async fn test_unknown_task_is_404() {
        let base = spawn_app("http://127.0.0.1:1").await;
        let resp = reqwest::get(format!(
            "{base}/api/execution/task/00000000-0000-0000-0000-000000000000/status"
        ))
        .await
        .unwrap();
        assert_eq!(resp.status(), 404);
        let body: Value = resp.json().await.unwrap();
        assert!(body["detail"].as_str().unwrap().contains("task not found"));
    }

    #[tokio::test]
    async fn test_unknown_capability_tag_is_400() {
        let base = spawn_app("http://127.0.0.1:1").await;
        let plan = serde_json::json!({
            "name": "nope",
            "request": {"capability": "time_travel", "image": "AAECAw=="},
        });
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/execution/task/plan"))
            .json(&plan)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert!(body["detail"].as_str().unwrap().contains("unknown variant"));
    }

    #[tokio::test]
    async fn test_sensor_snapshot_endpoint() {
        let base = spawn_app("http://127.0.0.1:1").await;
        let resp = reqwest::get(format!("{base}/api/perception/sensing/collect"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        let readings = body.as_array().unwrap();
        assert!(!readings.is_empty());
        assert!(readings[0]["sensor_id"].is_string());
    }

    #[tokio::test]
    async fn test_voices_list_endpoint() {
        let base = spawn_app("http://127.0.0.1:1").await;
        let resp = reqwest::get(format!("{base}/api/interaction/voices/list"))
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert!(!body["voices"].as_array().unwrap().is_empty());
    }
}
