// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

// Integration tests for the HTTP API, driven through the router without a
// listening socket.

use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use loadsentry_server::{api, build_components, config::ServerConfig, Components};
use std::time::Duration;
use tower::ServiceExt;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn test_config(queue_capacity: usize) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.analysis.window_size = 5;
    config.analysis.z_threshold = 1.5;
    config.ingest.queue_capacity = queue_capacity;
    config
}

async fn send(app: &Router, method: Method, uri: &str, body: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn ingest_accepts_then_rejects_when_queue_full() {
    // Pipeline is never started, so nothing drains the queue.
    let Components { state, .. } = build_components(&test_config(1)).unwrap();
    let metrics = state.metrics.clone();
    let app = api::router(state, REQUEST_TIMEOUT);

    let response = send(&app, Method::POST, "/ingest", r#"{"rps": 10}"#).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_string(response).await, "accepted");

    let response = send(&app, Method::POST, "/ingest", r#"{"rps": 11}"#).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    let body: serde_json::Value =
        serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"], "queue full");
    assert_eq!(body["code"], "QUEUE_FULL");

    assert_eq!(metrics.ingest_total(), 1);
    assert_eq!(metrics.rejected_total(), 1);
}

#[tokio::test]
async fn ingest_rejects_invalid_payloads() {
    let Components { state, .. } = build_components(&test_config(16)).unwrap();
    let metrics = state.metrics.clone();
    let app = api::router(state, REQUEST_TIMEOUT);

    for body in [
        "not json",
        r#"{"cpu": 0.5}"#,
        r#"{"rps": "fast"}"#,
        r#"{"rps": -1}"#,
        r#"{"rps": 1e308}"#,
    ] {
        let response = send(&app, Method::POST, "/ingest", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        let json: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert!(json["error"].is_string());
    }

    assert_eq!(metrics.ingest_total(), 0);
    assert_eq!(metrics.rejected_total(), 0);
}

#[tokio::test]
async fn ingest_requires_post() {
    let Components { state, .. } = build_components(&test_config(16)).unwrap();
    let app = api::router(state, REQUEST_TIMEOUT);

    let response = send(&app, Method::GET, "/ingest", "").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn ingest_reports_shutdown_when_pipeline_gone() {
    let Components { state, pipeline } = build_components(&test_config(16)).unwrap();
    drop(pipeline);
    let app = api::router(state, REQUEST_TIMEOUT);

    let response = send(&app, Method::POST, "/ingest", r#"{"rps": 1}"#).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value =
        serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["code"], "SHUTTING_DOWN");
}

#[tokio::test]
async fn analyze_reports_no_data_then_latest_verdict() {
    let Components { state, pipeline } = build_components(&test_config(64)).unwrap();
    let store = state.store.clone();
    let handle = pipeline.spawn();
    let app = api::router(state, REQUEST_TIMEOUT);

    let response = send(&app, Method::GET, "/analyze", "").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "no data");

    for (i, rps) in [10, 12, 11, 9, 13, 40].iter().enumerate() {
        let body = format!(r#"{{"timestamp": {}, "cpu": 0.4, "rps": {}}}"#, 1_700_000_000 + i, rps);
        let response = send(&app, Method::POST, "/ingest", &body).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    let mut analysis = serde_json::Value::Null;
    for _ in 0..200 {
        let response = send(&app, Method::GET, "/analyze", "").await;
        let text = body_string(response).await;
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) {
            if json["analysis"]["count"] == 6 {
                analysis = json["analysis"].clone();
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(analysis["count"], 6);
    assert_eq!(analysis["window"], 5);
    assert_eq!(analysis["anomaly"], true);
    assert_eq!(analysis["timestamp"], 1_700_000_005);
    assert!((analysis["rps_avg"].as_f64().unwrap() - 17.0).abs() < 1e-9);
    assert!(analysis["rps_z"].as_f64().unwrap() > 1.5);

    // Dropping the router releases the last queue handle.
    drop(app);
    let report = handle.await.unwrap();
    assert_eq!(report.processed, 6);
    assert_eq!(report.anomalies, 1);
    assert_eq!(store.map(|s| s.len()), Some(6));
}

#[tokio::test]
async fn health_and_metrics() {
    let Components { state, .. } = build_components(&test_config(16)).unwrap();
    let app = api::router(state, REQUEST_TIMEOUT);

    let response = send(&app, Method::GET, "/health", "").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");

    let response = send(&app, Method::GET, "/metrics", "").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let text = body_string(response).await;
    assert!(text.contains("metrics_ingest_total 0"));
    assert!(text.contains("metrics_anomaly_total 0"));
    assert!(text.contains(r#"http_request_duration_seconds_count{code="200",path="/health"} 1"#));
}

#[tokio::test]
async fn history_lists_stored_entries_newest_first() {
    let Components { state, pipeline } = build_components(&test_config(64)).unwrap();
    let handle = pipeline.spawn();
    let app = api::router(state, REQUEST_TIMEOUT);

    let response = send(&app, Method::GET, "/history", "").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value =
        serde_json::from_str(&body_string(response).await).unwrap();
    assert!(body["latest"].is_null());
    assert_eq!(body["entries"], serde_json::json!([]));

    for (i, rps) in [5, 6, 7].iter().enumerate() {
        let body = format!(r#"{{"timestamp": {}, "rps": {}}}"#, 100 + i, rps);
        let response = send(&app, Method::POST, "/ingest", &body).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    let mut history = serde_json::Value::Null;
    for _ in 0..200 {
        let response = send(&app, Method::GET, "/history", "").await;
        let json: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        if json["entries"].as_array().map(Vec::len) == Some(3) {
            history = json;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let timestamps: Vec<i64> = history["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["sample"]["timestamp"].as_i64().unwrap())
        .collect();
    assert_eq!(timestamps, vec![102, 101, 100]);
    assert_eq!(history["latest"]["sample"]["rps"], 7.0);
    assert_eq!(history["latest"]["verdict"]["count"], 3);

    let response = send(&app, Method::GET, "/history?limit=2", "").await;
    let limited: serde_json::Value =
        serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(limited["entries"].as_array().map(Vec::len), Some(2));
    assert_eq!(limited["entries"][0]["sample"]["timestamp"], 102);

    drop(app);
    assert_eq!(handle.await.unwrap().processed, 3);
}

#[tokio::test]
async fn history_not_found_when_store_disabled() {
    let mut config = test_config(16);
    config.store.enabled = false;
    let Components { state, .. } = build_components(&config).unwrap();
    assert!(state.store.is_none());
    let app = api::router(state, REQUEST_TIMEOUT);

    let response = send(&app, Method::GET, "/history", "").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value =
        serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"], "side store disabled");
}

#[tokio::test]
async fn stalled_request_body_times_out() {
    let Components { state, .. } = build_components(&test_config(16)).unwrap();
    let metrics = state.metrics.clone();
    let app = api::router(state, Duration::from_millis(50));

    // A client that sends headers and then never finishes the body.
    let stalled = futures::stream::pending::<Result<Bytes, std::io::Error>>();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/ingest")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from_stream(stalled))
        .unwrap();

    let response = tokio::time::timeout(Duration::from_secs(5), app.clone().oneshot(request))
        .await
        .expect("router must answer a stalled request")
        .unwrap();
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(metrics.ingest_total(), 0);

    let response = send(&app, Method::GET, "/metrics", "").await;
    let text = body_string(response).await;
    assert!(text.contains(r#"http_request_duration_seconds_count{code="408",path="/ingest"} 1"#));
}
