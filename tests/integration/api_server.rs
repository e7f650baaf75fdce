//! Integration tests for the API Server
//!
//! Tests HTTP endpoints, error mapping and task submission against the
//! in-memory store.

use axum_test::TestServer;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use stockpulse::core::http::{create_router, AppState};
use stockpulse::core::runtime::TaskRunner;
use stockpulse::core::scheduler::JobScheduler;
use stockpulse::db::Store;
use stockpulse::jobs::register_default_jobs;
use stockpulse::metrics::Metrics;
use stockpulse::models::{PredictionType, Timeframe};

use crate::support::{daily_candles, seed_prediction, FakeMarketData, FixedPredictor, Harness};

/// Test helper for API server integration tests
#[allow(dead_code)]
struct TestApiServer {
    server: TestServer,
    harness: Harness,
    scheduler: JobScheduler,
}

impl TestApiServer {
    async fn new() -> Self {
        let market = FakeMarketData::new().with_quote("NVDA", 120.0, Utc::now());
        let harness = Harness::new(market, FixedPredictor::bullish(), None);

        let metrics = Arc::new(Metrics::new().expect("metrics initialization"));
        let scheduler = JobScheduler::with_metrics(metrics.clone());
        register_default_jobs(&scheduler, harness.context.clone())
            .await
            .expect("register jobs");

        let state = AppState::new(
            metrics,
            scheduler.clone(),
            TaskRunner::default(),
            harness.context.clone(),
        );
        let server = TestServer::new(create_router(state)).expect("start test server");

        Self {
            server,
            harness,
            scheduler,
        }
    }

    async fn wait_for_task(&self, id: u64) -> Value {
        for _ in 0..200 {
            let body: Value = self.server.get(&format!("/api/tasks/{}", id)).await.json();
            if body["finished_at"].is_string() {
                return body;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("task {} did not finish", id);
    }
}

fn assert_error(body: &Value, category: &str) {
    assert_eq!(body["error"]["category"], category, "body: {}", body);
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn health_endpoint_reports_healthy_status() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_seconds"].as_u64().is_some());
    assert_eq!(body["service"], "stockpulse");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["scheduler_running"], false);
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_metrics() {
    let app = TestApiServer::new().await;
    app.server.get("/health").await;
    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    assert!(
        body.contains("http_requests_total"),
        "Expected http_requests_total metric"
    );
    assert!(
        body.contains("http_request_duration_seconds"),
        "Expected http_request_duration_seconds metric"
    );
}

#[tokio::test]
async fn scheduler_status_lists_registered_jobs() {
    let app = TestApiServer::new().await;
    let body: Value = app.server.get("/api/scheduler/status").await.json();

    assert_eq!(body["running"], false);
    assert_eq!(body["total_jobs"], 6);
    let names: Vec<&str> = body["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|job| job["name"].as_str().unwrap())
        .collect();
    for expected in [
        "fetch_stock_data",
        "generate_predictions",
        "evaluate_predictions",
        "daily_notifications",
        "price_alerts",
        "database_cleanup",
    ] {
        assert!(names.contains(&expected), "missing job {}", expected);
    }
    let job = &body["jobs"][0];
    assert_eq!(job["max_instances"], 1);
    assert_eq!(job["coalesce"], true);
}

#[tokio::test]
async fn pause_and_resume_job() {
    let app = TestApiServer::new().await;

    let response = app.server.post("/api/scheduler/jobs/price_alerts/pause").await;
    assert_eq!(response.status_code(), 200);

    let status = app.scheduler.status().await;
    let job = status.jobs.iter().find(|j| j.name == "price_alerts").unwrap();
    assert!(job.paused);
    assert!(job.next_fire.is_none());

    let response = app.server.post("/api/scheduler/jobs/price_alerts/resume").await;
    assert_eq!(response.status_code(), 200);

    let status = app.scheduler.status().await;
    let job = status.jobs.iter().find(|j| j.name == "price_alerts").unwrap();
    assert!(!job.paused);
    assert!(job.next_fire.is_some());
}

#[tokio::test]
async fn run_now_starts_job_and_unknown_job_is_404() {
    let app = TestApiServer::new().await;

    let response = app.server.post("/api/scheduler/jobs/database_cleanup/run").await;
    assert_eq!(response.status_code(), 202);
    let body: Value = response.json();
    assert_eq!(body["outcome"], "started");

    let response = app.server.post("/api/scheduler/jobs/nope/run").await;
    assert_eq!(response.status_code(), 404);
    assert_error(&response.json(), "not_found");
}

#[tokio::test]
async fn add_symbol_tracks_and_refreshes() {
    let app = TestApiServer::new().await;

    let response = app
        .server
        .post("/api/symbols")
        .json(&json!({ "ticker": "nvda", "name": "NVIDIA" }))
        .await;
    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    assert_eq!(body["symbol"]["ticker"], "NVDA");
    assert_eq!(body["symbol"]["is_active"], true);

    let task = app.wait_for_task(body["task_id"].as_u64().unwrap()).await;
    assert_eq!(task["state"], "succeeded", "task: {}", task);

    let symbol = app.harness.store.get_symbol("NVDA").await.unwrap().unwrap();
    assert_eq!(app.harness.store.count_prices(symbol.id).await.unwrap(), 1);

    let listed: Value = app.server.get("/api/symbols").await.json();
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn add_symbol_rejects_blank_ticker() {
    let app = TestApiServer::new().await;
    let response = app
        .server
        .post("/api/symbols")
        .json(&json!({ "ticker": "  " }))
        .await;
    assert_eq!(response.status_code(), 400);
    assert_error(&response.json(), "validation");
}

#[tokio::test]
async fn remove_symbol_deactivates() {
    let app = TestApiServer::new().await;
    app.harness.store.upsert_symbol("AAPL", None).await.unwrap();

    let response = app.server.delete("/api/symbols/aapl").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["is_active"], false);
    assert!(app.harness.store.list_active_symbols().await.unwrap().is_empty());

    let response = app.server.delete("/api/symbols/ZZZZ").await;
    assert_eq!(response.status_code(), 404);
    assert_error(&response.json(), "not_found");
}

#[tokio::test]
async fn generate_prediction_runs_as_task_and_shows_in_summary() {
    let app = TestApiServer::new().await;
    let symbol = app.harness.store.upsert_symbol("AAPL", None).await.unwrap();
    app.harness
        .store
        .upsert_price_points(symbol.id, &daily_candles(&[100.0; 30], Utc::now()))
        .await
        .unwrap();

    let response = app
        .server
        .post("/api/symbols/AAPL/predictions?timeframe=short")
        .await;
    assert_eq!(response.status_code(), 202);
    let body: Value = response.json();
    assert_eq!(body["timeframe"], "short");

    let task = app.wait_for_task(body["task_id"].as_u64().unwrap()).await;
    assert_eq!(task["state"], "succeeded", "task: {}", task);

    let summary: Value = app
        .server
        .get("/api/symbols/AAPL/predictions/summary?days=7")
        .await
        .json();
    assert_eq!(summary["symbol"], "AAPL");
    assert_eq!(summary["total_predictions"], 1);
    assert_eq!(summary["evaluated_predictions"], 0);
    assert_eq!(summary["distribution"]["bullish"], 1);
    assert_eq!(summary["recent"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn generate_prediction_validates_input() {
    let app = TestApiServer::new().await;
    app.harness.store.upsert_symbol("AAPL", None).await.unwrap();

    let response = app
        .server
        .post("/api/symbols/AAPL/predictions?timeframe=decade")
        .await;
    assert_eq!(response.status_code(), 400);
    assert_error(&response.json(), "validation");

    let response = app.server.post("/api/symbols/NOPE/predictions").await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn generate_task_failure_is_recorded() {
    let app = TestApiServer::new().await;
    app.harness.store.upsert_symbol("AAPL", None).await.unwrap();

    let body: Value = app.server.post("/api/symbols/AAPL/predictions").await.json();
    let task = app.wait_for_task(body["task_id"].as_u64().unwrap()).await;
    assert_eq!(task["state"], "failed");
    assert!(task["message"].as_str().unwrap().contains("AAPL"));
}

#[tokio::test]
async fn evaluate_prediction_on_demand() {
    let app = TestApiServer::new().await;
    let record = seed_prediction(
        app.harness.store.as_ref(),
        "AAPL",
        Timeframe::Short,
        PredictionType::Neutral,
        Some(100.0),
        Utc::now() - Duration::days(1),
    )
    .await;

    let response = app
        .server
        .post(&format!("/api/predictions/{}/evaluate?realized_price=101", record.id))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["is_evaluated"], true);
    assert_eq!(body["actual_price"], 101.0);
    assert_eq!(body["accuracy_score"], 1.0);

    let response = app
        .server
        .post(&format!("/api/predictions/{}/evaluate?realized_price=-3", record.id + 1000))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn evaluate_without_price_data_is_unprocessable() {
    let app = TestApiServer::new().await;
    let record = seed_prediction(
        app.harness.store.as_ref(),
        "AAPL",
        Timeframe::Short,
        PredictionType::Bullish,
        Some(100.0),
        Utc::now(),
    )
    .await;

    let response = app
        .server
        .post(&format!("/api/predictions/{}/evaluate", record.id))
        .await;
    assert_eq!(response.status_code(), 422);
    assert_error(&response.json(), "evaluation");
}

#[tokio::test]
async fn list_predictions_newest_first_with_filters() {
    let app = TestApiServer::new().await;
    let now = Utc::now();
    let old_short = seed_prediction(
        app.harness.store.as_ref(),
        "AAPL",
        Timeframe::Short,
        PredictionType::Bullish,
        Some(100.0),
        now - Duration::days(20),
    )
    .await;
    let medium = seed_prediction(
        app.harness.store.as_ref(),
        "AAPL",
        Timeframe::Medium,
        PredictionType::Bearish,
        Some(95.0),
        now - Duration::days(2),
    )
    .await;
    let new_short = seed_prediction(
        app.harness.store.as_ref(),
        "AAPL",
        Timeframe::Short,
        PredictionType::Neutral,
        Some(101.0),
        now - Duration::days(1),
    )
    .await;
    seed_prediction(
        app.harness.store.as_ref(),
        "MSFT",
        Timeframe::Short,
        PredictionType::Bullish,
        Some(400.0),
        now,
    )
    .await;

    let body: Value = app.server.get("/api/symbols/aapl/predictions").await.json();
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![new_short.id, medium.id, old_short.id]);

    let body: Value = app
        .server
        .get("/api/symbols/AAPL/predictions?timeframe=short&limit=1")
        .await
        .json();
    let only = body.as_array().unwrap();
    assert_eq!(only.len(), 1);
    assert_eq!(only[0]["id"], new_short.id);

    let body: Value = app
        .server
        .get("/api/symbols/AAPL/predictions?days=7")
        .await
        .json();
    assert_eq!(body.as_array().unwrap().len(), 2);

    let response = app.server.get("/api/symbols/AAPL/predictions?limit=0").await;
    assert_eq!(response.status_code(), 400);
    assert_error(&response.json(), "validation");

    let response = app.server.get("/api/symbols/NOPE/predictions").await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn delete_prediction_removes_record() {
    let app = TestApiServer::new().await;
    let record = seed_prediction(
        app.harness.store.as_ref(),
        "AAPL",
        Timeframe::Short,
        PredictionType::Bullish,
        Some(100.0),
        Utc::now(),
    )
    .await;

    let response = app
        .server
        .delete(&format!("/api/predictions/{}", record.id))
        .await;
    assert_eq!(response.status_code(), 204);
    assert!(app
        .harness
        .store
        .get_prediction(record.id)
        .await
        .unwrap()
        .is_none());

    let response = app
        .server
        .delete(&format!("/api/predictions/{}", record.id))
        .await;
    assert_eq!(response.status_code(), 404);
    assert_error(&response.json(), "not_found");
}

#[tokio::test]
async fn price_history_returns_stored_window() {
    let app = TestApiServer::new().await;
    let symbol = app.harness.store.upsert_symbol("AAPL", None).await.unwrap();
    let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
    app.harness
        .store
        .upsert_price_points(symbol.id, &daily_candles(&closes, Utc::now()))
        .await
        .unwrap();

    let response = app.server.get("/api/symbols/aapl/prices?days=3").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["symbol"], "AAPL");
    assert_eq!(body["count"], 3);
    let closes: Vec<f64> = body["prices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["close"].as_f64().unwrap())
        .collect();
    assert_eq!(closes, vec![107.0, 108.0, 109.0]);

    let response = app.server.get("/api/symbols/AAPL/prices?days=0").await;
    assert_eq!(response.status_code(), 400);

    let response = app.server.get("/api/symbols/NOPE/prices").await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn live_quote_comes_from_provider() {
    let app = TestApiServer::new().await;

    let response = app.server.get("/api/symbols/nvda/quote").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["symbol"], "NVDA");
    assert_eq!(body["price"], 120.0);
    assert_eq!(app.harness.market.quote_calls(), vec!["NVDA".to_string()]);

    let response = app.server.get("/api/symbols/ZZZZ/quote").await;
    assert_eq!(response.status_code(), 404);
    assert_error(&response.json(), "not_found");
}

#[tokio::test]
async fn chat_subscription_lifecycle() {
    let app = TestApiServer::new().await;

    let response = app
        .server
        .post("/api/chats")
        .json(&json!({ "chat_id": "42", "price_change_threshold": 2.5, "daily_summary": false }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["chat_id"], "42");
    assert_eq!(body["price_change_threshold"], 2.5);
    assert_eq!(body["daily_summary"], false);
    assert_eq!(body["price_alerts"], true);

    let chats: Value = app.server.get("/api/chats").await.json();
    assert_eq!(chats.as_array().unwrap().len(), 1);

    let response = app.server.delete("/api/chats/42").await;
    assert_eq!(response.status_code(), 204);
    let chats: Value = app.server.get("/api/chats").await.json();
    assert!(chats.as_array().unwrap().is_empty());

    let response = app
        .server
        .post("/api/chats")
        .json(&json!({ "chat_id": "43", "price_change_threshold": 0 }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn unknown_task_is_404() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/api/tasks/777").await;
    assert_eq!(response.status_code(), 404);
    assert_error(&response.json(), "not_found");
}
