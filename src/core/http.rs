//! HTTP endpoint server using Axum

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};

use crate::core::runtime::TaskRunner;
use crate::core::scheduler::JobScheduler;
use crate::db::normalize_ticker;
use crate::error::{AppError, AppResult, ErrorCategory};
use crate::evaluation::{evaluate_prediction, prediction_summary};
use crate::jobs::{handlers, JobContext};
use crate::metrics::Metrics;
use crate::models::{NewChatSubscription, Timeframe, TrackedSymbol};

#[derive(Clone)]
pub struct AppState {
    pub health: Arc<RwLock<HealthStatus>>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub scheduler: JobScheduler,
    pub tasks: TaskRunner,
    pub context: Arc<JobContext>,
}

impl AppState {
    pub fn new(
        metrics: Arc<Metrics>,
        scheduler: JobScheduler,
        tasks: TaskRunner,
        context: Arc<JobContext>,
    ) -> Self {
        Self {
            health: Arc::new(RwLock::new(HealthStatus::default())),
            metrics,
            start_time: Arc::new(Instant::now()),
            scheduler,
            tasks,
            context,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HealthStatus {
    pub status: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Scheduler => StatusCode::CONFLICT,
        ErrorCategory::Evaluation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::External => StatusCode::BAD_GATEWAY,
        ErrorCategory::Persistence => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let category = self.category();
        let status = status_for(category);
        if status.is_server_error() {
            error!(category = ?category, error = %self, "Request failed");
        }
        (
            status,
            Json(json!({
                "error": {
                    "category": category,
                    "message": self.to_string(),
                }
            })),
        )
            .into_response()
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let health = state.health.read().await;
    let uptime_seconds = state.start_time.elapsed().as_secs();
    let database = match state.context.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            warn!(error = %e, "Health check: store ping failed");
            "unavailable"
        }
    };
    Json(json!({
        "status": health.status,
        "uptime_seconds": uptime_seconds,
        "service": "stockpulse",
        "database": database,
        "scheduler_running": state.scheduler.is_running().await,
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();

    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();

    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

async fn scheduler_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.scheduler.status().await))
}

async fn run_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let outcome = state.scheduler.run_now(&name).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "job": name, "outcome": outcome })),
    ))
}

async fn pause_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<Value>> {
    state.scheduler.pause(&name).await?;
    Ok(Json(json!({ "job": name, "paused": true })))
}

async fn resume_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<Value>> {
    state.scheduler.resume(&name).await?;
    Ok(Json(json!({ "job": name, "paused": false })))
}

// ---------------------------------------------------------------------------
// Symbols
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AddSymbolRequest {
    ticker: String,
    name: Option<String>,
}

async fn list_symbols(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let symbols = state.context.store.list_active_symbols().await?;
    Ok(Json(json!(symbols)))
}

/// Track a symbol and queue an immediate price refresh for it
async fn add_symbol(
    State(state): State<AppState>,
    Json(request): Json<AddSymbolRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let ticker = request.ticker.trim();
    if ticker.is_empty() || ticker.len() > 10 {
        return Err(AppError::Validation(
            "ticker must be 1 to 10 characters".to_string(),
        ));
    }

    let symbol = state
        .context
        .store
        .upsert_symbol(ticker, request.name.as_deref())
        .await?;

    let ctx = state.context.clone();
    let refresh_ticker = symbol.ticker.clone();
    let task_id = state
        .tasks
        .submit(&format!("refresh:{}", symbol.ticker), async move {
            let inserted = handlers::refresh_symbol(&ctx, &refresh_ticker).await?;
            Ok(format!("stored {} new price points", inserted))
        })
        .await;

    info!(symbol = %symbol.ticker, task_id = task_id, "Tracking symbol {}", symbol.ticker);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "symbol": symbol, "task_id": task_id })),
    ))
}

async fn tracked_symbol(state: &AppState, ticker: &str) -> AppResult<TrackedSymbol> {
    state
        .context
        .store
        .get_symbol(ticker)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("symbol {}", ticker)))
}

#[derive(Debug, Deserialize)]
struct PriceHistoryQuery {
    days: Option<i64>,
}

/// Stored price points of a tracked symbol, oldest first
async fn price_history(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<PriceHistoryQuery>,
) -> AppResult<Json<Value>> {
    let days = query.days.unwrap_or(30);
    if !(1..=3650).contains(&days) {
        return Err(AppError::Validation(format!(
            "days must be between 1 and 3650, got {}",
            days
        )));
    }
    let symbol = tracked_symbol(&state, &ticker).await?;
    let since = Utc::now() - Duration::days(days);
    let prices = state
        .context
        .store
        .price_history(symbol.id, since)
        .await?;
    Ok(Json(json!({
        "symbol": symbol.ticker,
        "days": days,
        "count": prices.len(),
        "prices": prices,
    })))
}

/// Live quote straight from the market data provider
async fn live_quote(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> AppResult<Json<Value>> {
    let ticker = normalize_ticker(&ticker);
    if ticker.is_empty() {
        return Err(AppError::Validation("ticker must not be empty".to_string()));
    }
    let quote = state
        .context
        .market_data
        .get_quote(&ticker)
        .await
        .ok_or_else(|| AppError::NotFound(format!("live quote for {}", ticker)))?;
    Ok(Json(json!(quote)))
}

async fn remove_symbol(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> AppResult<Json<Value>> {
    let symbol = state.context.store.deactivate_symbol(&ticker).await?;
    info!(symbol = %symbol.ticker, "Stopped tracking symbol {}", symbol.ticker);
    Ok(Json(json!(symbol)))
}

// ---------------------------------------------------------------------------
// Predictions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateQuery {
    timeframe: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListPredictionsQuery {
    limit: Option<usize>,
    timeframe: Option<String>,
    days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SummaryQuery {
    days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct EvaluateQuery {
    realized_price: Option<f64>,
}

/// Queue an on-demand prediction for one symbol
async fn generate_prediction(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<GenerateQuery>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let timeframe = match query.timeframe.as_deref() {
        Some(raw) => raw.parse::<Timeframe>()?,
        None => Timeframe::Medium,
    };
    let symbol = tracked_symbol(&state, &ticker).await?;

    let ctx = state.context.clone();
    let task_name = format!("predict:{}:{}", symbol.ticker, timeframe);
    let task_id = state
        .tasks
        .submit(&task_name, async move {
            let record = handlers::generate_for_symbol(&ctx, &symbol, timeframe, Utc::now()).await?;
            Ok(format!(
                "prediction {}: {} ({:.2})",
                record.id, record.prediction_type, record.confidence
            ))
        })
        .await;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "task_id": task_id, "timeframe": timeframe })),
    ))
}

/// Newest predictions of one symbol, optionally narrowed to a timeframe or window
async fn list_predictions(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<ListPredictionsQuery>,
) -> AppResult<Json<Value>> {
    let limit = query.limit.unwrap_or(10);
    if !(1..=100).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and 100, got {}",
            limit
        )));
    }
    let timeframe = query
        .timeframe
        .as_deref()
        .map(str::parse::<Timeframe>)
        .transpose()?;
    let since = match query.days {
        Some(days) if days >= 1 => Utc::now() - Duration::days(days),
        Some(days) => {
            return Err(AppError::Validation(format!(
                "days must be positive, got {}",
                days
            )))
        }
        None => DateTime::<Utc>::MIN_UTC,
    };

    let symbol = tracked_symbol(&state, &ticker).await?;
    let predictions: Vec<_> = state
        .context
        .store
        .predictions_since(Some(symbol.id), since)
        .await?
        .into_iter()
        .filter(|p| timeframe.map_or(true, |t| p.timeframe == t))
        .take(limit)
        .collect();
    Ok(Json(json!(predictions)))
}

async fn delete_prediction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.context.store.delete_prediction(id).await?;
    info!(prediction_id = id, "Deleted prediction {}", id);
    Ok(StatusCode::NO_CONTENT)
}

async fn summary(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> AppResult<Json<Value>> {
    let days = query.days.unwrap_or(30);
    let summary =
        prediction_summary(state.context.store.as_ref(), &ticker, days, Utc::now()).await?;
    Ok(Json(json!(summary)))
}

async fn evaluate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<EvaluateQuery>,
) -> AppResult<Json<Value>> {
    let record = evaluate_prediction(
        state.context.store.as_ref(),
        id,
        query.realized_price,
        Utc::now(),
    )
    .await?;
    if let Some(metrics) = &state.context.metrics {
        metrics.predictions_evaluated_total.inc();
    }
    Ok(Json(json!(record)))
}

// ---------------------------------------------------------------------------
// Chat subscriptions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SubscribeRequest {
    chat_id: String,
    daily_summary: Option<bool>,
    price_alerts: Option<bool>,
    prediction_alerts: Option<bool>,
    price_change_threshold: Option<f64>,
}

async fn list_chats(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let chats = state.context.store.active_chats().await?;
    Ok(Json(json!(chats)))
}

async fn subscribe_chat(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> AppResult<Json<Value>> {
    let chat_id = request.chat_id.trim();
    if chat_id.is_empty() {
        return Err(AppError::Validation("chat_id must not be empty".to_string()));
    }

    let mut subscription = NewChatSubscription::with_defaults(
        chat_id,
        state.context.settings.default_alert_threshold_pct,
    );
    if let Some(threshold) = request.price_change_threshold {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(AppError::Validation(
                "price_change_threshold must be positive".to_string(),
            ));
        }
        subscription.price_change_threshold = threshold;
    }
    subscription.daily_summary = request.daily_summary.unwrap_or(true);
    subscription.price_alerts = request.price_alerts.unwrap_or(true);
    subscription.prediction_alerts = request.prediction_alerts.unwrap_or(true);

    let chat = state.context.store.upsert_chat(&subscription).await?;
    info!(chat_id = %chat.chat_id, "Chat {} subscribed", chat.chat_id);
    Ok(Json(json!(chat)))
}

async fn unsubscribe_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> AppResult<StatusCode> {
    state.context.store.deactivate_chat(&chat_id).await?;
    info!(chat_id = %chat_id, "Chat {} unsubscribed", chat_id);
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

async fn task_status(State(state): State<AppState>, Path(id): Path<u64>) -> AppResult<Json<Value>> {
    let record = state
        .tasks
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("task {}", id)))?;
    Ok(Json(json!(record)))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/scheduler/status", get(scheduler_status))
        .route("/api/scheduler/jobs/{name}/run", post(run_job))
        .route("/api/scheduler/jobs/{name}/pause", post(pause_job))
        .route("/api/scheduler/jobs/{name}/resume", post(resume_job))
        .route("/api/symbols", get(list_symbols).post(add_symbol))
        .route("/api/symbols/{ticker}", delete(remove_symbol))
        .route("/api/symbols/{ticker}/prices", get(price_history))
        .route("/api/symbols/{ticker}/quote", get(live_quote))
        .route(
            "/api/symbols/{ticker}/predictions",
            get(list_predictions).post(generate_prediction),
        )
        .route("/api/symbols/{ticker}/predictions/summary", get(summary))
        .route("/api/predictions/{id}", delete(delete_prediction))
        .route("/api/predictions/{id}/evaluate", post(evaluate))
        .route("/api/chats", get(list_chats).post(subscribe_chat))
        .route("/api/chats/{chat_id}", delete(unsubscribe_chat))
        .route("/api/tasks/{id}", get(task_status))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Serve the router until `shutdown` resolves
pub async fn start_server<F>(
    state: AppState,
    port: u16,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    info!(
        "Metrics endpoint available at http://0.0.0.0:{}/metrics",
        port
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
