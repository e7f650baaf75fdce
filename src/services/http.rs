//! Shared HTTP plumbing for provider adapters

use crate::error::{AppError, AppResult};
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::warn;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_RETRIES: usize = 3;

pub fn build_client() -> AppResult<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("stockpulse/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Configuration(format!("failed to build HTTP client: {}", e)))
}

#[derive(Debug)]
enum RequestFailure {
    Transport(reqwest::Error),
    Status(StatusCode, String),
}

impl RequestFailure {
    fn is_transient(&self) -> bool {
        match self {
            RequestFailure::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            RequestFailure::Status(status, _) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
        }
    }
}

impl std::fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestFailure::Transport(e) => write!(f, "{}", e),
            RequestFailure::Status(status, body) => write!(f, "HTTP {}: {}", status, body),
        }
    }
}

/// Send the request built by `build`, retrying transport errors, 429 and 5xx
/// responses with exponential backoff. Other non-success statuses fail at once.
pub async fn send_with_retry<F>(provider: &str, build: F) -> AppResult<Response>
where
    F: Fn() -> RequestBuilder,
{
    let build = &build;
    let attempt = move || async move {
        let response = match build().send().await {
            Ok(response) => response,
            Err(e) => return Err(RequestFailure::Transport(e)),
        };
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RequestFailure::Status(status, truncate(&body, 200)))
    };

    attempt
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(250))
                .with_max_times(MAX_RETRIES),
        )
        .when(RequestFailure::is_transient)
        .notify(|e: &RequestFailure, delay: Duration| {
            warn!(
                provider = %provider,
                error = %e,
                retry_in_ms = delay.as_millis() as u64,
                "{}: transient request failure, retrying",
                provider
            );
        })
        .await
        .map_err(|e| AppError::External(format!("{}: {}", provider, e)))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
