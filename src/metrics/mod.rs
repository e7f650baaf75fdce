//! Prometheus metrics for the HTTP surface and the job orchestrator

use prometheus::{
    Counter, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};

pub struct Metrics {
    registry: Registry,

    pub http_requests_total: Counter,
    pub http_requests_in_flight: Gauge,
    pub http_request_duration_seconds: prometheus::Histogram,

    /// Completed job executions labelled by job and outcome (success/failure/panic)
    pub job_runs_total: IntCounterVec,
    /// Fires that did not execute, labelled by job and reason (coalesced/misfired/paused)
    pub job_fires_skipped_total: IntCounterVec,
    pub job_duration_seconds: HistogramVec,

    pub predictions_generated_total: Counter,
    pub predictions_evaluated_total: Counter,
    pub notifications_sent_total: IntCounterVec,

    pub database_connected: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total =
            Counter::with_opts(Opts::new("http_requests_total", "Total HTTP requests served"))?;
        let http_requests_in_flight = Gauge::with_opts(Opts::new(
            "http_requests_in_flight",
            "HTTP requests currently being served",
        ))?;
        let http_request_duration_seconds = prometheus::Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        ))?;

        let job_runs_total = IntCounterVec::new(
            Opts::new("job_runs_total", "Scheduled job executions by outcome"),
            &["job", "outcome"],
        )?;
        let job_fires_skipped_total = IntCounterVec::new(
            Opts::new(
                "job_fires_skipped_total",
                "Scheduled fires that were dropped instead of executed",
            ),
            &["job", "reason"],
        )?;
        let job_duration_seconds = HistogramVec::new(
            HistogramOpts::new("job_duration_seconds", "Scheduled job run time in seconds")
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0]),
            &["job"],
        )?;

        let predictions_generated_total = Counter::with_opts(Opts::new(
            "predictions_generated_total",
            "Predictions persisted by the generation job",
        ))?;
        let predictions_evaluated_total = Counter::with_opts(Opts::new(
            "predictions_evaluated_total",
            "Predictions graded against realized prices",
        ))?;
        let notifications_sent_total = IntCounterVec::new(
            Opts::new("notifications_sent_total", "Messages delivered to chats"),
            &["kind"],
        )?;

        let database_connected = Gauge::with_opts(Opts::new(
            "database_connected",
            "1 when the persistence store is reachable",
        ))?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(job_runs_total.clone()))?;
        registry.register(Box::new(job_fires_skipped_total.clone()))?;
        registry.register(Box::new(job_duration_seconds.clone()))?;
        registry.register(Box::new(predictions_generated_total.clone()))?;
        registry.register(Box::new(predictions_evaluated_total.clone()))?;
        registry.register(Box::new(notifications_sent_total.clone()))?;
        registry.register(Box::new(database_connected.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_requests_in_flight,
            http_request_duration_seconds,
            job_runs_total,
            job_fires_skipped_total,
            job_duration_seconds,
            predictions_generated_total,
            predictions_evaluated_total,
            notifications_sent_total,
            database_connected,
        })
    }

    /// Render every registered metric in the Prometheus text format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
