use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use lyricist::{CompletionBackend, CompletionRequest};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts as PromOpts, Registry,
    TextEncoder,
};

struct Metrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_in_flight_requests: IntGauge,
    completion_calls_total: IntCounterVec,
    completion_call_duration_seconds: HistogramVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            PromOpts::new(
                "lyricist_http_requests_total",
                "Total HTTP requests served by lyricist-server.",
            ),
            &["route", "status"],
        )
        .expect("metrics definition must be valid");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "lyricist_http_request_duration_seconds",
                "HTTP request latency in seconds.",
            ),
            &["route", "status"],
        )
        .expect("metrics definition must be valid");

        let http_in_flight_requests = IntGauge::new(
            "lyricist_http_in_flight_requests",
            "Current number of in-flight HTTP requests.",
        )
        .expect("metrics definition must be valid");

        let completion_calls_total = IntCounterVec::new(
            PromOpts::new(
                "lyricist_completion_calls_total",
                "Completion model calls, by outcome.",
            ),
            &["outcome"],
        )
        .expect("metrics definition must be valid");

        let completion_call_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "lyricist_completion_call_duration_seconds",
                "Completion model call latency in seconds.",
            )
            .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 80.0]),
            &["outcome"],
        )
        .expect("metrics definition must be valid");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("metrics must register");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("metrics must register");
        registry
            .register(Box::new(http_in_flight_requests.clone()))
            .expect("metrics must register");
        registry
            .register(Box::new(completion_calls_total.clone()))
            .expect("metrics must register");
        registry
            .register(Box::new(completion_call_duration_seconds.clone()))
            .expect("metrics must register");

        Metrics {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_in_flight_requests,
            completion_calls_total,
            completion_call_duration_seconds,
        }
    })
}

pub fn init() {
    let _ = metrics();
}

pub async fn prometheus_metrics() -> Response {
    let families = metrics().registry.gather();
    let mut buf = Vec::new();
    if TextEncoder::new().encode(&families, &mut buf).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to encode metrics",
        )
            .into_response();
    }

    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
        )],
        buf,
    )
        .into_response()
}

pub async fn track_http_metrics(req: Request<Body>, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str())
        .unwrap_or_else(|| req.uri().path())
        .to_owned();

    if route == "/metrics" || route == "/healthz" {
        return next.run(req).await;
    }

    let start = Instant::now();

    metrics().http_in_flight_requests.inc();
    let response = next.run(req).await;
    metrics().http_in_flight_requests.dec();

    let status = response.status().as_u16().to_string();
    metrics()
        .http_requests_total
        .with_label_values(&[&route, &status])
        .inc();
    metrics()
        .http_request_duration_seconds
        .with_label_values(&[&route, &status])
        .observe(start.elapsed().as_secs_f64());

    response
}

/// Completion backend wrapper that records call counts and latency.
pub struct MeteredBackend<B> {
    inner: B,
}

impl<B> MeteredBackend<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }
}

impl<B: CompletionBackend> CompletionBackend for MeteredBackend<B> {
    async fn complete(&self, request: CompletionRequest) -> lyricist::Result<Option<String>> {
        let start = Instant::now();
        let result = self.inner.complete(request).await;

        let outcome = match &result {
            Ok(Some(_)) => "ok",
            Ok(None) => "empty",
            Err(_) => "error",
        };
        metrics()
            .completion_calls_total
            .with_label_values(&[outcome])
            .inc();
        metrics()
            .completion_call_duration_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());

        result
    }
}
