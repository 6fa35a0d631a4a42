//! Prometheus metrics for the notification relay.
//!
//! Collectors are registered lazily on the default registry the first time
//! they are touched and exposed on `GET /metrics`.

use std::future::{ready, Ready};
use std::rc::Rc;
use std::time::{Duration, Instant};

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpResponse};
use futures::future::LocalBoxFuture;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, TextEncoder,
};

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notification_relay_http_requests_total",
            "Total HTTP requests handled",
        ),
        &["method", "path", "status"],
    )
    .expect("failed to create http requests counter");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register http requests counter");
    counter
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "notification_relay_http_request_duration_seconds",
            "HTTP request latency in seconds",
        ),
        &["method", "path"],
    )
    .expect("failed to create http duration histogram");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register http duration histogram");
    histogram
});

static EVENTS_RECEIVED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "notification_relay_events_received_total",
        "Broker messages received on the notification channel",
    )
    .expect("failed to create events received counter");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register events received counter");
    counter
});

static EVENTS_MALFORMED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "notification_relay_events_malformed_total",
        "Broker messages dropped because they failed to decode",
    )
    .expect("failed to create events malformed counter");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register events malformed counter");
    counter
});

static EVENTS_UNROUTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "notification_relay_events_unrouted_total",
        "Events whose target user had no live session in this process",
    )
    .expect("failed to create events unrouted counter");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register events unrouted counter");
    counter
});

static FRAMES_DELIVERED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notification_relay_frames_delivered_total",
            "Frames pushed to WebSocket sessions, by notification kind",
        ),
        &["kind"],
    )
    .expect("failed to create frames delivered counter");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register frames delivered counter");
    counter
});

static EMIT_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "notification_relay_emit_failures_total",
        "Frames that could not be handed to a session channel",
    )
    .expect("failed to create emit failures counter");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register emit failures counter");
    counter
});

static ACTIVE_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "notification_relay_active_sessions",
        "WebSocket sessions currently registered in this process",
    )
    .expect("failed to create active sessions gauge");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register active sessions gauge");
    gauge
});

pub fn observe_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(elapsed.as_secs_f64());
}

pub fn observe_event_received() {
    EVENTS_RECEIVED_TOTAL.inc();
}

pub fn observe_event_malformed() {
    EVENTS_MALFORMED_TOTAL.inc();
}

pub fn observe_event_unrouted() {
    EVENTS_UNROUTED_TOTAL.inc();
}

pub fn observe_frames_delivered(kind: &str, count: u64) {
    FRAMES_DELIVERED_TOTAL.with_label_values(&[kind]).inc_by(count);
}

pub fn observe_emit_failure() {
    EMIT_FAILURES_TOTAL.inc();
}

pub fn set_active_sessions(count: usize) {
    ACTIVE_SESSIONS.set(count as i64);
}

/// Render all registered collectors in the Prometheus text format.
pub async fn serve_metrics() -> HttpResponse {
    let metric_families = prometheus::default_registry().gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

/// Middleware recording request counts and latency per route.
pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = MetricsMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let method = req.method().to_string();
        // Match path resolves after routing; fall back to the raw path.
        let path = req
            .match_pattern()
            .unwrap_or_else(|| req.path().to_string());
        let start = Instant::now();

        Box::pin(async move {
            let res = service.call(req).await?;
            observe_http_request(&method, &path, res.status().as_u16(), start.elapsed());
            Ok(res)
        })
    }
}
