//! Prometheus metrics.

use axum::{body::Body, http::Request, http::StatusCode, response::Response};
use lazy_static::lazy_static;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};
use tracing::Span;

use crate::record::Dataset;

lazy_static! {
    // Registry for holding metric state
    pub static ref REGISTRY: Registry = Registry::new();
    // Simple request counter
    pub static ref INCOMING_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("incoming_requests", "The number of HTTP requests received"),
        &["http_method"]
    ).expect("metric can be created");
    // Request counter by status code
    pub static ref RESPONSE_CODE_COLLECTOR: IntCounterVec = IntCounterVec::new(
        Opts::new("outgoing_response", "The number of responses sent."),
        &["status_code"]
    ).expect("metric can be created");
    // Request histogram by response time
    pub static ref RESPONSE_TIME_COLLECTOR: HistogramVec = HistogramVec::new(
        HistogramOpts{
            common_opts: Opts::new("response_time", "The time taken to respond to each request"),
            buckets: prometheus::DEFAULT_BUCKETS.to_vec(),
        },
        &[],
    ).expect("metric can be created");
    // Dataset rows kept by the decoder
    pub static ref ROWS_DECODED: IntCounter = IntCounter::new(
        "rows_decoded", "The number of dataset rows decoded"
    ).expect("metric can be created");
    // Dataset rows dropped by the decoder
    pub static ref ROWS_SKIPPED: IntCounter = IntCounter::new(
        "rows_skipped", "The number of malformed or blank dataset rows skipped"
    ).expect("metric can be created");
    // Decodes that stopped at the row limit
    pub static ref TRUNCATED_DECODES: IntCounter = IntCounter::new(
        "truncated_decodes", "The number of dataset decodes stopped at the row limit"
    ).expect("metric can be created");
}

/// Register all metrics with [REGISTRY].
pub fn register_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(INCOMING_REQUESTS.clone()))?;
    REGISTRY.register(Box::new(RESPONSE_CODE_COLLECTOR.clone()))?;
    REGISTRY.register(Box::new(RESPONSE_TIME_COLLECTOR.clone()))?;
    REGISTRY.register(Box::new(ROWS_DECODED.clone()))?;
    REGISTRY.register(Box::new(ROWS_SKIPPED.clone()))?;
    REGISTRY.register(Box::new(TRUNCATED_DECODES.clone()))?;
    Ok(())
}

/// Render all registered metrics in the prometheus text format.
pub async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    String::from_utf8(buffer).map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
}

/// Increments the prometheus counter on all incoming requests, labelled by http method
pub fn request_counter(request: &Request<Body>, _span: &Span) {
    INCOMING_REQUESTS
        .with_label_values(&[&request.method().to_string().to_ascii_uppercase()])
        .inc();
}

/// Increment the prometheus counter on all outgoing responses, labelled by status code
pub fn record_response_metrics<B>(
    response: &Response<B>,
    latency: std::time::Duration,
    _span: &Span,
) {
    RESPONSE_CODE_COLLECTOR
        .with_label_values(&[response.status().as_str()])
        .inc();

    RESPONSE_TIME_COLLECTOR
        .with_label_values(&[])
        .observe(latency.as_secs_f64());
}

/// Record the outcome of a dataset decode.
pub fn record_decode_metrics(dataset: &Dataset) {
    ROWS_DECODED.inc_by(dataset.len() as u64);
    ROWS_SKIPPED.inc_by(dataset.skipped as u64);
    if dataset.truncated {
        TRUNCATED_DECODES.inc();
    }
}
