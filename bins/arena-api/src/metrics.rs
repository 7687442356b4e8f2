// Prometheus metrics for the judge API

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::time::Duration;

lazy_static! {
    /// Finished runs/submits by mode and outcome (or error code)
    pub static ref JUDGE_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "arena_judge_requests_total",
        "Run and submit requests by mode and result",
        &["mode", "result"]
    )
    .expect("arena_judge_requests_total registers once");

    /// Wall time from request to verdict
    pub static ref JUDGE_DURATION: HistogramVec = register_histogram_vec!(
        "arena_judge_duration_seconds",
        "Time spent judging a run or submit",
        &["mode"],
        vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0]
    )
    .expect("arena_judge_duration_seconds registers once");
}

pub fn observe(mode: &str, result: &str, elapsed: Duration) {
    JUDGE_REQUESTS.with_label_values(&[mode, result]).inc();
    JUDGE_DURATION
        .with_label_values(&[mode])
        .observe(elapsed.as_secs_f64());
}

/// Render the default registry in the text exposition format
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
