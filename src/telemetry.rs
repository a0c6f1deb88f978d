//! Telemetry metric name constants.
//!
//! Centralised metric names for gateway operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `copilot_gateway_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `trigger` - what started a refresh: "init", "background" or "manual"
//! - `status` - outcome: "ok" or "error"
//! - `state` - freshness seen by a read: "fresh", "stale" or "unavailable"

/// Total models refreshes attempted.
///
/// Labels: `trigger`, `status` ("ok" | "error").
pub const MODELS_REFRESH_TOTAL: &str = "copilot_gateway_models_refresh_total";

/// Models refresh duration in seconds.
///
/// Labels: `trigger`.
pub const MODELS_REFRESH_DURATION_SECONDS: &str = "copilot_gateway_models_refresh_duration_seconds";

/// Total reads served by the models cache.
///
/// Labels: `state` ("fresh" | "stale" | "unavailable").
pub const MODELS_READS_TOTAL: &str = "copilot_gateway_models_reads_total";
