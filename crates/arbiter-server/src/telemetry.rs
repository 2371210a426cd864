// crates/arbiter-server/src/telemetry.rs
// ============================================================================
// Module: Server Telemetry
// Description: Observability hooks for tool routing and SSE delivery.
// Purpose: Provide metric events and a Prometheus exposition without hard deps.
// Dependencies: crate::tools
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for tool request counters,
//! a latency histogram, and SSE client gauges, plus a hand-rendered
//! Prometheus text exposition. It is intentionally dependency-light so
//! deployments can swap in their own pipeline without redesign.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::tools::ToolName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Latency buckets in milliseconds for tool request histograms.
pub const LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Tool request outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Successful request.
    Ok,
    /// Failed request.
    Error,
}

impl ToolOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for tool requests and SSE connections.
pub trait ServerMetrics: Send + Sync {
    /// Records one tool request with its latency.
    fn record_tool(&self, tool: Option<ToolName>, outcome: ToolOutcome, latency: Duration);
    /// Records an SSE client connecting.
    fn sse_connected(&self);
    /// Records an SSE client disconnecting.
    fn sse_disconnected(&self);
}

/// No-op metrics sink.
pub struct NoopMetrics;

impl ServerMetrics for NoopMetrics {
    fn record_tool(&self, _tool: Option<ToolName>, _outcome: ToolOutcome, _latency: Duration) {}

    fn sse_connected(&self) {}

    fn sse_disconnected(&self) {}
}

// ============================================================================
// SECTION: Prometheus Metrics
// ============================================================================

/// In-memory metrics with a Prometheus text exposition.
#[derive(Default)]
pub struct PrometheusMetrics {
    /// Request counts keyed by `(tool, outcome)` labels.
    requests: Mutex<BTreeMap<(String, &'static str), u64>>,
    /// Per-bucket latency counts matching [`LATENCY_BUCKETS_MS`].
    bucket_counts: Mutex<Vec<u64>>,
    /// Total observed latency in milliseconds.
    latency_sum_ms: AtomicU64,
    /// Total observed requests.
    latency_count: AtomicU64,
    /// Currently connected SSE clients.
    sse_clients: AtomicI64,
}

impl PrometheusMetrics {
    /// Creates an empty metrics registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bucket_counts: Mutex::new(vec![0; LATENCY_BUCKETS_MS.len()]),
            ..Self::default()
        }
    }

    /// Renders the Prometheus text exposition.
    ///
    /// `events_dropped` is supplied by the event bus at render time.
    #[must_use]
    pub fn render(&self, events_dropped: u64) -> String {
        let mut out = String::new();
        out.push_str("# TYPE arbiter_tool_requests_total counter\n");
        for ((tool, outcome), count) in lock_unpoisoned(&self.requests).iter() {
            out.push_str(&format!(
                "arbiter_tool_requests_total{{tool=\"{tool}\",outcome=\"{outcome}\"}} {count}\n"
            ));
        }
        out.push_str("# TYPE arbiter_tool_latency_ms histogram\n");
        let mut cumulative = 0u64;
        let buckets = lock_unpoisoned(&self.bucket_counts);
        for (bound, count) in LATENCY_BUCKETS_MS.iter().zip(buckets.iter()) {
            cumulative += count;
            out.push_str(&format!(
                "arbiter_tool_latency_ms_bucket{{le=\"{bound}\"}} {cumulative}\n"
            ));
        }
        drop(buckets);
        let count = self.latency_count.load(Ordering::SeqCst);
        out.push_str(&format!("arbiter_tool_latency_ms_bucket{{le=\"+Inf\"}} {count}\n"));
        out.push_str(&format!(
            "arbiter_tool_latency_ms_sum {}\n",
            self.latency_sum_ms.load(Ordering::SeqCst)
        ));
        out.push_str(&format!("arbiter_tool_latency_ms_count {count}\n"));
        out.push_str("# TYPE arbiter_sse_clients gauge\n");
        out.push_str(&format!(
            "arbiter_sse_clients {}\n",
            self.sse_clients.load(Ordering::SeqCst)
        ));
        out.push_str("# TYPE arbiter_bus_events_dropped_total counter\n");
        out.push_str(&format!("arbiter_bus_events_dropped_total {events_dropped}\n"));
        out
    }
}

impl ServerMetrics for PrometheusMetrics {
    fn record_tool(&self, tool: Option<ToolName>, outcome: ToolOutcome, latency: Duration) {
        let label = tool.map_or_else(|| "unknown".to_string(), |tool| tool.as_str().to_string());
        *lock_unpoisoned(&self.requests).entry((label, outcome.as_str())).or_insert(0) += 1;
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_sum_ms.fetch_add(millis, Ordering::SeqCst);
        self.latency_count.fetch_add(1, Ordering::SeqCst);
        let mut buckets = lock_unpoisoned(&self.bucket_counts);
        if let Some(index) = LATENCY_BUCKETS_MS.iter().position(|bound| millis <= *bound)
            && let Some(slot) = buckets.get_mut(index)
        {
            *slot += 1;
        }
    }

    fn sse_connected(&self) {
        self.sse_clients.fetch_add(1, Ordering::SeqCst);
    }

    fn sse_disconnected(&self) {
        self.sse_clients.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Locks a mutex, recovering the inner state if a holder panicked.
fn lock_unpoisoned<G>(mutex: &Mutex<G>) -> MutexGuard<'_, G> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use std::time::Duration;

    use super::PrometheusMetrics;
    use super::ServerMetrics;
    use super::ToolOutcome;
    use crate::tools::ToolName;

    #[test]
    fn exposition_includes_recorded_series() {
        let metrics = PrometheusMetrics::new();
        metrics.record_tool(Some(ToolName::Judge), ToolOutcome::Ok, Duration::from_millis(3));
        metrics.record_tool(Some(ToolName::Judge), ToolOutcome::Ok, Duration::from_millis(3));
        metrics.record_tool(None, ToolOutcome::Error, Duration::from_millis(40));
        metrics.sse_connected();

        let text = metrics.render(7);
        assert!(text.contains("arbiter_tool_requests_total{tool=\"judge\",outcome=\"ok\"} 2"));
        assert!(text.contains("arbiter_tool_requests_total{tool=\"unknown\",outcome=\"error\"} 1"));
        assert!(text.contains("arbiter_tool_latency_ms_count 3"));
        assert!(text.contains("arbiter_sse_clients 1"));
        assert!(text.contains("arbiter_bus_events_dropped_total 7"));
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let metrics = PrometheusMetrics::new();
        metrics.record_tool(Some(ToolName::Search), ToolOutcome::Ok, Duration::from_millis(1));
        metrics.record_tool(Some(ToolName::Search), ToolOutcome::Ok, Duration::from_millis(20));
        let text = metrics.render(0);
        assert!(text.contains("arbiter_tool_latency_ms_bucket{le=\"1\"} 1"));
        assert!(text.contains("arbiter_tool_latency_ms_bucket{le=\"25\"} 2"));
        assert!(text.contains("arbiter_tool_latency_ms_bucket{le=\"+Inf\"} 2"));
    }
}
