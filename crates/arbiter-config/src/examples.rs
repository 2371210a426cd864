// crates/arbiter-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payloads.
// Purpose: Deterministic examples for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical examples for Arbiter configuration. Outputs are deterministic
//! and always parse and validate against the current model.

/// Returns a canonical example `arbiter.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:8080"
max_body_bytes = 1048576

[server.limits]
max_inflight = 256
# rate_limit = { max_requests = 1000, window_ms = 1000, max_entries = 4096 }

# [server.auth]
# bearer_tokens = ["replace-me"]

[server.audit]
enabled = false
# path = "arbiter-audit.jsonl"

[scoring]
max_confidence = 0.618
concern_threshold = 0.382

[scoring.verdict_thresholds]
concern_min = 38
accept_min = 62
strong_accept_min = 85

[batch]
batch_size = 13
flush_interval_ms = 5000
max_queue_size = 89

[chain]
# batch_size = 13
# flush_interval_ms = 5000

[sse]
heartbeat_interval_ms = 15000
channel_capacity = 256

[learning]
auto_calibrate = true
calibrate_threshold = 21
modifier_range = 0.236
modifier_step = 0.089

[triggers]
periodic_interval_ms = 60000

[persistence]
kind = "sqlite"
path = "arbiter.db"
busy_timeout_ms = 5000
"#,
    )
}
