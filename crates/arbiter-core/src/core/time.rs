// crates/arbiter-core/src/core/time.rs
// ============================================================================
// Module: Arbiter Time Model
// Description: Unix-millisecond timestamps for judgments, blocks, and feedback.
// Purpose: Keep wall-clock reads at the edges so scoring stays deterministic.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Arbiter records all durable timestamps as unix epoch milliseconds. The
//! judge itself never reads the clock; timestamps are assigned by the
//! persistence layer and the chain manager at write time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Unix epoch milliseconds.
pub type TimestampMs = i64;

/// Returns the current wall-clock time as unix milliseconds.
///
/// Clamps to `i64::MAX` on overflow rather than failing; a clock that far in
/// the future is unrepresentable in every store anyway.
#[must_use]
pub fn now_millis() -> TimestampMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}
