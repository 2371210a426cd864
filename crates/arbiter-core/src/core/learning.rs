// crates/arbiter-core/src/core/learning.rs
// ============================================================================
// Module: Arbiter Learning State
// Description: Per-dimension weight modifiers and observed outcome counters.
// Purpose: Define the serializable snapshot exchanged between loop and judge.
// Dependencies: serde, crate::core::{judgment, rubric, time}
// ============================================================================

//! ## Overview
//! `LearningState` is a value type: the judge clones a snapshot at scoring
//! time and the learning loop swaps in replacements atomically. Modifiers are
//! additive adjustments to raw dimension scores, clamped to a bounded range.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::judgment::Verdict;
use crate::core::rubric::Dimension;
use crate::core::time::TimestampMs;

// ============================================================================
// SECTION: Outcome Counters
// ============================================================================

/// Observed feedback outcomes for one verdict band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictOutcomes {
    /// Feedback marked correct.
    pub correct: u64,
    /// Feedback marked incorrect.
    pub incorrect: u64,
    /// Feedback marked partially correct.
    pub partial: u64,
}

impl VerdictOutcomes {
    /// Total observations for the verdict.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.correct + self.incorrect + self.partial
    }
}

// ============================================================================
// SECTION: Bias
// ============================================================================

/// A detected systematic error for one verdict band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bias {
    /// Verdict band exhibiting the bias.
    pub verdict: Verdict,
    /// Observed incorrect rate in [0, 1].
    pub incorrect_rate: f64,
    /// Number of observations backing the detection.
    pub observations: u64,
}

// ============================================================================
// SECTION: Learning State
// ============================================================================

/// Snapshot of learned scoring adjustments.
///
/// # Invariants
/// - `modifiers` values stay within the configured bounded range.
/// - Mutated only by the learning loop; the judge reads snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningState {
    /// Additive per-dimension score modifiers.
    #[serde(default)]
    pub modifiers: BTreeMap<Dimension, f64>,
    /// Observed feedback outcomes per verdict band.
    #[serde(default)]
    pub outcomes: BTreeMap<Verdict, VerdictOutcomes>,
    /// Biases found by the most recent detection pass.
    #[serde(default)]
    pub biases: Vec<Bias>,
    /// Total feedback records processed.
    #[serde(default)]
    pub feedback_seen: u64,
    /// Number of calibration passes applied.
    #[serde(default)]
    pub calibrations: u64,
    /// Timestamp of the last mutation.
    #[serde(default)]
    pub updated_at: TimestampMs,
}

impl LearningState {
    /// Returns the modifier for a dimension, defaulting to zero.
    #[must_use]
    pub fn modifier(&self, dimension: Dimension) -> f64 {
        self.modifiers.get(&dimension).copied().unwrap_or(0.0)
    }
}
