// crates/arbiter-core/src/core/feedback.rs
// ============================================================================
// Module: Arbiter Feedback Model
// Description: Post-hoc assessments of judgment correctness.
// Purpose: Define the append-only feedback record consumed by the learning loop.
// Dependencies: serde, crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! Feedback records tie a human or downstream assessment to an existing
//! judgment. They are append-only and drive the learning loop's calibration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::FeedbackId;
use crate::core::identifiers::JudgmentId;
use crate::core::identifiers::SessionId;
use crate::core::identifiers::UserId;
use crate::core::time::TimestampMs;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Assessment of a judgment's correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackOutcome {
    /// The judgment was right.
    Correct,
    /// The judgment was wrong.
    Incorrect,
    /// The judgment was partially right.
    Partial,
}

impl FeedbackOutcome {
    /// Returns the stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Incorrect => "incorrect",
            Self::Partial => "partial",
        }
    }
}

impl fmt::Display for FeedbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Feedback
// ============================================================================

/// Feedback submission before persistence assigns identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFeedback {
    /// Judgment the feedback refers to.
    pub judgment_id: JudgmentId,
    /// Assessment outcome.
    pub outcome: FeedbackOutcome,
    /// Optional free-text reason.
    pub reason: Option<String>,
    /// Optional observed composite score in 0..=100.
    pub actual_score: Option<u8>,
    /// Optional user isolation key.
    pub user_id: Option<UserId>,
    /// Optional session isolation key.
    pub session_id: Option<SessionId>,
}

/// Durable, append-only feedback record.
///
/// # Invariants
/// - `judgment_id` refers to an existing judgment at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Stable identifier minted by the persistence layer.
    pub id: FeedbackId,
    /// Judgment the feedback refers to.
    pub judgment_id: JudgmentId,
    /// Assessment outcome.
    pub outcome: FeedbackOutcome,
    /// Optional free-text reason.
    pub reason: Option<String>,
    /// Optional observed composite score in 0..=100.
    pub actual_score: Option<u8>,
    /// Optional user isolation key.
    pub user_id: Option<UserId>,
    /// Optional session isolation key.
    pub session_id: Option<SessionId>,
    /// Creation timestamp assigned by the persistence layer.
    pub created_at: TimestampMs,
}

impl Feedback {
    /// Builds a feedback record from a submission plus assigned identity.
    #[must_use]
    pub fn from_new(new: NewFeedback, id: FeedbackId, created_at: TimestampMs) -> Self {
        Self {
            id,
            judgment_id: new.judgment_id,
            outcome: new.outcome,
            reason: new.reason,
            actual_score: new.actual_score,
            user_id: new.user_id,
            session_id: new.session_id,
            created_at,
        }
    }
}
