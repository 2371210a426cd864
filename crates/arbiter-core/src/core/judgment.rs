// crates/arbiter-core/src/core/judgment.rs
// ============================================================================
// Module: Arbiter Judgment Model
// Description: The scored output of evaluating one item.
// Purpose: Define the immutable judgment record and its verdict vocabulary.
// Dependencies: serde, crate::core::{identifiers, item, rubric, time}
// ============================================================================

//! ## Overview
//! A judgment is the durable result of scoring one item: 25 dimension scores,
//! 4 axiom aggregates, a composite `q_score`, a verdict band, a capped
//! confidence, and the enumerated weaknesses. Judgments are immutable once
//! stored; only `block_slot` is set, exactly once, by the chain manager.
//! Invariants:
//! - `dimension_scores` keys are exactly [`crate::core::rubric::Dimension::ALL`].
//! - `axiom_scores` derives from `dimension_scores` by a pure function.
//! - `confidence` never exceeds the configured maximum.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::JudgmentId;
use crate::core::identifiers::SessionId;
use crate::core::identifiers::UserId;
use crate::core::item::ItemType;
use crate::core::rubric::Axiom;
use crate::core::rubric::Dimension;
use crate::core::time::TimestampMs;

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Discrete category assigned to a judgment from its composite score.
///
/// # Invariants
/// - Ordering follows favorability: `Reject < Concern < Accept < StrongAccept`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    /// Composite score below the concern band.
    Reject,
    /// Composite score in the concern band.
    Concern,
    /// Composite score in the accept band.
    Accept,
    /// Composite score in the top band.
    StrongAccept,
}

impl Verdict {
    /// Every verdict in ascending favorability order.
    pub const ALL: [Self; 4] = [Self::Reject, Self::Concern, Self::Accept, Self::StrongAccept];

    /// Returns the stable label for the verdict.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Concern => "concern",
            Self::Accept => "accept",
            Self::StrongAccept => "strong-accept",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Weakness
// ============================================================================

/// A dimension scoring below the concern threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weakness {
    /// Weak dimension.
    pub dimension: Dimension,
    /// Score the dimension received.
    pub score: f64,
    /// Distance below the concern threshold.
    pub deficit: f64,
}

// ============================================================================
// SECTION: Judgment Draft
// ============================================================================

/// Judge output before persistence assigns identity and timestamps.
///
/// # Invariants
/// - Field semantics match [`Judgment`]; only identity fields are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgmentDraft {
    /// Kind of the judged item.
    pub item_type: ItemType,
    /// Denormalized snapshot of the item content.
    pub item_content: String,
    /// Scores for every dimension, in [0, 1].
    pub dimension_scores: BTreeMap<Dimension, f64>,
    /// Aggregated axiom scores, in [0, 1].
    pub axiom_scores: BTreeMap<Axiom, f64>,
    /// Composite score in 0..=100.
    pub q_score: u8,
    /// Verdict band for the composite score.
    pub verdict: Verdict,
    /// Capped confidence in the verdict.
    pub confidence: f64,
    /// Dimensions below the concern threshold, ascending by score.
    pub weaknesses: Vec<Weakness>,
}

// ============================================================================
// SECTION: Judgment
// ============================================================================

/// The durable, immutable result of scoring one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    /// Stable identifier minted by the persistence layer.
    pub id: JudgmentId,
    /// Kind of the judged item.
    pub item_type: ItemType,
    /// Denormalized snapshot of the item content.
    pub item_content: String,
    /// Scores for every dimension, in [0, 1].
    pub dimension_scores: BTreeMap<Dimension, f64>,
    /// Aggregated axiom scores, in [0, 1].
    pub axiom_scores: BTreeMap<Axiom, f64>,
    /// Composite score in 0..=100.
    pub q_score: u8,
    /// Verdict band for the composite score.
    pub verdict: Verdict,
    /// Capped confidence in the verdict.
    pub confidence: f64,
    /// Dimensions below the concern threshold, ascending by score.
    pub weaknesses: Vec<Weakness>,
    /// Optional user isolation key.
    pub user_id: Option<UserId>,
    /// Optional session isolation key.
    pub session_id: Option<SessionId>,
    /// Creation timestamp assigned by the persistence layer.
    pub created_at: TimestampMs,
    /// Slot of the block that sealed this judgment; set once by the chain.
    pub block_slot: Option<u64>,
}

impl Judgment {
    /// Builds a judgment from a draft plus persistence-assigned identity.
    #[must_use]
    pub fn from_draft(
        draft: JudgmentDraft,
        id: JudgmentId,
        user_id: Option<UserId>,
        session_id: Option<SessionId>,
        created_at: TimestampMs,
    ) -> Self {
        Self {
            id,
            item_type: draft.item_type,
            item_content: draft.item_content,
            dimension_scores: draft.dimension_scores,
            axiom_scores: draft.axiom_scores,
            q_score: draft.q_score,
            verdict: draft.verdict,
            confidence: draft.confidence,
            weaknesses: draft.weaknesses,
            user_id,
            session_id,
            created_at,
            block_slot: None,
        }
    }
}
