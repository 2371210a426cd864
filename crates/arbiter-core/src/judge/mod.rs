// crates/arbiter-core/src/judge/mod.rs
// ============================================================================
// Module: Arbiter Judge
// Description: Deterministic scoring of items into complete judgment drafts.
// Purpose: Turn an item plus scoring context into dimensions, axioms, and verdict.
// Dependencies: crate::core, crate::judge::{facts, rules}
// ============================================================================

//! ## Overview
//! The judge is a pure function: item and context in, judgment draft out. It
//! performs no I/O, reads no clock, and uses no randomness, so identical
//! inputs always produce identical drafts.
//! Invariants:
//! - `dimension_scores` carries exactly the 25 rubric dimensions.
//! - `confidence` never exceeds the configured maximum.
//! - Verdict bands are monotone in the composite score.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod facts;
pub mod rules;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::Axiom;
use crate::core::Dimension;
use crate::core::Item;
use crate::core::JudgmentDraft;
use crate::core::LearningState;
use crate::core::Verdict;
use crate::core::Weakness;
use crate::judge::facts::ItemFacts;
use crate::judge::rules::clamp01;
use crate::judge::rules::raw_score;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default upper bound on judgment confidence (reciprocal of the golden ratio).
pub const DEFAULT_MAX_CONFIDENCE: f64 = 0.618;
/// Default threshold below which a dimension counts as a weakness.
pub const DEFAULT_CONCERN_THRESHOLD: f64 = 0.382;
/// Weight given to a supplied knowledge prior when blending the composite.
const PRIOR_WEIGHT: f64 = 0.1;

// ============================================================================
// SECTION: Verdict Thresholds
// ============================================================================

/// Composite-score cut points separating the four verdict bands.
///
/// # Invariants
/// - `concern_min < accept_min < strong_accept_min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictThresholds {
    /// Scores below this are `reject`.
    pub concern_min: u8,
    /// Scores below this (and at least `concern_min`) are `concern`.
    pub accept_min: u8,
    /// Scores below this (and at least `accept_min`) are `accept`.
    pub strong_accept_min: u8,
}

impl Default for VerdictThresholds {
    fn default() -> Self {
        // Cut points derived from the reciprocal of the golden ratio:
        // 38.2, 61.8, and 61.8 + 38.2 * 0.618.
        Self {
            concern_min: 38,
            accept_min: 62,
            strong_accept_min: 85,
        }
    }
}

impl VerdictThresholds {
    /// Maps a composite score to its verdict band.
    #[must_use]
    pub const fn verdict_for(&self, q_score: u8) -> Verdict {
        if q_score >= self.strong_accept_min {
            Verdict::StrongAccept
        } else if q_score >= self.accept_min {
            Verdict::Accept
        } else if q_score >= self.concern_min {
            Verdict::Concern
        } else {
            Verdict::Reject
        }
    }

    /// Returns true when the cut points are strictly ordered.
    #[must_use]
    pub const fn is_ordered(&self) -> bool {
        self.concern_min < self.accept_min && self.accept_min < self.strong_accept_min
    }
}

// ============================================================================
// SECTION: Scoring Config
// ============================================================================

/// Static configuration for the judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Upper bound on confidence; always below 1.
    pub max_confidence: f64,
    /// Threshold below which a dimension counts as a weakness.
    pub concern_threshold: f64,
    /// Verdict band cut points.
    pub thresholds: VerdictThresholds,
    /// Composite weights per axiom; missing entries use rubric defaults.
    #[serde(default)]
    pub axiom_weights: BTreeMap<Axiom, f64>,
    /// Within-axiom weights per dimension; missing entries default to 1.
    #[serde(default)]
    pub dimension_weights: BTreeMap<Dimension, f64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_confidence: DEFAULT_MAX_CONFIDENCE,
            concern_threshold: DEFAULT_CONCERN_THRESHOLD,
            thresholds: VerdictThresholds::default(),
            axiom_weights: BTreeMap::new(),
            dimension_weights: BTreeMap::new(),
        }
    }
}

impl ScoringConfig {
    /// Returns the composite weight for an axiom.
    #[must_use]
    pub fn axiom_weight(&self, axiom: Axiom) -> f64 {
        self.axiom_weights.get(&axiom).copied().unwrap_or_else(|| axiom.default_weight())
    }

    /// Returns the within-axiom weight for a dimension.
    #[must_use]
    pub fn dimension_weight(&self, dimension: Dimension) -> f64 {
        self.dimension_weights.get(&dimension).copied().unwrap_or(1.0)
    }
}

// ============================================================================
// SECTION: Scoring Context
// ============================================================================

/// Per-call context the pipeline hands to the judge.
#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    /// Learning state snapshot applied as additive dimension modifiers.
    pub learning: Option<Arc<LearningState>>,
    /// Optional knowledge prior in [0, 1] blended into the composite.
    pub prior: Option<f64>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Judge errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum JudgeError {
    /// Item was malformed: missing type information or empty content.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

// ============================================================================
// SECTION: Judge
// ============================================================================

/// Deterministic item scorer.
#[derive(Debug, Clone, Default)]
pub struct Judge {
    /// Static scoring configuration.
    config: ScoringConfig,
}

impl Judge {
    /// Creates a judge with the given configuration.
    #[must_use]
    pub const fn new(config: ScoringConfig) -> Self {
        Self {
            config,
        }
    }

    /// Returns the scoring configuration.
    #[must_use]
    pub const fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Scores an item into a complete judgment draft.
    ///
    /// # Errors
    ///
    /// Returns [`JudgeError::InvalidInput`] for empty content. Scoring-range
    /// issues never error; every score is clamped.
    pub fn score(&self, item: &Item, context: &ScoringContext) -> Result<JudgmentDraft, JudgeError> {
        if item.content.trim().is_empty() {
            return Err(JudgeError::InvalidInput("item content is empty".to_string()));
        }
        let facts = ItemFacts::extract(item);

        let mut dimension_scores = BTreeMap::new();
        for dimension in Dimension::ALL {
            let raw = item
                .pinned_scores
                .get(&dimension)
                .copied()
                .map_or_else(|| raw_score(dimension, item, &facts), clamp01);
            let modifier = context
                .learning
                .as_ref()
                .map_or(0.0, |learning| learning.modifier(dimension));
            dimension_scores.insert(dimension, clamp01(raw + modifier));
        }

        let axiom_scores = self.aggregate_axioms(&dimension_scores);
        let composite = self.composite(&axiom_scores, context.prior);
        let q_score = round_composite(composite);
        let verdict = self.config.thresholds.verdict_for(q_score);
        let confidence = self.confidence(q_score, &axiom_scores);
        let weaknesses = self.weaknesses(&dimension_scores);

        Ok(JudgmentDraft {
            item_type: item.item_type,
            item_content: item.content.clone(),
            dimension_scores,
            axiom_scores,
            q_score,
            verdict,
            confidence,
            weaknesses,
        })
    }

    /// Aggregates dimension scores into per-axiom weighted means.
    fn aggregate_axioms(
        &self,
        dimension_scores: &BTreeMap<Dimension, f64>,
    ) -> BTreeMap<Axiom, f64> {
        let mut axiom_scores = BTreeMap::new();
        for axiom in Axiom::ALL {
            let mut weighted = 0.0;
            let mut weight_sum = 0.0;
            for dimension in axiom.dimensions() {
                let weight = self.config.dimension_weight(dimension).max(0.0);
                let score = dimension_scores.get(&dimension).copied().unwrap_or(0.0);
                weighted += weight * score;
                weight_sum += weight;
            }
            let score = if weight_sum > 0.0 { weighted / weight_sum } else { 0.0 };
            axiom_scores.insert(axiom, clamp01(score));
        }
        axiom_scores
    }

    /// Computes the composite in [0, 1], blending an optional prior.
    fn composite(&self, axiom_scores: &BTreeMap<Axiom, f64>, prior: Option<f64>) -> f64 {
        let mut weighted = 0.0;
        let mut weight_sum = 0.0;
        for axiom in Axiom::ALL {
            let weight = self.config.axiom_weight(axiom).max(0.0);
            weighted += weight * axiom_scores.get(&axiom).copied().unwrap_or(0.0);
            weight_sum += weight;
        }
        let mut composite = if weight_sum > 0.0 { weighted / weight_sum } else { 0.0 };
        if let Some(prior) = prior {
            composite = composite * (1.0 - PRIOR_WEIGHT) + clamp01(prior) * PRIOR_WEIGHT;
        }
        clamp01(composite)
    }

    /// Computes capped confidence, monotone in the composite and the weakest
    /// axiom.
    fn confidence(&self, q_score: u8, axiom_scores: &BTreeMap<Axiom, f64>) -> f64 {
        let min_axiom = axiom_scores.values().copied().fold(1.0, f64::min);
        let q = f64::from(q_score) / 100.0;
        let raw = self.config.max_confidence * 0.3_f64.mul_add(min_axiom, 0.7 * q);
        raw.min(self.config.max_confidence)
    }

    /// Enumerates dimensions below the concern threshold, ascending by score.
    fn weaknesses(&self, dimension_scores: &BTreeMap<Dimension, f64>) -> Vec<Weakness> {
        let threshold = self.config.concern_threshold;
        let mut weaknesses: Vec<Weakness> = dimension_scores
            .iter()
            .filter(|(_, score)| **score < threshold)
            .map(|(dimension, score)| Weakness {
                dimension: *dimension,
                score: *score,
                deficit: threshold - *score,
            })
            .collect();
        weaknesses.sort_by(|a, b| a.score.total_cmp(&b.score));
        weaknesses
    }
}

/// Rounds a [0, 1] composite to an integer score in 0..=100.
fn round_composite(composite: f64) -> u8 {
    let scaled = (composite.clamp(0.0, 1.0) * 100.0).round();
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "value is clamped to 0..=100 before conversion"
    )]
    let q_score = scaled as u8;
    q_score
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

    use std::sync::Arc;

    use super::Judge;
    use super::ScoringConfig;
    use super::ScoringContext;
    use super::VerdictThresholds;
    use crate::core::Dimension;
    use crate::core::Item;
    use crate::core::ItemType;
    use crate::core::LearningState;
    use crate::core::Verdict;

    fn sample_item() -> Item {
        let mut item = Item::new(
            ItemType::Claim,
            "Latency dropped 40% after the cache fix, measured over 3 days [1].",
        );
        item.sources = vec!["https://example.com/dashboard".to_string()];
        item.verified = Some(true);
        item
    }

    #[test]
    fn scoring_is_deterministic() {
        let judge = Judge::default();
        let item = sample_item();
        let first = judge.score(&item, &ScoringContext::default()).expect("first");
        let second = judge.score(&item, &ScoringContext::default()).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn empty_content_is_rejected() {
        let judge = Judge::default();
        let item = Item::new(ItemType::Note, "   ");
        assert!(judge.score(&item, &ScoringContext::default()).is_err());
    }

    #[test]
    fn confidence_never_exceeds_maximum() {
        let judge = Judge::default();
        let mut item = sample_item();
        for dimension in Dimension::ALL {
            item.pinned_scores.insert(dimension, 1.0);
        }
        let draft = judge.score(&item, &ScoringContext::default()).expect("draft");
        assert!(draft.confidence <= judge.config().max_confidence);
        assert_eq!(draft.q_score, 100);
        assert_eq!(draft.verdict, Verdict::StrongAccept);
    }

    #[test]
    fn pinned_scores_are_clamped_and_used() {
        let judge = Judge::default();
        let mut item = sample_item();
        item.pinned_scores.insert(Dimension::Novelty, 7.5);
        let draft = judge.score(&item, &ScoringContext::default()).expect("draft");
        let novelty = draft.dimension_scores.get(&Dimension::Novelty).copied();
        assert_eq!(novelty, Some(1.0));
    }

    #[test]
    fn learning_modifiers_shift_scores() {
        let judge = Judge::default();
        let item = sample_item();
        let baseline = judge.score(&item, &ScoringContext::default()).expect("baseline");

        let mut learning = LearningState::default();
        for dimension in Dimension::ALL {
            learning.modifiers.insert(dimension, -0.2);
        }
        let context = ScoringContext {
            learning: Some(Arc::new(learning)),
            prior: None,
        };
        let adjusted = judge.score(&item, &context).expect("adjusted");
        assert!(adjusted.q_score < baseline.q_score);
    }

    #[test]
    fn verdict_bands_are_monotone() {
        let thresholds = VerdictThresholds::default();
        let mut previous = thresholds.verdict_for(0);
        for q_score in 0..=100 {
            let verdict = thresholds.verdict_for(q_score);
            assert!(verdict >= previous, "verdict regressed at {q_score}");
            previous = verdict;
        }
    }

    #[test]
    fn weaknesses_sort_ascending_by_score() {
        let judge = Judge::default();
        let mut item = Item::new(ItemType::Note, "short");
        item.pinned_scores.insert(Dimension::Novelty, 0.1);
        item.pinned_scores.insert(Dimension::Structure, 0.05);
        let draft = judge.score(&item, &ScoringContext::default()).expect("draft");
        let scores: Vec<f64> = draft.weaknesses.iter().map(|weakness| weakness.score).collect();
        let mut sorted = scores.clone();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(scores, sorted);
    }

    #[test]
    fn prior_blends_into_composite() {
        let judge = Judge::new(ScoringConfig::default());
        let item = sample_item();
        let low = judge
            .score(
                &item,
                &ScoringContext {
                    learning: None,
                    prior: Some(0.0),
                },
            )
            .expect("low prior");
        let high = judge
            .score(
                &item,
                &ScoringContext {
                    learning: None,
                    prior: Some(1.0),
                },
            )
            .expect("high prior");
        assert!(high.q_score > low.q_score);
    }
}
