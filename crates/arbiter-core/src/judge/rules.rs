// crates/arbiter-core/src/judge/rules.rs
// ============================================================================
// Module: Arbiter Dimension Rules
// Description: Raw scoring rules mapping item facts to dimension scores.
// Purpose: Produce a deterministic [0, 1] score for each rubric dimension.
// Dependencies: crate::core::{item, rubric}, crate::judge::facts
// ============================================================================

//! ## Overview
//! One rule per rubric dimension. Rules are pure functions of the extracted
//! facts and the item shape; they never read the clock, never randomize, and
//! always return a value in [0, 1]. Pinned caller scores bypass these rules
//! entirely.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::item::Item;
use crate::core::item::ItemType;
use crate::core::rubric::Dimension;
use crate::judge::facts::ItemFacts;
use crate::judge::facts::vocab;

// ============================================================================
// SECTION: Scoring Helpers
// ============================================================================

/// Clamps a score into [0, 1].
#[must_use]
pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Smooth saturation: approaches 1 as `count` grows past `scale`.
fn saturate(count: usize, scale: f64) -> f64 {
    let value = to_f64(count);
    value / (value + scale)
}

/// Converts a count to `f64` without truncation warnings.
fn to_f64(value: usize) -> f64 {
    u32::try_from(value).map_or(f64::from(u32::MAX), f64::from)
}

/// Scores distance from an ideal band: 1 inside, decaying outside.
fn band(value: f64, low: f64, high: f64) -> f64 {
    if value >= low && value <= high {
        1.0
    } else if value < low {
        clamp01(value / low.max(f64::MIN_POSITIVE))
    } else {
        clamp01(high / value.max(f64::MIN_POSITIVE))
    }
}

// ============================================================================
// SECTION: Dimension Rules
// ============================================================================

/// Computes the raw score for one dimension.
#[must_use]
pub fn raw_score(dimension: Dimension, item: &Item, facts: &ItemFacts) -> f64 {
    let score = match dimension {
        Dimension::SourcePresence => source_presence(facts),
        Dimension::SourceDiversity => source_diversity(facts),
        Dimension::Verification => verification(item),
        Dimension::ClaimSupport => claim_support(facts),
        Dimension::HedgeBalance => hedge_balance(facts),
        Dimension::NumericConsistency => numeric_consistency(facts),
        Dimension::ContradictionAbsence => {
            1.0 - 0.8 * saturate(facts.hits(vocab::CONTRADICTION), 1.0)
        }
        Dimension::LengthBalance => length_balance(item.item_type, facts),
        Dimension::Redundancy => clamp01((facts.unique_word_ratio - 0.3) / 0.5),
        Dimension::Structure => structure(facts),
        Dimension::Readability => band(facts.avg_sentence_len, 6.0, 24.0),
        Dimension::TermConsistency => term_consistency(facts),
        Dimension::Specificity => specificity(facts),
        Dimension::SyntacticValidity => syntactic_validity(item.item_type, facts),
        Dimension::InternalCoherence => {
            0.85 - 0.35
                * saturate(
                    facts.hits(vocab::CONTRADICTION) + facts.hits(vocab::VAGUE),
                    2.0,
                )
        }
        Dimension::EdgeAwareness => 0.3 + 0.7 * saturate(facts.hits(vocab::EDGE), 2.0),
        Dimension::MethodDisclosure => 0.25 + 0.75 * saturate(facts.hits(vocab::METHOD), 2.0),
        Dimension::ErrorHandling => error_handling(item.item_type, facts),
        Dimension::TestEvidence => 0.2 + 0.8 * saturate(facts.hits(vocab::TEST), 2.0),
        Dimension::Actionability => {
            0.25 + 0.75 * saturate(facts.hits(vocab::ACTION) + facts.bullet_count, 3.0)
        }
        Dimension::Novelty => {
            0.8 - 0.5 * saturate(facts.hits(vocab::BOILERPLATE), 1.0)
                + 0.2 * saturate(facts.words, 40.0)
        }
        Dimension::ScopeFit => scope_fit(item.item_type, facts),
        Dimension::Completeness => 1.0 - 0.6 * saturate(facts.hits(vocab::DANGLING), 1.0),
        Dimension::Timeliness => timeliness(item.item_type, facts),
        Dimension::RiskDisclosure => 0.3 + 0.7 * saturate(facts.hits(vocab::RISK), 1.0),
    };
    clamp01(score)
}

/// Scores attached and in-text sourcing.
fn source_presence(facts: &ItemFacts) -> f64 {
    if facts.source_count > 0 {
        0.85 + 0.15 * saturate(facts.source_count, 2.0)
    } else if facts.url_count > 0 {
        0.6
    } else if facts.citation_count > 0 {
        0.5
    } else {
        0.2
    }
}

/// Scores source variety.
fn source_diversity(facts: &ItemFacts) -> f64 {
    if facts.source_count == 0 {
        return 0.3 + 0.3 * saturate(facts.url_count, 2.0);
    }
    let variety = to_f64(facts.distinct_sources) / to_f64(facts.source_count).max(1.0);
    0.3 + 0.7 * variety * saturate(facts.source_count, 1.0)
}

/// Scores the caller-supplied verification flag.
fn verification(item: &Item) -> f64 {
    match item.verified {
        Some(true) => 1.0,
        Some(false) => 0.25,
        None => 0.5,
    }
}

/// Scores how well claims are backed by citations and sources.
fn claim_support(facts: &ItemFacts) -> f64 {
    if facts.sentences == 0 {
        return 0.5;
    }
    let support = to_f64(facts.citation_count + facts.url_count + facts.source_count);
    clamp01(0.3 + 0.7 * (support / to_f64(facts.sentences)))
}

/// Scores hedging density: absent and dominant hedging both lose points.
fn hedge_balance(facts: &ItemFacts) -> f64 {
    if facts.words == 0 {
        return 0.0;
    }
    let density = to_f64(facts.hits(vocab::HEDGE)) / to_f64(facts.words);
    if density == 0.0 {
        0.55
    } else {
        band(density, 0.005, 0.04)
    }
}

/// Scores numeric sanity: digits present but not dominating.
fn numeric_consistency(facts: &ItemFacts) -> f64 {
    if facts.digit_ratio == 0.0 {
        0.6
    } else if facts.digit_ratio < 0.35 {
        0.85
    } else {
        0.45
    }
}

/// Scores content length against the informative band for the item type.
fn length_balance(item_type: ItemType, facts: &ItemFacts) -> f64 {
    let (low, high) = match item_type {
        ItemType::Note | ItemType::Other => (10.0, 250.0),
        ItemType::Code => (5.0, 400.0),
        ItemType::Commit => (6.0, 80.0),
        ItemType::Claim => (4.0, 60.0),
        ItemType::Event => (3.0, 120.0),
    };
    band(to_f64(facts.words), low, high)
}

/// Scores visible structure, with a neutral floor for short content.
fn structure(facts: &ItemFacts) -> f64 {
    if facts.words < 30 {
        return 0.6;
    }
    let markers = facts.bullet_count + facts.heading_count + facts.paragraph_count.saturating_sub(1);
    0.35 + 0.65 * saturate(markers, 2.0)
}

/// Scores identifier style consistency.
fn term_consistency(facts: &ItemFacts) -> f64 {
    if facts.mixed_identifier_styles { 0.45 } else { 0.85 }
}

/// Scores concrete over vague phrasing.
fn specificity(facts: &ItemFacts) -> f64 {
    let concrete = to_f64(facts.concrete_count);
    let vague = to_f64(facts.hits(vocab::VAGUE));
    clamp01((1.0 + concrete) / (1.0 + concrete + 2.0_f64.mul_add(vague, 1.0)))
}

/// Scores syntactic validity hints, strict for code items.
fn syntactic_validity(item_type: ItemType, facts: &ItemFacts) -> f64 {
    match (item_type, facts.balanced_delimiters) {
        (ItemType::Code, true) => 0.95,
        (ItemType::Code, false) => 0.2,
        (_, true) => 0.8,
        (_, false) => 0.4,
    }
}

/// Scores failure-path coverage, weighted for code and commits.
fn error_handling(item_type: ItemType, facts: &ItemFacts) -> f64 {
    let signal = saturate(facts.hits(vocab::ERROR), 2.0);
    match item_type {
        ItemType::Code | ItemType::Commit => 0.7_f64.mul_add(signal, 0.3),
        _ => 0.3_f64.mul_add(signal, 0.5),
    }
}

/// Scores whether the content matches its declared type.
fn scope_fit(item_type: ItemType, facts: &ItemFacts) -> f64 {
    match item_type {
        ItemType::Code => {
            if facts.code_hints {
                0.95
            } else {
                0.4
            }
        }
        ItemType::Claim => {
            if facts.sentences <= 3 {
                0.9
            } else {
                0.6
            }
        }
        ItemType::Event => {
            if facts.has_date || facts.digit_ratio > 0.0 {
                0.85
            } else {
                0.55
            }
        }
        ItemType::Note | ItemType::Commit | ItemType::Other => 0.75,
    }
}

/// Scores temporal anchoring, weighted for events and commits.
fn timeliness(item_type: ItemType, facts: &ItemFacts) -> f64 {
    let anchored = facts.has_date || facts.hits(vocab::TIME) > 0;
    match (item_type, anchored) {
        (ItemType::Event | ItemType::Commit, true) => 0.9,
        (ItemType::Event | ItemType::Commit, false) => 0.45,
        (_, true) => 0.85,
        (_, false) => 0.6,
    }
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

    use super::raw_score;
    use crate::core::item::Item;
    use crate::core::item::ItemType;
    use crate::core::rubric::Dimension;
    use crate::judge::facts::ItemFacts;

    #[test]
    fn every_rule_stays_in_unit_interval() {
        let samples = [
            Item::new(ItemType::Note, "hello"),
            Item::new(ItemType::Code, "fn main() { println!(\"ok\"); }"),
            Item::new(ItemType::Claim, "Latency dropped 40% after the fix [1]."),
            Item::new(ItemType::Event, "deploy finished at 2026-01-12T10:00Z"),
        ];
        for item in &samples {
            let facts = ItemFacts::extract(item);
            for dimension in Dimension::ALL {
                let score = raw_score(dimension, item, &facts);
                assert!((0.0..=1.0).contains(&score), "{dimension} out of range: {score}");
            }
        }
    }

    #[test]
    fn sourced_items_outscore_unsourced_on_source_presence() {
        let mut sourced = Item::new(ItemType::Claim, "Latency dropped.");
        sourced.sources = vec!["https://example.com/report".to_string()];
        let bare = Item::new(ItemType::Claim, "Latency dropped.");
        let sourced_score = raw_score(
            Dimension::SourcePresence,
            &sourced,
            &ItemFacts::extract(&sourced),
        );
        let bare_score =
            raw_score(Dimension::SourcePresence, &bare, &ItemFacts::extract(&bare));
        assert!(sourced_score > bare_score);
    }

    #[test]
    fn broken_code_scores_low_on_syntactic_validity() {
        let broken = Item::new(ItemType::Code, "fn broken( {");
        let score = raw_score(
            Dimension::SyntacticValidity,
            &broken,
            &ItemFacts::extract(&broken),
        );
        assert!(score < 0.3);
    }

    #[test]
    fn verified_flag_drives_verification_score() {
        let mut item = Item::new(ItemType::Note, "checked");
        item.verified = Some(true);
        let facts = ItemFacts::extract(&item);
        assert!((raw_score(Dimension::Verification, &item, &facts) - 1.0).abs() < f64::EPSILON);
        item.verified = Some(false);
        assert!(raw_score(Dimension::Verification, &item, &ItemFacts::extract(&item)) < 0.3);
    }
}
