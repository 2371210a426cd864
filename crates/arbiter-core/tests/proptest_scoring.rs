// crates/arbiter-core/tests/proptest_scoring.rs
// ============================================================================
// Module: Scoring Property Tests
// Description: Determinism, bounds, and commitment properties under fuzzing.
// ============================================================================
//! ## Overview
//! Property tests over arbitrary item content: scoring is deterministic and
//! bounded, verdict bands are monotone, and merkle/block commitments are
//! stable and order-sensitive.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use arbiter_core::Block;
use arbiter_core::Item;
use arbiter_core::ItemType;
use arbiter_core::Judge;
use arbiter_core::JudgmentId;
use arbiter_core::ScoringContext;
use arbiter_core::VerdictThresholds;
use arbiter_core::core::Dimension;
use arbiter_core::merkle_root;
use proptest::prelude::*;

/// Strategy over item types.
fn item_type_strategy() -> impl Strategy<Value = ItemType> {
    prop_oneof![
        Just(ItemType::Note),
        Just(ItemType::Code),
        Just(ItemType::Commit),
        Just(ItemType::Claim),
        Just(ItemType::Event),
    ]
}

/// Strategy over non-empty printable content.
fn content_strategy() -> impl Strategy<Value = String> {
    "[ -~]{1,400}".prop_filter("content must not be blank", |s| !s.trim().is_empty())
}

proptest! {
    #[test]
    fn scoring_is_deterministic_for_any_item(
        item_type in item_type_strategy(),
        content in content_strategy(),
    ) {
        let judge = Judge::default();
        let item = Item::new(item_type, content);
        let first = judge.score(&item, &ScoringContext::default()).expect("first");
        let second = judge.score(&item, &ScoringContext::default()).expect("second");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn scores_stay_bounded_for_any_item(
        item_type in item_type_strategy(),
        content in content_strategy(),
    ) {
        let judge = Judge::default();
        let item = Item::new(item_type, content);
        let draft = judge.score(&item, &ScoringContext::default()).expect("draft");
        prop_assert!(draft.q_score <= 100);
        prop_assert!(draft.confidence <= 0.618);
        prop_assert_eq!(draft.dimension_scores.len(), Dimension::ALL.len());
        for score in draft.dimension_scores.values() {
            prop_assert!((0.0..=1.0).contains(score));
        }
        for score in draft.axiom_scores.values() {
            prop_assert!((0.0..=1.0).contains(score));
        }
    }

    #[test]
    fn verdicts_never_regress_with_score(a in 0u8..=100, b in 0u8..=100) {
        let thresholds = VerdictThresholds::default();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(thresholds.verdict_for(low) <= thresholds.verdict_for(high));
    }

    #[test]
    fn merkle_root_is_stable_and_order_sensitive(
        ids in prop::collection::vec("[a-z0-9]{1,12}", 1..32),
    ) {
        let leaves: Vec<JudgmentId> =
            ids.iter().map(|id| JudgmentId::new(id.clone())).collect();
        let root = merkle_root(&leaves);
        prop_assert_eq!(root.len(), 64);
        prop_assert_eq!(root.clone(), merkle_root(&leaves));
        if leaves.len() > 1 && leaves.first() != leaves.last() {
            let mut reversed = leaves.clone();
            reversed.reverse();
            prop_assert_ne!(root, merkle_root(&reversed));
        }
    }

    #[test]
    fn sealed_blocks_always_link_and_recompute(
        batches in prop::collection::vec(
            prop::collection::vec("[a-z0-9]{1,8}", 1..6),
            1..6,
        ),
    ) {
        let mut prev = Block::genesis(1).expect("genesis");
        let mut created_at = 2i64;
        let mut counter = 0usize;
        for batch in batches {
            let ids: Vec<JudgmentId> = batch
                .iter()
                .map(|suffix| {
                    counter += 1;
                    JudgmentId::new(format!("j-{counter}-{suffix}"))
                })
                .collect();
            let block = Block::seal_after(&prev, ids, created_at).expect("seal");
            prop_assert_eq!(block.slot, prev.slot + 1);
            prop_assert_eq!(block.prev_hash.clone(), prev.hash.clone());
            prop_assert_eq!(
                block.merkle_root.clone(),
                merkle_root(&block.judgment_ids)
            );
            prop_assert_eq!(block.hash.clone(), block.recompute_hash().expect("recompute"));
            created_at += 1;
            prev = block;
        }
    }
}
