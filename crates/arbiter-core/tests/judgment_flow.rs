// crates/arbiter-core/tests/judgment_flow.rs
// ============================================================================
// Module: Judgment Flow Tests
// Description: End-to-end pipeline, chain, learning, and event scenarios.
// ============================================================================
//! ## Overview
//! Exercises the full request path: score, persist, seal, publish, repair,
//! and feedback-driven calibration, against the in-memory persistence.

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

use std::sync::Arc;

use arbiter_core::CallContext;
use arbiter_core::ChainConfig;
use arbiter_core::ChainManager;
use arbiter_core::EventBus;
use arbiter_core::Item;
use arbiter_core::ItemType;
use arbiter_core::Judge;
use arbiter_core::JudgmentPipeline;
use arbiter_core::LearningConfig;
use arbiter_core::LearningEngine;
use arbiter_core::MemoryPersistence;
use arbiter_core::PipelineCaller;
use arbiter_core::ScoringContext;
use arbiter_core::SharedPersistence;
use arbiter_core::Topic;
use arbiter_core::core::FeedbackOutcome;
use arbiter_core::core::NewFeedback;

/// Wired runtime for one test.
struct Harness {
    /// Shared store.
    persistence: SharedPersistence,
    /// Event bus shared across components.
    bus: EventBus,
    /// Chain manager.
    chain: Arc<ChainManager>,
    /// Learning engine.
    learning: Arc<LearningEngine>,
    /// Pipeline under test.
    pipeline: JudgmentPipeline,
}

fn harness(chain_batch_size: usize) -> Harness {
    let persistence: SharedPersistence = Arc::new(MemoryPersistence::new());
    let bus = EventBus::default();
    let chain = Arc::new(
        ChainManager::new(Arc::clone(&persistence), bus.clone(), ChainConfig {
            batch_size: chain_batch_size,
            flush_interval_ms: 60_000,
            max_queue_size: 1_000,
        })
        .expect("chain"),
    );
    let learning = Arc::new(
        LearningEngine::new(Arc::clone(&persistence), LearningConfig::default())
            .expect("learning"),
    );
    let pipeline = JudgmentPipeline::new(
        Judge::default(),
        Arc::clone(&persistence),
        Arc::clone(&chain),
        bus.clone(),
        Arc::clone(&learning),
    );
    Harness {
        persistence,
        bus,
        chain,
        learning,
        pipeline,
    }
}

fn quality_item() -> Item {
    let mut item = Item::new(
        ItemType::Claim,
        "Latency dropped 40% after the cache fix, measured over 3 days [1]. Risk: cache \
         warmup is slower on cold starts.",
    );
    item.sources = vec!["https://example.com/dashboard".to_string()];
    item.verified = Some(true);
    item
}

#[tokio::test(flavor = "multi_thread")]
async fn single_judgment_single_block() {
    let h = harness(100);
    let receipt = h
        .pipeline
        .judge(
            &Item::new(ItemType::Note, "hello"),
            CallContext::default(),
            PipelineCaller::default(),
        )
        .await
        .expect("receipt");
    assert!(receipt.q_score <= 100);
    assert!(receipt.confidence <= 0.618);

    let genesis = h.persistence.block_by_slot(0).expect("load").expect("genesis");
    let block = h.chain.flush().await.expect("flush").expect("block");
    assert_eq!(block.slot, 1);
    assert_eq!(block.judgment_ids, vec![receipt.id.clone()]);
    assert_eq!(block.prev_hash, genesis.hash);

    let stored = h.persistence.judgment(&receipt.id).expect("load").expect("judgment");
    assert_eq!(stored.block_slot, Some(1));
}

#[tokio::test(flavor = "multi_thread")]
async fn batched_sealing_waits_for_the_third_item() {
    let h = harness(3);
    let mut ids = Vec::new();
    for index in 0..2 {
        let receipt = h
            .pipeline
            .judge(
                &Item::new(ItemType::Note, format!("item {index}")),
                CallContext::default(),
                PipelineCaller::default(),
            )
            .await
            .expect("receipt");
        ids.push(receipt.id);
    }
    assert_eq!(h.chain.status().head_slot, 0, "no block before the third item");

    let receipt = h
        .pipeline
        .judge(
            &Item::new(ItemType::Note, "item 2"),
            CallContext::default(),
            PipelineCaller::default(),
        )
        .await
        .expect("receipt");
    ids.push(receipt.id);

    for _ in 0..100 {
        if h.chain.status().head_slot == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let block = h.persistence.block_by_slot(1).expect("load").expect("sealed block");
    assert_eq!(block.judgment_ids, ids);
    for id in &ids {
        let stored = h.persistence.judgment(id).expect("load").expect("judgment");
        assert_eq!(stored.block_slot, Some(1));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn adopt_recovers_seeded_orphans() {
    let persistence: SharedPersistence = Arc::new(MemoryPersistence::new());
    let judge = Judge::default();
    for index in 0..3 {
        let draft = judge
            .score(
                &Item::new(ItemType::Note, format!("seeded {index}")),
                &ScoringContext::default(),
            )
            .expect("draft");
        persistence.store_judgment(&draft, None, None).expect("store");
    }
    assert_eq!(persistence.count_unlinked_judgments().expect("count"), 3);

    let chain = ChainManager::new(Arc::clone(&persistence), EventBus::default(), {
        ChainConfig::default()
    })
    .expect("chain");
    assert_eq!(chain.status().head_slot, 0, "fresh start initializes genesis only");

    let report = chain.adopt_orphaned_judgments().expect("adopt");
    assert_eq!(report.adopted, 3);
    let block = report.block.expect("recovery block");
    assert_eq!(block.slot, 1);
    let stored_order: Vec<i64> = block
        .judgment_ids
        .iter()
        .map(|id| {
            persistence.judgment(id).expect("load").expect("judgment").created_at
        })
        .collect();
    let mut sorted = stored_order.clone();
    sorted.sort_unstable();
    assert_eq!(stored_order, sorted, "recovery block preserves created_at order");
    assert_eq!(persistence.count_unlinked_judgments().expect("count"), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn feedback_calibration_lowers_repeat_scores() {
    let h = harness(1_000);
    let item = quality_item();
    let first = h
        .pipeline
        .judge(&item, CallContext::default(), PipelineCaller::default())
        .await
        .expect("first receipt");
    assert!(first.q_score > 10, "calibration scenario needs a mid-band score");

    let mut calibrated = false;
    for _ in 0..21 {
        let receipt = h
            .pipeline
            .judge(&item, CallContext::default(), PipelineCaller::default())
            .await
            .expect("receipt");
        let judgment =
            h.persistence.judgment(&receipt.id).expect("load").expect("judgment");
        let feedback = h
            .persistence
            .store_feedback(&NewFeedback {
                judgment_id: judgment.id.clone(),
                outcome: FeedbackOutcome::Incorrect,
                reason: None,
                actual_score: Some(10),
                user_id: None,
                session_id: None,
            })
            .expect("feedback");
        let report =
            h.learning.process_feedback(&feedback, &judgment).expect("process feedback");
        calibrated = calibrated || report.calibration.is_some();
    }
    assert!(calibrated, "auto-calibration should fire at the backlog threshold");
    let state = h.learning.snapshot();
    assert!(
        state.modifiers.values().any(|modifier| *modifier < 0.0),
        "some modifier should decrease"
    );

    let after = h
        .pipeline
        .judge(&item, CallContext::default(), PipelineCaller::default())
        .await
        .expect("post-calibration receipt");
    assert!(
        after.q_score < first.q_score,
        "calibrated score {} should drop below initial {}",
        after.q_score,
        first.q_score
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn live_stream_has_no_replay_but_search_catches_up() {
    let h = harness(1_000);
    let early = h.bus.subscribe(&[Topic::Judgment]);
    let receipt = h
        .pipeline
        .judge(
            &Item::new(ItemType::Note, "observable cache note"),
            CallContext::default(),
            PipelineCaller::default(),
        )
        .await
        .expect("receipt");

    let event = early.recv().await.expect("live event");
    assert_eq!(event.payload["id"].as_str(), Some(receipt.id.as_str()));

    let late = h.bus.subscribe(&[Topic::Judgment]);
    assert!(late.try_recv().is_none(), "no replay for late subscribers");

    let found = h.persistence.search_judgments("cache", 10).expect("search");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, receipt.id);
}

#[tokio::test(flavor = "multi_thread")]
async fn verify_reports_clean_chain_after_activity() {
    let h = harness(2);
    for index in 0..6 {
        h.pipeline
            .judge(
                &Item::new(ItemType::Note, format!("activity {index}")),
                CallContext::default(),
                PipelineCaller::default(),
            )
            .await
            .expect("receipt");
    }
    h.chain.flush().await.expect("final flush");
    for _ in 0..100 {
        if h.chain.status().pending_judgments == 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let report = h.chain.verify_integrity(None).expect("verify");
    assert!(report.valid, "faults: {:?}", report.errors);
    assert!(report.blocks_checked >= 2);
}
