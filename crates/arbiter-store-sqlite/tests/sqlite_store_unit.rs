// crates/arbiter-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Durable persistence behavior against a temp database file.
// ============================================================================
//! ## Overview
//! Exercises the SQLite persistence implementation: round trips, the
//! transactional seal fan-out, orphan queries, token-guarded reset, and
//! durability across reopen.

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

use std::path::Path;

use arbiter_core::Block;
use arbiter_core::Item;
use arbiter_core::ItemType;
use arbiter_core::Judge;
use arbiter_core::Judgment;
use arbiter_core::JudgmentId;
use arbiter_core::LearningState;
use arbiter_core::Persistence;
use arbiter_core::PersistenceError;
use arbiter_core::ScoringContext;
use arbiter_core::Trigger;
use arbiter_core::TriggerId;
use arbiter_core::core::Dimension;
use arbiter_core::core::DigestStats;
use arbiter_core::core::DigestType;
use arbiter_core::core::FeedbackOutcome;
use arbiter_core::core::NewDigest;
use arbiter_core::core::NewFeedback;
use arbiter_core::core::TriggerAction;
use arbiter_core::core::TriggerCondition;
use arbiter_core::core::TriggerType;
use arbiter_store_sqlite::SqlitePersistence;
use arbiter_store_sqlite::SqliteStoreConfig;
use serde_json::json;

fn open(path: &Path) -> SqlitePersistence {
    SqlitePersistence::open(&SqliteStoreConfig::new(path)).expect("open store")
}

fn stored(store: &SqlitePersistence, content: &str) -> Judgment {
    let draft = Judge::default()
        .score(&Item::new(ItemType::Note, content), &ScoringContext::default())
        .expect("draft");
    store.store_judgment(&draft, None, None).expect("store judgment")
}

#[test]
fn judgments_round_trip_and_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("arbiter.db");
    let judgment = {
        let store = open(&path);
        stored(&store, "durable cache latency note")
    };
    let reopened = open(&path);
    let loaded = reopened.judgment(&judgment.id).expect("load").expect("present");
    assert_eq!(loaded.q_score, judgment.q_score);
    assert_eq!(loaded.verdict, judgment.verdict);
    assert_eq!(loaded.block_slot, None);
    let hits = reopened.search_judgments("latency", 10).expect("search");
    assert_eq!(hits.len(), 1);
}

#[test]
fn minted_identifiers_are_unique_across_kinds() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open(&dir.path().join("arbiter.db"));
    let first = stored(&store, "one");
    let second = stored(&store, "two");
    assert_ne!(first.id, second.id);
    let digest = store
        .store_digest(&NewDigest {
            source: "test".to_string(),
            digest_type: DigestType::Text,
            content: "summary".to_string(),
            patterns: Vec::new(),
            insights: Vec::new(),
            metadata: DigestStats::default(),
        })
        .expect("digest");
    assert_ne!(digest.id.as_str(), first.id.as_str());
}

#[test]
fn seal_transaction_sets_slots_atomically() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open(&dir.path().join("arbiter.db"));
    let genesis = Block::genesis(1).expect("genesis");
    store.store_sealed_block(&genesis).expect("genesis stored");
    let a = stored(&store, "first");
    let b = stored(&store, "second");
    let block = Block::seal_after(&genesis, vec![a.id.clone(), b.id.clone()], 2).expect("seal");
    store.store_sealed_block(&block).expect("sealed");

    assert_eq!(store.judgment(&a.id).expect("load").expect("a").block_slot, Some(1));
    assert_eq!(store.judgment(&b.id).expect("load").expect("b").block_slot, Some(1));
    assert_eq!(store.head_block().expect("head").expect("head").slot, 1);
    assert_eq!(store.count_unlinked_judgments().expect("count"), 0);
}

#[test]
fn failed_seal_rolls_back_every_write() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open(&dir.path().join("arbiter.db"));
    let genesis = Block::genesis(1).expect("genesis");
    store.store_sealed_block(&genesis).expect("genesis stored");
    let a = stored(&store, "first");
    let bad = Block::seal_after(
        &genesis,
        vec![a.id.clone(), JudgmentId::new("missing")],
        2,
    )
    .expect("seal");
    assert!(store.store_sealed_block(&bad).is_err());

    assert_eq!(store.judgment(&a.id).expect("load").expect("a").block_slot, None);
    assert!(store.block_by_slot(1).expect("load").is_none());
    assert_eq!(store.count_unlinked_judgments().expect("count"), 1);
}

#[test]
fn duplicate_slot_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open(&dir.path().join("arbiter.db"));
    let genesis = Block::genesis(1).expect("genesis");
    store.store_sealed_block(&genesis).expect("genesis stored");
    let again = Block::genesis(2).expect("genesis again");
    assert!(matches!(
        store.store_sealed_block(&again),
        Err(PersistenceError::Invalid(_))
    ));
}

#[test]
fn orphan_queries_see_only_unchained_judgments() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open(&dir.path().join("arbiter.db"));
    let genesis = Block::genesis(1).expect("genesis");
    store.store_sealed_block(&genesis).expect("genesis stored");
    let sealed = stored(&store, "sealed");
    let orphan = stored(&store, "orphan");
    let block = Block::seal_after(&genesis, vec![sealed.id.clone()], 2).expect("seal");
    store.store_sealed_block(&block).expect("sealed block");

    let orphans = store.find_orphaned_judgments().expect("orphans");
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].id, orphan.id);
    assert_eq!(store.count_unlinked_judgments().expect("count"), 1);
}

#[test]
fn feedback_round_trips_and_requires_judgment() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open(&dir.path().join("arbiter.db"));
    let judgment = stored(&store, "judged");
    let feedback = store
        .store_feedback(&NewFeedback {
            judgment_id: judgment.id.clone(),
            outcome: FeedbackOutcome::Partial,
            reason: Some("close but mis-scored".to_string()),
            actual_score: Some(70),
            user_id: None,
            session_id: None,
        })
        .expect("feedback");
    let listed = store.feedback_for(&judgment.id).expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, feedback.id);
    assert_eq!(listed[0].actual_score, Some(70));

    let missing = store.store_feedback(&NewFeedback {
        judgment_id: JudgmentId::new("missing"),
        outcome: FeedbackOutcome::Correct,
        reason: None,
        actual_score: None,
        user_id: None,
        session_id: None,
    });
    assert!(matches!(missing, Err(PersistenceError::NotFound(_))));
}

#[test]
fn triggers_round_trip_with_enable_toggle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open(&dir.path().join("arbiter.db"));
    let trigger = Trigger {
        id: TriggerId::new("low-score"),
        name: "alert on weak judgments".to_string(),
        trigger_type: TriggerType::Threshold,
        condition: TriggerCondition::FieldLt {
            field: "q_score".to_string(),
            value: 40.0,
        },
        action: TriggerAction::Alert,
        action_config: json!({}),
        enabled: true,
        priority: 5,
    };
    store.upsert_trigger(&trigger).expect("upsert");
    assert_eq!(store.list_triggers().expect("list").len(), 1);

    assert!(store.set_trigger_enabled(&trigger.id, false).expect("disable"));
    let listed = store.list_triggers().expect("list");
    assert!(!listed[0].enabled);

    assert!(store.delete_trigger(&trigger.id).expect("delete"));
    assert!(!store.delete_trigger(&trigger.id).expect("second delete"));
    assert!(store.list_triggers().expect("list").is_empty());
}

#[test]
fn learning_state_snapshot_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open(&dir.path().join("arbiter.db"));
    assert!(store.load_learning_state().expect("load").is_none());
    let mut state = LearningState {
        feedback_seen: 13,
        ..LearningState::default()
    };
    state.modifiers.insert(Dimension::Novelty, -0.1);
    store.save_learning_state(&state).expect("save");
    let loaded = store.load_learning_state().expect("load").expect("present");
    assert_eq!(loaded, state);
}

#[test]
fn digest_search_matches_content_and_source() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open(&dir.path().join("arbiter.db"));
    store
        .store_digest(&NewDigest {
            source: "ops-wiki".to_string(),
            digest_type: DigestType::Text,
            content: "runbook for deploy rollback".to_string(),
            patterns: vec!["links".to_string()],
            insights: Vec::new(),
            metadata: DigestStats::default(),
        })
        .expect("digest");
    assert_eq!(store.search_digests("rollback", 10).expect("by content").len(), 1);
    assert_eq!(store.search_digests("ops-wiki", 10).expect("by source").len(), 1);
    assert!(store.search_digests("unrelated", 10).expect("no match").is_empty());
}

#[test]
fn like_wildcards_are_escaped_in_search() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open(&dir.path().join("arbiter.db"));
    stored(&store, "contains 100% literal percent");
    stored(&store, "plain text");
    let hits = store.search_judgments("100%", 10).expect("search");
    assert_eq!(hits.len(), 1);
    let underscore = store.search_judgments("_", 10).expect("underscore");
    assert!(underscore.is_empty(), "bare underscore must not match everything");
}

#[test]
fn reset_requires_exact_token_and_clears_tables() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open(&dir.path().join("arbiter.db"));
    let judgment = stored(&store, "keep me");
    assert!(store.reset_all("wrong").is_err());
    assert!(store.judgment(&judgment.id).expect("load").is_some());

    store.reset_all("BURN_IT_ALL").expect("reset");
    assert!(store.judgment(&judgment.id).expect("load").is_none());
    assert!(store.head_block().expect("head").is_none());
    assert!(store.list_triggers().expect("triggers").is_empty());
    assert!(store.load_learning_state().expect("learning").is_none());
}

#[test]
fn readiness_probe_succeeds_on_open_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open(&dir.path().join("arbiter.db"));
    store.readiness().expect("ready");
}
