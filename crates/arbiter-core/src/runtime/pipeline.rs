// crates/arbiter-core/src/runtime/pipeline.rs
// ============================================================================
// Module: Arbiter Judgment Pipeline
// Description: The score, persist, chain, publish path for one item.
// Purpose: Coordinate the judge, persistence, chain, and event bus.
// Dependencies: crate::core, crate::interfaces, crate::judge, crate::runtime
// ============================================================================

//! ## Overview
//! The pipeline owns no durable state; it coordinates. Once the judgment is
//! stored the caller's request succeeds: chain sealing is asynchronous and
//! self-healing, and event publication failures only increment a counter.
//! Invariants:
//! - Scoring errors surface as invalid input; storage errors surface as-is.
//! - The `judgment` event carries the provenance of any triggering rules.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::core::Axiom;
use crate::core::BusEvent;
use crate::core::Item;
use crate::core::JudgmentId;
use crate::core::SessionId;
use crate::core::Topic;
use crate::core::TriggerId;
use crate::core::UserId;
use crate::core::Verdict;
use crate::core::Weakness;
use crate::core::time::TimestampMs;
use crate::interfaces::PersistenceError;
use crate::interfaces::SharedPersistence;
use crate::judge::Judge;
use crate::judge::JudgeError;
use crate::judge::ScoringContext;
use crate::runtime::chain::ChainManager;
use crate::runtime::chain::SealRequest;
use crate::runtime::bus::EventBus;
use crate::runtime::learning::LearningEngine;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Caller identity attached to stored judgments.
#[derive(Debug, Clone, Default)]
pub struct PipelineCaller {
    /// Optional user isolation key.
    pub user_id: Option<UserId>,
    /// Optional session isolation key.
    pub session_id: Option<SessionId>,
}

/// Per-call scoring context.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Optional knowledge prior in [0, 1].
    pub prior: Option<f64>,
    /// Triggers that led to this call; carried onto the published event.
    pub provenance: Vec<TriggerId>,
}

// ============================================================================
// SECTION: Receipt
// ============================================================================

/// Result returned to the caller after a successful judgment.
#[derive(Debug, Clone, Serialize)]
pub struct JudgmentReceipt {
    /// Stored judgment identifier.
    pub id: JudgmentId,
    /// Composite score in 0..=100.
    pub q_score: u8,
    /// Verdict band.
    pub verdict: Verdict,
    /// Capped confidence.
    pub confidence: f64,
    /// Aggregated axiom scores.
    pub axiom_scores: BTreeMap<Axiom, f64>,
    /// Dimensions below the concern threshold.
    pub weaknesses: Vec<Weakness>,
    /// Storage timestamp.
    pub created_at: TimestampMs,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Pipeline errors surfaced to callers.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Item was malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Persistence failed before the judgment became durable.
    #[error(transparent)]
    Storage(#[from] PersistenceError),
}

impl From<JudgeError> for PipelineError {
    fn from(error: JudgeError) -> Self {
        match error {
            JudgeError::InvalidInput(message) => Self::InvalidInput(message),
        }
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Coordinator for the judgment request path.
pub struct JudgmentPipeline {
    /// Deterministic scorer.
    judge: Judge,
    /// Durable store.
    persistence: SharedPersistence,
    /// Chain manager receiving sealed judgment references.
    chain: Arc<ChainManager>,
    /// Event bus for `judgment` events.
    bus: EventBus,
    /// Learning loop supplying scoring snapshots.
    learning: Arc<LearningEngine>,
    /// Chain enqueue failures (closed queue); judgments stay durable.
    chain_enqueue_failures: AtomicU64,
}

impl JudgmentPipeline {
    /// Creates the pipeline.
    #[must_use]
    pub fn new(
        judge: Judge,
        persistence: SharedPersistence,
        chain: Arc<ChainManager>,
        bus: EventBus,
        learning: Arc<LearningEngine>,
    ) -> Self {
        Self {
            judge,
            persistence,
            chain,
            bus,
            learning,
            chain_enqueue_failures: AtomicU64::new(0),
        }
    }

    /// Returns the configured judge.
    #[must_use]
    pub const fn judge_config(&self) -> &Judge {
        &self.judge
    }

    /// Evaluates one item: score, persist, enqueue for sealing, publish.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] for malformed items and
    /// [`PipelineError::Storage`] when the judgment could not be stored.
    /// Chain and event failures never fail the call.
    pub async fn judge(
        &self,
        item: &Item,
        context: CallContext,
        caller: PipelineCaller,
    ) -> Result<JudgmentReceipt, PipelineError> {
        let scoring = ScoringContext {
            learning: Some(self.learning.snapshot()),
            prior: context.prior,
        };
        let draft = self.judge.score(item, &scoring)?;
        let judgment = self.persistence.store_judgment(
            &draft,
            caller.user_id.as_ref(),
            caller.session_id.as_ref(),
        )?;

        let seal = SealRequest {
            id: judgment.id.clone(),
            q_score: judgment.q_score,
            verdict: judgment.verdict,
            created_at: judgment.created_at,
        };
        if self.chain.add_judgment(seal).await.is_err() {
            self.chain_enqueue_failures.fetch_add(1, Ordering::SeqCst);
        }

        self.bus.publish_event(BusEvent::with_provenance(
            Topic::Judgment,
            json!({
                "id": judgment.id,
                "q_score": judgment.q_score,
                "verdict": judgment.verdict,
                "confidence": judgment.confidence,
                "item_type": judgment.item_type,
                "timestamp": judgment.created_at,
            }),
            context.provenance,
        ));

        Ok(JudgmentReceipt {
            id: judgment.id,
            q_score: judgment.q_score,
            verdict: judgment.verdict,
            confidence: judgment.confidence,
            axiom_scores: judgment.axiom_scores,
            weaknesses: judgment.weaknesses,
            created_at: judgment.created_at,
        })
    }

    /// Returns the number of chain enqueue failures observed.
    #[must_use]
    pub fn chain_enqueue_failures(&self) -> u64 {
        self.chain_enqueue_failures.load(Ordering::SeqCst)
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

    use std::sync::Arc;

    use serde_json::Value;

    use super::CallContext;
    use super::JudgmentPipeline;
    use super::PipelineCaller;
    use super::PipelineError;
    use crate::core::Item;
    use crate::core::ItemType;
    use crate::core::Topic;
    use crate::core::UserId;
    use crate::interfaces::SharedPersistence;
    use crate::judge::Judge;
    use crate::runtime::bus::EventBus;
    use crate::runtime::chain::ChainConfig;
    use crate::runtime::chain::ChainManager;
    use crate::runtime::learning::LearningConfig;
    use crate::runtime::learning::LearningEngine;
    use crate::runtime::memory::MemoryPersistence;

    fn build_pipeline() -> (JudgmentPipeline, SharedPersistence, EventBus) {
        let persistence: SharedPersistence = Arc::new(MemoryPersistence::new());
        let bus = EventBus::default();
        let chain = Arc::new(
            ChainManager::new(Arc::clone(&persistence), bus.clone(), ChainConfig {
                batch_size: 100,
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
            chain,
            bus.clone(),
            learning,
        );
        (pipeline, persistence, bus)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn judge_persists_and_publishes() {
        let (pipeline, persistence, bus) = build_pipeline();
        let subscription = bus.subscribe(&[Topic::Judgment]);
        let receipt = pipeline
            .judge(
                &Item::new(ItemType::Note, "hello"),
                CallContext::default(),
                PipelineCaller {
                    user_id: Some(UserId::new("u-1")),
                    session_id: None,
                },
            )
            .await
            .expect("receipt");
        assert!(receipt.q_score <= 100);
        assert!(receipt.confidence <= 0.618);

        let stored =
            persistence.judgment(&receipt.id).expect("load").expect("judgment present");
        assert_eq!(stored.user_id.as_ref().map(ToString::to_string), Some("u-1".to_string()));
        assert_eq!(stored.block_slot, None, "sealing is asynchronous");

        let event = subscription.recv().await.expect("judgment event");
        assert_eq!(event.payload["id"], Value::String(receipt.id.to_string()));
        assert_eq!(event.payload["q_score"], receipt.q_score);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_items_do_not_touch_storage() {
        let (pipeline, persistence, _bus) = build_pipeline();
        let result = pipeline
            .judge(
                &Item::new(ItemType::Note, ""),
                CallContext::default(),
                PipelineCaller::default(),
            )
            .await;
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
        assert!(persistence.recent_judgments(10).expect("recent").is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn provenance_is_carried_onto_events() {
        let (pipeline, _persistence, bus) = build_pipeline();
        let subscription = bus.subscribe(&[Topic::Judgment]);
        let context = CallContext {
            prior: None,
            provenance: vec![crate::core::TriggerId::new("t-1")],
        };
        pipeline
            .judge(&Item::new(ItemType::Note, "hello"), context, PipelineCaller::default())
            .await
            .expect("receipt");
        let event = subscription.recv().await.expect("event");
        assert_eq!(event.provenance.len(), 1);
        assert_eq!(event.provenance[0].as_str(), "t-1");
    }
}
