// crates/arbiter-core/src/runtime/chain.rs
// ============================================================================
// Module: Arbiter Chain Manager
// Description: Batched sealing of judgments into a hash-linked block log.
// Purpose: Maintain the proof-of-judgment chain and its repair operations.
// Dependencies: crate::core, crate::interfaces, crate::runtime::{batch, bus}
// ============================================================================

//! ## Overview
//! The chain manager packages committed judgments into hash-linked,
//! merkle-committed blocks. Judgments queue in an internal batch queue whose
//! flush function seals one block per batch; the seal transaction (block
//! insert plus per-judgment `block_slot` fan-out) is atomic at the
//! persistence layer, so a failed seal leaves no observable mutation and the
//! batch requeues.
//! Invariants:
//! - Block slots are strictly monotonic; slot 0 is genesis.
//! - `head` and stats live under one mutex held only for enqueue and the
//!   narrow sealing window.
//! - Verification reports faults without mutating; repairs are idempotent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::core::Block;
use crate::core::JudgmentId;
use crate::core::Topic;
use crate::core::Verdict;
use crate::core::ZERO_HASH;
use crate::core::merkle_root;
use crate::core::time::TimestampMs;
use crate::core::time::now_millis;
use crate::interfaces::PersistenceError;
use crate::interfaces::SharedPersistence;
use crate::runtime::batch::BatchQueue;
use crate::runtime::batch::BatchQueueConfig;
use crate::runtime::batch::FlushError;
use crate::runtime::batch::QueueStats;
use crate::runtime::batch::noop_error_hook;
use crate::runtime::bus::EventBus;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Batch parameters for the chain's internal queue.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Judgments per sealed block before a background seal triggers.
    pub batch_size: usize,
    /// Interval for time-based sealing.
    pub flush_interval_ms: u64,
    /// Queue bound that forces an inline seal.
    pub max_queue_size: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            batch_size: 13,
            flush_interval_ms: 5_000,
            max_queue_size: 89,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Chain manager errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Persistence reported a failure.
    #[error("chain storage error: {0}")]
    Storage(#[from] PersistenceError),
    /// Canonical encoding failed.
    #[error("chain hashing error: {0}")]
    Hashing(String),
    /// Internal queue rejected the operation.
    #[error("chain queue error: {0}")]
    Queue(String),
}

// ============================================================================
// SECTION: Seal Requests
// ============================================================================

/// Judgment reference queued for sealing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SealRequest {
    /// Judgment identifier.
    pub id: JudgmentId,
    /// Composite score, carried for observability payloads.
    pub q_score: u8,
    /// Verdict band, carried for observability payloads.
    pub verdict: Verdict,
    /// Judgment creation timestamp.
    pub created_at: TimestampMs,
}

// ============================================================================
// SECTION: Status and Reports
// ============================================================================

/// Counters describing chain activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChainStats {
    /// Blocks sealed since startup.
    pub blocks_sealed: u64,
    /// Judgments sealed since startup.
    pub judgments_sealed: u64,
    /// Seal attempts that failed and requeued.
    pub seal_failures: u64,
}

/// Snapshot of chain state for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct ChainStatus {
    /// Whether initialization completed.
    pub initialized: bool,
    /// Slot of the current head block.
    pub head_slot: u64,
    /// Judgments awaiting sealing.
    pub pending_judgments: usize,
    /// Chain activity counters.
    pub stats: ChainStats,
    /// Internal queue counters.
    pub queue: QueueStats,
}

/// Fault kinds reported by verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultKind {
    /// Stored hash does not match the recomputed canonical hash.
    HashMismatch,
    /// Stored merkle root does not match the judgment identifiers.
    MerkleMismatch,
    /// Block does not link to its predecessor's hash.
    LinkMismatch,
    /// A slot in the verified range has no stored block.
    MissingBlock,
}

/// One verification fault.
#[derive(Debug, Clone, Serialize)]
pub struct BlockFault {
    /// Slot the fault was found at.
    pub slot: u64,
    /// Fault kind.
    pub kind: FaultKind,
    /// Human-readable detail.
    pub detail: String,
}

/// Result of a verification walk.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    /// Whether every checked block was intact.
    pub valid: bool,
    /// Number of blocks checked.
    pub blocks_checked: u64,
    /// Faults found, in slot order.
    pub errors: Vec<BlockFault>,
}

/// Result of a relink repair pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RepairReport {
    /// Judgment references examined.
    pub examined: u64,
    /// Judgments whose `block_slot` was restored.
    pub relinked: u64,
}

/// Result of adopting orphaned judgments.
#[derive(Debug, Clone, Serialize)]
pub struct AdoptionReport {
    /// Judgments sealed into the recovery block.
    pub adopted: usize,
    /// The recovery block, when one was sealed.
    pub block: Option<Block>,
}

// ============================================================================
// SECTION: Chain Manager
// ============================================================================

/// Manager for the proof-of-judgment chain.
pub struct ChainManager {
    /// Shared sealing state.
    inner: Arc<ChainInner>,
    /// Internal batch queue feeding the sealer.
    queue: BatchQueue<SealRequest>,
}

/// State shared between the manager handle and the queue's flush function.
struct ChainInner {
    /// Durable store.
    persistence: SharedPersistence,
    /// Event bus for `block` events.
    bus: EventBus,
    /// Head block, counters, and the most recently sealed block.
    state: Mutex<ChainState>,
}

/// Mutable chain state behind the mutex.
struct ChainState {
    /// Current tip of the chain.
    head: Block,
    /// Activity counters.
    stats: ChainStats,
    /// Most recently sealed block.
    last_sealed: Option<Block>,
}

impl ChainManager {
    /// Initializes the chain: loads the head block or writes genesis.
    ///
    /// Must be called within a Tokio runtime; the internal queue starts its
    /// flush ticker immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError`] when the store cannot be read or genesis cannot
    /// be written.
    pub fn new(
        persistence: SharedPersistence,
        bus: EventBus,
        config: ChainConfig,
    ) -> Result<Self, ChainError> {
        let head = match persistence.head_block()? {
            Some(head) => head,
            None => {
                let genesis = Block::genesis(now_millis())
                    .map_err(|err| ChainError::Hashing(err.to_string()))?;
                persistence.store_sealed_block(&genesis)?;
                genesis
            }
        };
        let inner = Arc::new(ChainInner {
            persistence,
            bus,
            state: Mutex::new(ChainState {
                head,
                stats: ChainStats::default(),
                last_sealed: None,
            }),
        });
        let sealer = Arc::clone(&inner);
        let queue = BatchQueue::new(
            BatchQueueConfig {
                name: "poj-chain".to_string(),
                batch_size: config.batch_size,
                flush_interval_ms: config.flush_interval_ms,
                max_queue_size: config.max_queue_size,
            },
            Arc::new(move |batch| {
                let sealer = Arc::clone(&sealer);
                Box::pin(async move {
                    sealer
                        .seal(batch)
                        .map(|_| ())
                        .map_err(|err| FlushError(err.to_string()))
                })
            }),
            noop_error_hook(),
        );
        Ok(Self {
            inner,
            queue,
        })
    }

    /// Queues a judgment reference for sealing into the next block.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Queue`] only when the queue is closed; seal
    /// failures requeue internally and never surface here.
    pub async fn add_judgment(&self, request: SealRequest) -> Result<(), ChainError> {
        self.queue.add(request).await.map_err(|err| ChainError::Queue(err.to_string()))
    }

    /// Forces sealing of the pending batch.
    ///
    /// Returns the newly sealed block, or `None` when nothing was pending.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Queue`] when the seal failed; the batch remains
    /// queued.
    pub async fn flush(&self) -> Result<Option<Block>, ChainError> {
        let flushed =
            self.queue.flush().await.map_err(|err| ChainError::Queue(err.to_string()))?;
        if flushed == 0 {
            return Ok(None);
        }
        Ok(lock_unpoisoned(&self.inner.state).last_sealed.clone())
    }

    /// Returns a status snapshot.
    #[must_use]
    pub fn status(&self) -> ChainStatus {
        let state = lock_unpoisoned(&self.inner.state);
        ChainStatus {
            initialized: true,
            head_slot: state.head.slot,
            pending_judgments: self.queue.len(),
            stats: state.stats,
            queue: self.queue.stats(),
        }
    }

    /// Returns the current head block.
    #[must_use]
    pub fn head(&self) -> Block {
        lock_unpoisoned(&self.inner.state).head.clone()
    }

    /// Walks the chain recomputing hashes, merkle roots, and linkage.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Storage`] when blocks cannot be read; integrity
    /// faults are reported in the result, never as errors.
    pub fn verify_integrity(
        &self,
        from_slot: Option<u64>,
    ) -> Result<VerificationReport, ChainError> {
        let head_slot = lock_unpoisoned(&self.inner.state).head.slot;
        let start = from_slot.unwrap_or(0).min(head_slot);
        let mut errors = Vec::new();
        let mut blocks_checked = 0u64;
        let mut prev = if start == 0 {
            None
        } else {
            self.inner.persistence.block_by_slot(start - 1)?
        };
        for slot in start..=head_slot {
            let Some(block) = self.inner.persistence.block_by_slot(slot)? else {
                errors.push(BlockFault {
                    slot,
                    kind: FaultKind::MissingBlock,
                    detail: "no block stored at slot".to_string(),
                });
                prev = None;
                continue;
            };
            blocks_checked += 1;
            let expected_root = merkle_root(&block.judgment_ids);
            if block.merkle_root == expected_root {
                match block.recompute_hash() {
                    Ok(expected_hash) if expected_hash == block.hash => {}
                    Ok(expected_hash) => errors.push(BlockFault {
                        slot,
                        kind: FaultKind::HashMismatch,
                        detail: format!("expected {expected_hash}, stored {}", block.hash),
                    }),
                    Err(err) => errors.push(BlockFault {
                        slot,
                        kind: FaultKind::HashMismatch,
                        detail: err.to_string(),
                    }),
                }
            } else {
                errors.push(BlockFault {
                    slot,
                    kind: FaultKind::MerkleMismatch,
                    detail: format!("expected {expected_root}, stored {}", block.merkle_root),
                });
            }
            let link_ok = match (&prev, slot) {
                (_, 0) => block.prev_hash == ZERO_HASH,
                (Some(prev_block), _) => block.prev_hash == prev_block.hash,
                (None, _) => true,
            };
            if !link_ok {
                errors.push(BlockFault {
                    slot,
                    kind: FaultKind::LinkMismatch,
                    detail: "prev_hash does not match predecessor".to_string(),
                });
            }
            prev = Some(block);
        }
        Ok(VerificationReport {
            valid: errors.is_empty(),
            blocks_checked,
            errors,
        })
    }

    /// Restores `block_slot` on judgments referenced by blocks but stored
    /// unlinked. Idempotent: a second pass relinks nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Storage`] when reads or writes fail.
    pub fn relink_orphaned_judgments(&self) -> Result<RepairReport, ChainError> {
        let head_slot = lock_unpoisoned(&self.inner.state).head.slot;
        let mut report = RepairReport::default();
        for slot in 1..=head_slot {
            let Some(block) = self.inner.persistence.block_by_slot(slot)? else {
                continue;
            };
            for id in &block.judgment_ids {
                report.examined += 1;
                let Some(judgment) = self.inner.persistence.judgment(id)? else {
                    continue;
                };
                if judgment.block_slot.is_none() {
                    self.inner.persistence.set_judgment_block_slot(id, slot)?;
                    report.relinked += 1;
                }
            }
        }
        Ok(report)
    }

    /// Seals a recovery block over judgments that were stored but never
    /// chained, in stored `created_at` order.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError`] when the store fails or sealing fails.
    pub fn adopt_orphaned_judgments(&self) -> Result<AdoptionReport, ChainError> {
        let orphans = self.inner.persistence.find_orphaned_judgments()?;
        if orphans.is_empty() {
            return Ok(AdoptionReport {
                adopted: 0,
                block: None,
            });
        }
        let batch: Vec<SealRequest> = orphans
            .iter()
            .map(|judgment| SealRequest {
                id: judgment.id.clone(),
                q_score: judgment.q_score,
                verdict: judgment.verdict,
                created_at: judgment.created_at,
            })
            .collect();
        let adopted = batch.len();
        let block = self.inner.seal(batch)?;
        Ok(AdoptionReport {
            adopted,
            block: Some(block),
        })
    }

    /// Destroys all persisted state and re-initializes to just-after-genesis.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError`] for a wrong confirmation token or when the
    /// store fails; a wrong token mutates nothing.
    pub fn reset_all(&self, confirmation_token: &str) -> Result<(), ChainError> {
        self.inner.persistence.reset_all(confirmation_token)?;
        self.queue.clear();
        let genesis =
            Block::genesis(now_millis()).map_err(|err| ChainError::Hashing(err.to_string()))?;
        self.inner.persistence.store_sealed_block(&genesis)?;
        let mut state = lock_unpoisoned(&self.inner.state);
        state.head = genesis;
        state.stats = ChainStats::default();
        state.last_sealed = None;
        Ok(())
    }

    /// Closes the internal queue, sealing any pending batch best-effort.
    pub async fn close(&self) {
        let _ = self.queue.close().await;
    }
}

impl ChainInner {
    /// Seals one batch into a new block and advances the head.
    fn seal(&self, batch: Vec<SealRequest>) -> Result<Block, ChainError> {
        let block = {
            let mut state = lock_unpoisoned(&self.state);
            let ids: Vec<JudgmentId> = batch.iter().map(|request| request.id.clone()).collect();
            let block = Block::seal_after(&state.head, ids, now_millis())
                .map_err(|err| ChainError::Hashing(err.to_string()))?;
            if let Err(err) = self.persistence.store_sealed_block(&block) {
                state.stats.seal_failures += 1;
                return Err(ChainError::Storage(err));
            }
            state.head = block.clone();
            state.stats.blocks_sealed += 1;
            state.stats.judgments_sealed += u64::try_from(batch.len()).unwrap_or(u64::MAX);
            state.last_sealed = Some(block.clone());
            block
        };
        self.bus.publish(
            Topic::Block,
            json!({
                "slot": block.slot,
                "hash": block.hash,
                "prev_hash": block.prev_hash,
                "merkle_root": block.merkle_root,
                "judgment_ids": block.judgment_ids,
                "created_at": block.created_at,
            }),
        );
        Ok(block)
    }
}

/// Locks a mutex, recovering the inner state if a holder panicked.
fn lock_unpoisoned<G>(mutex: &Mutex<G>) -> MutexGuard<'_, G> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
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

    use super::ChainConfig;
    use super::ChainManager;
    use super::FaultKind;
    use super::SealRequest;
    use crate::core::Item;
    use crate::core::ItemType;
    use crate::core::Judgment;
    use crate::core::Topic;
    use crate::core::ZERO_HASH;
    use crate::interfaces::SharedPersistence;
    use crate::judge::Judge;
    use crate::judge::ScoringContext;
    use crate::runtime::bus::EventBus;
    use crate::runtime::memory::MemoryPersistence;

    fn store_judgment(persistence: &SharedPersistence, content: &str) -> Judgment {
        let draft = Judge::default()
            .score(&Item::new(ItemType::Note, content), &ScoringContext::default())
            .expect("draft");
        persistence.store_judgment(&draft, None, None).expect("store")
    }

    fn seal_request(judgment: &Judgment) -> SealRequest {
        SealRequest {
            id: judgment.id.clone(),
            q_score: judgment.q_score,
            verdict: judgment.verdict,
            created_at: judgment.created_at,
        }
    }

    fn big_batch_config() -> ChainConfig {
        ChainConfig {
            batch_size: 100,
            flush_interval_ms: 60_000,
            max_queue_size: 1_000,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn initialization_writes_genesis_once() {
        let persistence: SharedPersistence = Arc::new(MemoryPersistence::new());
        let chain =
            ChainManager::new(Arc::clone(&persistence), EventBus::default(), big_batch_config())
                .expect("chain");
        let status = chain.status();
        assert!(status.initialized);
        assert_eq!(status.head_slot, 0);
        let genesis = persistence.block_by_slot(0).expect("load").expect("genesis");
        assert_eq!(genesis.prev_hash, ZERO_HASH);

        let reopened =
            ChainManager::new(Arc::clone(&persistence), EventBus::default(), big_batch_config())
                .expect("reopen");
        assert_eq!(reopened.status().head_slot, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn flush_seals_pending_judgments_in_order() {
        let persistence: SharedPersistence = Arc::new(MemoryPersistence::new());
        let bus = EventBus::default();
        let subscription = bus.subscribe(&[Topic::Block]);
        let chain = ChainManager::new(Arc::clone(&persistence), bus, big_batch_config())
            .expect("chain");
        let a = store_judgment(&persistence, "first");
        let b = store_judgment(&persistence, "second");
        chain.add_judgment(seal_request(&a)).await.expect("add a");
        chain.add_judgment(seal_request(&b)).await.expect("add b");

        let block = chain.flush().await.expect("flush").expect("block");
        assert_eq!(block.slot, 1);
        assert_eq!(block.judgment_ids, vec![a.id.clone(), b.id.clone()]);
        assert_eq!(
            persistence.judgment(&a.id).expect("load").expect("a").block_slot,
            Some(1)
        );
        let event = subscription.recv().await.expect("block event");
        assert_eq!(event.payload["slot"], 1);

        assert!(chain.flush().await.expect("empty flush").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn batch_size_triggers_background_seal() {
        let persistence: SharedPersistence = Arc::new(MemoryPersistence::new());
        let config = ChainConfig {
            batch_size: 3,
            flush_interval_ms: 60_000,
            max_queue_size: 1_000,
        };
        let chain =
            ChainManager::new(Arc::clone(&persistence), EventBus::default(), config)
                .expect("chain");
        let judgments: Vec<Judgment> = (0..3)
            .map(|index| store_judgment(&persistence, &format!("item {index}")))
            .collect();
        assert_eq!(chain.status().head_slot, 0, "no block before the third add");
        for judgment in &judgments {
            chain.add_judgment(seal_request(judgment)).await.expect("add");
        }
        for _ in 0..50 {
            if chain.status().head_slot == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let block = persistence.block_by_slot(1).expect("load").expect("sealed");
        let expected: Vec<_> = judgments.iter().map(|judgment| judgment.id.clone()).collect();
        assert_eq!(block.judgment_ids, expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn verify_detects_merkle_tampering() {
        let persistence = Arc::new(MemoryPersistence::new());
        let shared: SharedPersistence = Arc::clone(&persistence) as SharedPersistence;
        let chain = ChainManager::new(Arc::clone(&shared), EventBus::default(), {
            big_batch_config()
        })
        .expect("chain");
        for index in 0..2 {
            let judgment = store_judgment(&shared, &format!("item {index}"));
            chain.add_judgment(seal_request(&judgment)).await.expect("add");
            chain.flush().await.expect("flush");
        }
        let clean = chain.verify_integrity(None).expect("verify");
        assert!(clean.valid);
        assert_eq!(clean.blocks_checked, 3);

        let mut tampered = shared.block_by_slot(2).expect("load").expect("block");
        tampered.merkle_root = ZERO_HASH.to_string();
        persistence.overwrite_block_for_tests(tampered);

        let report = chain.verify_integrity(None).expect("verify");
        assert!(!report.valid);
        assert!(
            report
                .errors
                .iter()
                .any(|fault| fault.slot == 2 && fault.kind == FaultKind::MerkleMismatch)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn adopt_seals_orphans_and_relink_is_idempotent() {
        let persistence: SharedPersistence = Arc::new(MemoryPersistence::new());
        let orphans: Vec<Judgment> = (0..3)
            .map(|index| store_judgment(&persistence, &format!("orphan {index}")))
            .collect();
        let chain =
            ChainManager::new(Arc::clone(&persistence), EventBus::default(), big_batch_config())
                .expect("chain");
        assert_eq!(persistence.count_unlinked_judgments().expect("count"), 3);

        let report = chain.adopt_orphaned_judgments().expect("adopt");
        assert_eq!(report.adopted, 3);
        let block = report.block.expect("recovery block");
        assert_eq!(block.slot, 1);
        let expected: Vec<_> = orphans.iter().map(|judgment| judgment.id.clone()).collect();
        assert_eq!(block.judgment_ids, expected);
        assert_eq!(persistence.count_unlinked_judgments().expect("count"), 0);

        let first = chain.relink_orphaned_judgments().expect("relink");
        assert_eq!(first.relinked, 0);
        let second = chain.relink_orphaned_judgments().expect("relink again");
        assert_eq!(second.relinked, 0);

        let empty = chain.adopt_orphaned_judgments().expect("adopt again");
        assert_eq!(empty.adopted, 0);
        assert!(empty.block.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reset_requires_token_and_reinitializes() {
        let persistence: SharedPersistence = Arc::new(MemoryPersistence::new());
        let chain =
            ChainManager::new(Arc::clone(&persistence), EventBus::default(), big_batch_config())
                .expect("chain");
        let judgment = store_judgment(&persistence, "keep");
        chain.add_judgment(seal_request(&judgment)).await.expect("add");
        chain.flush().await.expect("flush");

        assert!(chain.reset_all("nope").is_err());
        assert_eq!(chain.status().head_slot, 1, "wrong token must not mutate");

        chain.reset_all("BURN_IT_ALL").expect("reset");
        let status = chain.status();
        assert_eq!(status.head_slot, 0);
        assert_eq!(status.pending_judgments, 0);
        assert!(persistence.judgment(&judgment.id).expect("load").is_none());
    }
}
