// crates/arbiter-core/src/runtime/memory.rs
// ============================================================================
// Module: Arbiter In-Memory Persistence
// Description: Reference Persistence implementation backed by process memory.
// Purpose: Back tests and throwaway deployments without a database file.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! `MemoryPersistence` keeps every table in a single mutex-guarded state
//! struct. Operations mirror the durable store's semantics, including the
//! transactional seal fan-out and the destructive-reset token check, so tests
//! exercise the same contract the SQLite store honors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use crate::core::Block;
use crate::core::Digest;
use crate::core::DigestId;
use crate::core::Feedback;
use crate::core::FeedbackId;
use crate::core::Judgment;
use crate::core::JudgmentDraft;
use crate::core::JudgmentId;
use crate::core::LearningState;
use crate::core::NewDigest;
use crate::core::NewFeedback;
use crate::core::SessionId;
use crate::core::Trigger;
use crate::core::TriggerId;
use crate::core::UserId;
use crate::core::now_millis;
use crate::interfaces::Persistence;
use crate::interfaces::PersistenceError;
use crate::interfaces::RESET_CONFIRMATION_TOKEN;

// ============================================================================
// SECTION: State
// ============================================================================

/// Mutable tables behind the store mutex.
#[derive(Debug, Default)]
struct MemoryState {
    /// Judgments keyed by identifier.
    judgments: BTreeMap<JudgmentId, Judgment>,
    /// Insertion order of judgment identifiers.
    judgment_order: Vec<JudgmentId>,
    /// Blocks keyed by slot.
    blocks: BTreeMap<u64, Block>,
    /// Feedback records in insertion order.
    feedback: Vec<Feedback>,
    /// Digests in insertion order.
    digests: Vec<Digest>,
    /// Triggers keyed by identifier.
    triggers: BTreeMap<TriggerId, Trigger>,
    /// Learning state snapshot.
    learning: Option<LearningState>,
    /// Monotonic counter for minted identifiers.
    next_id: u64,
}

impl MemoryState {
    /// Mints the next identifier with the given prefix.
    fn mint(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// In-memory [`Persistence`] implementation.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    /// Guarded table state.
    state: Mutex<MemoryState>,
}

impl MemoryPersistence {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state, recovering from poisoning.
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrites a stored block, bypassing seal rules (test support).
    #[cfg(test)]
    pub(crate) fn overwrite_block_for_tests(&self, block: Block) {
        self.state().blocks.insert(block.slot, block);
    }
}

impl Persistence for MemoryPersistence {
    fn store_judgment(
        &self,
        draft: &JudgmentDraft,
        user_id: Option<&UserId>,
        session_id: Option<&SessionId>,
    ) -> Result<Judgment, PersistenceError> {
        let mut state = self.state();
        let id = JudgmentId::new(state.mint("j"));
        let judgment = Judgment::from_draft(
            draft.clone(),
            id.clone(),
            user_id.cloned(),
            session_id.cloned(),
            now_millis(),
        );
        state.judgments.insert(id.clone(), judgment.clone());
        state.judgment_order.push(id);
        Ok(judgment)
    }

    fn set_judgment_block_slot(
        &self,
        id: &JudgmentId,
        slot: u64,
    ) -> Result<(), PersistenceError> {
        let mut state = self.state();
        let judgment = state
            .judgments
            .get_mut(id)
            .ok_or_else(|| PersistenceError::NotFound(format!("judgment {id}")))?;
        judgment.block_slot = Some(slot);
        Ok(())
    }

    fn judgment(&self, id: &JudgmentId) -> Result<Option<Judgment>, PersistenceError> {
        Ok(self.state().judgments.get(id).cloned())
    }

    fn search_judgments(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Judgment>, PersistenceError> {
        let needle = query.to_lowercase();
        let state = self.state();
        Ok(state
            .judgment_order
            .iter()
            .rev()
            .filter_map(|id| state.judgments.get(id))
            .filter(|judgment| judgment.item_content.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }

    fn recent_judgments(&self, limit: usize) -> Result<Vec<Judgment>, PersistenceError> {
        let state = self.state();
        Ok(state
            .judgment_order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| state.judgments.get(id))
            .cloned()
            .collect())
    }

    fn store_sealed_block(&self, block: &Block) -> Result<(), PersistenceError> {
        let mut state = self.state();
        if state.blocks.contains_key(&block.slot) {
            return Err(PersistenceError::Invalid(format!(
                "block slot {} already exists",
                block.slot
            )));
        }
        for id in &block.judgment_ids {
            if !state.judgments.contains_key(id) {
                return Err(PersistenceError::NotFound(format!("judgment {id}")));
            }
        }
        for id in &block.judgment_ids {
            if let Some(judgment) = state.judgments.get_mut(id) {
                judgment.block_slot = Some(block.slot);
            }
        }
        state.blocks.insert(block.slot, block.clone());
        Ok(())
    }

    fn block_by_slot(&self, slot: u64) -> Result<Option<Block>, PersistenceError> {
        Ok(self.state().blocks.get(&slot).cloned())
    }

    fn head_block(&self) -> Result<Option<Block>, PersistenceError> {
        Ok(self.state().blocks.values().next_back().cloned())
    }

    fn recent_blocks(&self, limit: usize) -> Result<Vec<Block>, PersistenceError> {
        Ok(self.state().blocks.values().rev().take(limit).cloned().collect())
    }

    fn store_feedback(&self, new: &NewFeedback) -> Result<Feedback, PersistenceError> {
        let mut state = self.state();
        if !state.judgments.contains_key(&new.judgment_id) {
            return Err(PersistenceError::NotFound(format!("judgment {}", new.judgment_id)));
        }
        let id = FeedbackId::new(state.mint("f"));
        let feedback = Feedback::from_new(new.clone(), id, now_millis());
        state.feedback.push(feedback.clone());
        Ok(feedback)
    }

    fn feedback_for(&self, id: &JudgmentId) -> Result<Vec<Feedback>, PersistenceError> {
        Ok(self
            .state()
            .feedback
            .iter()
            .filter(|feedback| feedback.judgment_id == *id)
            .cloned()
            .collect())
    }

    fn store_digest(&self, new: &NewDigest) -> Result<Digest, PersistenceError> {
        let mut state = self.state();
        let id = DigestId::new(state.mint("d"));
        let digest = Digest::from_new(new.clone(), id, now_millis());
        state.digests.push(digest.clone());
        Ok(digest)
    }

    fn search_digests(&self, query: &str, limit: usize) -> Result<Vec<Digest>, PersistenceError> {
        let needle = query.to_lowercase();
        Ok(self
            .state()
            .digests
            .iter()
            .rev()
            .filter(|digest| {
                digest.content.to_lowercase().contains(&needle)
                    || digest.source.to_lowercase().contains(&needle)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    fn upsert_trigger(&self, trigger: &Trigger) -> Result<(), PersistenceError> {
        self.state().triggers.insert(trigger.id.clone(), trigger.clone());
        Ok(())
    }

    fn list_triggers(&self) -> Result<Vec<Trigger>, PersistenceError> {
        Ok(self.state().triggers.values().cloned().collect())
    }

    fn delete_trigger(&self, id: &TriggerId) -> Result<bool, PersistenceError> {
        Ok(self.state().triggers.remove(id).is_some())
    }

    fn set_trigger_enabled(
        &self,
        id: &TriggerId,
        enabled: bool,
    ) -> Result<bool, PersistenceError> {
        let mut state = self.state();
        match state.triggers.get_mut(id) {
            Some(trigger) => {
                trigger.enabled = enabled;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn load_learning_state(&self) -> Result<Option<LearningState>, PersistenceError> {
        Ok(self.state().learning.clone())
    }

    fn save_learning_state(&self, learning: &LearningState) -> Result<(), PersistenceError> {
        self.state().learning = Some(learning.clone());
        Ok(())
    }

    fn count_unlinked_judgments(&self) -> Result<u64, PersistenceError> {
        let count =
            self.state().judgments.values().filter(|judgment| judgment.block_slot.is_none()).count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    fn find_orphaned_judgments(&self) -> Result<Vec<Judgment>, PersistenceError> {
        let state = self.state();
        let mut orphans: Vec<Judgment> = state
            .judgments
            .values()
            .filter(|judgment| judgment.block_slot.is_none())
            .filter(|judgment| {
                !state.blocks.values().any(|block| block.judgment_ids.contains(&judgment.id))
            })
            .cloned()
            .collect();
        orphans.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
        });
        Ok(orphans)
    }

    fn reset_all(&self, confirmation_token: &str) -> Result<(), PersistenceError> {
        if confirmation_token != RESET_CONFIRMATION_TOKEN {
            return Err(PersistenceError::Invalid(
                "reset requires the exact confirmation token".to_string(),
            ));
        }
        *self.state() = MemoryState::default();
        Ok(())
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

    use super::MemoryPersistence;
    use crate::core::Block;
    use crate::core::FeedbackOutcome;
    use crate::core::Item;
    use crate::core::ItemType;
    use crate::core::NewFeedback;
    use crate::interfaces::Persistence;
    use crate::interfaces::PersistenceError;
    use crate::judge::Judge;
    use crate::judge::ScoringContext;

    fn stored(store: &MemoryPersistence, content: &str) -> crate::core::Judgment {
        let draft = Judge::default()
            .score(&Item::new(ItemType::Note, content), &ScoringContext::default())
            .expect("draft");
        store.store_judgment(&draft, None, None).expect("store judgment")
    }

    #[test]
    fn judgments_round_trip_and_search() {
        let store = MemoryPersistence::new();
        let judgment = stored(&store, "cache latency improved markedly");
        let loaded = store.judgment(&judgment.id).expect("load").expect("present");
        assert_eq!(loaded.id, judgment.id);
        let hits = store.search_judgments("latency", 10).expect("search");
        assert_eq!(hits.len(), 1);
        assert!(store.search_judgments("unrelated", 10).expect("search").is_empty());
    }

    #[test]
    fn sealed_block_sets_slots_transactionally() {
        let store = MemoryPersistence::new();
        let genesis = Block::genesis(1).expect("genesis");
        store.store_sealed_block(&genesis).expect("genesis stored");
        let a = stored(&store, "first");
        let b = stored(&store, "second");
        let block =
            Block::seal_after(&genesis, vec![a.id.clone(), b.id.clone()], 2).expect("seal");
        store.store_sealed_block(&block).expect("block stored");
        assert_eq!(store.judgment(&a.id).expect("load").expect("a").block_slot, Some(1));
        assert_eq!(store.judgment(&b.id).expect("load").expect("b").block_slot, Some(1));
        assert_eq!(store.count_unlinked_judgments().expect("count"), 0);
    }

    #[test]
    fn sealing_unknown_judgment_leaves_no_partial_effect() {
        let store = MemoryPersistence::new();
        let genesis = Block::genesis(1).expect("genesis");
        store.store_sealed_block(&genesis).expect("genesis stored");
        let a = stored(&store, "first");
        let block = Block::seal_after(
            &genesis,
            vec![a.id.clone(), crate::core::JudgmentId::new("missing")],
            2,
        )
        .expect("seal");
        assert!(store.store_sealed_block(&block).is_err());
        assert_eq!(store.judgment(&a.id).expect("load").expect("a").block_slot, None);
        assert!(store.block_by_slot(1).expect("load").is_none());
    }

    #[test]
    fn feedback_requires_existing_judgment() {
        let store = MemoryPersistence::new();
        let result = store.store_feedback(&NewFeedback {
            judgment_id: crate::core::JudgmentId::new("missing"),
            outcome: FeedbackOutcome::Correct,
            reason: None,
            actual_score: None,
            user_id: None,
            session_id: None,
        });
        assert!(matches!(result, Err(PersistenceError::NotFound(_))));
    }

    #[test]
    fn reset_requires_exact_token() {
        let store = MemoryPersistence::new();
        let judgment = stored(&store, "keep me");
        assert!(store.reset_all("burn_it_all").is_err());
        assert!(store.judgment(&judgment.id).expect("load").is_some());
        store.reset_all("BURN_IT_ALL").expect("reset");
        assert!(store.judgment(&judgment.id).expect("load").is_none());
    }
}
