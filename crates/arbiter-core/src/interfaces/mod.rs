// crates/arbiter-core/src/interfaces/mod.rs
// ============================================================================
// Module: Arbiter Interfaces
// Description: Backend-agnostic persistence capability consumed by the core.
// Purpose: Define the contract surface durable stores must honor.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The core never talks to a storage engine directly; it consumes the
//! [`Persistence`] capability. Implementations must be internally safe for
//! concurrent use and must make every operation atomic: an operation either
//! fully completes or reports [`PersistenceError`] with no partial effect.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::Block;
use crate::core::Digest;
use crate::core::Feedback;
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

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Confirmation token required by every destructive reset operation.
pub const RESET_CONFIRMATION_TOKEN: &str = "BURN_IT_ALL";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Persistence capability errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Underlying storage diagnostics are reduced to message strings.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Store I/O error.
    #[error("persistence io error: {0}")]
    Io(String),
    /// Stored data is corrupted or fails integrity checks.
    #[error("persistence corruption: {0}")]
    Corrupt(String),
    /// Referenced record does not exist.
    #[error("persistence not found: {0}")]
    NotFound(String),
    /// Input rejected by the store.
    #[error("persistence invalid data: {0}")]
    Invalid(String),
    /// Store reported an engine-level error.
    #[error("persistence store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Persistence Capability
// ============================================================================

/// Shared handle to a persistence implementation.
pub type SharedPersistence = Arc<dyn Persistence>;

/// Durable, queryable store for judgments, blocks, feedback, digests,
/// triggers, and learning state.
///
/// # Invariants
/// - Implementations are internally synchronized for concurrent use.
/// - [`Persistence::store_sealed_block`] is transactional with the
///   per-judgment `block_slot` fan-out.
pub trait Persistence: Send + Sync {
    /// Stores a judgment draft, minting its identity and timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails; no partial effect.
    fn store_judgment(
        &self,
        draft: &JudgmentDraft,
        user_id: Option<&UserId>,
        session_id: Option<&SessionId>,
    ) -> Result<Judgment, PersistenceError>;

    /// Sets the sealing block slot on a stored judgment.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] for unknown judgments.
    fn set_judgment_block_slot(&self, id: &JudgmentId, slot: u64)
    -> Result<(), PersistenceError>;

    /// Loads a judgment by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the read fails.
    fn judgment(&self, id: &JudgmentId) -> Result<Option<Judgment>, PersistenceError>;

    /// Full-text search over judgment content, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the read fails.
    fn search_judgments(&self, query: &str, limit: usize)
    -> Result<Vec<Judgment>, PersistenceError>;

    /// Returns the most recent judgments.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the read fails.
    fn recent_judgments(&self, limit: usize) -> Result<Vec<Judgment>, PersistenceError>;

    /// Stores a sealed block and sets `block_slot` on every sealed judgment
    /// in one transactional unit.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when any part fails; nothing is written.
    fn store_sealed_block(&self, block: &Block) -> Result<(), PersistenceError>;

    /// Loads a block by slot.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the read fails.
    fn block_by_slot(&self, slot: u64) -> Result<Option<Block>, PersistenceError>;

    /// Loads the highest-slot block.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the read fails.
    fn head_block(&self) -> Result<Option<Block>, PersistenceError>;

    /// Returns the most recent blocks, highest slot first.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the read fails.
    fn recent_blocks(&self, limit: usize) -> Result<Vec<Block>, PersistenceError>;

    /// Stores a feedback submission, minting its identity and timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] when the judgment is unknown.
    fn store_feedback(&self, new: &NewFeedback) -> Result<Feedback, PersistenceError>;

    /// Returns feedback records for a judgment, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the read fails.
    fn feedback_for(&self, id: &JudgmentId) -> Result<Vec<Feedback>, PersistenceError>;

    /// Stores a digest, minting its identity and timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails.
    fn store_digest(&self, new: &NewDigest) -> Result<Digest, PersistenceError>;

    /// Full-text search over digest content, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the read fails.
    fn search_digests(&self, query: &str, limit: usize) -> Result<Vec<Digest>, PersistenceError>;

    /// Inserts or replaces a trigger rule.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails.
    fn upsert_trigger(&self, trigger: &Trigger) -> Result<(), PersistenceError>;

    /// Lists every stored trigger rule.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the read fails.
    fn list_triggers(&self) -> Result<Vec<Trigger>, PersistenceError>;

    /// Deletes a trigger rule; returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails.
    fn delete_trigger(&self, id: &TriggerId) -> Result<bool, PersistenceError>;

    /// Enables or disables a trigger rule; returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails.
    fn set_trigger_enabled(&self, id: &TriggerId, enabled: bool)
    -> Result<bool, PersistenceError>;

    /// Loads the learning state snapshot, if one was saved.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the read fails.
    fn load_learning_state(&self) -> Result<Option<LearningState>, PersistenceError>;

    /// Saves the learning state snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails.
    fn save_learning_state(&self, state: &LearningState) -> Result<(), PersistenceError>;

    /// Counts judgments whose `block_slot` is unset.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the read fails.
    fn count_unlinked_judgments(&self) -> Result<u64, PersistenceError>;

    /// Returns judgments with no `block_slot` that appear in no block,
    /// ordered by `created_at` then identifier.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the read fails.
    fn find_orphaned_judgments(&self) -> Result<Vec<Judgment>, PersistenceError>;

    /// Destroys all persisted state. Requires the exact confirmation token
    /// [`RESET_CONFIRMATION_TOKEN`].
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Invalid`] for a wrong token; nothing is
    /// mutated in that case.
    fn reset_all(&self, confirmation_token: &str) -> Result<(), PersistenceError>;

    /// Reports store readiness for liveness/readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}
