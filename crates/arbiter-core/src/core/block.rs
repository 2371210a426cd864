// crates/arbiter-core/src/core/block.rs
// ============================================================================
// Module: Arbiter Block Model
// Description: Hash-linked block records for the proof-of-judgment chain.
// Purpose: Define the block shape and its canonical hash computation.
// Dependencies: serde, crate::core::{hashing, identifiers, merkle, time}
// ============================================================================

//! ## Overview
//! A block seals an ordered set of judgment identifiers under a merkle
//! commitment and links to its predecessor by hash. The block hash covers the
//! RFC 8785 canonical JSON of `(slot, prev_hash, merkle_root, judgment_ids,
//! created_at)`; the same encoding is used during verification.
//! Invariants:
//! - `slot` is strictly monotonic; slot 0 is the genesis block.
//! - Non-genesis blocks seal at least one judgment.
//! - `hash` and `merkle_root` are derivable from the other fields.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashError;
use crate::core::hashing::ZERO_HASH;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::JudgmentId;
use crate::core::merkle::merkle_root;
use crate::core::time::TimestampMs;

// ============================================================================
// SECTION: Canonical Encoding
// ============================================================================

/// Fields covered by the block hash, in canonical form.
///
/// # Invariants
/// - Serialization goes through RFC 8785; key order never affects the hash.
#[derive(Debug, Serialize)]
struct BlockSigning<'a> {
    /// Block slot.
    slot: u64,
    /// Hash of the predecessor block.
    prev_hash: &'a str,
    /// Merkle root over the sealed judgment identifiers.
    merkle_root: &'a str,
    /// Ordered judgment identifiers.
    judgment_ids: &'a [JudgmentId],
    /// Sealing timestamp.
    created_at: TimestampMs,
}

/// Computes the canonical hash for a block's fields.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn block_hash(
    slot: u64,
    prev_hash: &str,
    merkle: &str,
    judgment_ids: &[JudgmentId],
    created_at: TimestampMs,
) -> Result<String, HashError> {
    let signing = BlockSigning {
        slot,
        prev_hash,
        merkle_root: merkle,
        judgment_ids,
        created_at,
    };
    Ok(hash_canonical_json(DEFAULT_HASH_ALGORITHM, &signing)?.value)
}

// ============================================================================
// SECTION: Block
// ============================================================================

/// A sealed, hash-linked record of ordered judgment identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Strictly monotonic slot index; 0 is genesis.
    pub slot: u64,
    /// Hash of the block at `slot - 1`; genesis carries the zero hash.
    pub prev_hash: String,
    /// Merkle root over `judgment_ids`.
    pub merkle_root: String,
    /// Ordered judgment identifiers sealed by this block.
    pub judgment_ids: Vec<JudgmentId>,
    /// Canonical hash over the other fields.
    pub hash: String,
    /// Wall-clock timestamp at sealing.
    pub created_at: TimestampMs,
}

impl Block {
    /// Builds the genesis block for an empty chain.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn genesis(created_at: TimestampMs) -> Result<Self, HashError> {
        let hash = block_hash(0, ZERO_HASH, ZERO_HASH, &[], created_at)?;
        Ok(Self {
            slot: 0,
            prev_hash: ZERO_HASH.to_string(),
            merkle_root: ZERO_HASH.to_string(),
            judgment_ids: Vec::new(),
            hash,
            created_at,
        })
    }

    /// Seals a successor block over the given judgment identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn seal_after(
        prev: &Self,
        judgment_ids: Vec<JudgmentId>,
        created_at: TimestampMs,
    ) -> Result<Self, HashError> {
        let slot = prev.slot + 1;
        let merkle = merkle_root(&judgment_ids);
        let hash = block_hash(slot, &prev.hash, &merkle, &judgment_ids, created_at)?;
        Ok(Self {
            slot,
            prev_hash: prev.hash.clone(),
            merkle_root: merkle,
            judgment_ids,
            hash,
            created_at,
        })
    }

    /// Recomputes the canonical hash from this block's fields.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn recompute_hash(&self) -> Result<String, HashError> {
        block_hash(
            self.slot,
            &self.prev_hash,
            &self.merkle_root,
            &self.judgment_ids,
            self.created_at,
        )
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

    use super::Block;
    use crate::core::hashing::ZERO_HASH;
    use crate::core::identifiers::JudgmentId;
    use crate::core::merkle::merkle_root;

    #[test]
    fn genesis_anchors_to_zero_hash() {
        let genesis = Block::genesis(1_000).expect("genesis");
        assert_eq!(genesis.slot, 0);
        assert_eq!(genesis.prev_hash, ZERO_HASH);
        assert_eq!(genesis.merkle_root, ZERO_HASH);
        assert!(genesis.judgment_ids.is_empty());
        assert_eq!(genesis.hash, genesis.recompute_hash().expect("recompute"));
    }

    #[test]
    fn sealed_block_links_to_predecessor() {
        let genesis = Block::genesis(1_000).expect("genesis");
        let ids = vec![JudgmentId::new("j-1"), JudgmentId::new("j-2")];
        let block = Block::seal_after(&genesis, ids.clone(), 2_000).expect("seal");
        assert_eq!(block.slot, 1);
        assert_eq!(block.prev_hash, genesis.hash);
        assert_eq!(block.merkle_root, merkle_root(&ids));
        assert_eq!(block.hash, block.recompute_hash().expect("recompute"));
    }

    #[test]
    fn tampered_merkle_root_breaks_hash() {
        let genesis = Block::genesis(1_000).expect("genesis");
        let mut block =
            Block::seal_after(&genesis, vec![JudgmentId::new("j-1")], 2_000).expect("seal");
        block.merkle_root = ZERO_HASH.to_string();
        assert_ne!(block.hash, block.recompute_hash().expect("recompute"));
    }

    #[test]
    fn hash_covers_judgment_order() {
        let genesis = Block::genesis(1_000).expect("genesis");
        let forward = Block::seal_after(
            &genesis,
            vec![JudgmentId::new("j-1"), JudgmentId::new("j-2")],
            2_000,
        )
        .expect("seal");
        let reversed = Block::seal_after(
            &genesis,
            vec![JudgmentId::new("j-2"), JudgmentId::new("j-1")],
            2_000,
        )
        .expect("seal");
        assert_ne!(forward.hash, reversed.hash);
    }
}
