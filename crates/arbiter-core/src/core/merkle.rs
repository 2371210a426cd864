// crates/arbiter-core/src/core/merkle.rs
// ============================================================================
// Module: Arbiter Merkle Commitments
// Description: Merkle root computation over ordered judgment identifiers.
// Purpose: Commit each block to its judgment set for tamper evidence.
// Dependencies: crate::core::hashing, crate::core::identifiers
// ============================================================================

//! ## Overview
//! Blocks commit to their ordered judgment identifiers via a binary merkle
//! tree. Leaves are SHA-256 digests of the raw identifier bytes; odd levels
//! duplicate the last node before pairing.
//! Invariants:
//! - The empty set commits to [`crate::core::hashing::ZERO_HASH`].
//! - Roots are order-sensitive: reordering identifiers changes the root.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::ZERO_HASH;
use crate::core::hashing::hash_bytes;
use crate::core::identifiers::JudgmentId;

// ============================================================================
// SECTION: Merkle Root
// ============================================================================

/// Computes the merkle root over ordered judgment identifiers.
///
/// Returns the zero hash for an empty identifier list.
#[must_use]
pub fn merkle_root(ids: &[JudgmentId]) -> String {
    if ids.is_empty() {
        return ZERO_HASH.to_string();
    }
    let mut level: Vec<String> = ids
        .iter()
        .map(|id| hash_bytes(DEFAULT_HASH_ALGORITHM, id.as_str().as_bytes()).value)
        .collect();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            if let Some(last) = level.last().cloned() {
                level.push(last);
            }
        }
        level = level.chunks(2).map(|pair| combine(&pair[0], &pair[1])).collect();
    }
    level.first().map_or_else(|| ZERO_HASH.to_string(), Clone::clone)
}

/// Hashes the concatenation of two hex-encoded nodes.
fn combine(left: &str, right: &str) -> String {
    let mut bytes = Vec::with_capacity(left.len() + right.len());
    bytes.extend_from_slice(left.as_bytes());
    bytes.extend_from_slice(right.as_bytes());
    hash_bytes(DEFAULT_HASH_ALGORITHM, &bytes).value
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

    use super::merkle_root;
    use crate::core::hashing::ZERO_HASH;
    use crate::core::identifiers::JudgmentId;

    fn ids(values: &[&str]) -> Vec<JudgmentId> {
        values.iter().map(|value| JudgmentId::new(*value)).collect()
    }

    #[test]
    fn empty_set_commits_to_zero_hash() {
        assert_eq!(merkle_root(&[]), ZERO_HASH);
    }

    #[test]
    fn single_leaf_root_is_leaf_hash() {
        let root = merkle_root(&ids(&["j-1"]));
        assert_eq!(root.len(), 64);
        assert_eq!(root, merkle_root(&ids(&["j-1"])));
    }

    #[test]
    fn root_is_order_sensitive() {
        let forward = merkle_root(&ids(&["j-1", "j-2", "j-3"]));
        let reversed = merkle_root(&ids(&["j-3", "j-2", "j-1"]));
        assert_ne!(forward, reversed);
    }

    #[test]
    fn odd_level_duplicates_last_leaf() {
        let triple = merkle_root(&ids(&["j-1", "j-2", "j-3"]));
        let padded = merkle_root(&ids(&["j-1", "j-2", "j-3", "j-3"]));
        assert_eq!(triple, padded);
    }

    #[test]
    fn root_is_stable_across_calls() {
        let first = merkle_root(&ids(&["a", "b", "c", "d", "e"]));
        let second = merkle_root(&ids(&["a", "b", "c", "d", "e"]));
        assert_eq!(first, second);
    }
}
