// crates/arbiter-core/src/core/mod.rs
// ============================================================================
// Module: Arbiter Core Types
// Description: Canonical Arbiter data model: items, judgments, blocks, rules.
// Purpose: Provide stable, serializable types for every derived API surface.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Arbiter core types define the item input shape, the judgment record, the
//! proof-of-judgment block, feedback, triggers, digests, and learning state.
//! These types are the canonical source of truth for any derived API
//! surfaces (HTTP tools, SSE payloads, or stores).

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod block;
pub mod digest;
pub mod events;
pub mod feedback;
pub mod hashing;
pub mod identifiers;
pub mod item;
pub mod judgment;
pub mod learning;
pub mod merkle;
pub mod rubric;
pub mod time;
pub mod trigger;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use block::Block;
pub use block::block_hash;
pub use digest::Digest;
pub use digest::DigestStats;
pub use digest::DigestType;
pub use digest::NewDigest;
pub use events::BusEvent;
pub use events::Topic;
pub use feedback::Feedback;
pub use feedback::FeedbackOutcome;
pub use feedback::NewFeedback;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::ZERO_HASH;
pub use identifiers::DigestId;
pub use identifiers::FeedbackId;
pub use identifiers::JudgmentId;
pub use identifiers::SessionId;
pub use identifiers::TriggerId;
pub use identifiers::UserId;
pub use item::Item;
pub use item::ItemType;
pub use judgment::Judgment;
pub use judgment::JudgmentDraft;
pub use judgment::Verdict;
pub use judgment::Weakness;
pub use learning::Bias;
pub use learning::LearningState;
pub use learning::VerdictOutcomes;
pub use merkle::merkle_root;
pub use rubric::Axiom;
pub use rubric::Dimension;
pub use time::TimestampMs;
pub use time::now_millis;
pub use trigger::Trigger;
pub use trigger::TriggerAction;
pub use trigger::TriggerCondition;
pub use trigger::TriggerType;
