// crates/arbiter-core/src/core/item.rs
// ============================================================================
// Module: Arbiter Item Model
// Description: The input document submitted for judgment.
// Purpose: Define the item shape accepted by the judge and pipeline.
// Dependencies: serde, crate::core::rubric
// ============================================================================

//! ## Overview
//! An item is a short structured document: a note, code snippet, commit
//! summary, claim, or event. Callers may pin individual dimension scores;
//! pinned values are clamped but otherwise used verbatim by the judge.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::rubric::Dimension;

// ============================================================================
// SECTION: Item Type
// ============================================================================

/// Kind of document submitted for judgment.
///
/// # Invariants
/// - Unknown labels deserialize to [`ItemType::Other`] rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Free-form note or prose.
    Note,
    /// Code snippet or patch body.
    Code,
    /// Commit summary or change description.
    Commit,
    /// Factual claim.
    Claim,
    /// Observed event payload.
    Event,
    /// Anything else.
    #[serde(other)]
    Other,
}

impl ItemType {
    /// Returns the stable label for the item type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Code => "code",
            Self::Commit => "commit",
            Self::Claim => "claim",
            Self::Event => "event",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Item
// ============================================================================

/// A document submitted for judgment.
///
/// # Invariants
/// - `content` must be non-empty; the judge rejects empty content.
/// - `pinned_scores` values are clamped to [0, 1] at scoring time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Kind of document.
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Free text or serialized structured content.
    pub content: String,
    /// Optional source references (URLs, citations, document handles).
    #[serde(default)]
    pub sources: Vec<String>,
    /// Whether the caller verified the item externally.
    #[serde(default)]
    pub verified: Option<bool>,
    /// Caller-pinned dimension scores, used verbatim after clamping.
    #[serde(default)]
    pub pinned_scores: BTreeMap<Dimension, f64>,
}

impl Item {
    /// Creates a bare item with the given type and content.
    #[must_use]
    pub fn new(item_type: ItemType, content: impl Into<String>) -> Self {
        Self {
            item_type,
            content: content.into(),
            sources: Vec::new(),
            verified: None,
            pinned_scores: BTreeMap::new(),
        }
    }
}
