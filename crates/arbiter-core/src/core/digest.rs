// crates/arbiter-core/src/core/digest.rs
// ============================================================================
// Module: Arbiter Digest Model
// Description: Structured summaries extracted from text blobs.
// Purpose: Define the digest record appended to the knowledge base.
// Dependencies: serde, crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! A digest is the extracted summary of a text blob: surface statistics,
//! detected patterns, and synthesized insights. Digests are append-only and
//! searchable alongside judgments.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::DigestId;
use crate::core::time::TimestampMs;

// ============================================================================
// SECTION: Digest Type
// ============================================================================

/// Kind of content a digest summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestType {
    /// Prose or mixed text.
    Text,
    /// Source code.
    Code,
    /// Log output.
    Log,
    /// Anything else.
    #[serde(other)]
    Other,
}

impl DigestType {
    /// Returns the stable label for the digest type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Code => "code",
            Self::Log => "log",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DigestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Digest Stats
// ============================================================================

/// Surface statistics captured while digesting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestStats {
    /// Line count.
    pub lines: usize,
    /// Word count.
    pub words: usize,
    /// Distinct lowercase word count.
    pub unique_words: usize,
    /// URL occurrences.
    pub urls: usize,
    /// Fenced code block count.
    pub code_fences: usize,
    /// TODO/FIXME marker count.
    pub todo_markers: usize,
}

// ============================================================================
// SECTION: Digest
// ============================================================================

/// Digest content before persistence assigns identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDigest {
    /// Where the content came from.
    pub source: String,
    /// Kind of content summarized.
    pub digest_type: DigestType,
    /// Condensed summary of the content.
    pub content: String,
    /// Detected pattern labels.
    pub patterns: Vec<String>,
    /// Synthesized observations.
    pub insights: Vec<String>,
    /// Surface statistics.
    pub metadata: DigestStats,
}

/// Durable digest record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    /// Stable identifier minted by the persistence layer.
    pub id: DigestId,
    /// Where the content came from.
    pub source: String,
    /// Kind of content summarized.
    pub digest_type: DigestType,
    /// Condensed summary of the content.
    pub content: String,
    /// Detected pattern labels.
    pub patterns: Vec<String>,
    /// Synthesized observations.
    pub insights: Vec<String>,
    /// Surface statistics.
    pub metadata: DigestStats,
    /// Creation timestamp assigned by the persistence layer.
    pub created_at: TimestampMs,
}

impl Digest {
    /// Builds a digest record from content plus assigned identity.
    #[must_use]
    pub fn from_new(new: NewDigest, id: DigestId, created_at: TimestampMs) -> Self {
        Self {
            id,
            source: new.source,
            digest_type: new.digest_type,
            content: new.content,
            patterns: new.patterns,
            insights: new.insights,
            metadata: new.metadata,
            created_at,
        }
    }
}
