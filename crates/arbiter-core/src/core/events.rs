// crates/arbiter-core/src/core/events.rs
// ============================================================================
// Module: Arbiter Event Vocabulary
// Description: Topics and event payloads carried by the in-process bus.
// Purpose: Define the fixed topic set and the event envelope.
// Dependencies: serde, serde_json, crate::core::identifiers
// ============================================================================

//! ## Overview
//! Pipeline components communicate through topic-keyed events. The topic set
//! is fixed; payloads are JSON values. Events carry a provenance list of
//! trigger identifiers so the trigger engine can prevent self-amplifying
//! loops.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::TriggerId;

// ============================================================================
// SECTION: Topics
// ============================================================================

/// Topic keys carried by the event bus.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// A judgment was stored.
    Judgment,
    /// A block was sealed.
    Block,
    /// An alert was raised.
    Alert,
    /// A tool call is about to run.
    ToolPre,
    /// A tool call finished.
    ToolPost,
    /// A digest surfaced patterns.
    Pattern,
    /// A client connected or disconnected.
    Connection,
}

impl Topic {
    /// Every topic in canonical order.
    pub const ALL: [Self; 7] = [
        Self::Judgment,
        Self::Block,
        Self::Alert,
        Self::ToolPre,
        Self::ToolPost,
        Self::Pattern,
        Self::Connection,
    ];

    /// Returns the wire label for the topic.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Judgment => "judgment",
            Self::Block => "block",
            Self::Alert => "alert",
            Self::ToolPre => "tool.pre",
            Self::ToolPost => "tool.post",
            Self::Pattern => "pattern",
            Self::Connection => "connection",
        }
    }

    /// Parses a topic from its wire label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|topic| topic.as_str() == label)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Event Envelope
// ============================================================================

/// One event delivered to bus subscribers.
///
/// # Invariants
/// - `provenance` lists every trigger that contributed to producing the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    /// Topic the event was published on.
    pub topic: Topic,
    /// JSON payload.
    pub payload: Value,
    /// Trigger identifiers that led to this event.
    #[serde(default)]
    pub provenance: Vec<TriggerId>,
}

impl BusEvent {
    /// Creates an event with empty provenance.
    #[must_use]
    pub fn new(topic: Topic, payload: Value) -> Self {
        Self {
            topic,
            payload,
            provenance: Vec::new(),
        }
    }

    /// Creates an event carrying trigger provenance.
    #[must_use]
    pub fn with_provenance(topic: Topic, payload: Value, provenance: Vec<TriggerId>) -> Self {
        Self {
            topic,
            payload,
            provenance,
        }
    }
}
