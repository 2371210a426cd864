// crates/arbiter-core/src/core/identifiers.rs
// ============================================================================
// Module: Arbiter Identifiers
// Description: Canonical opaque identifiers for judgments, feedback, and rules.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical string-based identifiers used throughout
//! Arbiter. Identifiers are opaque and serialize as strings. Judgment,
//! feedback, and digest identifiers are minted by the persistence layer;
//! trigger, user, and session identifiers are caller-supplied.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

/// Defines an opaque string identifier newtype with standard conversions.
macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

string_id! {
    /// Judgment identifier minted by the persistence layer.
    JudgmentId
}

string_id! {
    /// Feedback identifier minted by the persistence layer.
    FeedbackId
}

string_id! {
    /// Digest identifier minted by the persistence layer.
    DigestId
}

string_id! {
    /// Trigger rule identifier supplied at registration time.
    TriggerId
}

string_id! {
    /// Caller-scoped user identifier used for isolation.
    UserId
}

string_id! {
    /// Caller-scoped session identifier used for isolation.
    SessionId
}
