// crates/arbiter-core/src/core/trigger.rs
// ============================================================================
// Module: Arbiter Trigger Model
// Description: Persistent rules binding event predicates to actions.
// Purpose: Define the trigger vocabulary evaluated by the trigger engine.
// Dependencies: serde, serde_json, crate::core::{events, identifiers}
// ============================================================================

//! ## Overview
//! A trigger pairs a pure condition over event payloads with an action. Rules
//! persist across restarts; the engine loads them at startup and writes every
//! mutation through. Conditions never perform I/O.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::events::Topic;
use crate::core::identifiers::TriggerId;

// ============================================================================
// SECTION: Trigger Type
// ============================================================================

/// When a trigger is considered for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Matches any bus event.
    Event,
    /// Matches ticks from the periodic scheduler.
    Periodic,
    /// Matches `pattern` topic events only.
    Pattern,
    /// Matches `judgment` topic events only; conditions are numeric.
    Threshold,
    /// Matches any event; the condition carries the composite logic.
    Composite,
}

impl TriggerType {
    /// Returns the stable label for the trigger type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Periodic => "periodic",
            Self::Pattern => "pattern",
            Self::Threshold => "threshold",
            Self::Composite => "composite",
        }
    }
}

// ============================================================================
// SECTION: Condition
// ============================================================================

/// Pure predicate over an event topic and payload.
///
/// # Invariants
/// - Evaluation is side-effect free and total: malformed payloads are `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerCondition {
    /// Always matches.
    Always,
    /// Matches a specific topic.
    TopicIs {
        /// Topic to match.
        topic: Topic,
    },
    /// Payload field equals a JSON value.
    FieldEquals {
        /// Top-level payload field name.
        field: String,
        /// Expected value.
        value: Value,
    },
    /// Payload field is a number strictly greater than the bound.
    FieldGt {
        /// Top-level payload field name.
        field: String,
        /// Exclusive lower bound.
        value: f64,
    },
    /// Payload field is a number strictly less than the bound.
    FieldLt {
        /// Top-level payload field name.
        field: String,
        /// Exclusive upper bound.
        value: f64,
    },
    /// Payload string field contains a substring.
    FieldContains {
        /// Top-level payload field name.
        field: String,
        /// Substring to look for.
        needle: String,
    },
    /// Every sub-condition matches.
    AllOf {
        /// Sub-conditions.
        conditions: Vec<TriggerCondition>,
    },
    /// At least one sub-condition matches.
    AnyOf {
        /// Sub-conditions.
        conditions: Vec<TriggerCondition>,
    },
}

impl TriggerCondition {
    /// Evaluates the condition against a payload and an optional topic.
    ///
    /// Periodic ticks carry no topic; `TopicIs` never matches them.
    #[must_use]
    pub fn matches(&self, topic: Option<Topic>, payload: &Value) -> bool {
        match self {
            Self::Always => true,
            Self::TopicIs {
                topic: expected,
            } => topic == Some(*expected),
            Self::FieldEquals {
                field,
                value,
            } => payload.get(field) == Some(value),
            Self::FieldGt {
                field,
                value,
            } => payload.get(field).and_then(Value::as_f64).is_some_and(|actual| actual > *value),
            Self::FieldLt {
                field,
                value,
            } => payload.get(field).and_then(Value::as_f64).is_some_and(|actual| actual < *value),
            Self::FieldContains {
                field,
                needle,
            } => payload
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|actual| actual.contains(needle.as_str())),
            Self::AllOf {
                conditions,
            } => conditions.iter().all(|condition| condition.matches(topic, payload)),
            Self::AnyOf {
                conditions,
            } => conditions.iter().any(|condition| condition.matches(topic, payload)),
        }
    }
}

// ============================================================================
// SECTION: Action
// ============================================================================

/// Action executed when a trigger matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerAction {
    /// Construct an item from the payload and judge it.
    Judge,
    /// Record the event through the log capability.
    Log,
    /// Publish an alert event.
    Alert,
    /// Invoke the block capability.
    Block,
    /// Invoke the review capability.
    Review,
    /// Invoke the notify capability.
    Notify,
}

impl TriggerAction {
    /// Returns the stable label for the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Judge => "judge",
            Self::Log => "log",
            Self::Alert => "alert",
            Self::Block => "block",
            Self::Review => "review",
            Self::Notify => "notify",
        }
    }
}

// ============================================================================
// SECTION: Trigger
// ============================================================================

/// A persistent rule binding a condition to an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// Stable rule identifier.
    pub id: TriggerId,
    /// Human-readable rule name.
    pub name: String,
    /// When the rule is considered for matching.
    pub trigger_type: TriggerType,
    /// Pure predicate over event payloads.
    pub condition: TriggerCondition,
    /// Action executed on match.
    pub action: TriggerAction,
    /// Action-specific configuration payload.
    #[serde(default)]
    pub action_config: Value,
    /// Whether the rule participates in matching.
    pub enabled: bool,
    /// Execution priority; higher runs first.
    pub priority: i64,
}
