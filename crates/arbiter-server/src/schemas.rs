// crates/arbiter-server/src/schemas.rs
// ============================================================================
// Module: Tool Input Schemas
// Description: JSON Schemas validated before tool dispatch.
// Purpose: Keep the tool contract explicit and machine-checkable.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! One schema per tool, draft 2020-12. Schemas gate dispatch: payloads that
//! fail validation are rejected as invalid input before any handler runs.
//! Enum vocabularies here mirror the core type definitions; the router tests
//! assert they stay in sync.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Shared Fragments
// ============================================================================

/// Schema fragment for an item payload.
fn item_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "type": {
                "type": "string",
                "enum": ["note", "code", "commit", "claim", "event", "other"]
            },
            "content": { "type": "string", "minLength": 1 },
            "sources": { "type": "array", "items": { "type": "string" } },
            "verified": { "type": ["boolean", "null"] },
            "pinned_scores": {
                "type": "object",
                "additionalProperties": { "type": "number" }
            }
        },
        "required": ["type", "content"],
        "additionalProperties": false
    })
}

// ============================================================================
// SECTION: Tool Schemas
// ============================================================================

/// Input schema for the `judge` tool.
#[must_use]
pub fn judge_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "item": item_schema(),
            "context": {
                "type": "object",
                "properties": {
                    "prior": { "type": ["number", "null"], "minimum": 0.0, "maximum": 1.0 }
                },
                "additionalProperties": false
            },
            "user_id": { "type": ["string", "null"] },
            "session_id": { "type": ["string", "null"] }
        },
        "required": ["item"],
        "additionalProperties": false
    })
}

/// Input schema for the `digest` tool.
#[must_use]
pub fn digest_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "content": { "type": "string", "minLength": 1 },
            "source": { "type": ["string", "null"] },
            "type": {
                "type": "string",
                "enum": ["text", "code", "log", "other"]
            }
        },
        "required": ["content"],
        "additionalProperties": false
    })
}

/// Input schema for the `search` tool.
#[must_use]
pub fn search_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": { "type": "string", "minLength": 1 },
            "type": {
                "type": "string",
                "enum": ["judgments", "knowledge", "all"]
            },
            "limit": { "type": "integer", "minimum": 1, "maximum": 1000 }
        },
        "required": ["query"],
        "additionalProperties": false
    })
}

/// Input schema for the `feedback` tool.
#[must_use]
pub fn feedback_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "judgment_id": { "type": "string", "minLength": 1 },
            "outcome": { "type": "string", "enum": ["correct", "incorrect", "partial"] },
            "reason": { "type": ["string", "null"] },
            "actual_score": { "type": ["integer", "null"], "minimum": 0, "maximum": 100 },
            "user_id": { "type": ["string", "null"] },
            "session_id": { "type": ["string", "null"] }
        },
        "required": ["judgment_id", "outcome"],
        "additionalProperties": false
    })
}

/// Input schema for the `chain` tool.
#[must_use]
pub fn chain_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": [
                    "status", "verify", "head", "block", "recent",
                    "export", "flush", "relink", "adopt", "reset"
                ]
            },
            "from_slot": { "type": ["integer", "null"], "minimum": 0 },
            "slot": { "type": ["integer", "null"], "minimum": 0 },
            "limit": { "type": ["integer", "null"], "minimum": 1, "maximum": 1000 },
            "confirmation_token": { "type": ["string", "null"] }
        },
        "required": ["action"],
        "additionalProperties": false
    })
}

/// Input schema for the `trigger` tool.
#[must_use]
pub fn trigger_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": ["register", "unregister", "list", "enable", "disable", "process"]
            },
            "trigger": { "type": "object" },
            "id": { "type": ["string", "null"] },
            "topic": {
                "type": ["string", "null"],
                "enum": [
                    "judgment", "block", "alert", "tool.pre",
                    "tool.post", "pattern", "connection", null
                ]
            },
            "payload": {}
        },
        "required": ["action"],
        "additionalProperties": false
    })
}

/// Input schema for the `learning` tool.
#[must_use]
pub fn learning_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": ["feedback", "calibrate", "biases", "state", "reset"]
            },
            "judgment_id": { "type": ["string", "null"] },
            "outcome": {
                "type": ["string", "null"],
                "enum": ["correct", "incorrect", "partial", null]
            },
            "reason": { "type": ["string", "null"] },
            "actual_score": { "type": ["integer", "null"], "minimum": 0, "maximum": 100 }
        },
        "required": ["action"],
        "additionalProperties": false
    })
}
