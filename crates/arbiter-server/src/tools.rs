// crates/arbiter-server/src/tools.rs
// ============================================================================
// Module: Tool Router
// Description: Named-operation dispatch for the Arbiter HTTP surface.
// Purpose: Validate tool inputs against schemas and route to the runtime.
// Dependencies: arbiter-core, jsonschema, serde_json
// ============================================================================

//! ## Overview
//! The tool router is the single dispatch point for the operation surface:
//! `judge`, `digest`, `search`, `feedback`, `chain`, `trigger`, and
//! `learning`. Every payload is validated against its JSON Schema before the
//! handler runs; handlers are thin wrappers over the runtime components.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arbiter_core::Item;
use arbiter_core::JudgmentId;
use arbiter_core::NewFeedback;
use arbiter_core::PersistenceError;
use arbiter_core::SessionId;
use arbiter_core::SharedPersistence;
use arbiter_core::Topic;
use arbiter_core::Trigger;
use arbiter_core::TriggerId;
use arbiter_core::UserId;
use arbiter_core::core::DigestType;
use arbiter_core::core::FeedbackOutcome;
use arbiter_core::runtime::CallContext;
use arbiter_core::runtime::ChainError;
use arbiter_core::runtime::ChainManager;
use arbiter_core::runtime::DigestEngine;
use arbiter_core::runtime::JudgmentPipeline;
use arbiter_core::runtime::LearningEngine;
use arbiter_core::runtime::PipelineCaller;
use arbiter_core::runtime::PipelineError;
use arbiter_core::runtime::TriggerEngine;
use jsonschema::Validator;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::schemas;

// ============================================================================
// SECTION: Tool Names
// ============================================================================

/// Operations exposed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// Score an item into a judgment.
    Judge,
    /// Digest a text blob into the knowledge base.
    Digest,
    /// Search judgments and digests.
    Search,
    /// Submit feedback on a judgment.
    Feedback,
    /// Chain status, verification, and repair operations.
    Chain,
    /// Trigger rule management.
    Trigger,
    /// Learning loop operations.
    Learning,
}

impl ToolName {
    /// Every tool in listing order.
    pub const ALL: [Self; 7] = [
        Self::Judge,
        Self::Digest,
        Self::Search,
        Self::Feedback,
        Self::Chain,
        Self::Trigger,
        Self::Learning,
    ];

    /// Returns the wire name of the tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Judge => "judge",
            Self::Digest => "digest",
            Self::Search => "search",
            Self::Feedback => "feedback",
            Self::Chain => "chain",
            Self::Trigger => "trigger",
            Self::Learning => "learning",
        }
    }

    /// Parses a tool from its wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    /// Returns the human-readable description used in listings.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Judge => "Score an item across the rubric and persist the judgment.",
            Self::Digest => "Extract patterns and statistics from a text blob.",
            Self::Search => "Full-text search over judgments and digests.",
            Self::Feedback => "Record a correctness assessment for a judgment.",
            Self::Chain => "Inspect, verify, flush, or repair the judgment chain.",
            Self::Trigger => "Manage event-driven evaluation rules.",
            Self::Learning => "Inspect or adjust the feedback-driven learning state.",
        }
    }

    /// Returns the tool's input schema.
    #[must_use]
    pub fn input_schema(self) -> Value {
        match self {
            Self::Judge => schemas::judge_input_schema(),
            Self::Digest => schemas::digest_input_schema(),
            Self::Search => schemas::search_input_schema(),
            Self::Feedback => schemas::feedback_input_schema(),
            Self::Chain => schemas::chain_input_schema(),
            Self::Trigger => schemas::trigger_input_schema(),
            Self::Learning => schemas::learning_input_schema(),
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tool definition entry for `GET /api/tools`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Wire name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Input JSON Schema.
    pub input_schema: Value,
}

/// Returns the canonical tool listing.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolName::ALL
        .into_iter()
        .map(|tool| ToolDefinition {
            name: tool.as_str(),
            description: tool.description(),
            input_schema: tool.input_schema(),
        })
        .collect()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool routing errors.
///
/// # Invariants
/// - `kind` labels are stable; they appear in HTTP envelopes and audit lines.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool with the requested name.
    #[error("unknown tool")]
    UnknownTool,
    /// Payload failed schema validation or decoding.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Persistence failed.
    #[error("storage error: {0}")]
    Storage(String),
    /// Chain operation failed.
    #[error("chain error: {0}")]
    Chain(String),
    /// A required capability is not configured.
    #[error("unavailable: {0}")]
    Unavailable(String),
    /// Operation was aborted by shutdown or timeout.
    #[error("cancelled: {0}")]
    Cancelled(String),
    /// Response serialization failed.
    #[error("serialization failed")]
    Serialization,
    /// Internal invariant violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Returns the stable error kind label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool => "unknown_tool",
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "storage",
            Self::Chain(_) => "chain",
            Self::Unavailable(_) => "unavailable",
            Self::Cancelled(_) => "cancelled",
            Self::Serialization => "serialization",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<PersistenceError> for ToolError {
    fn from(error: PersistenceError) -> Self {
        match error {
            PersistenceError::NotFound(message) => Self::NotFound(message),
            PersistenceError::Invalid(message) => Self::InvalidInput(message),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<PipelineError> for ToolError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::InvalidInput(message) => Self::InvalidInput(message),
            PipelineError::Storage(storage) => storage.into(),
        }
    }
}

impl From<ChainError> for ToolError {
    fn from(error: ChainError) -> Self {
        match error {
            ChainError::Storage(storage) => storage.into(),
            other => Self::Chain(other.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Per-call context accepted by the `judge` tool.
#[derive(Debug, Clone, Default, Deserialize)]
struct JudgeContextRequest {
    /// Optional knowledge prior in [0, 1].
    #[serde(default)]
    prior: Option<f64>,
}

/// `judge` request payload.
#[derive(Debug, Deserialize)]
struct JudgeRequest {
    /// Item to score.
    item: Item,
    /// Optional scoring context.
    #[serde(default)]
    context: Option<JudgeContextRequest>,
    /// Optional user isolation key.
    #[serde(default)]
    user_id: Option<UserId>,
    /// Optional session isolation key.
    #[serde(default)]
    session_id: Option<SessionId>,
}

/// `digest` request payload.
#[derive(Debug, Deserialize)]
struct DigestRequest {
    /// Text blob to digest.
    content: String,
    /// Where the content came from.
    #[serde(default)]
    source: Option<String>,
    /// Kind of content.
    #[serde(default, rename = "type")]
    digest_type: Option<DigestType>,
}

/// Search scopes accepted by the `search` tool.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum SearchScope {
    /// Judgments only.
    Judgments,
    /// Digests only.
    Knowledge,
    /// Judgments and digests.
    #[default]
    All,
}

/// `search` request payload.
#[derive(Debug, Deserialize)]
struct SearchRequest {
    /// Query text.
    query: String,
    /// Search scope.
    #[serde(default, rename = "type")]
    scope: SearchScope,
    /// Maximum results per scope.
    #[serde(default)]
    limit: Option<usize>,
}

/// `feedback` request payload.
#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    /// Judgment the feedback refers to.
    judgment_id: JudgmentId,
    /// Assessment outcome.
    outcome: FeedbackOutcome,
    /// Optional free-text reason.
    #[serde(default)]
    reason: Option<String>,
    /// Optional observed composite score.
    #[serde(default)]
    actual_score: Option<u8>,
    /// Optional user isolation key.
    #[serde(default)]
    user_id: Option<UserId>,
    /// Optional session isolation key.
    #[serde(default)]
    session_id: Option<SessionId>,
}

/// `chain` request payload.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ChainRequest {
    /// Chain status snapshot.
    Status,
    /// Walk the chain verifying integrity.
    Verify {
        /// Slot to start from; defaults to genesis.
        #[serde(default)]
        from_slot: Option<u64>,
    },
    /// Current head block.
    Head,
    /// Block at a specific slot.
    Block {
        /// Slot to load.
        slot: u64,
    },
    /// Most recent blocks.
    Recent {
        /// Maximum blocks to return.
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Chain export in ascending slot order.
    Export {
        /// Maximum blocks to export.
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Force-seal the pending batch.
    Flush,
    /// Restore block slots on linked-but-unmarked judgments.
    Relink,
    /// Seal stored-but-unchained judgments into a recovery block.
    Adopt,
    /// Destroy all persisted state.
    Reset {
        /// Must equal the exact confirmation token.
        confirmation_token: String,
    },
}

/// `trigger` request payload.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum TriggerRequest {
    /// Register or replace a rule.
    Register {
        /// Rule definition.
        trigger: Trigger,
    },
    /// Delete a rule.
    Unregister {
        /// Rule identifier.
        id: TriggerId,
    },
    /// List rules.
    List,
    /// Enable a rule.
    Enable {
        /// Rule identifier.
        id: TriggerId,
    },
    /// Disable a rule.
    Disable {
        /// Rule identifier.
        id: TriggerId,
    },
    /// Run rules against a supplied payload.
    Process {
        /// Topic to evaluate under; defaults to `alert`.
        #[serde(default)]
        topic: Option<String>,
        /// Event payload.
        #[serde(default)]
        payload: Option<Value>,
    },
}

/// `learning` request payload.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum LearningRequest {
    /// Submit feedback through the learning surface.
    Feedback {
        /// Judgment the feedback refers to.
        judgment_id: JudgmentId,
        /// Assessment outcome.
        outcome: FeedbackOutcome,
        /// Optional free-text reason.
        #[serde(default)]
        reason: Option<String>,
        /// Optional observed composite score.
        #[serde(default)]
        actual_score: Option<u8>,
    },
    /// Force a calibration pass.
    Calibrate,
    /// Report detected biases.
    Biases,
    /// Return the current learning state.
    State,
    /// Reset the learning state.
    Reset,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Construction inputs for the tool router.
pub struct ToolRouterConfig {
    /// Judgment pipeline.
    pub pipeline: Arc<JudgmentPipeline>,
    /// Chain manager.
    pub chain: Arc<ChainManager>,
    /// Trigger engine.
    pub triggers: Arc<TriggerEngine>,
    /// Learning engine.
    pub learning: Arc<LearningEngine>,
    /// Digest engine.
    pub digests: Arc<DigestEngine>,
    /// Durable store, used for search and lookups.
    pub persistence: SharedPersistence,
}

/// Named-operation dispatcher.
#[derive(Clone)]
pub struct ToolRouter {
    /// Shared router state.
    inner: Arc<RouterInner>,
}

/// State behind a router handle.
struct RouterInner {
    /// Judgment pipeline.
    pipeline: Arc<JudgmentPipeline>,
    /// Chain manager.
    chain: Arc<ChainManager>,
    /// Trigger engine.
    triggers: Arc<TriggerEngine>,
    /// Learning engine.
    learning: Arc<LearningEngine>,
    /// Digest engine.
    digests: Arc<DigestEngine>,
    /// Durable store.
    persistence: SharedPersistence,
    /// Compiled input validators per tool.
    validators: BTreeMap<ToolName, Validator>,
}

impl ToolRouter {
    /// Builds the router, compiling every tool's input schema.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Internal`] when a schema fails to compile.
    pub fn new(config: ToolRouterConfig) -> Result<Self, ToolError> {
        let mut validators = BTreeMap::new();
        for tool in ToolName::ALL {
            let validator = jsonschema::validator_for(&tool.input_schema())
                .map_err(|err| ToolError::Internal(format!("schema for {tool}: {err}")))?;
            validators.insert(tool, validator);
        }
        Ok(Self {
            inner: Arc::new(RouterInner {
                pipeline: config.pipeline,
                chain: config.chain,
                triggers: config.triggers,
                learning: config.learning,
                digests: config.digests,
                persistence: config.persistence,
                validators,
            }),
        })
    }

    /// Dispatches one tool call.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when the tool is unknown, the payload fails
    /// validation, or the handler fails.
    pub async fn handle(&self, name: &str, payload: Value) -> Result<Value, ToolError> {
        let tool = ToolName::parse(name).ok_or(ToolError::UnknownTool)?;
        if let Some(validator) = self.inner.validators.get(&tool) {
            validator
                .validate(&payload)
                .map_err(|err| ToolError::InvalidInput(err.to_string()))?;
        }
        match tool {
            ToolName::Judge => self.inner.judge(payload).await,
            ToolName::Digest => self.inner.digest(payload),
            ToolName::Search => self.inner.search(payload),
            ToolName::Feedback => self.inner.feedback(payload),
            ToolName::Chain => self.inner.chain(payload).await,
            ToolName::Trigger => self.inner.trigger(payload).await,
            ToolName::Learning => self.inner.learning(payload),
        }
    }
}

impl RouterInner {
    /// Handles the `judge` tool.
    async fn judge(&self, payload: Value) -> Result<Value, ToolError> {
        let request: JudgeRequest = decode(payload)?;
        let context = CallContext {
            prior: request.context.unwrap_or_default().prior,
            provenance: Vec::new(),
        };
        let caller = PipelineCaller {
            user_id: request.user_id,
            session_id: request.session_id,
        };
        let receipt = self.pipeline.judge(&request.item, context, caller).await?;
        to_value(&receipt)
    }

    /// Handles the `digest` tool.
    fn digest(&self, payload: Value) -> Result<Value, ToolError> {
        let request: DigestRequest = decode(payload)?;
        let digest = self.digests.digest(
            &request.content,
            request.source.as_deref(),
            request.digest_type.unwrap_or(DigestType::Text),
        )?;
        Ok(json!({
            "id": digest.id,
            "patterns": digest.patterns,
            "insights": digest.insights,
            "stats": digest.metadata,
        }))
    }

    /// Handles the `search` tool.
    fn search(&self, payload: Value) -> Result<Value, ToolError> {
        let request: SearchRequest = decode(payload)?;
        let limit = request.limit.unwrap_or(20).min(1_000);
        let mut results = Vec::new();
        if matches!(request.scope, SearchScope::Judgments | SearchScope::All) {
            for judgment in self.persistence.search_judgments(&request.query, limit)? {
                results.push(json!({
                    "kind": "judgment",
                    "id": judgment.id,
                    "q_score": judgment.q_score,
                    "verdict": judgment.verdict,
                    "item_type": judgment.item_type,
                    "item_content": judgment.item_content,
                    "block_slot": judgment.block_slot,
                    "created_at": judgment.created_at,
                }));
            }
        }
        if matches!(request.scope, SearchScope::Knowledge | SearchScope::All) {
            for digest in self.persistence.search_digests(&request.query, limit)? {
                results.push(json!({
                    "kind": "digest",
                    "id": digest.id,
                    "source": digest.source,
                    "content": digest.content,
                    "patterns": digest.patterns,
                    "created_at": digest.created_at,
                }));
            }
        }
        let total = results.len();
        Ok(json!({ "results": results, "total": total }))
    }

    /// Handles the `feedback` tool.
    fn feedback(&self, payload: Value) -> Result<Value, ToolError> {
        let request: FeedbackRequest = decode(payload)?;
        self.submit_feedback(
            request.judgment_id,
            request.outcome,
            request.reason,
            request.actual_score,
            request.user_id,
            request.session_id,
        )
    }

    /// Stores feedback and feeds the learning loop.
    fn submit_feedback(
        &self,
        judgment_id: JudgmentId,
        outcome: FeedbackOutcome,
        reason: Option<String>,
        actual_score: Option<u8>,
        user_id: Option<UserId>,
        session_id: Option<SessionId>,
    ) -> Result<Value, ToolError> {
        let judgment = self
            .persistence
            .judgment(&judgment_id)?
            .ok_or_else(|| ToolError::NotFound(format!("judgment {judgment_id}")))?;
        let feedback = self.persistence.store_feedback(&NewFeedback {
            judgment_id,
            outcome,
            reason,
            actual_score,
            user_id,
            session_id,
        })?;
        let report = self.learning.process_feedback(&feedback, &judgment)?;
        Ok(json!({ "id": feedback.id, "learning": report }))
    }

    /// Handles the `chain` tool.
    async fn chain(&self, payload: Value) -> Result<Value, ToolError> {
        let request: ChainRequest = decode(payload)?;
        match request {
            ChainRequest::Status => to_value(&self.chain.status()),
            ChainRequest::Verify {
                from_slot,
            } => to_value(&self.chain.verify_integrity(from_slot)?),
            ChainRequest::Head => to_value(&self.chain.head()),
            ChainRequest::Block {
                slot,
            } => {
                let block = self
                    .persistence
                    .block_by_slot(slot)?
                    .ok_or_else(|| ToolError::NotFound(format!("block {slot}")))?;
                to_value(&block)
            }
            ChainRequest::Recent {
                limit,
            } => to_value(&self.persistence.recent_blocks(limit.unwrap_or(10).min(1_000))?),
            ChainRequest::Export {
                limit,
            } => {
                let mut blocks =
                    self.persistence.recent_blocks(limit.unwrap_or(1_000).min(1_000))?;
                blocks.reverse();
                Ok(json!({
                    "head_slot": self.chain.status().head_slot,
                    "blocks": blocks,
                }))
            }
            ChainRequest::Flush => {
                let sealed = self.chain.flush().await?;
                Ok(json!({ "sealed": sealed }))
            }
            ChainRequest::Relink => to_value(&self.chain.relink_orphaned_judgments()?),
            ChainRequest::Adopt => to_value(&self.chain.adopt_orphaned_judgments()?),
            ChainRequest::Reset {
                confirmation_token,
            } => {
                self.chain.reset_all(&confirmation_token)?;
                Ok(json!({ "reset": true }))
            }
        }
    }

    /// Handles the `trigger` tool.
    async fn trigger(&self, payload: Value) -> Result<Value, ToolError> {
        let request: TriggerRequest = decode(payload)?;
        match request {
            TriggerRequest::Register {
                trigger,
            } => {
                self.triggers.register(trigger)?;
                Ok(json!({ "registered": true }))
            }
            TriggerRequest::Unregister {
                id,
            } => {
                let removed = self.triggers.unregister(&id)?;
                Ok(json!({ "removed": removed }))
            }
            TriggerRequest::List => to_value(&self.triggers.list()),
            TriggerRequest::Enable {
                id,
            } => {
                let updated = self.triggers.set_enabled(&id, true)?;
                Ok(json!({ "updated": updated }))
            }
            TriggerRequest::Disable {
                id,
            } => {
                let updated = self.triggers.set_enabled(&id, false)?;
                Ok(json!({ "updated": updated }))
            }
            TriggerRequest::Process {
                topic,
                payload,
            } => {
                let topic = topic
                    .as_deref()
                    .map_or(Some(Topic::Alert), Topic::parse)
                    .ok_or_else(|| ToolError::InvalidInput("unknown topic".to_string()))?;
                let fired = self
                    .triggers
                    .process_manual(topic, payload.unwrap_or_else(|| json!({})))
                    .await;
                Ok(json!({ "fired": fired }))
            }
        }
    }

    /// Handles the `learning` tool.
    fn learning(&self, payload: Value) -> Result<Value, ToolError> {
        let request: LearningRequest = decode(payload)?;
        match request {
            LearningRequest::Feedback {
                judgment_id,
                outcome,
                reason,
                actual_score,
            } => self.submit_feedback(judgment_id, outcome, reason, actual_score, None, None),
            LearningRequest::Calibrate => to_value(&self.learning.calibrate()?),
            LearningRequest::Biases => Ok(json!({ "biases": self.learning.detect_biases() })),
            LearningRequest::State => to_value(&*self.learning.snapshot()),
            LearningRequest::Reset => {
                self.learning.reset()?;
                Ok(json!({ "reset": true }))
            }
        }
    }
}

/// Decodes a validated payload into a request type.
fn decode<T: serde::de::DeserializeOwned>(payload: Value) -> Result<T, ToolError> {
    serde_json::from_value(payload).map_err(|err| ToolError::InvalidInput(err.to_string()))
}

/// Serializes a response value.
fn to_value<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|_| ToolError::Serialization)
}
