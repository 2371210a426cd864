// crates/arbiter-config/src/config.rs
// ============================================================================
// Module: Arbiter Configuration
// Description: Configuration loading and validation for the Arbiter server.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: arbiter-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size limits. Missing
//! or invalid configuration fails closed: the server refuses to start rather
//! than guessing. Every section has serde defaults, so an empty file is a
//! valid development configuration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use arbiter_core::Axiom;
use arbiter_core::Dimension;
use arbiter_core::ScoringConfig;
use arbiter_core::VerdictThresholds;
use arbiter_core::runtime::BatchQueueConfig;
use arbiter_core::runtime::ChainConfig;
use arbiter_core::runtime::LearningConfig;
use arbiter_core::runtime::TriggerEngineConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "arbiter.toml";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;
/// Maximum number of bearer tokens.
pub(crate) const MAX_AUTH_TOKENS: usize = 64;
/// Maximum length of a bearer token.
pub(crate) const MAX_AUTH_TOKEN_LENGTH: usize = 256;
/// Minimum allowed rate limit window in milliseconds.
pub(crate) const MIN_RATE_LIMIT_WINDOW_MS: u64 = 100;
/// Maximum allowed rate limit window in milliseconds.
pub(crate) const MAX_RATE_LIMIT_WINDOW_MS: u64 = 60_000;
/// Minimum SSE heartbeat interval in milliseconds.
pub(crate) const MIN_HEARTBEAT_INTERVAL_MS: u64 = 1_000;
/// Tolerance when checking that axiom weight overrides sum to one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Config file could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Config file exceeds the size limit.
    #[error("config file too large: {actual} bytes (max {max})")]
    TooLarge {
        /// Maximum allowed bytes.
        max: u64,
        /// Actual file size in bytes.
        actual: u64,
    },
    /// A value failed validation.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Server Section
// ============================================================================

/// Rate limiter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window per key.
    pub max_requests: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Maximum tracked keys before eviction.
    #[serde(default = "default_rate_limit_entries")]
    pub max_entries: usize,
}

/// Returns the default tracked-entry bound for the rate limiter.
const fn default_rate_limit_entries() -> usize {
    4_096
}

/// Request limits for the HTTP surface.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerLimitsConfig {
    /// Maximum concurrently processed requests.
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
    /// Optional fixed-window rate limiter.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for ServerLimitsConfig {
    fn default() -> Self {
        Self {
            max_inflight: default_max_inflight(),
            rate_limit: None,
        }
    }
}

/// Returns the default in-flight request bound.
const fn default_max_inflight() -> usize {
    256
}

/// Bearer-token authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerAuthConfig {
    /// Accepted bearer tokens.
    #[serde(default)]
    pub bearer_tokens: Vec<String>,
}

/// Tool-call audit sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerAuditConfig {
    /// Whether tool calls are audited.
    #[serde(default)]
    pub enabled: bool,
    /// Audit log file path; stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address, `host:port`.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Request limits.
    #[serde(default)]
    pub limits: ServerLimitsConfig,
    /// Optional bearer-token authentication.
    #[serde(default)]
    pub auth: Option<ServerAuthConfig>,
    /// Tool-call audit sink.
    #[serde(default)]
    pub audit: ServerAuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            limits: ServerLimitsConfig::default(),
            auth: None,
            audit: ServerAuditConfig::default(),
        }
    }
}

/// Returns the default bind address.
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Returns the default request body limit.
const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl ServerConfig {
    /// Validates the server section.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid(format!("server.bind is not an address: {}", self.bind)))?;
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("server.max_body_bytes must be nonzero".to_string()));
        }
        if self.limits.max_inflight == 0 {
            return Err(ConfigError::Invalid(
                "server.limits.max_inflight must be nonzero".to_string(),
            ));
        }
        if let Some(rate_limit) = &self.limits.rate_limit {
            if rate_limit.max_requests == 0 {
                return Err(ConfigError::Invalid(
                    "server.limits.rate_limit.max_requests must be nonzero".to_string(),
                ));
            }
            if !(MIN_RATE_LIMIT_WINDOW_MS..=MAX_RATE_LIMIT_WINDOW_MS)
                .contains(&rate_limit.window_ms)
            {
                return Err(ConfigError::Invalid(format!(
                    "server.limits.rate_limit.window_ms must be within {MIN_RATE_LIMIT_WINDOW_MS}..={MAX_RATE_LIMIT_WINDOW_MS}"
                )));
            }
            if rate_limit.max_entries == 0 {
                return Err(ConfigError::Invalid(
                    "server.limits.rate_limit.max_entries must be nonzero".to_string(),
                ));
            }
        }
        if let Some(auth) = &self.auth {
            if auth.bearer_tokens.is_empty() {
                return Err(ConfigError::Invalid(
                    "server.auth requires at least one bearer token".to_string(),
                ));
            }
            if auth.bearer_tokens.len() > MAX_AUTH_TOKENS {
                return Err(ConfigError::Invalid(format!(
                    "server.auth.bearer_tokens exceeds {MAX_AUTH_TOKENS} entries"
                )));
            }
            for token in &auth.bearer_tokens {
                if token.is_empty() || token.len() > MAX_AUTH_TOKEN_LENGTH {
                    return Err(ConfigError::Invalid(
                        "server.auth bearer tokens must be 1..=256 bytes".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Scoring Section
// ============================================================================

/// Verdict threshold settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdSettings {
    /// Scores below this are `reject`.
    pub concern_min: u8,
    /// Scores below this (and at least `concern_min`) are `concern`.
    pub accept_min: u8,
    /// Scores below this (and at least `accept_min`) are `accept`.
    pub strong_accept_min: u8,
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        let defaults = VerdictThresholds::default();
        Self {
            concern_min: defaults.concern_min,
            accept_min: defaults.accept_min,
            strong_accept_min: defaults.strong_accept_min,
        }
    }
}

/// Scoring rubric settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSettings {
    /// Upper bound on judgment confidence.
    #[serde(default = "default_max_confidence")]
    pub max_confidence: f64,
    /// Threshold below which a dimension counts as a weakness.
    #[serde(default = "default_concern_threshold")]
    pub concern_threshold: f64,
    /// Verdict band cut points.
    #[serde(default)]
    pub verdict_thresholds: ThresholdSettings,
    /// Axiom weight overrides keyed by axiom label.
    #[serde(default)]
    pub axiom_weights: BTreeMap<String, f64>,
    /// Dimension weight overrides keyed by dimension label.
    #[serde(default)]
    pub dimension_weights: BTreeMap<String, f64>,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            max_confidence: default_max_confidence(),
            concern_threshold: default_concern_threshold(),
            verdict_thresholds: ThresholdSettings::default(),
            axiom_weights: BTreeMap::new(),
            dimension_weights: BTreeMap::new(),
        }
    }
}

/// Returns the default confidence bound.
const fn default_max_confidence() -> f64 {
    arbiter_core::DEFAULT_MAX_CONFIDENCE
}

/// Returns the default concern threshold.
const fn default_concern_threshold() -> f64 {
    arbiter_core::DEFAULT_CONCERN_THRESHOLD
}

impl ScoringSettings {
    /// Validates the scoring section.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.max_confidence) || self.max_confidence <= 0.0 {
            return Err(ConfigError::Invalid(
                "scoring.max_confidence must be in (0, 1)".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.concern_threshold) {
            return Err(ConfigError::Invalid(
                "scoring.concern_threshold must be in [0, 1]".to_string(),
            ));
        }
        let thresholds = VerdictThresholds {
            concern_min: self.verdict_thresholds.concern_min,
            accept_min: self.verdict_thresholds.accept_min,
            strong_accept_min: self.verdict_thresholds.strong_accept_min,
        };
        if !thresholds.is_ordered() {
            return Err(ConfigError::Invalid(
                "scoring.verdict_thresholds must be strictly ordered".to_string(),
            ));
        }
        if !self.axiom_weights.is_empty() {
            let mut sum = 0.0;
            for (label, weight) in &self.axiom_weights {
                if Axiom::parse(label).is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "scoring.axiom_weights has unknown axiom: {label}"
                    )));
                }
                if *weight < 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "scoring.axiom_weights.{label} must be non-negative"
                    )));
                }
                sum += weight;
            }
            if self.axiom_weights.len() == Axiom::ALL.len()
                && (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE
            {
                return Err(ConfigError::Invalid(
                    "scoring.axiom_weights must sum to 1".to_string(),
                ));
            }
        }
        for (label, weight) in &self.dimension_weights {
            if Dimension::parse(label).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "scoring.dimension_weights has unknown dimension: {label}"
                )));
            }
            if *weight < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "scoring.dimension_weights.{label} must be non-negative"
                )));
            }
        }
        Ok(())
    }

    /// Builds the core scoring configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unknown rubric labels.
    pub fn to_scoring_config(&self) -> Result<ScoringConfig, ConfigError> {
        let mut axiom_weights = BTreeMap::new();
        for (label, weight) in &self.axiom_weights {
            let axiom = Axiom::parse(label).ok_or_else(|| {
                ConfigError::Invalid(format!("scoring.axiom_weights has unknown axiom: {label}"))
            })?;
            axiom_weights.insert(axiom, *weight);
        }
        let mut dimension_weights = BTreeMap::new();
        for (label, weight) in &self.dimension_weights {
            let dimension = Dimension::parse(label).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "scoring.dimension_weights has unknown dimension: {label}"
                ))
            })?;
            dimension_weights.insert(dimension, *weight);
        }
        Ok(ScoringConfig {
            max_confidence: self.max_confidence,
            concern_threshold: self.concern_threshold,
            thresholds: VerdictThresholds {
                concern_min: self.verdict_thresholds.concern_min,
                accept_min: self.verdict_thresholds.accept_min,
                strong_accept_min: self.verdict_thresholds.strong_accept_min,
            },
            axiom_weights,
            dimension_weights,
        })
    }
}

// ============================================================================
// SECTION: Batch, Chain, SSE, Learning, Trigger Sections
// ============================================================================

/// Default batch queue settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchSettings {
    /// Count trigger for background flushes.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Interval for the periodic flush ticker.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Size bound that forces an inline flush.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            max_queue_size: default_max_queue_size(),
        }
    }
}

/// Returns the default batch size.
const fn default_batch_size() -> usize {
    13
}

/// Returns the default flush interval.
const fn default_flush_interval_ms() -> u64 {
    5_000
}

/// Returns the default queue bound.
const fn default_max_queue_size() -> usize {
    89
}

impl BatchSettings {
    /// Validates the batch section.
    fn validate(&self, prefix: &str) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(format!("{prefix}.batch_size must be nonzero")));
        }
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::Invalid(format!(
                "{prefix}.flush_interval_ms must be nonzero"
            )));
        }
        if self.max_queue_size < self.batch_size {
            return Err(ConfigError::Invalid(format!(
                "{prefix}.max_queue_size must be at least batch_size"
            )));
        }
        Ok(())
    }

    /// Builds a batch queue configuration with the given name.
    #[must_use]
    pub fn to_queue_config(&self, name: &str) -> BatchQueueConfig {
        BatchQueueConfig {
            name: name.to_string(),
            batch_size: self.batch_size,
            flush_interval_ms: self.flush_interval_ms,
            max_queue_size: self.max_queue_size,
        }
    }
}

/// Chain batch overrides; unset fields fall back to `[batch]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainSettings {
    /// Judgments per sealed block.
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Interval for time-based sealing.
    #[serde(default)]
    pub flush_interval_ms: Option<u64>,
    /// Queue bound that forces an inline seal.
    #[serde(default)]
    pub max_queue_size: Option<usize>,
}

impl ChainSettings {
    /// Builds the chain configuration over the batch defaults.
    #[must_use]
    pub fn to_chain_config(&self, batch: &BatchSettings) -> ChainConfig {
        ChainConfig {
            batch_size: self.batch_size.unwrap_or(batch.batch_size),
            flush_interval_ms: self.flush_interval_ms.unwrap_or(batch.flush_interval_ms),
            max_queue_size: self.max_queue_size.unwrap_or(batch.max_queue_size),
        }
    }
}

/// SSE stream settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SseSettings {
    /// Heartbeat comment interval.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Per-subscriber event queue capacity.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for SseSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Returns the default heartbeat interval.
const fn default_heartbeat_interval_ms() -> u64 {
    15_000
}

/// Returns the default subscriber queue capacity.
const fn default_channel_capacity() -> usize {
    256
}

impl SseSettings {
    /// Validates the SSE section.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval_ms < MIN_HEARTBEAT_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "sse.heartbeat_interval_ms must be at least {MIN_HEARTBEAT_INTERVAL_MS}"
            )));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid("sse.channel_capacity must be nonzero".to_string()));
        }
        Ok(())
    }
}

/// Learning loop settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LearningSettings {
    /// Whether reaching the backlog threshold calibrates automatically.
    #[serde(default = "default_auto_calibrate")]
    pub auto_calibrate: bool,
    /// Backlog size that triggers automatic calibration.
    #[serde(default = "default_calibrate_threshold")]
    pub calibrate_threshold: usize,
    /// Bound on the absolute value of any modifier.
    #[serde(default = "default_modifier_range")]
    pub modifier_range: f64,
    /// Step scale applied to residuals during calibration.
    #[serde(default = "default_modifier_step")]
    pub modifier_step: f64,
}

impl Default for LearningSettings {
    fn default() -> Self {
        Self {
            auto_calibrate: default_auto_calibrate(),
            calibrate_threshold: default_calibrate_threshold(),
            modifier_range: default_modifier_range(),
            modifier_step: default_modifier_step(),
        }
    }
}

/// Returns the default auto-calibrate flag.
const fn default_auto_calibrate() -> bool {
    true
}

/// Returns the default calibration threshold.
const fn default_calibrate_threshold() -> usize {
    21
}

/// Returns the default modifier range.
const fn default_modifier_range() -> f64 {
    0.236
}

/// Returns the default modifier step.
const fn default_modifier_step() -> f64 {
    0.089
}

impl LearningSettings {
    /// Validates the learning section.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.calibrate_threshold == 0 {
            return Err(ConfigError::Invalid(
                "learning.calibrate_threshold must be nonzero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.modifier_range) {
            return Err(ConfigError::Invalid(
                "learning.modifier_range must be in [0, 1]".to_string(),
            ));
        }
        if self.modifier_step <= 0.0 || self.modifier_step > 1.0 {
            return Err(ConfigError::Invalid(
                "learning.modifier_step must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the core learning configuration.
    #[must_use]
    pub const fn to_learning_config(&self) -> LearningConfig {
        LearningConfig {
            auto_calibrate: self.auto_calibrate,
            calibrate_threshold: self.calibrate_threshold,
            modifier_range: self.modifier_range,
            modifier_step: self.modifier_step,
        }
    }
}

/// Trigger engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerSettings {
    /// Interval driving periodic triggers.
    #[serde(default = "default_periodic_interval_ms")]
    pub periodic_interval_ms: u64,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            periodic_interval_ms: default_periodic_interval_ms(),
        }
    }
}

/// Returns the default periodic trigger interval.
const fn default_periodic_interval_ms() -> u64 {
    60_000
}

impl TriggerSettings {
    /// Validates the trigger section.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.periodic_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "triggers.periodic_interval_ms must be nonzero".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the trigger engine configuration.
    #[must_use]
    pub const fn to_engine_config(&self) -> TriggerEngineConfig {
        TriggerEngineConfig {
            periodic_interval_ms: self.periodic_interval_ms,
        }
    }
}

// ============================================================================
// SECTION: Persistence Section
// ============================================================================

/// Persistence backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceKind {
    /// Process-memory store; state dies with the server.
    #[default]
    Memory,
    /// Durable SQLite store.
    Sqlite,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Backend selector.
    #[serde(default)]
    pub kind: PersistenceKind,
    /// Database path; required for the SQLite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            kind: PersistenceKind::default(),
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Returns the default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl PersistenceConfig {
    /// Validates the persistence section.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.kind == PersistenceKind::Sqlite && self.path.is_none() {
            return Err(ConfigError::Invalid(
                "persistence.kind = \"sqlite\" requires persistence.path".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Root Arbiter configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArbiterConfig {
    /// HTTP server section.
    #[serde(default)]
    pub server: ServerConfig,
    /// Scoring rubric section.
    #[serde(default)]
    pub scoring: ScoringSettings,
    /// Default batch queue section.
    #[serde(default)]
    pub batch: BatchSettings,
    /// Chain batch overrides.
    #[serde(default)]
    pub chain: ChainSettings,
    /// SSE stream section.
    #[serde(default)]
    pub sse: SseSettings,
    /// Learning loop section.
    #[serde(default)]
    pub learning: LearningSettings,
    /// Trigger engine section.
    #[serde(default)]
    pub triggers: TriggerSettings,
    /// Persistence section.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl ArbiterConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed, or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let metadata = fs::metadata(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::TooLarge {
                max: MAX_CONFIG_FILE_SIZE,
                actual: metadata.len(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        Self::from_toml(&raw)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section, fail-closed.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.scoring.validate()?;
        self.batch.validate("batch")?;
        BatchSettings {
            batch_size: self.chain.batch_size.unwrap_or(self.batch.batch_size),
            flush_interval_ms: self
                .chain
                .flush_interval_ms
                .unwrap_or(self.batch.flush_interval_ms),
            max_queue_size: self.chain.max_queue_size.unwrap_or(self.batch.max_queue_size),
        }
        .validate("chain")?;
        self.sse.validate()?;
        self.learning.validate()?;
        self.triggers.validate()?;
        self.persistence.validate()?;
        Ok(())
    }
}
