// crates/arbiter-core/src/runtime/digest.rs
// ============================================================================
// Module: Arbiter Digest Engine
// Description: Lexical digestion of text blobs into patterns and insights.
// Purpose: Append searchable summaries to the knowledge base.
// Dependencies: crate::core, crate::interfaces, crate::runtime::bus
// ============================================================================

//! ## Overview
//! The digest engine condenses a text blob into surface statistics, detected
//! pattern labels, and short insights, then persists the record. Detected
//! patterns are announced on the `pattern` topic so triggers can react.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde_json::json;

use crate::core::Digest;
use crate::core::DigestStats;
use crate::core::DigestType;
use crate::core::NewDigest;
use crate::core::Topic;
use crate::interfaces::PersistenceError;
use crate::interfaces::SharedPersistence;
use crate::runtime::bus::EventBus;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of the condensed summary.
const SUMMARY_LIMIT: usize = 280;

// ============================================================================
// SECTION: Digest Engine
// ============================================================================

/// Content digestion front-end.
pub struct DigestEngine {
    /// Durable store for digests.
    persistence: SharedPersistence,
    /// Event bus for `pattern` announcements.
    bus: EventBus,
}

impl DigestEngine {
    /// Creates the engine.
    #[must_use]
    pub const fn new(persistence: SharedPersistence, bus: EventBus) -> Self {
        Self {
            persistence,
            bus,
        }
    }

    /// Digests a blob, persists the record, and announces patterns.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the digest cannot be stored.
    pub fn digest(
        &self,
        content: &str,
        source: Option<&str>,
        digest_type: DigestType,
    ) -> Result<Digest, PersistenceError> {
        let stats = collect_stats(content);
        let patterns = detect_patterns(content, &stats);
        let insights = synthesize_insights(&stats, &patterns);
        let new = NewDigest {
            source: source.unwrap_or("inline").to_string(),
            digest_type,
            content: summarize(content),
            patterns: patterns.clone(),
            insights,
            metadata: stats,
        };
        let digest = self.persistence.store_digest(&new)?;
        if !patterns.is_empty() {
            self.bus.publish(
                Topic::Pattern,
                json!({
                    "id": digest.id,
                    "source": digest.source,
                    "patterns": digest.patterns,
                }),
            );
        }
        Ok(digest)
    }
}

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Collects surface statistics.
fn collect_stats(content: &str) -> DigestStats {
    let words: Vec<&str> = content.split_whitespace().collect();
    let unique: BTreeSet<String> = words.iter().map(|word| word.to_lowercase()).collect();
    let lower = content.to_lowercase();
    DigestStats {
        lines: content.lines().count(),
        words: words.len(),
        unique_words: unique.len(),
        urls: lower.matches("http://").count() + lower.matches("https://").count(),
        code_fences: content.matches("```").count() / 2,
        todo_markers: lower.matches("todo").count() + lower.matches("fixme").count(),
    }
}

/// Detects pattern labels from content and statistics.
fn detect_patterns(content: &str, stats: &DigestStats) -> Vec<String> {
    let lower = content.to_lowercase();
    let mut patterns = Vec::new();
    if stats.urls > 0 {
        patterns.push("links".to_string());
    }
    if stats.code_fences > 0 {
        patterns.push("code-blocks".to_string());
    }
    if stats.todo_markers > 0 {
        patterns.push("unresolved-work".to_string());
    }
    if content.lines().any(|line| line.trim_start().starts_with('#')) {
        patterns.push("headings".to_string());
    }
    if content.lines().any(|line| {
        let trimmed = line.trim_start();
        trimmed.starts_with("- ") || trimmed.starts_with("* ")
    }) {
        patterns.push("lists".to_string());
    }
    if ["always", "never", "guaranteed", "impossible"]
        .iter()
        .any(|term| lower.contains(term))
    {
        patterns.push("emphatic-claims".to_string());
    }
    if content.contains('?') {
        patterns.push("open-questions".to_string());
    }
    patterns
}

/// Synthesizes short observations from statistics and patterns.
fn synthesize_insights(stats: &DigestStats, patterns: &[String]) -> Vec<String> {
    let mut insights = Vec::new();
    if stats.words > 0 && stats.unique_words * 2 < stats.words {
        insights.push("content is highly repetitive".to_string());
    }
    if patterns.iter().any(|pattern| pattern == "unresolved-work") {
        insights.push("content carries unresolved work markers".to_string());
    }
    if patterns.iter().any(|pattern| pattern == "code-blocks") && stats.urls == 0 {
        insights.push("code is presented without reference links".to_string());
    }
    if patterns.iter().any(|pattern| pattern == "emphatic-claims") {
        insights.push("emphatic claims may need sourcing".to_string());
    }
    if insights.is_empty() && stats.words > 0 {
        insights.push("no notable anomalies detected".to_string());
    }
    insights
}

/// Truncates content to the summary limit on a character boundary.
fn summarize(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= SUMMARY_LIMIT {
        return trimmed.to_string();
    }
    trimmed.chars().take(SUMMARY_LIMIT).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
