// crates/arbiter-server/src/audit.rs
// ============================================================================
// Module: Server Audit Logging
// Description: Structured audit events for tool call handling.
// Purpose: Emit redacted audit lines without hard dependencies.
// Dependencies: serde, crate::{telemetry, tools}
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for tool call logging.
//! Events are JSON lines carrying sizes, outcomes, and timings; raw request
//! payloads are never logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::telemetry::ToolOutcome;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Tool call audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct ToolAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Tool name when the call named a known tool.
    pub tool: Option<String>,
    /// Request outcome.
    pub outcome: &'static str,
    /// Normalized error kind label when the call failed.
    pub error_kind: Option<&'static str>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
    /// Request latency in milliseconds.
    pub duration_ms: u64,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
}

impl ToolAuditEvent {
    /// Creates an audit event stamped with the current time.
    #[must_use]
    pub fn new(
        tool: Option<String>,
        outcome: ToolOutcome,
        error_kind: Option<&'static str>,
        request_bytes: usize,
        response_bytes: usize,
        duration_ms: u64,
        peer_ip: Option<String>,
    ) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis());
        Self {
            event: "tool_call",
            timestamp_ms,
            tool,
            outcome: outcome.as_str(),
            error_kind,
            request_bytes,
            response_bytes,
            duration_ms,
            peer_ip,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for tool call events.
pub trait ToolAuditSink: Send + Sync {
    /// Records one audit event.
    fn record(&self, event: &ToolAuditEvent);
}

/// Audit sink that discards events.
pub struct NoopAuditSink;

impl ToolAuditSink for NoopAuditSink {
    fn record(&self, _event: &ToolAuditEvent) {}
}

/// Audit sink writing JSON lines to stderr.
pub struct StderrAuditSink;

impl ToolAuditSink for StderrAuditSink {
    fn record(&self, event: &ToolAuditEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{line}");
        }
    }
}

/// Audit sink appending JSON lines to a file.
pub struct FileAuditSink {
    /// Open file handle for appending audit events.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens or creates the audit log file.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] when the file cannot be opened.
    pub fn new(path: &Path) -> Result<Self, io::Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl ToolAuditSink for FileAuditSink {
    fn record(&self, event: &ToolAuditEvent) {
        if let Ok(line) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{line}");
            let _ = file.flush();
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::FileAuditSink;
    use super::ToolAuditEvent;
    use super::ToolAuditSink;
    use crate::telemetry::ToolOutcome;

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audit.jsonl");
        let sink = FileAuditSink::new(&path).expect("sink");
        sink.record(&ToolAuditEvent::new(
            Some("judge".to_string()),
            ToolOutcome::Ok,
            None,
            120,
            240,
            4,
            None,
        ));
        sink.record(&ToolAuditEvent::new(
            None,
            ToolOutcome::Error,
            Some("invalid_input"),
            8,
            64,
            1,
            Some("127.0.0.1".to_string()),
        ));
        let contents = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(first["event"], "tool_call");
        assert_eq!(first["tool"], "judge");
        let second: serde_json::Value = serde_json::from_str(lines[1]).expect("json");
        assert_eq!(second["error_kind"], "invalid_input");
    }
}
