// crates/arbiter-server/src/lib.rs
// ============================================================================
// Module: Arbiter Server Library
// Description: HTTP surface for the Arbiter runtime.
// Purpose: Expose the server builder, tool router, telemetry, and audit sinks.
// Dependencies: arbiter-core, arbiter-config, axum
// ============================================================================

//! ## Overview
//! `arbiter-server` adapts the Arbiter runtime to HTTP: a schema-validated
//! tool surface, a live SSE stream of pipeline events, health and Prometheus
//! endpoints, and request hardening (body limits, rate limiting, in-flight
//! caps, optional bearer auth).

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod schemas;
pub mod server;
pub mod telemetry;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::ToolAuditEvent;
pub use audit::ToolAuditSink;
pub use server::AppState;
pub use server::ArbiterServer;
pub use server::ServerError;
pub use telemetry::NoopMetrics;
pub use telemetry::PrometheusMetrics;
pub use telemetry::ServerMetrics;
pub use telemetry::ToolOutcome;
pub use tools::ToolDefinition;
pub use tools::ToolError;
pub use tools::ToolName;
pub use tools::ToolRouter;
pub use tools::ToolRouterConfig;
pub use tools::tool_definitions;
