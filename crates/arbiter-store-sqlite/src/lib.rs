// crates/arbiter-store-sqlite/src/lib.rs
// ============================================================================
// Module: Arbiter SQLite Store Library
// Description: Durable Persistence backed by SQLite.
// Purpose: Expose the SQLite persistence implementation and its config.
// Dependencies: arbiter-core, rusqlite
// ============================================================================

//! ## Overview
//! `arbiter-store-sqlite` provides the durable [`arbiter_core::Persistence`]
//! implementation used by production deployments. The store keeps one WAL
//! database file and serializes records as JSON payloads next to the columns
//! queries filter on.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqlitePersistence;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
