// crates/arbiter-core/src/runtime/mod.rs
// ============================================================================
// Module: Arbiter Runtime
// Description: Concurrency-bearing components built on the core data model.
// Purpose: Provide the batch queue, bus, chain, pipeline, triggers, learning,
// and digest engines plus the in-memory persistence reference.
// Dependencies: tokio, crate::{core, interfaces, judge}
// ============================================================================

//! ## Overview
//! Runtime components wire the pure core into an always-on server: the batch
//! queue and chain manager run background tasks, the event bus fans out
//! pipeline events, and the trigger engine and learning loop close the
//! feedback cycle. Everything here expects to live inside a Tokio runtime.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod batch;
pub mod bus;
pub mod chain;
pub mod digest;
pub mod learning;
pub mod memory;
pub mod pipeline;
pub mod triggers;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use batch::BatchError;
pub use batch::BatchQueue;
pub use batch::BatchQueueConfig;
pub use batch::FlushError;
pub use batch::FlushFn;
pub use batch::QueueStats;
pub use batch::noop_error_hook;
pub use bus::DEFAULT_CHANNEL_CAPACITY;
pub use bus::EventBus;
pub use bus::Subscription;
pub use chain::AdoptionReport;
pub use chain::BlockFault;
pub use chain::ChainConfig;
pub use chain::ChainError;
pub use chain::ChainManager;
pub use chain::ChainStats;
pub use chain::ChainStatus;
pub use chain::FaultKind;
pub use chain::RepairReport;
pub use chain::SealRequest;
pub use chain::VerificationReport;
pub use digest::DigestEngine;
pub use learning::CalibrationReport;
pub use learning::LearningConfig;
pub use learning::LearningEngine;
pub use learning::LearningReport;
pub use memory::MemoryPersistence;
pub use pipeline::CallContext;
pub use pipeline::JudgmentPipeline;
pub use pipeline::JudgmentReceipt;
pub use pipeline::PipelineCaller;
pub use pipeline::PipelineError;
pub use triggers::NoopTriggerSink;
pub use triggers::TriggerEngine;
pub use triggers::TriggerEngineConfig;
pub use triggers::TriggerSink;
