// crates/arbiter-config/src/lib.rs
// ============================================================================
// Module: Arbiter Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for arbiter.toml semantics.
// Dependencies: arbiter-core, serde, toml
// ============================================================================

//! ## Overview
//! `arbiter-config` defines the canonical configuration model for Arbiter. It
//! provides strict, fail-closed validation and a deterministic generator for
//! the example config file.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;

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

    use super::ArbiterConfig;
    use super::PersistenceKind;
    use super::config_toml_example;

    #[test]
    fn empty_config_uses_defaults_and_validates() {
        let config = ArbiterConfig::from_toml("").expect("defaults");
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.batch.batch_size, 13);
        assert_eq!(config.batch.max_queue_size, 89);
        assert_eq!(config.learning.calibrate_threshold, 21);
        assert!((config.scoring.max_confidence - 0.618).abs() < f64::EPSILON);
        assert_eq!(config.persistence.kind, PersistenceKind::Memory);
    }

    #[test]
    fn example_config_parses_and_validates() {
        let config = ArbiterConfig::from_toml(&config_toml_example()).expect("example");
        assert_eq!(config.persistence.kind, PersistenceKind::Sqlite);
        assert_eq!(config.sse.heartbeat_interval_ms, 15_000);
    }

    #[test]
    fn unordered_thresholds_fail_closed() {
        let raw = r#"
[scoring.verdict_thresholds]
concern_min = 62
accept_min = 38
strong_accept_min = 85
"#;
        assert!(ArbiterConfig::from_toml(raw).is_err());
    }

    #[test]
    fn out_of_range_confidence_fails_closed() {
        assert!(ArbiterConfig::from_toml("[scoring]\nmax_confidence = 1.0\n").is_err());
        assert!(ArbiterConfig::from_toml("[scoring]\nmax_confidence = 0.0\n").is_err());
    }

    #[test]
    fn sqlite_requires_path() {
        assert!(ArbiterConfig::from_toml("[persistence]\nkind = \"sqlite\"\n").is_err());
    }

    #[test]
    fn unknown_dimension_weight_fails_closed() {
        let raw = "[scoring.dimension_weights]\nnot_a_dimension = 2.0\n";
        assert!(ArbiterConfig::from_toml(raw).is_err());
    }

    #[test]
    fn chain_overrides_fall_back_to_batch() {
        let config = ArbiterConfig::from_toml("[chain]\nbatch_size = 3\n").expect("config");
        let chain = config.chain.to_chain_config(&config.batch);
        assert_eq!(chain.batch_size, 3);
        assert_eq!(chain.flush_interval_ms, 5_000);
        assert_eq!(chain.max_queue_size, 89);
    }

    #[test]
    fn axiom_weight_overrides_must_sum_to_one() {
        let raw = r#"
[scoring.axiom_weights]
veracity = 0.5
clarity = 0.5
rigor = 0.5
utility = 0.5
"#;
        assert!(ArbiterConfig::from_toml(raw).is_err());
    }

    #[test]
    fn scoring_settings_convert_to_core_config() {
        let raw = r#"
[scoring.axiom_weights]
veracity = 0.4
clarity = 0.2
rigor = 0.2
utility = 0.2

[scoring.dimension_weights]
source_presence = 2.0
"#;
        let config = ArbiterConfig::from_toml(raw).expect("config");
        let scoring = config.scoring.to_scoring_config().expect("scoring");
        assert_eq!(scoring.axiom_weights.len(), 4);
        assert_eq!(scoring.dimension_weights.len(), 1);
    }
}
