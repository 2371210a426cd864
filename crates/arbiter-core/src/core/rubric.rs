// crates/arbiter-core/src/core/rubric.rs
// ============================================================================
// Module: Arbiter Scoring Rubric
// Description: The fixed dimension and axiom vocabulary for judgments.
// Purpose: Provide the single source of truth for axiom membership and labels.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every judgment scores the same 25 dimensions, grouped into 4 axioms. The
//! tables in this module are the only place membership is defined; the judge,
//! the learning loop, and the stores all derive from them.
//! Invariants:
//! - [`Dimension::ALL`] lists every dimension exactly once.
//! - Every dimension belongs to exactly one axiom.
//! - Labels are stable serialization keys; renaming one is a breaking change.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Axioms
// ============================================================================

/// Top-level score aggregate. Each axiom is a weighted mean of its dimensions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Axiom {
    /// Is the item grounded: sources, verification, supported claims.
    Veracity,
    /// Is the item readable: length, structure, terminology.
    Clarity,
    /// Is the item careful: validity, coherence, edge awareness.
    Rigor,
    /// Is the item useful: actionability, fit, completeness.
    Utility,
}

impl Axiom {
    /// Every axiom in canonical order.
    pub const ALL: [Self; 4] = [Self::Veracity, Self::Clarity, Self::Rigor, Self::Utility];

    /// Returns the stable label for the axiom.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Veracity => "veracity",
            Self::Clarity => "clarity",
            Self::Rigor => "rigor",
            Self::Utility => "utility",
        }
    }

    /// Parses an axiom from its stable label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|axiom| axiom.as_str() == label)
    }

    /// Returns the dimensions belonging to this axiom, in canonical order.
    #[must_use]
    pub fn dimensions(self) -> impl Iterator<Item = Dimension> {
        Dimension::ALL.into_iter().filter(move |dimension| dimension.axiom() == self)
    }

    /// Default composite weight for the axiom. Weights sum to 1.
    #[must_use]
    pub const fn default_weight(self) -> f64 {
        match self {
            Self::Veracity => 0.35,
            Self::Rigor => 0.25,
            Self::Clarity | Self::Utility => 0.20,
        }
    }
}

impl fmt::Display for Axiom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Dimensions
// ============================================================================

/// One of the 25 scalar attributes every item is scored on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// At least one source is attached.
    SourcePresence,
    /// Sources span more than one origin.
    SourceDiversity,
    /// The caller marked the item as externally verified.
    Verification,
    /// Claims are accompanied by citation markers or sources.
    ClaimSupport,
    /// Hedging language is present in proportion, not absent or dominant.
    HedgeBalance,
    /// Numeric statements are self-consistent.
    NumericConsistency,
    /// No internal contradiction markers.
    ContradictionAbsence,
    /// Content length sits in the informative band for its type.
    LengthBalance,
    /// Low repetition across sentences and words.
    Redundancy,
    /// Headings, lists, or paragraphs give the content shape.
    Structure,
    /// Sentence lengths stay readable.
    Readability,
    /// Terminology stays consistent across the content.
    TermConsistency,
    /// Concrete identifiers and values over vague phrasing.
    Specificity,
    /// Code-like content parses plausibly (balanced delimiters).
    SyntacticValidity,
    /// Statements follow from one another without non-sequiturs.
    InternalCoherence,
    /// Edge cases and limits are acknowledged.
    EdgeAwareness,
    /// The method or provenance of the content is disclosed.
    MethodDisclosure,
    /// Failure paths are mentioned where applicable.
    ErrorHandling,
    /// Tests or evidence of checking are referenced.
    TestEvidence,
    /// A reader can act on the content.
    Actionability,
    /// Content is not boilerplate.
    Novelty,
    /// Content stays within its declared type.
    ScopeFit,
    /// No dangling references or unfinished sections.
    Completeness,
    /// Content is anchored in time where it matters.
    Timeliness,
    /// Risks and caveats are disclosed.
    RiskDisclosure,
}

impl Dimension {
    /// Every dimension in canonical order, grouped by axiom.
    pub const ALL: [Self; 25] = [
        Self::SourcePresence,
        Self::SourceDiversity,
        Self::Verification,
        Self::ClaimSupport,
        Self::HedgeBalance,
        Self::NumericConsistency,
        Self::ContradictionAbsence,
        Self::LengthBalance,
        Self::Redundancy,
        Self::Structure,
        Self::Readability,
        Self::TermConsistency,
        Self::Specificity,
        Self::SyntacticValidity,
        Self::InternalCoherence,
        Self::EdgeAwareness,
        Self::MethodDisclosure,
        Self::ErrorHandling,
        Self::TestEvidence,
        Self::Actionability,
        Self::Novelty,
        Self::ScopeFit,
        Self::Completeness,
        Self::Timeliness,
        Self::RiskDisclosure,
    ];

    /// Returns the stable label for the dimension.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourcePresence => "source_presence",
            Self::SourceDiversity => "source_diversity",
            Self::Verification => "verification",
            Self::ClaimSupport => "claim_support",
            Self::HedgeBalance => "hedge_balance",
            Self::NumericConsistency => "numeric_consistency",
            Self::ContradictionAbsence => "contradiction_absence",
            Self::LengthBalance => "length_balance",
            Self::Redundancy => "redundancy",
            Self::Structure => "structure",
            Self::Readability => "readability",
            Self::TermConsistency => "term_consistency",
            Self::Specificity => "specificity",
            Self::SyntacticValidity => "syntactic_validity",
            Self::InternalCoherence => "internal_coherence",
            Self::EdgeAwareness => "edge_awareness",
            Self::MethodDisclosure => "method_disclosure",
            Self::ErrorHandling => "error_handling",
            Self::TestEvidence => "test_evidence",
            Self::Actionability => "actionability",
            Self::Novelty => "novelty",
            Self::ScopeFit => "scope_fit",
            Self::Completeness => "completeness",
            Self::Timeliness => "timeliness",
            Self::RiskDisclosure => "risk_disclosure",
        }
    }

    /// Parses a dimension from its stable label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|dimension| dimension.as_str() == label)
    }

    /// Returns the axiom this dimension belongs to.
    #[must_use]
    pub const fn axiom(self) -> Axiom {
        match self {
            Self::SourcePresence
            | Self::SourceDiversity
            | Self::Verification
            | Self::ClaimSupport
            | Self::HedgeBalance
            | Self::NumericConsistency
            | Self::ContradictionAbsence => Axiom::Veracity,
            Self::LengthBalance
            | Self::Redundancy
            | Self::Structure
            | Self::Readability
            | Self::TermConsistency
            | Self::Specificity => Axiom::Clarity,
            Self::SyntacticValidity
            | Self::InternalCoherence
            | Self::EdgeAwareness
            | Self::MethodDisclosure
            | Self::ErrorHandling
            | Self::TestEvidence => Axiom::Rigor,
            Self::Actionability
            | Self::Novelty
            | Self::ScopeFit
            | Self::Completeness
            | Self::Timeliness
            | Self::RiskDisclosure => Axiom::Utility,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
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

    use std::collections::BTreeSet;

    use super::Axiom;
    use super::Dimension;

    #[test]
    fn dimension_table_has_no_duplicates() {
        let unique: BTreeSet<&str> =
            Dimension::ALL.iter().map(|dimension| dimension.as_str()).collect();
        assert_eq!(unique.len(), Dimension::ALL.len());
    }

    #[test]
    fn every_axiom_has_members() {
        for axiom in Axiom::ALL {
            assert!(axiom.dimensions().count() >= 6, "axiom {axiom} is underpopulated");
        }
    }

    #[test]
    fn axiom_membership_partitions_dimensions() {
        let total: usize = Axiom::ALL.iter().map(|axiom| axiom.dimensions().count()).sum();
        assert_eq!(total, Dimension::ALL.len());
    }

    #[test]
    fn default_axiom_weights_sum_to_one() {
        let sum: f64 = Axiom::ALL.iter().map(|axiom| axiom.default_weight()).sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn labels_round_trip_through_parse() {
        for dimension in Dimension::ALL {
            assert_eq!(Dimension::parse(dimension.as_str()), Some(dimension));
        }
        assert_eq!(Dimension::parse("not_a_dimension"), None);
    }
}
