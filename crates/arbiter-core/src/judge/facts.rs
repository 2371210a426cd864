// crates/arbiter-core/src/judge/facts.rs
// ============================================================================
// Module: Arbiter Item Facts
// Description: Lexical and structural fact extraction from item content.
// Purpose: Feed the dimension rules with deterministic surface measurements.
// Dependencies: crate::core::item
// ============================================================================

//! ## Overview
//! Fact extraction is the only place item content is inspected. Every
//! measurement is a pure function of the item; the dimension rules combine
//! facts into scores without touching the raw text again.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::core::item::Item;

// ============================================================================
// SECTION: Term Lists
// ============================================================================

/// Hedging vocabulary.
const HEDGE_TERMS: &[&str] =
    &["maybe", "might", "possibly", "perhaps", "likely", "unclear", "probably", "seems"];
/// Vague filler vocabulary.
const VAGUE_TERMS: &[&str] = &["stuff", "things", "somehow", "various", "several", "etc"];
/// Risk and caveat vocabulary.
const RISK_TERMS: &[&str] = &["risk", "caveat", "warning", "limitation", "tradeoff", "downside"];
/// Failure-path vocabulary.
const ERROR_TERMS: &[&str] =
    &["error", "fail", "panic", "exception", "fallback", "retry", "timeout"];
/// Testing and verification vocabulary.
const TEST_TERMS: &[&str] = &["test", "assert", "verified", "checked", "validated", "measured"];
/// Method-disclosure vocabulary.
const METHOD_TERMS: &[&str] =
    &["because", "based on", "according to", "derived", "observed", "compared"];
/// Edge-case vocabulary.
const EDGE_TERMS: &[&str] =
    &["edge case", "boundary", "empty", "zero", "overflow", "null", "none", "corner"];
/// Imperative action vocabulary.
const ACTION_TERMS: &[&str] =
    &["run ", "use ", "add ", "fix ", "set ", "install ", "remove ", "apply ", "call "];
/// Contradiction markers.
const CONTRADICTION_TERMS: &[&str] =
    &["but actually", "contradicts", "on the contrary", "not true", "inconsistent with"];
/// Boilerplate and placeholder markers.
const BOILERPLATE_TERMS: &[&str] = &["lorem ipsum", "placeholder", "tbd", "<insert", "xxx"];
/// Temporal anchoring vocabulary.
const TIME_TERMS: &[&str] =
    &["today", "yesterday", "recently", "currently", "as of", "deadline", "scheduled"];
/// Unfinished-content markers.
const DANGLING_TERMS: &[&str] = &["todo", "fixme", "???", "..."];

// ============================================================================
// SECTION: Facts
// ============================================================================

/// Deterministic surface measurements over one item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFacts {
    /// Word count.
    pub words: usize,
    /// Line count.
    pub lines: usize,
    /// Sentence count (non-empty `.!?` segments).
    pub sentences: usize,
    /// Distinct lowercase words divided by total words.
    pub unique_word_ratio: f64,
    /// Mean words per sentence.
    pub avg_sentence_len: f64,
    /// Attached source count.
    pub source_count: usize,
    /// Distinct attached sources.
    pub distinct_sources: usize,
    /// URL occurrences inside the content.
    pub url_count: usize,
    /// Citation markers (`[n]`, parenthesized years, `et al`).
    pub citation_count: usize,
    /// Fenced code block count.
    pub code_fence_count: usize,
    /// Whether brackets and quotes balance.
    pub balanced_delimiters: bool,
    /// Whether the content carries code-like tokens.
    pub code_hints: bool,
    /// Digit characters divided by total characters.
    pub digit_ratio: f64,
    /// Whether a year or ISO-style date appears.
    pub has_date: bool,
    /// Bullet line count.
    pub bullet_count: usize,
    /// Heading line count.
    pub heading_count: usize,
    /// Paragraph count (blank-line separated).
    pub paragraph_count: usize,
    /// Whether snake_case and camelCase identifiers are mixed.
    pub mixed_identifier_styles: bool,
    /// Concrete tokens (paths, identifiers, numbers).
    pub concrete_count: usize,
    /// Occurrences per tracked vocabulary.
    pub term_hits: BTreeMap<&'static str, usize>,
}

/// Vocabulary keys stored in [`ItemFacts::term_hits`].
pub mod vocab {
    /// Hedging vocabulary key.
    pub const HEDGE: &str = "hedge";
    /// Vague filler vocabulary key.
    pub const VAGUE: &str = "vague";
    /// Risk vocabulary key.
    pub const RISK: &str = "risk";
    /// Failure-path vocabulary key.
    pub const ERROR: &str = "error";
    /// Testing vocabulary key.
    pub const TEST: &str = "test";
    /// Method-disclosure vocabulary key.
    pub const METHOD: &str = "method";
    /// Edge-case vocabulary key.
    pub const EDGE: &str = "edge";
    /// Imperative action vocabulary key.
    pub const ACTION: &str = "action";
    /// Contradiction marker key.
    pub const CONTRADICTION: &str = "contradiction";
    /// Boilerplate marker key.
    pub const BOILERPLATE: &str = "boilerplate";
    /// Temporal anchoring key.
    pub const TIME: &str = "time";
    /// Unfinished-content marker key.
    pub const DANGLING: &str = "dangling";
}

impl ItemFacts {
    /// Extracts facts from an item.
    #[must_use]
    pub fn extract(item: &Item) -> Self {
        let content = item.content.as_str();
        let lower = content.to_lowercase();
        let words: Vec<&str> = content.split_whitespace().collect();
        let word_count = words.len();
        let unique: BTreeSet<String> =
            words.iter().map(|word| word.to_lowercase()).collect();
        let sentences = count_sentences(content);
        let lines = content.lines().count();
        let digit_chars = content.chars().filter(char::is_ascii_digit).count();
        let char_count = content.chars().count().max(1);

        let mut term_hits = BTreeMap::new();
        term_hits.insert(vocab::HEDGE, count_terms(&lower, HEDGE_TERMS));
        term_hits.insert(vocab::VAGUE, count_terms(&lower, VAGUE_TERMS));
        term_hits.insert(vocab::RISK, count_terms(&lower, RISK_TERMS));
        term_hits.insert(vocab::ERROR, count_terms(&lower, ERROR_TERMS));
        term_hits.insert(vocab::TEST, count_terms(&lower, TEST_TERMS));
        term_hits.insert(vocab::METHOD, count_terms(&lower, METHOD_TERMS));
        term_hits.insert(vocab::EDGE, count_terms(&lower, EDGE_TERMS));
        term_hits.insert(vocab::ACTION, count_terms(&lower, ACTION_TERMS));
        term_hits.insert(vocab::CONTRADICTION, count_terms(&lower, CONTRADICTION_TERMS));
        term_hits.insert(vocab::BOILERPLATE, count_terms(&lower, BOILERPLATE_TERMS));
        term_hits.insert(vocab::TIME, count_terms(&lower, TIME_TERMS));
        term_hits.insert(vocab::DANGLING, count_terms(&lower, DANGLING_TERMS));

        let distinct_sources: BTreeSet<&String> = item.sources.iter().collect();

        Self {
            words: word_count,
            lines,
            sentences,
            unique_word_ratio: ratio(unique.len(), word_count),
            avg_sentence_len: ratio(word_count, sentences.max(1)),
            source_count: item.sources.len(),
            distinct_sources: distinct_sources.len(),
            url_count: lower.matches("http://").count() + lower.matches("https://").count(),
            citation_count: count_citations(content),
            code_fence_count: content.matches("```").count() / 2,
            balanced_delimiters: delimiters_balanced(content),
            code_hints: has_code_hints(content),
            digit_ratio: ratio(digit_chars, char_count),
            has_date: has_date_anchor(content),
            bullet_count: count_line_prefixes(content, &["- ", "* ", "+ "]),
            heading_count: count_line_prefixes(content, &["# ", "## ", "### "]),
            paragraph_count: count_paragraphs(content),
            mixed_identifier_styles: mixed_identifier_styles(&words),
            concrete_count: count_concrete_tokens(&words),
            term_hits,
        }
    }

    /// Returns the occurrence count for a vocabulary key.
    #[must_use]
    pub fn hits(&self, key: &'static str) -> usize {
        self.term_hits.get(key).copied().unwrap_or(0)
    }
}

// ============================================================================
// SECTION: Extraction Helpers
// ============================================================================

/// Ratio of two counts, zero when the denominator is zero.
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        precise(numerator) / precise(denominator)
    }
}

/// Converts a count to `f64` without truncation warnings.
fn precise(value: usize) -> f64 {
    u32::try_from(value).map_or(f64::from(u32::MAX), f64::from)
}

/// Counts non-empty sentence segments.
fn count_sentences(content: &str) -> usize {
    content
        .split(['.', '!', '?'])
        .filter(|segment| !segment.trim().is_empty())
        .count()
}

/// Counts occurrences of each term across the lowercased content.
fn count_terms(lower: &str, terms: &[&str]) -> usize {
    terms.iter().map(|term| lower.matches(term).count()).sum()
}

/// Counts citation markers: `[n]`, parenthesized years, and `et al`.
fn count_citations(content: &str) -> usize {
    let mut count = content.to_lowercase().matches("et al").count();
    let bytes = content.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'[' || bytes[index] == b'(' {
            let close = if bytes[index] == b'[' { b']' } else { b')' };
            let mut end = index + 1;
            while end < bytes.len() && bytes[end] != close {
                end += 1;
            }
            if end < bytes.len()
                && end > index + 1
                && let Some(inner) = content.get(index + 1 .. end)
            {
                let digits =
                    !inner.is_empty() && inner.chars().all(|ch| ch.is_ascii_digit());
                let year = inner.len() == 4
                    && digits
                    && (inner.starts_with("19") || inner.starts_with("20"));
                if (bytes[index] == b'[' && digits) || year {
                    count += 1;
                }
            }
            index = end + 1;
        } else {
            index += 1;
        }
    }
    count
}

/// Checks bracket and quote balance.
fn delimiters_balanced(content: &str) -> bool {
    let mut stack = Vec::new();
    for ch in content.chars() {
        match ch {
            '(' | '[' | '{' => stack.push(ch),
            ')' => {
                if stack.pop() != Some('(') {
                    return false;
                }
            }
            ']' => {
                if stack.pop() != Some('[') {
                    return false;
                }
            }
            '}' => {
                if stack.pop() != Some('{') {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty() && content.matches('"').count() % 2 == 0
}

/// Detects code-like tokens: fences, semicolons at line ends, `fn`/`let`.
fn has_code_hints(content: &str) -> bool {
    content.contains("```")
        || content.lines().any(|line| line.trim_end().ends_with(';'))
        || content.contains("fn ")
        || content.contains("def ")
        || content.contains("=>")
        || content.contains("::")
}

/// Detects a year or ISO-style date anchor.
fn has_date_anchor(content: &str) -> bool {
    let bytes = content.as_bytes();
    bytes.windows(4).any(|window| {
        (window.starts_with(b"19") || window.starts_with(b"20"))
            && window.iter().all(u8::is_ascii_digit)
    })
}

/// Counts lines starting with any of the given prefixes.
fn count_line_prefixes(content: &str, prefixes: &[&str]) -> usize {
    content
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            prefixes.iter().any(|prefix| trimmed.starts_with(prefix))
        })
        .count()
}

/// Counts blank-line separated paragraphs.
fn count_paragraphs(content: &str) -> usize {
    content
        .split("\n\n")
        .filter(|paragraph| !paragraph.trim().is_empty())
        .count()
}

/// Detects a mix of snake_case and camelCase identifiers.
fn mixed_identifier_styles(words: &[&str]) -> bool {
    let snake = words.iter().any(|word| {
        word.contains('_') && word.chars().any(char::is_alphabetic)
    });
    let camel = words.iter().any(|word| {
        let mut chars = word.chars();
        chars.next().is_some_and(char::is_lowercase)
            && word.chars().skip(1).any(char::is_uppercase)
    });
    snake && camel
}

/// Counts concrete tokens: paths, identifiers, and numbers.
fn count_concrete_tokens(words: &[&str]) -> usize {
    words
        .iter()
        .filter(|word| {
            word.contains('/')
                || word.contains('_')
                || word.contains('.') && word.len() > 3
                || word.chars().any(char::is_numeric)
        })
        .count()
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

    use super::ItemFacts;
    use super::vocab;
    use crate::core::item::Item;
    use crate::core::item::ItemType;

    #[test]
    fn extraction_counts_basic_surface_facts() {
        let item = Item::new(
            ItemType::Note,
            "First sentence here. Second sentence follows!\n\n- bullet one\n- bullet two",
        );
        let facts = ItemFacts::extract(&item);
        assert_eq!(facts.sentences, 3);
        assert_eq!(facts.bullet_count, 2);
        assert_eq!(facts.paragraph_count, 2);
        assert!(facts.balanced_delimiters);
    }

    #[test]
    fn citation_markers_are_detected() {
        let item =
            Item::new(ItemType::Claim, "Shown in [1] and confirmed by Smith et al (2021).");
        let facts = ItemFacts::extract(&item);
        assert!(facts.citation_count >= 3);
    }

    #[test]
    fn unbalanced_delimiters_are_flagged() {
        let item = Item::new(ItemType::Code, "fn broken( { let x = 1;");
        let facts = ItemFacts::extract(&item);
        assert!(!facts.balanced_delimiters);
        assert!(facts.code_hints);
    }

    #[test]
    fn hedge_vocabulary_is_counted() {
        let item = Item::new(ItemType::Note, "This might work, maybe, but it is unclear.");
        let facts = ItemFacts::extract(&item);
        assert_eq!(facts.hits(vocab::HEDGE), 3);
    }

    #[test]
    fn extraction_is_deterministic() {
        let item = Item::new(ItemType::Commit, "Fix retry handling for timeout errors [2].");
        assert_eq!(ItemFacts::extract(&item), ItemFacts::extract(&item));
    }
}
