// crates/arbiter-core/src/runtime/learning.rs
// ============================================================================
// Module: Arbiter Learning Loop
// Description: Feedback-driven calibration of per-dimension weight modifiers.
// Purpose: Nudge future scoring toward observed outcomes within bounded steps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The learning loop accumulates feedback samples and, once the backlog
//! reaches a threshold, calibrates: each dimension's modifier moves a bounded
//! step toward the mean signed residual between observed and judged scores,
//! weighted by how much the dimension contributed. The judge reads state as
//! an `Arc` snapshot; the loop swaps replacements atomically, so the read
//! path takes no long-held lock.
//! Invariants:
//! - Modifiers stay inside the configured range.
//! - Calibrated state is persisted before the snapshot is swapped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::RwLock;

use serde::Serialize;

use crate::core::Bias;
use crate::core::Dimension;
use crate::core::Feedback;
use crate::core::FeedbackOutcome;
use crate::core::Judgment;
use crate::core::LearningState;
use crate::core::now_millis;
use crate::interfaces::PersistenceError;
use crate::interfaces::SharedPersistence;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Learning loop parameters.
#[derive(Debug, Clone)]
pub struct LearningConfig {
    /// Whether reaching the backlog threshold calibrates automatically.
    pub auto_calibrate: bool,
    /// Backlog size that triggers automatic calibration.
    pub calibrate_threshold: usize,
    /// Bound on the absolute value of any modifier.
    pub modifier_range: f64,
    /// Step scale applied to residuals during calibration.
    pub modifier_step: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            auto_calibrate: true,
            calibrate_threshold: 21,
            modifier_range: 0.236,
            modifier_step: 0.089,
        }
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Result of one calibration pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CalibrationReport {
    /// Dimensions whose modifier changed.
    pub updated: usize,
    /// Mean absolute modifier change.
    pub mean_delta: f64,
}

/// Result of processing one feedback record.
#[derive(Debug, Clone, Serialize)]
pub struct LearningReport {
    /// Total feedback records processed since startup or reset.
    pub feedback_seen: u64,
    /// Samples currently awaiting calibration.
    pub backlog: usize,
    /// Calibration result, when one fired.
    pub calibration: Option<CalibrationReport>,
    /// Biases detected by the most recent pass.
    pub biases: Vec<Bias>,
}

/// One feedback observation awaiting calibration.
#[derive(Debug, Clone)]
struct Sample {
    /// Dimension scores of the judged item.
    dimension_scores: BTreeMap<Dimension, f64>,
    /// Composite score the judge produced.
    q_score: u8,
    /// Feedback outcome.
    outcome: FeedbackOutcome,
    /// Observed composite score, when supplied.
    actual_score: Option<u8>,
}

impl Sample {
    /// Signed residual between observed and judged composites, in [-1, 1].
    fn residual(&self) -> f64 {
        let judged = f64::from(self.q_score) / 100.0;
        self.actual_score.map_or_else(
            || match self.outcome {
                FeedbackOutcome::Correct => 0.0,
                FeedbackOutcome::Incorrect => -0.25,
                FeedbackOutcome::Partial => -0.1,
            },
            |actual| f64::from(actual) / 100.0 - judged,
        )
    }
}

// ============================================================================
// SECTION: Learning Engine
// ============================================================================

/// Feedback-driven weight calibration engine.
pub struct LearningEngine {
    /// Durable store for state snapshots.
    persistence: SharedPersistence,
    /// Loop parameters.
    config: LearningConfig,
    /// Current snapshot; readers clone the `Arc`, writers swap it.
    state: RwLock<Arc<LearningState>>,
    /// Samples awaiting calibration.
    backlog: Mutex<Vec<Sample>>,
}

impl LearningEngine {
    /// Creates the engine, loading any persisted state snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the snapshot cannot be read.
    pub fn new(
        persistence: SharedPersistence,
        config: LearningConfig,
    ) -> Result<Self, PersistenceError> {
        let state = persistence.load_learning_state()?.unwrap_or_default();
        Ok(Self {
            persistence,
            config,
            state: RwLock::new(Arc::new(state)),
            backlog: Mutex::new(Vec::new()),
        })
    }

    /// Returns the current state snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<LearningState> {
        self.state
            .read()
            .map_or_else(|poisoned| Arc::clone(&poisoned.into_inner()), |guard| Arc::clone(&guard))
    }

    /// Processes one feedback record against its judgment.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when a triggered calibration cannot be
    /// persisted.
    pub fn process_feedback(
        &self,
        feedback: &Feedback,
        judgment: &Judgment,
    ) -> Result<LearningReport, PersistenceError> {
        let mut next = (*self.snapshot()).clone();
        let outcomes = next.outcomes.entry(judgment.verdict).or_default();
        match feedback.outcome {
            FeedbackOutcome::Correct => outcomes.correct += 1,
            FeedbackOutcome::Incorrect => outcomes.incorrect += 1,
            FeedbackOutcome::Partial => outcomes.partial += 1,
        }
        next.feedback_seen += 1;
        next.updated_at = now_millis();
        self.swap(next);

        let backlog_len = {
            let mut backlog = lock_unpoisoned(&self.backlog);
            backlog.push(Sample {
                dimension_scores: judgment.dimension_scores.clone(),
                q_score: judgment.q_score,
                outcome: feedback.outcome,
                actual_score: feedback.actual_score,
            });
            backlog.len()
        };

        let calibration = if self.config.auto_calibrate
            && backlog_len >= self.config.calibrate_threshold
        {
            Some(self.calibrate()?)
        } else {
            None
        };

        let state = self.snapshot();
        Ok(LearningReport {
            feedback_seen: state.feedback_seen,
            backlog: lock_unpoisoned(&self.backlog).len(),
            calibration,
            biases: state.biases.clone(),
        })
    }

    /// Runs a calibration pass over the accumulated backlog.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the new state cannot be persisted;
    /// in that case the old snapshot stays active.
    pub fn calibrate(&self) -> Result<CalibrationReport, PersistenceError> {
        let samples: Vec<Sample> = {
            let mut backlog = lock_unpoisoned(&self.backlog);
            backlog.drain(..).collect()
        };
        if samples.is_empty() {
            return Ok(CalibrationReport::default());
        }

        let mut next = (*self.snapshot()).clone();
        let mut updated = 0usize;
        let mut total_delta = 0.0f64;
        for dimension in Dimension::ALL {
            let mut residual_sum = 0.0f64;
            for sample in &samples {
                let score = sample.dimension_scores.get(&dimension).copied().unwrap_or(0.0);
                let contribution = dimension.axiom().default_weight() * score;
                residual_sum += sample.residual() * 0.5f64.mul_add(contribution / 0.35, 0.5);
            }
            let mean_residual = residual_sum / sample_count(&samples);
            let delta = self.config.modifier_step * mean_residual;
            if delta.abs() > f64::EPSILON {
                let current = next.modifier(dimension);
                let bounded = (current + delta)
                    .clamp(-self.config.modifier_range, self.config.modifier_range);
                next.modifiers.insert(dimension, bounded);
                total_delta += (bounded - current).abs();
                updated += 1;
            }
        }
        next.calibrations += 1;
        next.biases = detect_biases_in(&next);
        next.updated_at = now_millis();

        self.persistence.save_learning_state(&next)?;
        self.swap(next);
        Ok(CalibrationReport {
            updated,
            mean_delta: if updated == 0 {
                0.0
            } else {
                total_delta / sample_count_from(updated)
            },
        })
    }

    /// Detects verdict bands with a majority-incorrect feedback record.
    #[must_use]
    pub fn detect_biases(&self) -> Vec<Bias> {
        detect_biases_in(&self.snapshot())
    }

    /// Resets learning state and persists the empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the reset cannot be persisted.
    pub fn reset(&self) -> Result<(), PersistenceError> {
        let state = LearningState {
            updated_at: now_millis(),
            ..LearningState::default()
        };
        self.persistence.save_learning_state(&state)?;
        lock_unpoisoned(&self.backlog).clear();
        self.swap(state);
        Ok(())
    }

    /// Swaps in a new snapshot.
    fn swap(&self, next: LearningState) {
        let next = Arc::new(next);
        match self.state.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

/// Detects biases from a state's outcome counters.
fn detect_biases_in(state: &LearningState) -> Vec<Bias> {
    let mut biases = Vec::new();
    for (verdict, outcomes) in &state.outcomes {
        let total = outcomes.total();
        if total < 5 {
            continue;
        }
        let incorrect_rate = ratio_u64(outcomes.incorrect, total);
        if incorrect_rate > 0.5 {
            biases.push(Bias {
                verdict: *verdict,
                incorrect_rate,
                observations: total,
            });
        }
    }
    biases
}

/// Converts a sample list length to `f64`.
fn sample_count(samples: &[Sample]) -> f64 {
    sample_count_from(samples.len())
}

/// Converts a count to `f64` without truncation warnings.
fn sample_count_from(count: usize) -> f64 {
    u32::try_from(count.max(1)).map_or(f64::from(u32::MAX), f64::from)
}

/// Ratio of two u64 counters.
fn ratio_u64(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        let numerator = u32::try_from(numerator).map_or(f64::from(u32::MAX), f64::from);
        let denominator = u32::try_from(denominator).map_or(f64::from(u32::MAX), f64::from);
        numerator / denominator
    }
}

/// Locks a mutex, recovering the inner state if a holder panicked.
fn lock_unpoisoned<G>(mutex: &Mutex<G>) -> MutexGuard<'_, G> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
