// crates/arbiter-core/src/runtime/triggers.rs
// ============================================================================
// Module: Arbiter Trigger Engine
// Description: Event-driven rule matching and action dispatch.
// Purpose: Run persisted trigger rules against bus events and ticks.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! The trigger engine subscribes to pipeline topics and evaluates every
//! enabled rule against each arriving event: type filter, pure condition,
//! priority order, then action. `judge` actions re-enter the pipeline with
//! extended provenance; a rule already present in an event's provenance never
//! re-fires, which breaks self-amplifying loops. Rule mutations write through
//! to persistence.
//! Invariants:
//! - Conditions are pure; only actions have side effects.
//! - Action failures are reported as `alert` events, never retried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use serde_json::Value;
use serde_json::json;
use tokio::task::JoinHandle;

use crate::core::BusEvent;
use crate::core::Item;
use crate::core::ItemType;
use crate::core::Topic;
use crate::core::Trigger;
use crate::core::TriggerAction;
use crate::core::TriggerId;
use crate::core::TriggerType;
use crate::core::now_millis;
use crate::interfaces::PersistenceError;
use crate::interfaces::SharedPersistence;
use crate::runtime::bus::EventBus;
use crate::runtime::pipeline::CallContext;
use crate::runtime::pipeline::JudgmentPipeline;
use crate::runtime::pipeline::PipelineCaller;

// ============================================================================
// SECTION: Capabilities
// ============================================================================

/// Side-effect capabilities for non-bus trigger actions.
///
/// # Invariants
/// - Implementations must not panic; failures are their own concern.
pub trait TriggerSink: Send + Sync {
    /// Records a matched `log` action.
    fn log(&self, trigger: &Trigger, event: &BusEvent);
    /// Delivers a `notify` action.
    fn notify(&self, trigger: &Trigger, event: &BusEvent);
    /// Applies a `block` action.
    fn block(&self, trigger: &Trigger, event: &BusEvent);
    /// Queues a `review` action.
    fn review(&self, trigger: &Trigger, event: &BusEvent);
}

/// Capability sink that discards every action.
pub struct NoopTriggerSink;

impl TriggerSink for NoopTriggerSink {
    fn log(&self, _trigger: &Trigger, _event: &BusEvent) {}

    fn notify(&self, _trigger: &Trigger, _event: &BusEvent) {}

    fn block(&self, _trigger: &Trigger, _event: &BusEvent) {}

    fn review(&self, _trigger: &Trigger, _event: &BusEvent) {}
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Trigger engine runtime parameters.
#[derive(Debug, Clone)]
pub struct TriggerEngineConfig {
    /// Interval driving `periodic` triggers.
    pub periodic_interval_ms: u64,
}

impl Default for TriggerEngineConfig {
    fn default() -> Self {
        Self {
            periodic_interval_ms: 60_000,
        }
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Topics the engine consumes.
const ENGINE_TOPICS: [Topic; 4] = [Topic::Judgment, Topic::Block, Topic::Alert, Topic::Pattern];

/// Event-driven rule engine.
pub struct TriggerEngine {
    /// Shared engine state.
    inner: Arc<EngineInner>,
    /// Background task handles.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// State shared with the engine's background tasks.
struct EngineInner {
    /// Durable store for rules.
    persistence: SharedPersistence,
    /// Event bus consumed and published to.
    bus: EventBus,
    /// Pipeline used by `judge` actions.
    pipeline: Arc<JudgmentPipeline>,
    /// Capability sink for side-effect actions.
    sink: Arc<dyn TriggerSink>,
    /// In-memory rule cache, kept in sync with persistence.
    triggers: Mutex<Vec<Trigger>>,
}

impl TriggerEngine {
    /// Creates the engine, loading persisted rules.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when rules cannot be loaded.
    pub fn new(
        persistence: SharedPersistence,
        bus: EventBus,
        pipeline: Arc<JudgmentPipeline>,
        sink: Arc<dyn TriggerSink>,
    ) -> Result<Self, PersistenceError> {
        let triggers = persistence.list_triggers()?;
        Ok(Self {
            inner: Arc::new(EngineInner {
                persistence,
                bus,
                pipeline,
                sink,
                triggers: Mutex::new(triggers),
            }),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Starts the event dispatcher and the periodic ticker.
    pub fn start(&self, config: &TriggerEngineConfig) {
        let dispatcher = {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                let subscription = inner.bus.subscribe(&ENGINE_TOPICS);
                while let Some(event) = subscription.recv().await {
                    inner.process_event(&event).await;
                }
            })
        };
        let ticker = {
            let inner = Arc::clone(&self.inner);
            let period = Duration::from_millis(config.periodic_interval_ms.max(1));
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                interval.tick().await;
                let mut tick = 0u64;
                loop {
                    interval.tick().await;
                    tick += 1;
                    inner.process_tick(tick).await;
                }
            })
        };
        let mut tasks = lock_unpoisoned(&self.tasks);
        tasks.push(dispatcher);
        tasks.push(ticker);
    }

    /// Stops the background tasks.
    pub fn stop(&self) {
        for task in lock_unpoisoned(&self.tasks).drain(..) {
            task.abort();
        }
    }

    /// Registers or replaces a rule, writing through to persistence.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails; the cache is left
    /// unchanged in that case.
    pub fn register(&self, trigger: Trigger) -> Result<(), PersistenceError> {
        self.inner.persistence.upsert_trigger(&trigger)?;
        let mut triggers = lock_unpoisoned(&self.inner.triggers);
        triggers.retain(|existing| existing.id != trigger.id);
        triggers.push(trigger);
        Ok(())
    }

    /// Deletes a rule; returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails.
    pub fn unregister(&self, id: &TriggerId) -> Result<bool, PersistenceError> {
        let existed = self.inner.persistence.delete_trigger(id)?;
        lock_unpoisoned(&self.inner.triggers).retain(|trigger| trigger.id != *id);
        Ok(existed)
    }

    /// Enables or disables a rule; returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the write fails.
    pub fn set_enabled(&self, id: &TriggerId, enabled: bool) -> Result<bool, PersistenceError> {
        let existed = self.inner.persistence.set_trigger_enabled(id, enabled)?;
        if existed {
            let mut triggers = lock_unpoisoned(&self.inner.triggers);
            if let Some(trigger) = triggers.iter_mut().find(|trigger| trigger.id == *id) {
                trigger.enabled = enabled;
            }
        }
        Ok(existed)
    }

    /// Lists the cached rules.
    #[must_use]
    pub fn list(&self) -> Vec<Trigger> {
        lock_unpoisoned(&self.inner.triggers).clone()
    }

    /// Processes a caller-supplied payload as if it arrived on the bus.
    ///
    /// Returns the number of rules that fired.
    pub async fn process_manual(&self, topic: Topic, payload: Value) -> usize {
        self.inner.process_event(&BusEvent::new(topic, payload)).await
    }
}

impl Drop for TriggerEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl EngineInner {
    /// Runs matching rules for one event; returns how many fired.
    async fn process_event(&self, event: &BusEvent) -> usize {
        let mut matched: Vec<Trigger> = {
            let triggers = lock_unpoisoned(&self.triggers);
            triggers
                .iter()
                .filter(|trigger| trigger.enabled)
                .filter(|trigger| type_matches(trigger.trigger_type, event.topic))
                .filter(|trigger| !event.provenance.contains(&trigger.id))
                .filter(|trigger| {
                    trigger.condition.matches(Some(event.topic), &event.payload)
                })
                .cloned()
                .collect()
        };
        matched.sort_by(|a, b| b.priority.cmp(&a.priority));
        let fired = matched.len();
        for trigger in matched {
            self.execute(&trigger, event).await;
        }
        fired
    }

    /// Runs periodic rules for one ticker firing.
    async fn process_tick(&self, tick: u64) {
        let payload = json!({
            "tick": tick,
            "timestamp": now_millis(),
        });
        let mut matched: Vec<Trigger> = {
            let triggers = lock_unpoisoned(&self.triggers);
            triggers
                .iter()
                .filter(|trigger| trigger.enabled)
                .filter(|trigger| trigger.trigger_type == TriggerType::Periodic)
                .filter(|trigger| trigger.condition.matches(None, &payload))
                .cloned()
                .collect()
        };
        matched.sort_by(|a, b| b.priority.cmp(&a.priority));
        for trigger in matched {
            let event = BusEvent::new(Topic::Alert, payload.clone());
            self.execute(&trigger, &event).await;
        }
    }

    /// Executes one matched rule's action.
    async fn execute(&self, trigger: &Trigger, event: &BusEvent) {
        match trigger.action {
            TriggerAction::Judge => self.execute_judge(trigger, event).await,
            TriggerAction::Alert => {
                let mut provenance = event.provenance.clone();
                provenance.push(trigger.id.clone());
                self.bus.publish_event(BusEvent::with_provenance(
                    Topic::Alert,
                    json!({
                        "trigger": trigger.id,
                        "name": trigger.name,
                        "source_topic": event.topic,
                        "payload": event.payload,
                    }),
                    provenance,
                ));
            }
            TriggerAction::Log => self.sink.log(trigger, event),
            TriggerAction::Notify => self.sink.notify(trigger, event),
            TriggerAction::Block => self.sink.block(trigger, event),
            TriggerAction::Review => self.sink.review(trigger, event),
        }
    }

    /// Builds an item from the event payload and judges it.
    async fn execute_judge(&self, trigger: &Trigger, event: &BusEvent) {
        let item_type: ItemType = trigger
            .action_config
            .get("item_type")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or(ItemType::Event);
        let content = trigger
            .action_config
            .get("content_field")
            .and_then(Value::as_str)
            .and_then(|field| event.payload.get(field))
            .and_then(Value::as_str)
            .map_or_else(|| event.payload.to_string(), ToString::to_string);
        let prior = trigger.action_config.get("prior").and_then(Value::as_f64);

        let mut provenance = event.provenance.clone();
        provenance.push(trigger.id.clone());
        let context = CallContext {
            prior,
            provenance: provenance.clone(),
        };
        let item = Item::new(item_type, content);
        if let Err(error) =
            self.pipeline.judge(&item, context, PipelineCaller::default()).await
        {
            self.bus.publish_event(BusEvent::with_provenance(
                Topic::Alert,
                json!({
                    "trigger": trigger.id,
                    "name": trigger.name,
                    "action": "judge",
                    "error": error.to_string(),
                }),
                provenance,
            ));
        }
    }
}

/// Maps trigger types to the event topics they consider.
const fn type_matches(trigger_type: TriggerType, topic: Topic) -> bool {
    match trigger_type {
        TriggerType::Event | TriggerType::Composite => true,
        TriggerType::Pattern => matches!(topic, Topic::Pattern),
        TriggerType::Threshold => matches!(topic, Topic::Judgment),
        TriggerType::Periodic => false,
    }
}

/// Locks a mutex, recovering the inner state if a holder panicked.
fn lock_unpoisoned<G>(mutex: &Mutex<G>) -> MutexGuard<'_, G> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
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

    use std::sync::Arc;

    use serde_json::json;

    use super::NoopTriggerSink;
    use super::TriggerEngine;
    use crate::core::Topic;
    use crate::core::Trigger;
    use crate::core::TriggerAction;
    use crate::core::TriggerCondition;
    use crate::core::TriggerId;
    use crate::core::TriggerType;
    use crate::interfaces::SharedPersistence;
    use crate::judge::Judge;
    use crate::runtime::bus::EventBus;
    use crate::runtime::chain::ChainConfig;
    use crate::runtime::chain::ChainManager;
    use crate::runtime::learning::LearningConfig;
    use crate::runtime::learning::LearningEngine;
    use crate::runtime::memory::MemoryPersistence;
    use crate::runtime::pipeline::JudgmentPipeline;

    fn build_engine() -> (TriggerEngine, SharedPersistence, EventBus) {
        let persistence: SharedPersistence = Arc::new(MemoryPersistence::new());
        let bus = EventBus::default();
        let chain = Arc::new(
            ChainManager::new(Arc::clone(&persistence), bus.clone(), ChainConfig {
                batch_size: 100,
                flush_interval_ms: 60_000,
                max_queue_size: 1_000,
            })
            .expect("chain"),
        );
        let learning = Arc::new(
            LearningEngine::new(Arc::clone(&persistence), LearningConfig::default())
                .expect("learning"),
        );
        let pipeline = Arc::new(JudgmentPipeline::new(
            Judge::default(),
            Arc::clone(&persistence),
            chain,
            bus.clone(),
            learning,
        ));
        let engine = TriggerEngine::new(
            Arc::clone(&persistence),
            bus.clone(),
            pipeline,
            Arc::new(NoopTriggerSink),
        )
        .expect("engine");
        (engine, persistence, bus)
    }

    fn low_score_alert_trigger() -> Trigger {
        Trigger {
            id: TriggerId::new("low-score"),
            name: "alert on weak judgments".to_string(),
            trigger_type: TriggerType::Threshold,
            condition: TriggerCondition::FieldLt {
                field: "q_score".to_string(),
                value: 40.0,
            },
            action: TriggerAction::Alert,
            action_config: json!({}),
            enabled: true,
            priority: 10,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn matching_trigger_publishes_alert() {
        let (engine, _persistence, bus) = build_engine();
        engine.register(low_score_alert_trigger()).expect("register");
        let alerts = bus.subscribe(&[Topic::Alert]);
        let fired = engine.process_manual(Topic::Judgment, json!({"q_score": 12})).await;
        assert_eq!(fired, 1);
        let alert = alerts.recv().await.expect("alert");
        assert_eq!(alert.payload["trigger"], "low-score");
        assert_eq!(alert.provenance.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disabled_and_nonmatching_triggers_stay_silent() {
        let (engine, _persistence, _bus) = build_engine();
        engine.register(low_score_alert_trigger()).expect("register");
        assert_eq!(
            engine.process_manual(Topic::Judgment, json!({"q_score": 90})).await,
            0,
            "condition should not match"
        );
        engine
            .set_enabled(&TriggerId::new("low-score"), false)
            .expect("disable");
        assert_eq!(
            engine.process_manual(Topic::Judgment, json!({"q_score": 12})).await,
            0,
            "disabled trigger should not fire"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn judge_action_produces_judgment_with_provenance() {
        let (engine, persistence, bus) = build_engine();
        let trigger = Trigger {
            id: TriggerId::new("auto-judge"),
            name: "judge alert bodies".to_string(),
            trigger_type: TriggerType::Event,
            condition: TriggerCondition::TopicIs {
                topic: Topic::Alert,
            },
            action: TriggerAction::Judge,
            action_config: json!({"item_type": "event", "content_field": "message"}),
            enabled: true,
            priority: 0,
        };
        engine.register(trigger).expect("register");
        let judgments = bus.subscribe(&[Topic::Judgment]);
        let fired = engine
            .process_manual(Topic::Alert, json!({"message": "deploy failed on host a1"}))
            .await;
        assert_eq!(fired, 1);
        let event = judgments.recv().await.expect("judgment event");
        assert_eq!(event.provenance.len(), 1);
        assert_eq!(event.provenance[0].as_str(), "auto-judge");
        assert_eq!(persistence.recent_judgments(10).expect("recent").len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn provenance_prevents_re_firing() {
        let (engine, _persistence, _bus) = build_engine();
        let trigger = Trigger {
            id: TriggerId::new("auto-judge"),
            name: "judge everything".to_string(),
            trigger_type: TriggerType::Event,
            condition: TriggerCondition::Always,
            action: TriggerAction::Judge,
            action_config: json!({}),
            enabled: true,
            priority: 0,
        };
        engine.register(trigger).expect("register");
        let event = crate::core::BusEvent::with_provenance(
            Topic::Judgment,
            json!({"q_score": 50}),
            vec![TriggerId::new("auto-judge")],
        );
        assert_eq!(engine.inner.process_event(&event).await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rules_persist_across_engine_restarts() {
        let (engine, persistence, bus) = build_engine();
        engine.register(low_score_alert_trigger()).expect("register");
        drop(engine);

        let chain = Arc::new(
            ChainManager::new(Arc::clone(&persistence), bus.clone(), ChainConfig {
                batch_size: 100,
                flush_interval_ms: 60_000,
                max_queue_size: 1_000,
            })
            .expect("chain"),
        );
        let learning = Arc::new(
            LearningEngine::new(Arc::clone(&persistence), LearningConfig::default())
                .expect("learning"),
        );
        let pipeline = Arc::new(JudgmentPipeline::new(
            Judge::default(),
            Arc::clone(&persistence),
            chain,
            bus.clone(),
            learning,
        ));
        let reloaded = TriggerEngine::new(
            Arc::clone(&persistence),
            bus,
            pipeline,
            Arc::new(NoopTriggerSink),
        )
        .expect("engine");
        assert_eq!(reloaded.list().len(), 1);
    }
}
