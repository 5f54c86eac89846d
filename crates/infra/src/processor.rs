//! Per-record trigger lifecycle.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use relay_core::TriggerId;
use relay_triggers::{ExecutionContext, Outcome, TriggerRecord, TriggerRegistry, TriggerResult};

use crate::store::{StoreError, TriggerStore};

/// How a single `process` call ended.
///
/// Control signals ("nothing to do yet", "not ready") are values here rather
/// than errors; only unrecognized failures surface as [`ProcessError`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// Executed to completion; the payload was recorded as a result.
    Completed(JsonValue),
    /// `date_processed` was already set; nothing was invoked or mutated.
    AlreadyProcessed,
    /// Not eligible before `process_after`; nothing was invoked or mutated.
    NotDue { process_after: DateTime<Utc> },
    /// The handler asked for more time; the record stays pending.
    Deferred,
    /// Recognized failure; terminal, the payload was recorded as a result.
    Failed(JsonValue),
}

/// Processing error.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The record's discriminator has no registered handler.
    #[error("no handler registered for trigger type: {0}")]
    UnknownType(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The handler failed in an unrecognized way. The record was left
    /// untouched and stays due for a later retry.
    #[error("execution of {trigger_type} trigger {id} failed")]
    Execution {
        trigger_type: String,
        id: TriggerId,
        #[source]
        source: anyhow::Error,
    },
}

/// Drives one record through its lifecycle: due-check, handler execution,
/// outcome recording.
///
/// Used by the batch sweep for each due record, and directly (without the
/// sweep lock) by [`dispatch_one`] for externally triggered processing.
///
/// [`dispatch_one`]: TriggerProcessor::dispatch_one
pub struct TriggerProcessor<S: TriggerStore> {
    store: S,
    registry: TriggerRegistry,
}

impl<S: TriggerStore> TriggerProcessor<S> {
    pub fn new(store: S, registry: TriggerRegistry) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &TriggerRegistry {
        &self.registry
    }

    /// Process a single record.
    ///
    /// With `force` unset, an already-processed record is a no-op
    /// (`AlreadyProcessed`) and a scheduled-for-later record is untouched
    /// (`NotDue`). With `force` set, both guards are skipped: the handler
    /// runs again and another result is appended; `date_processed` is
    /// re-stamped, never cleared.
    pub fn process(
        &self,
        record: &mut TriggerRecord,
        context: &ExecutionContext,
        force: bool,
    ) -> Result<ProcessOutcome, ProcessError> {
        if !force && record.is_processed() {
            return Ok(ProcessOutcome::AlreadyProcessed);
        }
        if !force
            && let Some(after) = record.process_after()
            && after > Utc::now()
        {
            return Ok(ProcessOutcome::NotDue {
                process_after: after,
            });
        }

        let handler = self
            .registry
            .get(record.trigger_type())
            .ok_or_else(|| ProcessError::UnknownType(record.trigger_type().to_string()))?;

        match handler.execute(record, context) {
            Ok(Outcome::Completed(payload)) => {
                record.mark_processed(Utc::now());
                self.store.update(record)?;
                self.store
                    .append_result(TriggerResult::new(record.id(), payload.clone()))?;
                Ok(ProcessOutcome::Completed(payload))
            }
            Ok(Outcome::Deferred { process_after }) => {
                if let Some(at) = process_after {
                    record.defer_until(at);
                    self.store.update(record)?;
                }
                debug!(
                    trigger_type = %record.trigger_type(),
                    trigger_id = %record.id(),
                    "trigger deferred"
                );
                Ok(ProcessOutcome::Deferred)
            }
            Ok(Outcome::Failed(payload)) => {
                record.mark_processed(Utc::now());
                self.store.update(record)?;
                self.store
                    .append_result(TriggerResult::new(record.id(), payload.clone()))?;
                // Expected occurrence, not a bug.
                info!(
                    trigger_type = %record.trigger_type(),
                    trigger_id = %record.id(),
                    "trigger ended with a recognized failure"
                );
                Ok(ProcessOutcome::Failed(payload))
            }
            Err(source) => Err(ProcessError::Execution {
                trigger_type: record.trigger_type().to_string(),
                id: record.id(),
                source,
            }),
        }
    }

    /// Process exactly one named trigger on demand.
    ///
    /// An absent record is a silent no-op (`Ok(None)`): the triggering event
    /// may race with deletion. Everything else — recognized failures
    /// included — is surfaced to the caller. This path takes no sweep lock;
    /// concurrent dispatch for the same identifier is the caller's problem
    /// unless the handler is idempotent.
    pub fn dispatch_one(
        &self,
        trigger_type: &str,
        id: TriggerId,
        extra: ExecutionContext,
        force: bool,
    ) -> Result<Option<ProcessOutcome>, ProcessError> {
        let Some(mut record) = self.store.get(trigger_type, id)? else {
            debug!(trigger_type, trigger_id = %id, "dispatch target not found; ignoring");
            return Ok(None);
        };

        self.process(&mut record, &extra, force).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;
    use chrono::Duration;
    use serde_json::json;

    use relay_triggers::TriggerHandler;

    use crate::store::InMemoryTriggerStore;

    /// Handler that counts invocations and returns a preconfigured ending.
    struct ScriptedHandler {
        trigger_type: &'static str,
        calls: Arc<AtomicUsize>,
        script: Script,
    }

    enum Script {
        Complete(JsonValue),
        Defer(Option<DateTime<Utc>>),
        Fail(JsonValue),
        Blow(&'static str),
        EchoContext(&'static str),
    }

    impl TriggerHandler for ScriptedHandler {
        fn trigger_type(&self) -> &str {
            self.trigger_type
        }

        fn execute(
            &self,
            _record: &TriggerRecord,
            context: &ExecutionContext,
        ) -> anyhow::Result<Outcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Complete(payload) => Ok(Outcome::completed_with(payload.clone())),
                Script::Defer(None) => Ok(Outcome::deferred()),
                Script::Defer(Some(at)) => Ok(Outcome::deferred_until(*at)),
                Script::Fail(payload) => Ok(Outcome::failed(payload.clone())),
                Script::Blow(msg) => Err(anyhow!(*msg)),
                Script::EchoContext(key) => Ok(Outcome::completed_with(
                    context.get(key).cloned().unwrap_or(JsonValue::Null),
                )),
            }
        }
    }

    fn setup(
        script: Script,
    ) -> (
        TriggerProcessor<Arc<InMemoryTriggerStore>>,
        Arc<InMemoryTriggerStore>,
        Arc<AtomicUsize>,
    ) {
        let store = InMemoryTriggerStore::arc();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = TriggerRegistry::new();
        registry
            .register(Arc::new(ScriptedHandler {
                trigger_type: "dummy",
                calls: calls.clone(),
                script,
            }))
            .unwrap();
        (
            TriggerProcessor::new(store.clone(), registry),
            store,
            calls,
        )
    }

    #[test]
    fn completion_stamps_and_records() {
        let (processor, store, calls) = setup(Script::Complete(json!({"ok": true})));
        let mut record = TriggerRecord::new("dummy", json!({}));
        store.insert(record.clone()).unwrap();

        let outcome = processor
            .process(&mut record, &ExecutionContext::new(), false)
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Completed(json!({"ok": true})));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stored = store.get("dummy", record.id()).unwrap().unwrap();
        assert!(stored.is_processed());
        let results = store.results_for(record.id()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].result(), &json!({"ok": true}));
    }

    #[test]
    fn already_processed_is_a_noop() {
        let (processor, store, calls) = setup(Script::Complete(JsonValue::Null));
        let mut record = TriggerRecord::new("dummy", json!({}));
        record.mark_processed(Utc::now());
        store.insert(record.clone()).unwrap();

        let outcome = processor
            .process(&mut record, &ExecutionContext::new(), false)
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::AlreadyProcessed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(store.results_for(record.id()).unwrap().is_empty());
    }

    #[test]
    fn not_due_is_untouched() {
        let (processor, store, calls) = setup(Script::Complete(JsonValue::Null));
        let after = Utc::now() + Duration::hours(1);
        let mut record = TriggerRecord::new("dummy", json!({})).not_before(after);
        store.insert(record.clone()).unwrap();

        let outcome = processor
            .process(&mut record, &ExecutionContext::new(), false)
            .unwrap();

        assert_eq!(
            outcome,
            ProcessOutcome::NotDue {
                process_after: after
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!store.get("dummy", record.id()).unwrap().unwrap().is_processed());
    }

    #[test]
    fn force_skips_both_guards() {
        let (processor, store, calls) = setup(Script::Complete(json!(1)));
        let mut record =
            TriggerRecord::new("dummy", json!({})).not_before(Utc::now() + Duration::hours(1));
        record.mark_processed(Utc::now());
        store.insert(record.clone()).unwrap();

        let outcome = processor
            .process(&mut record, &ExecutionContext::new(), true)
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Completed(json!(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn deferral_reschedules_without_result() {
        let later = Utc::now() + Duration::minutes(30);
        let (processor, store, _calls) = setup(Script::Defer(Some(later)));
        let mut record = TriggerRecord::new("dummy", json!({}));
        store.insert(record.clone()).unwrap();

        let outcome = processor
            .process(&mut record, &ExecutionContext::new(), false)
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Deferred);
        let stored = store.get("dummy", record.id()).unwrap().unwrap();
        assert!(!stored.is_processed());
        assert_eq!(stored.process_after(), Some(later));
        assert!(store.results_for(record.id()).unwrap().is_empty());
    }

    #[test]
    fn deferral_without_reschedule_leaves_store_untouched() {
        let (processor, store, _calls) = setup(Script::Defer(None));
        let mut record = TriggerRecord::new("dummy", json!({}));
        store.insert(record.clone()).unwrap();

        let outcome = processor
            .process(&mut record, &ExecutionContext::new(), false)
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Deferred);
        let stored = store.get("dummy", record.id()).unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[test]
    fn recognized_failure_is_terminal() {
        let (processor, store, _calls) = setup(Script::Fail(json!({"reason": "no stock"})));
        let mut record = TriggerRecord::new("dummy", json!({}));
        store.insert(record.clone()).unwrap();

        let outcome = processor
            .process(&mut record, &ExecutionContext::new(), false)
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Failed(json!({"reason": "no stock"})));
        let stored = store.get("dummy", record.id()).unwrap().unwrap();
        assert!(stored.is_processed());
        let results = store.results_for(record.id()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].result(), &json!({"reason": "no stock"}));
    }

    #[test]
    fn unrecognized_failure_leaves_record_due() {
        let (processor, store, _calls) = setup(Script::Blow("connection reset"));
        let mut record = TriggerRecord::new("dummy", json!({}));
        store.insert(record.clone()).unwrap();

        let err = processor
            .process(&mut record, &ExecutionContext::new(), false)
            .unwrap_err();

        assert!(matches!(err, ProcessError::Execution { .. }));
        let stored = store.get("dummy", record.id()).unwrap().unwrap();
        assert!(!stored.is_processed());
        assert!(stored.is_due(Utc::now()));
        assert!(store.results_for(record.id()).unwrap().is_empty());
    }

    #[test]
    fn unknown_type_is_an_error() {
        let (processor, store, _calls) = setup(Script::Complete(JsonValue::Null));
        let mut record = TriggerRecord::new("unregistered", json!({}));
        store.insert(record.clone()).unwrap();

        let err = processor
            .process(&mut record, &ExecutionContext::new(), false)
            .unwrap_err();

        assert!(matches!(err, ProcessError::UnknownType(t) if t == "unregistered"));
    }

    #[test]
    fn dispatch_missing_record_is_silent() {
        let (processor, store, calls) = setup(Script::Complete(JsonValue::Null));

        let outcome = processor
            .dispatch_one("dummy", TriggerId::new(), ExecutionContext::new(), false)
            .unwrap();

        assert_eq!(outcome, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.record_count(), 0);
    }

    #[test]
    fn dispatch_forwards_extra_context() {
        let (processor, store, _calls) = setup(Script::EchoContext("origin"));
        let record = TriggerRecord::new("dummy", json!({}));
        let id = store.insert(record).unwrap();

        let extra = ExecutionContext::new().with_value("origin", json!("webhook"));
        let outcome = processor.dispatch_one("dummy", id, extra, false).unwrap();

        assert_eq!(outcome, Some(ProcessOutcome::Completed(json!("webhook"))));
    }

    #[test]
    fn forced_dispatch_accumulates_results() {
        let (processor, store, calls) = setup(Script::Complete(json!("run")));
        let record = TriggerRecord::new("dummy", json!({}));
        let id = store.insert(record).unwrap();

        processor
            .dispatch_one("dummy", id, ExecutionContext::new(), false)
            .unwrap();
        let first_stamp = store.get("dummy", id).unwrap().unwrap().date_processed();
        assert!(first_stamp.is_some());

        // Unforced re-dispatch is inert.
        let outcome = processor
            .dispatch_one("dummy", id, ExecutionContext::new(), false)
            .unwrap();
        assert_eq!(outcome, Some(ProcessOutcome::AlreadyProcessed));
        assert_eq!(store.results_for(id).unwrap().len(), 1);

        // Forced re-dispatch executes again and appends.
        let outcome = processor
            .dispatch_one("dummy", id, ExecutionContext::new(), true)
            .unwrap();
        assert_eq!(outcome, Some(ProcessOutcome::Completed(json!("run"))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.results_for(id).unwrap().len(), 2);

        let second_stamp = store.get("dummy", id).unwrap().unwrap().date_processed();
        assert!(second_stamp.is_some());
        assert!(second_stamp >= first_stamp);
    }
}
