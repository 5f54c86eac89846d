//! Trigger records and their result log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use relay_core::{TriggerId, TriggerResultId};

/// A persisted unit of deferred work.
///
/// Records are polymorphic by `trigger_type`: the discriminator selects the
/// handler registered for that variant, and `payload` belongs to it. The
/// processing core treats the payload as opaque.
///
/// Lifecycle: created with `date_processed` unset; the processor stamps
/// `date_processed` exactly once at terminal completion (success or
/// recognized failure). Forced reprocessing may re-stamp it, never clear it.
/// `process_after` is only moved by a handler-signaled deferral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRecord {
    id: TriggerId,
    trigger_type: String,
    source: Option<String>,
    date_received: DateTime<Utc>,
    process_after: Option<DateTime<Utc>>,
    date_processed: Option<DateTime<Utc>>,
    payload: JsonValue,
}

impl TriggerRecord {
    /// Create a new unprocessed record, stamping `id` and `date_received`.
    pub fn new(trigger_type: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            id: TriggerId::new(),
            trigger_type: trigger_type.into(),
            source: None,
            date_received: Utc::now(),
            process_after: None,
            date_processed: None,
            payload,
        }
    }

    /// Record where this trigger came from (free-text provenance).
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Make the record ineligible for processing before `at`.
    pub fn not_before(mut self, at: DateTime<Utc>) -> Self {
        self.process_after = Some(at);
        self
    }

    pub fn id(&self) -> TriggerId {
        self.id
    }

    pub fn trigger_type(&self) -> &str {
        &self.trigger_type
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn date_received(&self) -> DateTime<Utc> {
        self.date_received
    }

    pub fn process_after(&self) -> Option<DateTime<Utc>> {
        self.process_after
    }

    pub fn date_processed(&self) -> Option<DateTime<Utc>> {
        self.date_processed
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    pub fn is_processed(&self) -> bool {
        self.date_processed.is_some()
    }

    /// Whether the record is eligible for processing at `now`.
    ///
    /// Due means: not yet processed, and either unscheduled or its scheduled
    /// time has passed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.date_processed.is_some() {
            return false;
        }
        match self.process_after {
            Some(after) => after <= now,
            None => true,
        }
    }

    /// Stamp terminal completion.
    ///
    /// Only the processor calls this. Re-stamping (forced reprocessing) moves
    /// the timestamp forward; it never goes back to unset.
    pub fn mark_processed(&mut self, now: DateTime<Utc>) {
        self.date_processed = Some(now);
    }

    /// Reschedule the record (handler-signaled deferral).
    pub fn defer_until(&mut self, at: DateTime<Utc>) {
        self.process_after = Some(at);
    }
}

/// An append-only outcome log entry for a completed trigger.
///
/// One record accumulates multiple results when reprocessed under force.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResult {
    id: TriggerResultId,
    trigger_id: TriggerId,
    result: JsonValue,
    recorded_at: DateTime<Utc>,
}

impl TriggerResult {
    pub fn new(trigger_id: TriggerId, result: JsonValue) -> Self {
        Self {
            id: TriggerResultId::new(),
            trigger_id,
            result,
            recorded_at: Utc::now(),
        }
    }

    pub fn id(&self) -> TriggerResultId {
        self.id
    }

    pub fn trigger_id(&self) -> TriggerId {
        self.trigger_id
    }

    pub fn result(&self) -> &JsonValue {
        &self.result
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}
