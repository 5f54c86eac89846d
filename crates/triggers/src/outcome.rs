//! Execution outcomes signaled by trigger handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// What a handler decided about a single record.
///
/// The three variants cover every *recognized* way an execution can end;
/// unrecognized failures are returned as plain errors and handled by the
/// processing layer's error boundary (the record stays due and is retried).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    /// Work done. The payload (possibly `Null`) is recorded as the trigger's
    /// result and the record becomes terminal.
    Completed(JsonValue),

    /// Not ready yet. The record stays pending; a supplied `process_after`
    /// reschedules it.
    Deferred {
        process_after: Option<DateTime<Utc>>,
    },

    /// Recognized, expected failure. Terminal like `Completed`: the payload
    /// is recorded and the record is not retried.
    Failed(JsonValue),
}

impl Outcome {
    /// Successful completion with no result payload.
    pub fn completed() -> Self {
        Self::Completed(JsonValue::Null)
    }

    pub fn completed_with(payload: JsonValue) -> Self {
        Self::Completed(payload)
    }

    /// Defer without rescheduling; the record stays due for the next sweep.
    pub fn deferred() -> Self {
        Self::Deferred {
            process_after: None,
        }
    }

    /// Defer and move the record's eligibility to `at`.
    pub fn deferred_until(at: DateTime<Utc>) -> Self {
        Self::Deferred {
            process_after: Some(at),
        }
    }

    pub fn failed(payload: JsonValue) -> Self {
        Self::Failed(payload)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }
}
