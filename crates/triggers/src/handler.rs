//! Trigger execution capability.

use crate::context::ExecutionContext;
use crate::outcome::Outcome;
use crate::record::TriggerRecord;

/// Type-specific execution logic for one trigger variant.
///
/// Implementations are registered in a [`TriggerRegistry`] under their
/// discriminator and invoked by the processing layer for records carrying
/// that `trigger_type`.
///
/// Contract:
/// - `execute` must confine its side effects to the record it was given; no
///   cross-record coupling.
/// - Recognized endings (done / not ready / expected failure) are expressed
///   through [`Outcome`]. Returning `Err` means an *unrecognized* failure:
///   the record is left untouched and retried on a later sweep.
/// - `execute` runs to completion; there is no deadline enforcement, so a
///   stalling implementation stalls the whole sweep.
///
/// [`TriggerRegistry`]: crate::registry::TriggerRegistry
pub trait TriggerHandler: Send + Sync + 'static {
    /// Discriminator this handler executes. Must match the `trigger_type` of
    /// every record routed to it.
    fn trigger_type(&self) -> &str;

    /// Run the type-specific work for a single record.
    fn execute(
        &self,
        record: &TriggerRecord,
        context: &ExecutionContext,
    ) -> anyhow::Result<Outcome>;
}
