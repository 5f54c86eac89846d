//! `relay-triggers`
//!
//! **Responsibility:** Trigger domain model and execution capability.
//!
//! This crate defines what a trigger *is*:
//! - `TriggerRecord`: a persisted unit of deferred work with lifecycle fields.
//! - `TriggerResult`: an append-only outcome log entry.
//! - `Outcome`: the tagged union a handler returns (completed / deferred /
//!   recognized failure). Unrecognized failures are ordinary errors and are
//!   handled by the processing layer, not modeled here.
//! - `TriggerHandler`: the capability interface one trigger variant implements.
//! - `TriggerRegistry`: the explicit process-wide map from discriminator
//!   strings to handlers, populated at startup.
//!
//! Persistence and batch processing live in `relay-infra`; this crate stays
//! storage-agnostic.

pub mod context;
pub mod handler;
pub mod outcome;
pub mod record;
pub mod registry;

pub use context::ExecutionContext;
pub use handler::TriggerHandler;
pub use outcome::Outcome;
pub use record::{TriggerRecord, TriggerResult};
pub use registry::{RegistryError, TriggerRegistry};
