//! Process-wide registry of trigger variants.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::handler::TriggerHandler;

/// Registry error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A handler is already registered under this discriminator.
    #[error("trigger type already registered: {0}")]
    Duplicate(String),
}

/// Maps discriminator strings to their handlers.
///
/// Populated once at startup; the sweep discovers which stored types are
/// processable by enumerating it. Enumeration is sorted by discriminator, so
/// cross-type sweep order is stable across runs.
#[derive(Clone, Default)]
pub struct TriggerRegistry {
    handlers: BTreeMap<String, Arc<dyn TriggerHandler>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own discriminator.
    pub fn register(&mut self, handler: Arc<dyn TriggerHandler>) -> Result<(), RegistryError> {
        let trigger_type = handler.trigger_type().to_string();
        if self.handlers.contains_key(&trigger_type) {
            return Err(RegistryError::Duplicate(trigger_type));
        }
        self.handlers.insert(trigger_type, handler);
        Ok(())
    }

    pub fn get(&self, trigger_type: &str) -> Option<Arc<dyn TriggerHandler>> {
        self.handlers.get(trigger_type).cloned()
    }

    /// Registered discriminators, sorted.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for TriggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerRegistry")
            .field("types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
