use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::foundation::error::{MontageError, MontageResult};
use crate::processor::ProcessorKind;
use crate::processor::builtin::{ColourCurveProcessor, GainProcessor};
use crate::processor::controller::ProcessorController;

/// Creates a fresh processor instance.
pub type ProcessorFactory = Arc<dyn Fn() -> ProcessorKind + Send + Sync>;

/// Prefix of identifiers for processors compiled into montage.
pub const BUILTIN_PREFIX: &str = "BUILTIN: ";

/// Status recorded for a saved processor whose identifier is not registered.
pub const PLUGIN_NOT_KNOWN: &str = "Plugin not known";

/// Identifier for a built-in processor named `name`.
pub fn builtin_identifier(name: &str) -> String {
    format!("{BUILTIN_PREFIX}{name}")
}

/// Maps processor identifiers to factories.
#[derive(Default)]
pub struct PluginRegistry {
    factories: RwLock<BTreeMap<String, ProcessorFactory>>,
}

impl PluginRegistry {
    /// Registry with nothing registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry preloaded with [`GainProcessor`] and [`ColourCurveProcessor`].
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        registry.register(
            builtin_identifier(GainProcessor::NAME),
            Arc::new(|| ProcessorKind::Audio(Box::new(GainProcessor::new()))),
        );
        registry.register(
            builtin_identifier(ColourCurveProcessor::NAME),
            Arc::new(|| ProcessorKind::Video(Box::new(ColourCurveProcessor::new()))),
        );
        registry
    }

    /// Add or replace a factory.
    pub fn register(&self, identifier: impl Into<String>, factory: ProcessorFactory) {
        self.factories.write().insert(identifier.into(), factory);
    }

    /// Known identifiers, sorted.
    pub fn identifiers(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.read().contains_key(identifier)
    }

    /// Instantiate `identifier` inside a fresh controller.
    pub fn create(&self, identifier: &str) -> MontageResult<ProcessorController> {
        let factory = self
            .factories
            .read()
            .get(identifier)
            .cloned()
            .ok_or_else(|| MontageError::plugin(format!("{PLUGIN_NOT_KNOWN}: {identifier}")))?;
        Ok(ProcessorController::new(identifier, factory()))
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("identifiers", &self.identifiers())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/processor/registry.rs"]
mod tests;
