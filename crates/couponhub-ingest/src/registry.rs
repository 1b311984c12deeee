use std::sync::Arc;

use crate::error::IngestError;
use crate::provider::ManagedProvider;

/// Name-keyed collection of providers in registration order.
///
/// Names are unique; a second provider with an already-registered name
/// is rejected rather than replacing the first.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<ManagedProvider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns [`IngestError::DuplicateProvider`] when a provider with the
    /// same name is already registered.
    pub fn register(&mut self, provider: Arc<ManagedProvider>) -> Result<(), IngestError> {
        if self.get(provider.name()).is_some() {
            return Err(IngestError::DuplicateProvider(provider.name().to_string()));
        }
        tracing::debug!(
            provider = %provider.name(),
            enabled = provider.is_enabled(),
            "registry: provider registered"
        );
        self.providers.push(provider);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ManagedProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    #[must_use]
    pub fn all(&self) -> Vec<Arc<ManagedProvider>> {
        self.providers.clone()
    }

    #[must_use]
    pub fn enabled(&self) -> Vec<Arc<ManagedProvider>> {
        self.providers
            .iter()
            .filter(|p| p.is_enabled())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
