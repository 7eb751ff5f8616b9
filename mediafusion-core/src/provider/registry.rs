//! Registry of configured debrid providers, grounded on the same
//! factory-registry shape the teacher uses for its media providers,
//! simplified to a flat name -> instance map since MediaFusion providers
//! are configured once at startup from environment input (§6), not
//! created dynamically per room.

use std::collections::HashMap;
use std::sync::Arc;

use super::DebridProvider;

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn DebridProvider>>,
    disabled: std::collections::HashSet<String>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn DebridProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn disable(&mut self, name: &str) {
        self.disabled.insert(name.to_string());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn DebridProvider>> {
        if self.disabled.contains(name) {
            return None;
        }
        self.providers.get(name).cloned()
    }

    #[must_use]
    pub fn enabled(&self) -> Vec<Arc<dyn DebridProvider>> {
        self.providers
            .iter()
            .filter(|(name, _)| !self.disabled.contains(*name))
            .map(|(_, provider)| provider.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::test_support::StubProvider;

    #[test]
    fn disabled_provider_is_not_returned() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubProvider::new("realdebrid")));
        registry.disable("realdebrid");
        assert!(registry.get("realdebrid").is_none());
    }

    #[test]
    fn registered_provider_is_retrievable_by_name() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubProvider::new("torbox")));
        assert!(registry.get("torbox").is_some());
    }
}
