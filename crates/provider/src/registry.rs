//! Process-wide provider registry.
//!
//! Handlers look providers up on every request; a reload callback
//! rewrites entries while requests are in flight. Lookups take the read
//! side of the lock, mutations the write side, and no I/O happens under
//! either. The set of known auth-plugin names is fixed at construction
//! (the plugin list cannot change at runtime), so registration can
//! validate plugin references without consulting the auth subsystem.

use crate::error::RegistryError;
use crate::traits::Provider;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Concurrent id→provider mapping.
pub struct ProviderRegistry {
    plugin_names: HashSet<String>,
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

impl ProviderRegistry {
    /// Create a registry that accepts providers referencing any of
    /// `plugin_names`.
    pub fn new(plugin_names: impl IntoIterator<Item = String>) -> Self {
        Self {
            plugin_names: plugin_names.into_iter().collect(),
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a provider.
    ///
    /// Fails on an empty id, on an auth-plugin reference that does not
    /// resolve, and on a duplicate id. The duplicate check and the
    /// insert happen under a single write lock so two concurrent
    /// registrations of the same id cannot both succeed.
    pub fn register(&self, provider: Arc<dyn Provider>) -> Result<(), RegistryError> {
        let id = provider.id().to_string();
        if id.is_empty() {
            return Err(RegistryError::EmptyId);
        }

        if let Some(plugin) = provider.auth_plugin() {
            if !self.plugin_names.contains(plugin) {
                return Err(RegistryError::PluginNotFound(id));
            }
        }

        tracing::info!(provider = %id, "registering provider");

        let mut providers = self.providers.write().expect("registry lock poisoned");
        if providers.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered);
        }
        providers.insert(id, provider);
        Ok(())
    }

    /// Remove a provider. Removing an unknown id is a no-op.
    pub fn remove(&self, id: &str) {
        tracing::info!(provider = %id, "removing provider");
        self.providers
            .write()
            .expect("registry lock poisoned")
            .remove(id);
    }

    /// Look up a provider by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .read()
            .expect("registry lock poisoned")
            .get(id)
            .cloned()
    }

    /// Snapshot of the registered ids.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .providers
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Apply a reloaded provider list.
    ///
    /// Every provider in `new` replaces any same-id entry (remove, then
    /// register, so a reloaded id is rebuilt); ids present before but
    /// absent from `new` are removed. A provider that fails to register
    /// is logged and skipped; it never takes the server down.
    pub fn apply(&self, new: Vec<Arc<dyn Provider>>) {
        let new_ids: HashSet<String> = new.iter().map(|p| p.id().to_string()).collect();

        for provider in new {
            let id = provider.id().to_string();
            self.remove(&id);
            if let Err(err) = self.register(provider) {
                tracing::error!(provider = %id, error = %err, "failed to register provider on reload");
            }
        }

        let stale: Vec<String> = self
            .ids()
            .into_iter()
            .filter(|id| !new_ids.contains(id))
            .collect();
        for id in stale {
            self.remove(&id);
        }
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .finish_non_exhaustive()
    }
}
