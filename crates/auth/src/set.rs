//! The fixed set of plugins a server runs with.

use crate::error::PluginError;
use crate::plugin::AuthPlugin;
use std::sync::Arc;

/// The plugin list plus the default plugin name.
///
/// The set is fixed once the server is constructed. Lookup is a linear
/// scan: the expected cardinality is small single digits, and a scan
/// keeps the hot path allocation-free.
#[derive(Debug)]
pub struct PluginSet {
    plugins: Vec<Arc<dyn AuthPlugin>>,
    default_name: String,
}

impl PluginSet {
    pub fn new(
        plugins: Vec<Arc<dyn AuthPlugin>>,
        default_name: impl Into<String>,
    ) -> Result<Self, PluginError> {
        let default_name = default_name.into();

        if plugins.is_empty() {
            return Err(PluginError::Config(
                "at least one auth plugin is required".to_string(),
            ));
        }
        if default_name.is_empty() {
            return Err(PluginError::Config(
                "default auth plugin must be set".to_string(),
            ));
        }

        for (i, plugin) in plugins.iter().enumerate() {
            if plugins[..i].iter().any(|p| p.name() == plugin.name()) {
                return Err(PluginError::Config(format!(
                    "duplicate plugin name: {}",
                    plugin.name()
                )));
            }
        }

        if !plugins.iter().any(|p| p.name() == default_name) {
            return Err(PluginError::Config(format!(
                "default auth plugin {default_name} not found"
            )));
        }

        Ok(Self {
            plugins,
            default_name,
        })
    }

    /// Find a plugin by name.
    pub fn find(&self, name: &str) -> Option<&Arc<dyn AuthPlugin>> {
        self.plugins.iter().find(|p| p.name() == name)
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Names of every plugin in the set.
    pub fn names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    /// Stop every plugin, logging failures instead of aborting; a
    /// plugin that will not die should not block shutdown of the rest.
    pub async fn stop_all(&self) {
        for plugin in &self.plugins {
            if let Err(err) = plugin.stop().await {
                tracing::error!(plugin = %plugin.name(), error = %err, "failed to stop plugin");
            }
        }
    }
}
