//! Application state shared across handlers.

use porter_auth::PluginSet;
use porter_core::config::ServerConfig;
use porter_provider::ProviderRegistry;
use std::sync::Arc;

/// Shared application state.
///
/// The registry is the only mutable piece; the config and the plugin
/// set are fixed once the server is constructed.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Provider registry, consulted on every request.
    pub registry: Arc<ProviderRegistry>,
    /// The fixed set of authorization plugins.
    pub plugins: Arc<PluginSet>,
}
