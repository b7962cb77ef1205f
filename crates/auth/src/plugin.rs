//! The plugin contract and its three lifecycles.

use crate::allow_types::AllowTypesPlugin;
use crate::error::PluginError;
use crate::subprocess::SubprocessPlugin;
use crate::v1::{AuthorizationServiceClient, AuthorizeRequest};
use async_trait::async_trait;
use porter_core::config::PluginConfig;
use std::sync::Arc;
use tonic::transport::Channel;
use tracing::Level;

/// A named authorization decider, consulted once per request.
///
/// `authorize` returns `Ok(())` to let the request proceed; everything
/// else is a [`tonic::Status`] whose code decides the HTTP translation
/// (done by the server, not here).
#[async_trait]
pub trait AuthPlugin: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    async fn authorize(&self, request: AuthorizeRequest) -> Result<(), tonic::Status>;

    /// Release whatever the plugin owns: the child process for
    /// subprocess plugins, the connection for remote ones.
    async fn stop(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

/// An in-process plugin.
#[derive(Debug)]
struct BuiltinPlugin {
    name: String,
    inner: AllowTypesPlugin,
}

#[async_trait]
impl AuthPlugin for BuiltinPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn authorize(&self, request: AuthorizeRequest) -> Result<(), tonic::Status> {
        self.inner.authorize(&request)
    }
}

/// A plugin process owned by the server.
#[derive(Debug)]
struct OwnedProcessPlugin {
    inner: SubprocessPlugin,
}

#[async_trait]
impl AuthPlugin for OwnedProcessPlugin {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn authorize(&self, request: AuthorizeRequest) -> Result<(), tonic::Status> {
        let mut client = self.inner.client();
        client.authorize(request).await.map(|_| ())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        self.inner.stop().await
    }
}

/// An externally managed plugin reached over plaintext gRPC.
#[derive(Debug)]
struct RemotePlugin {
    name: String,
    client: AuthorizationServiceClient,
}

impl RemotePlugin {
    async fn connect(name: String, addr: &str) -> Result<Self, PluginError> {
        let endpoint = Channel::from_shared(format!("http://{addr}"))
            .map_err(|err| PluginError::Config(format!("bad plugin address {addr}: {err}")))?;
        let channel = endpoint.connect().await?;
        Ok(Self {
            name,
            client: AuthorizationServiceClient::new(channel),
        })
    }
}

#[async_trait]
impl AuthPlugin for RemotePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn authorize(&self, request: AuthorizeRequest) -> Result<(), tonic::Status> {
        let mut client = self.client.clone();
        client.authorize(request).await.map(|_| ())
    }

    // Dropping the channel closes the connection; there is nothing else
    // to release.
}

fn parse_log_level(level: Option<&str>) -> Result<Level, PluginError> {
    match level {
        None => Ok(Level::INFO),
        Some("trace") => Ok(Level::TRACE),
        Some("debug") => Ok(Level::DEBUG),
        Some("info") => Ok(Level::INFO),
        Some("warn") => Ok(Level::WARN),
        Some("error") => Ok(Level::ERROR),
        Some(other) => Err(PluginError::Config(format!("unknown log level: {other}"))),
    }
}

/// Build a plugin from its configuration.
///
/// Exactly one of `cmd`, `addr` or `builtin` selects the lifecycle.
/// The caller owns the result and must call `stop` when done with it.
pub async fn from_config(config: &PluginConfig) -> Result<Arc<dyn AuthPlugin>, PluginError> {
    if config.name.is_empty() {
        return Err(PluginError::Config("name must be set".to_string()));
    }

    let log_level = parse_log_level(config.log_level.as_deref())?;

    let selected = usize::from(!config.cmd.is_empty())
        + usize::from(config.addr.is_some())
        + usize::from(config.builtin.is_some());
    if selected > 1 {
        return Err(PluginError::Config(
            "only one of cmd, addr or builtin can be set".to_string(),
        ));
    }
    if selected == 0 {
        return Err(PluginError::Config(
            "must set either cmd, addr or builtin".to_string(),
        ));
    }

    if !config.cmd.is_empty() {
        let inner =
            SubprocessPlugin::start(config.name.clone(), &config.cmd, &config.args, log_level)
                .await?;
        return Ok(Arc::new(OwnedProcessPlugin { inner }));
    }

    if let Some(addr) = config.addr.as_deref() {
        let plugin = RemotePlugin::connect(config.name.clone(), addr).await?;
        return Ok(Arc::new(plugin));
    }

    match config.builtin.as_deref() {
        Some("allow-types") => Ok(Arc::new(BuiltinPlugin {
            name: config.name.clone(),
            inner: AllowTypesPlugin::new(&config.args)?,
        })),
        Some(other) => Err(PluginError::Config(format!(
            "unknown built-in plugin: {other}"
        ))),
        None => unreachable!("selection counted above"),
    }
}
