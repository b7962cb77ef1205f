//! Server construction and lifecycle.

use crate::routes::create_router;
use crate::state::AppState;
use axum::Router;
use axum::extract::Request;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use porter_auth::{AuthPlugin, PluginError, PluginSet};
use porter_core::config::ServerConfig;
use porter_provider::ProviderRegistry;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Clients get this long to send their request head.
const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(5);
/// Grace period for draining in-flight requests on shutdown.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The HTTP facade: router, registry and plugin set, ready to run.
pub struct Server {
    state: AppState,
    router: Router,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server").finish_non_exhaustive()
    }
}

impl Server {
    /// Validate the configuration and wire the router.
    ///
    /// Fails when the bind address is empty, the plugin list is empty,
    /// plugin names collide, or the default plugin is missing from the
    /// list. Providers are registered afterwards through
    /// [`Server::registry`].
    pub fn new(
        config: ServerConfig,
        plugins: Vec<Arc<dyn AuthPlugin>>,
    ) -> Result<Self, ServerError> {
        if config.bind.is_empty() {
            return Err(ServerError::Config("bind address is required".to_string()));
        }

        let plugins = PluginSet::new(plugins, config.default_auth_plugin.clone())?;
        let registry = Arc::new(ProviderRegistry::new(plugins.names()));

        let state = AppState {
            config: Arc::new(config),
            registry,
            plugins: Arc::new(plugins),
        };
        let router = create_router(state.clone());

        Ok(Self { state, router })
    }

    /// The provider registry backing this server.
    pub fn registry(&self) -> Arc<ProviderRegistry> {
        self.state.registry.clone()
    }

    /// The shared application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The router, for driving the server without a listener (tests).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind and serve until `shutdown` fires, then drain with a bounded
    /// grace period.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.state.config.bind).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "server listening");

        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(HEADER_READ_TIMEOUT);
        let graceful = GracefulShutdown::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to accept connection");
                            continue;
                        }
                    };

                    let io = TokioIo::new(stream);
                    let router = self.router.clone();
                    let service = hyper::service::service_fn(move |request: Request<Incoming>| {
                        router.clone().oneshot(request)
                    });

                    let connection = builder.serve_connection_with_upgrades(io, service);
                    let watched = graceful.watch(connection.into_owned());
                    tokio::spawn(async move {
                        if let Err(err) = watched.await {
                            tracing::debug!(peer = %peer, error = %err, "connection closed with error");
                        }
                    });
                }
            }
        }

        // Stop accepting, then drain what is in flight.
        drop(listener);
        tokio::select! {
            _ = graceful.shutdown() => {
                tracing::info!("server drained");
            }
            _ = tokio::time::sleep(SHUTDOWN_DEADLINE) => {
                tracing::error!(
                    deadline_secs = SHUTDOWN_DEADLINE.as_secs(),
                    "graceful shutdown deadline exceeded, dropping open connections"
                );
            }
        }

        Ok(())
    }
}
