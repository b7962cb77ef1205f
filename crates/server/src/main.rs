//! Porter server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use porter_core::config::AppConfig;
use porter_server::Server;
use porter_server::reload;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Porter - a uniform HTTP facade over object-storage providers
#[derive(Parser, Debug)]
#[command(name = "porterd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "PORTER_CONFIG", default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("porter v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide or
    // override everything).
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %args.config, "loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    }

    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("PORTER_") && key != "PORTER_CONFIG");
    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "no configuration provided; pass --config /path/to/config.toml \
             or set PORTER_-prefixed environment variables \
             (e.g. PORTER_SERVER__BIND=0.0.0.0:8080)"
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("PORTER_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    // Plugins are fixed for the process lifetime; a failure here is fatal.
    let mut plugins = Vec::with_capacity(config.auth_plugins.len());
    for plugin_config in &config.auth_plugins {
        let plugin = porter_auth::from_config(plugin_config)
            .await
            .with_context(|| format!("failed to create plugin {}", plugin_config.name))?;
        plugins.push(plugin);
    }
    tracing::info!(count = plugins.len(), "auth plugins started");

    let server = Server::new(config.server.clone(), plugins).context("failed to create server")?;
    let state = server.state().clone();

    // Initial provider set; startup is strict about broken definitions.
    let providers = reload::load_providers(&config.providers_file)
        .await
        .context("failed to load providers")?;
    for provider in providers {
        let id = provider.id().to_string();
        server
            .registry()
            .register(provider)
            .with_context(|| format!("failed to register provider {id}"))?;
    }

    // Keep the watcher alive for the lifetime of the server.
    let _watcher = reload::spawn_watcher(config.providers_file.clone(), server.registry())
        .context("failed to watch providers file")?;

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone())?;

    server.run(shutdown).await.context("server failed")?;
    tracing::info!("server stopped");

    // Release plugin children and connections before exiting.
    state.plugins.stop_all().await;

    Ok(())
}

/// First SIGINT/SIGTERM triggers graceful shutdown; a second one kills
/// the process outright.
fn spawn_signal_handler(shutdown: CancellationToken) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt()).context("failed to install handler")?;
    let mut terminate = signal(SignalKind::terminate()).context("failed to install handler")?;

    tokio::spawn(async move {
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
        tracing::info!("stopping server");
        shutdown.cancel();

        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
        tracing::warn!("force killing");
        std::process::exit(1);
    });

    Ok(())
}
