//! Provider definition loading and hot reload.
//!
//! The providers file is parsed with figment and watched with `notify`.
//! Startup is strict: a provider that cannot be built aborts the
//! process before it accepts traffic. Reloads are lenient: a broken
//! definition is logged and skipped so an edit typo never takes the
//! server down.

use anyhow::Context;
use figment::Figment;
use figment::providers::{Format, Toml};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use porter_core::config::ProvidersFile;
use porter_provider::{Provider, ProviderRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Quiet period after a filesystem event before reloading, so a burst
/// of editor writes produces one reload.
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(300);

fn parse_providers_file(path: &Path) -> anyhow::Result<ProvidersFile> {
    Figment::new()
        .merge(Toml::file(path))
        .extract()
        .with_context(|| format!("failed to parse providers file {}", path.display()))
}

/// Load and build every provider in the file. Any failure is an error;
/// used at startup where a broken definition should stop the launch.
pub async fn load_providers(path: &Path) -> anyhow::Result<Vec<Arc<dyn Provider>>> {
    let file = parse_providers_file(path)?;

    let mut providers = Vec::with_capacity(file.len());
    for (id, table) in file {
        let config = table.into_config(id.clone());
        let provider = porter_provider::from_config(&config)
            .await
            .with_context(|| format!("failed to build provider {id}"))?;
        providers.push(provider);
    }
    Ok(providers)
}

/// Re-read the providers file and apply it to the registry. Individual
/// failures are logged and skipped.
pub async fn reload_providers(path: &Path, registry: &ProviderRegistry) {
    tracing::info!(path = %path.display(), "reloading providers");

    let file = match parse_providers_file(path) {
        Ok(file) => file,
        Err(err) => {
            tracing::error!(error = %err, "providers file unreadable, keeping current set");
            return;
        }
    };

    let mut providers = Vec::with_capacity(file.len());
    for (id, table) in file {
        let config = table.into_config(id.clone());
        match porter_provider::from_config(&config).await {
            Ok(provider) => providers.push(provider),
            Err(err) => {
                tracing::error!(provider = %id, error = %err, "failed to build provider, skipping");
            }
        }
    }

    registry.apply(providers);
}

/// Watch the providers file and reload on change.
///
/// The parent directory is watched rather than the file itself because
/// most editors replace the file, which would drop a file-level watch.
/// The returned watcher must be kept alive for the watch to persist.
pub fn spawn_watcher(
    path: PathBuf,
    registry: Arc<ProviderRegistry>,
) -> anyhow::Result<RecommendedWatcher> {
    let watch_dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let file_name = path.file_name().map(|name| name.to_os_string());

    let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
        let event = match result {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "providers watch error");
                return;
            }
        };

        let relevant = matches!(
            event.kind,
            notify::EventKind::Create(_)
                | notify::EventKind::Modify(_)
                | notify::EventKind::Remove(_)
        ) && event.paths.iter().any(|p| {
            file_name.is_none() || p.file_name().map(|n| n.to_os_string()) == file_name
        });

        if relevant {
            let _ = tx.send(());
        }
    })
    .context("failed to create providers watcher")?;

    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", watch_dir.display()))?;
    tracing::info!(path = %path.display(), "watching providers file");

    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            // Collapse the burst of events a single save produces.
            tokio::time::sleep(RELOAD_DEBOUNCE).await;
            while rx.try_recv().is_ok() {}

            reload_providers(&path, &registry).await;
        }
    });

    Ok(watcher)
}
