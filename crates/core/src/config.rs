//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level application configuration for the `porterd` binary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Authorization plugins, fixed for the lifetime of the process.
    #[serde(default)]
    pub auth_plugins: Vec<PluginConfig>,
    /// Path to the provider definition file. This file is watched and
    /// hot-reloaded; the rest of the configuration is not.
    #[serde(default = "default_providers_file")]
    pub providers_file: PathBuf,
}

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Name of the auth plugin used for providers that do not name one.
    #[serde(default)]
    pub default_auth_plugin: String,
    /// Allow uploads with a raw request body instead of multipart form data.
    #[serde(default)]
    pub allow_raw_body: bool,
    /// Allow uploads without a Content-Length header. The body is buffered
    /// in memory to measure it, bounded by `max_buffered_body_bytes`.
    #[serde(default = "default_allow_unknown_content_length")]
    pub allow_unknown_content_length: bool,
    /// Upper bound for bodies buffered to resolve an unknown Content-Length.
    #[serde(default = "default_max_buffered_body_bytes")]
    pub max_buffered_body_bytes: u64,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_allow_unknown_content_length() -> bool {
    true
}

fn default_max_buffered_body_bytes() -> u64 {
    32 * 1024 * 1024
}

fn default_providers_file() -> PathBuf {
    PathBuf::from("providers.toml")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            default_auth_plugin: String::new(),
            allow_raw_body: false,
            allow_unknown_content_length: default_allow_unknown_content_length(),
            max_buffered_body_bytes: default_max_buffered_body_bytes(),
        }
    }
}

/// Configuration of a single authorization plugin.
///
/// Exactly one of `cmd`, `addr` or `builtin` must be set:
/// - `cmd`: command and arguments of a plugin binary started and owned by
///   the server, spoken to over the handshake protocol.
/// - `addr`: `host:port` of an already running plugin reachable over
///   plaintext gRPC.
/// - `builtin`: identifier of an in-process plugin (`args` configures it).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Unique name of the plugin, used to reference it from providers
    /// and as the tag on its re-logged output.
    pub name: String,
    /// Command and arguments to start the plugin as a child process.
    #[serde(default)]
    pub cmd: Vec<String>,
    /// Address of an externally managed plugin.
    #[serde(default)]
    pub addr: Option<String>,
    /// Identifier of a built-in plugin.
    #[serde(default)]
    pub builtin: Option<String>,
    /// Extra arguments, passed to `cmd` and `builtin` plugins.
    #[serde(default)]
    pub args: Vec<String>,
    /// Level at which the plugin's own output is re-logged
    /// (trace/debug/info/warn/error, default info).
    #[serde(default)]
    pub log_level: Option<String>,
}

/// A provider definition: the id (table key in the providers file),
/// the optional auth plugin override, and the type-specific settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(rename = "auth-plugin", default)]
    pub auth_plugin: Option<String>,
    #[serde(flatten)]
    pub settings: ProviderSettings,
}

/// Type-specific provider settings, tagged by `type`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderSettings {
    /// Discards writes, serves a constant body.
    Void,
    /// Logs every operation, serves a constant body.
    Log,
    /// In-process map. Contents do not survive a restart (or a reload of
    /// the provider, which rebuilds it empty).
    Memory,
    /// Local filesystem under a root directory.
    Fs {
        /// Root directory for stored objects.
        path: PathBuf,
    },
    /// AWS S3 via the official SDK.
    S3 {
        /// Bucket name.
        bucket: String,
        /// AWS region.
        #[serde(default)]
        region: Option<String>,
        /// Shared-config profile to load credentials from.
        #[serde(default)]
        profile: Option<String>,
        /// Optional endpoint URL (for MinIO, etc.).
        #[serde(default)]
        endpoint: Option<String>,
        /// Enable the pre-sign capability for this provider.
        #[serde(default)]
        presign: bool,
    },
    /// Generic cloud storage addressed by a driver URL
    /// (`s3://`, `az://`, `gs://`, `file://`, `memory://`).
    Cloud {
        /// Driver URL selecting the backing store.
        #[serde(rename = "driver-url")]
        driver_url: String,
    },
}

/// The shape of the provider definition file: id → definition.
pub type ProvidersFile = BTreeMap<String, ProviderTable>;

/// A provider table as written in the providers file (the id is the key).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderTable {
    #[serde(rename = "auth-plugin", default)]
    pub auth_plugin: Option<String>,
    #[serde(flatten)]
    pub settings: ProviderSettings,
}

impl ProviderTable {
    /// Attach the id (the table key) to produce a full provider config.
    pub fn into_config(self, id: impl Into<String>) -> ProviderConfig {
        ProviderConfig {
            id: id.into(),
            auth_plugin: self.auth_plugin,
            settings: self.settings,
        }
    }
}
