//! Provider abstraction and backends for porter.
//!
//! This crate provides:
//! - The [`Provider`] contract every backend implements, with its
//!   sentinel error taxonomy
//! - The concurrent [`ProviderRegistry`] consulted on every request and
//!   rewritten on configuration reloads
//! - Backends: void, log, in-memory, filesystem, S3 and generic cloud
//!   storage

pub mod backends;
pub mod error;
pub mod registry;
pub mod traits;

pub use backends::{
    cloud::CloudProvider,
    fs::FsProvider,
    log::LogProvider,
    memory::MemoryProvider,
    s3::{S3Provider, S3Settings},
    void::VoidProvider,
};
pub use error::{ProviderError, ProviderResult, RegistryError};
pub use registry::ProviderRegistry;
pub use traits::{
    GetOptions, ListObjectsResponse, ObjectInfo, ObjectStream, Presigner, PresignOperation,
    Provider, PutOptions, read_all, stream_from_bytes,
};

use porter_core::config::{ProviderConfig, ProviderSettings};
use std::sync::Arc;

/// Build a provider from its configuration.
pub async fn from_config(config: &ProviderConfig) -> ProviderResult<Arc<dyn Provider>> {
    let id = config.id.clone();
    let auth_plugin = config.auth_plugin.clone();

    match &config.settings {
        ProviderSettings::Void => Ok(Arc::new(VoidProvider::new(id, auth_plugin))),
        ProviderSettings::Log => Ok(Arc::new(LogProvider::new(id, auth_plugin))),
        ProviderSettings::Memory => Ok(Arc::new(MemoryProvider::new(id, auth_plugin))),
        ProviderSettings::Fs { path } => {
            Ok(Arc::new(FsProvider::new(id, auth_plugin, path).await?))
        }
        ProviderSettings::S3 {
            bucket,
            region,
            profile,
            endpoint,
            presign,
        } => {
            let settings = S3Settings {
                bucket: bucket.clone(),
                region: region.clone(),
                profile: profile.clone(),
                endpoint: endpoint.clone(),
                presign: *presign,
            };
            Ok(Arc::new(S3Provider::new(id, auth_plugin, settings).await?))
        }
        ProviderSettings::Cloud { driver_url } => {
            Ok(Arc::new(CloudProvider::new(id, auth_plugin, driver_url)?))
        }
    }
}
