//! Shared configuration types for porter.
//!
//! These structs are deserialized by the `porterd` binary (from TOML and
//! environment variables) and consumed by the provider and auth crates.
//! Parsing and file watching live in the binary; this crate only defines
//! the shapes.

pub mod config;

pub use config::{
    AppConfig, PluginConfig, ProviderConfig, ProviderSettings, ProviderTable, ProvidersFile,
    ServerConfig,
};
