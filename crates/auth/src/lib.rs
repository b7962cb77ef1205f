//! Authorization plugin subsystem for porter.
//!
//! A plugin is a named decider with a single question:
//! may this request proceed? Three lifecycles answer it:
//! - built-in, in-process (`allow-types`)
//! - a child process started by the server, spoken to over gRPC after a
//!   stdout handshake
//! - an already running remote gRPC endpoint
//!
//! All three share the `authorization.v1` wire contract in [`v1`].

pub mod allow_types;
pub mod error;
pub mod plugin;
pub mod set;
pub mod subprocess;
pub mod v1;

pub use error::PluginError;
pub use plugin::{AuthPlugin, from_config};
pub use set::PluginSet;
pub use v1::{AuthorizeRequest, Header, RequestType};
