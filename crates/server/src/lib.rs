//! HTTP facade in front of heterogeneous object-storage providers.
//!
//! One URL shape - `/{verb}/{provider}/{key…}` - covers upload,
//! download, listing, tag retrieval and pre-signed URLs against any
//! registered provider, gated per request by a pluggable authorization
//! layer. This crate provides:
//! - The request router and handlers
//! - The authorization middleware translating plugin outcomes to HTTP
//! - The 500-body redaction middleware
//! - Server construction validation and the serve/drain lifecycle
//! - Provider definition loading and hot reload

pub mod authz;
pub mod error;
pub mod handlers;
pub mod redact;
pub mod reload;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use server::{Server, ServerError};
pub use state::AppState;
