//! HTTP request handlers.

pub mod file;
pub mod list;
pub mod meta;
pub mod presign;

pub use file::{download, upload};
pub use list::{list, list_root};
pub use meta::{metadata, tags};
pub use presign::presign;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use porter_provider::Provider;
use std::sync::Arc;

/// Content type assumed when the client supplied none: what content
/// sniffing yields for an empty buffer.
pub(crate) const FALLBACK_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Resolve a provider id or fail with 404.
pub(crate) fn lookup_provider(state: &AppState, id: &str) -> ApiResult<Arc<dyn Provider>> {
    state
        .registry
        .get(id)
        .ok_or_else(|| ApiError::NotFound("provider not found".to_string()))
}

/// Guard against keys the router could not rule out (e.g. `//`).
pub(crate) fn ensure_key(key: &str) -> ApiResult<()> {
    if key.is_empty() {
        return Err(ApiError::BadRequest("key is required".to_string()));
    }
    Ok(())
}

/// Terminal handler for routes whose key segment is missing entirely.
pub(crate) async fn missing_key() -> ApiError {
    ApiError::BadRequest("key is required".to_string())
}
