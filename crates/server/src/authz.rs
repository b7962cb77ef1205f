//! Per-request authorization.
//!
//! Every handler calls [`authorize_request`] after path parsing and
//! before touching the provider. The plugin decides; this module only
//! selects the plugin, replicates the request headers and translates
//! the outcome to an HTTP status.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::http::HeaderMap;
use porter_auth::{AuthorizeRequest, Header, RequestType};
use porter_provider::Provider;
use tonic::Code;

/// Render the incoming header map as the wire shape plugins expect.
/// Header values are not guaranteed to be UTF-8; replicate them lossily.
fn replicate_headers(headers: &HeaderMap) -> Vec<Header> {
    headers
        .keys()
        .map(|name| Header {
            key: name.as_str().to_string(),
            values: headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .collect(),
        })
        .collect()
}

/// Ask the plugin governing `provider` whether this request may proceed.
pub async fn authorize_request(
    state: &AppState,
    request_type: RequestType,
    headers: &HeaderMap,
    key: &str,
    provider: &dyn Provider,
) -> ApiResult<()> {
    let plugin_name = provider
        .auth_plugin()
        .unwrap_or_else(|| state.plugins.default_name());

    let plugin = state.plugins.find(plugin_name).ok_or_else(|| {
        ApiError::Internal(format!(
            "no auth plugin found for provider {}",
            provider.id()
        ))
    })?;

    let request = AuthorizeRequest {
        key: key.to_string(),
        provider: provider.id().to_string(),
        request_type: request_type as i32,
        headers: replicate_headers(headers),
    };

    match plugin.authorize(request).await {
        Ok(()) => Ok(()),
        Err(status) => Err(match status.code() {
            Code::Unauthenticated => {
                ApiError::Unauthenticated(format!("Unauthenticated: {}", status.message()))
            }
            Code::PermissionDenied => {
                ApiError::Forbidden(format!("permission denied: {}", status.message()))
            }
            _ => ApiError::Internal(format!("plugin error: {}", status.message())),
        }),
    }
}
