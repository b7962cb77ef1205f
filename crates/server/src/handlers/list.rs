//! Listing handler.

use super::lookup_provider;
use crate::authz::authorize_request;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use porter_auth::RequestType;

/// GET /list/{provider}/{prefix} - keys under a prefix.
pub async fn list(
    State(state): State<AppState>,
    Path((provider_id, prefix)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    list_inner(state, provider_id, prefix, headers).await
}

/// GET /list/{provider} - the whole key space.
pub async fn list_root(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    list_inner(state, provider_id, String::new(), headers).await
}

async fn list_inner(
    state: AppState,
    provider_id: String,
    prefix: String,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let provider = lookup_provider(&state, &provider_id)?;

    // The prefix plays the role of the key in the authorization
    // request; an empty prefix is a legitimate "list everything".
    authorize_request(
        &state,
        RequestType::List,
        &headers,
        &prefix,
        provider.as_ref(),
    )
    .await?;

    let result = provider.list_objects(&prefix).await?;
    Ok(Json(result.keys).into_response())
}
