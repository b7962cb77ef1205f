//! Metadata and tag handlers.
//!
//! Two endpoints expose the same provider call: `/tags/` returns the
//! tag mapping verbatim (`null` when the backend has no tag support),
//! `/meta/` wraps it in an envelope with room for future metadata.

use super::{ensure_key, lookup_provider};
use crate::authz::authorize_request;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use porter_auth::RequestType;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
struct MetaResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<BTreeMap<String, String>>,
}

/// GET /meta/{provider}/{key} - object metadata envelope.
pub async fn metadata(
    State(state): State<AppState>,
    Path((provider_id, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let provider = lookup_provider(&state, &provider_id)?;
    ensure_key(&key)?;

    authorize_request(
        &state,
        RequestType::GetMetadata,
        &headers,
        &key,
        provider.as_ref(),
    )
    .await?;

    let tags = provider.get_tags(&key).await?;
    Ok(Json(MetaResponse { tags }).into_response())
}

/// GET /tags/{provider}/{key} - the tag mapping itself.
pub async fn tags(
    State(state): State<AppState>,
    Path((provider_id, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let provider = lookup_provider(&state, &provider_id)?;
    ensure_key(&key)?;

    authorize_request(
        &state,
        RequestType::GetMetadata,
        &headers,
        &key,
        provider.as_ref(),
    )
    .await?;

    let tags = provider.get_tags(&key).await?;
    Ok(Json(tags).into_response())
}
