//! Pre-signed URL handler.

use super::{ensure_key, lookup_provider};
use crate::authz::authorize_request;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use porter_auth::RequestType;
use porter_provider::PresignOperation;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PresignParams {
    op: Option<String>,
}

/// POST /presign/{provider}/{key}?op=download|upload - hand the client
/// a URL that performs the operation directly against the backend.
pub async fn presign(
    State(state): State<AppState>,
    Path((provider_id, key)): Path<(String, String)>,
    Query(params): Query<PresignParams>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let provider = lookup_provider(&state, &provider_id)?;

    let Some(presigner) = provider.presigner() else {
        return Err(ApiError::NotFound(
            "presign not allowed for this provider".to_string(),
        ));
    };

    ensure_key(&key)?;

    let op = params
        .op
        .ok_or_else(|| ApiError::BadRequest("presign operation is required".to_string()))?;
    let (op, request_type) = match op.as_str() {
        "download" => (PresignOperation::Download, RequestType::Download),
        "upload" => (PresignOperation::Upload, RequestType::Upload),
        other => {
            return Err(ApiError::BadRequest(format!(
                "unsupported presign operation: {other}"
            )));
        }
    };

    authorize_request(&state, request_type, &headers, &key, provider.as_ref()).await?;

    let url = presigner.presign_url(&key, op).await?;
    Ok(url.into_response())
}
