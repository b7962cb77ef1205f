//! Download and upload handlers.

use super::{FALLBACK_CONTENT_TYPE, ensure_key, lookup_provider};
use crate::authz::authorize_request;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{HeaderMap, Response, StatusCode, header};
use axum::response::IntoResponse;
use bytes::BytesMut;
use futures::StreamExt;
use porter_auth::RequestType;
use porter_provider::{GetOptions, ObjectStream, ProviderError, PutOptions, stream_from_bytes};
use std::collections::BTreeMap;
use std::time::SystemTime;
use time::OffsetDateTime;

/// Memory cap while reading the multipart `file` part.
const MULTIPART_MEMORY_LIMIT: usize = 10 * 1024 * 1024;

/// GET /file/{provider}/{key} - stream an object to the client.
pub async fn download(
    State(state): State<AppState>,
    Path((provider_id, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response<Body>> {
    let provider = lookup_provider(&state, &provider_id)?;
    ensure_key(&key)?;

    let if_modified_since = parse_if_modified_since(&headers)?;

    authorize_request(
        &state,
        RequestType::Download,
        &headers,
        &key,
        provider.as_ref(),
    )
    .await?;

    let (stream, info) = provider
        .get_object(&key, GetOptions { if_modified_since })
        .await?;

    let mut builder = Response::builder().status(StatusCode::OK);
    if let Some(modified) = info.last_modified {
        builder = builder.header(
            header::LAST_MODIFIED,
            httpdate::fmt_http_date(SystemTime::from(modified)),
        );
    }
    if let Some(length) = info.content_length {
        builder = builder.header(header::CONTENT_LENGTH, length.to_string());
    }
    if let Some(content_type) = info.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }

    builder
        .body(Body::from_stream(stream))
        .map_err(|err| ApiError::Internal(format!("failed to build response: {err}")))
}

/// PUT/POST /file/{provider}/{key} - store an object.
pub async fn upload(
    State(state): State<AppState>,
    Path((provider_id, key)): Path<(String, String)>,
    request: Request,
) -> ApiResult<Response<Body>> {
    let provider = lookup_provider(&state, &provider_id)?;
    ensure_key(&key)?;

    authorize_request(
        &state,
        RequestType::Upload,
        request.headers(),
        &key,
        provider.as_ref(),
    )
    .await?;

    let tags = parse_tags(request.uri().query().unwrap_or(""))?;
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();
    let declared_length = declared_content_length(request.headers())?;

    // Pick the data source and resolve the exact stream length; the
    // provider never sees an unknown length.
    let (data, content_length): (ObjectStream, u64) =
        if content_type.contains("multipart/form-data") {
            let bytes = read_multipart_file(request).await?;
            let length = bytes.len() as u64;
            (stream_from_bytes(bytes), length)
        } else {
            if !state.config.allow_raw_body {
                return Err(ApiError::UnsupportedMediaType(
                    "raw body uploads are not allowed, use multipart form data".to_string(),
                ));
            }

            match declared_length {
                Some(length) => (body_stream(request), length),
                None => {
                    if !state.config.allow_unknown_content_length {
                        return Err(ApiError::BadRequest(
                            "content length must be set".to_string(),
                        ));
                    }
                    let bytes =
                        buffer_body(request, state.config.max_buffered_body_bytes).await?;
                    let length = bytes.len() as u64;
                    (stream_from_bytes(bytes), length)
                }
            }
        };

    if content_length == 0 {
        return Err(ApiError::BadRequest("no content to upload".to_string()));
    }

    let content_type = if content_type.is_empty() {
        FALLBACK_CONTENT_TYPE.to_string()
    } else {
        content_type
    };

    provider
        .put_object(
            &key,
            data,
            PutOptions {
                content_type,
                content_length,
                tags,
            },
        )
        .await?;

    Ok(StatusCode::OK.into_response())
}

fn parse_if_modified_since(headers: &HeaderMap) -> ApiResult<Option<OffsetDateTime>> {
    let Some(value) = headers.get(header::IF_MODIFIED_SINCE) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("invalid If-Modified-Since header".to_string()))?;
    let time = httpdate::parse_http_date(value).map_err(|err| {
        ApiError::BadRequest(format!("invalid If-Modified-Since header: {err}"))
    })?;
    Ok(Some(OffsetDateTime::from(time)))
}

fn declared_content_length(headers: &HeaderMap) -> ApiResult<Option<u64>> {
    let Some(value) = headers.get(header::CONTENT_LENGTH) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest("invalid Content-Length header".to_string()))
}

/// Parse `tag=name:value` query parameters.
///
/// Exactly one colon, both sides non-empty, names unique. Query
/// parameters other than `tag` are ignored.
fn parse_tags(query: &str) -> ApiResult<BTreeMap<String, String>> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
        .map_err(|err| ApiError::BadRequest(format!("invalid query string: {err}")))?;

    let mut tags = BTreeMap::new();
    for (param, value) in pairs {
        if param != "tag" {
            continue;
        }

        let Some((name, tag_value)) = value.split_once(':') else {
            return Err(ApiError::BadRequest("invalid tag format".to_string()));
        };
        if name.is_empty() || tag_value.is_empty() || tag_value.contains(':') {
            return Err(ApiError::BadRequest("invalid tag format".to_string()));
        }

        if tags
            .insert(name.to_string(), tag_value.to_string())
            .is_some()
        {
            return Err(ApiError::BadRequest(format!(
                "multiple values for key {name}, this is not supported"
            )));
        }
    }
    Ok(tags)
}

/// Read the `file` part of a multipart form, bounded in memory.
async fn read_multipart_file(request: Request) -> ApiResult<Bytes> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|err| ApiError::BadRequest(format!("error parsing multipart form: {err}")))?;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("error parsing multipart form: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| ApiError::BadRequest(format!("error reading multipart form: {err}")))?
        {
            if buffer.len() + chunk.len() > MULTIPART_MEMORY_LIMIT {
                return Err(ApiError::BadRequest(
                    "multipart form data too large".to_string(),
                ));
            }
            buffer.extend_from_slice(&chunk);
        }
        return Ok(buffer.freeze());
    }

    Err(ApiError::BadRequest(
        "no file field in multipart form".to_string(),
    ))
}

/// The raw request body as an object stream.
fn body_stream(request: Request) -> ObjectStream {
    request
        .into_body()
        .into_data_stream()
        .map(|chunk| chunk.map_err(|err| ProviderError::Io(std::io::Error::other(err))))
        .boxed()
}

/// Drain the request body into memory to measure it, refusing to buffer
/// more than `limit` bytes.
async fn buffer_body(request: Request, limit: u64) -> ApiResult<Bytes> {
    let mut stream = request.into_body().into_data_stream();
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|err| ApiError::BadRequest(format!("error reading request body: {err}")))?;
        if buffer.len() as u64 + chunk.len() as u64 > limit {
            return Err(ApiError::BadRequest(
                "request body too large to buffer".to_string(),
            ));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}
