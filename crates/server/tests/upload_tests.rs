//! Integration tests for the upload path: body sourcing, content-length
//! negotiation and tag parsing.

mod common;

use axum::body::Body;
use axum::http::StatusCode;
use common::{MockProvider, TestServer, send};
use std::sync::Arc;

async fn raw_body_server(allowed_types: &[&str]) -> TestServer {
    TestServer::with_config(allowed_types, |config| {
        config.allow_raw_body = true;
    })
    .await
}

#[tokio::test]
async fn raw_upload_reaches_the_provider() {
    let server = raw_body_server(&["upload"]).await;
    let provider = Arc::new(MockProvider::new("mock"));
    server.register(provider.clone());

    let (status, _, _) = send(
        &server.router,
        "PUT",
        "/file/mock/123/456/abc?tag=abc:123&tag=pepe:frog",
        &[("content-length", "5")],
        Body::from("hello"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let puts = provider.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].key, "123/456/abc");
    assert_eq!(puts[0].data.as_ref(), b"hello");
    assert_eq!(puts[0].content_length, 5);
    assert_eq!(puts[0].tags.len(), 2);
    assert_eq!(puts[0].tags.get("abc").map(String::as_str), Some("123"));
    assert_eq!(puts[0].tags.get("pepe").map(String::as_str), Some("frog"));
}

#[tokio::test]
async fn post_uploads_too() {
    let server = raw_body_server(&["upload"]).await;
    let provider = Arc::new(MockProvider::new("mock"));
    server.register(provider.clone());

    let (status, _, _) = send(
        &server.router,
        "POST",
        "/file/mock/123",
        &[("content-length", "5")],
        Body::from("hello"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(provider.puts().len(), 1);
}

#[tokio::test]
async fn duplicate_tag_names_are_rejected() {
    let server = raw_body_server(&["upload"]).await;
    let provider = Arc::new(MockProvider::new("mock"));
    server.register(provider.clone());

    let (status, _, body) = send(
        &server.router,
        "PUT",
        "/file/mock/123/456/abc?tag=abc:123&tag=abc:123",
        &[("content-length", "5")],
        Body::from("hello"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body.as_ref(),
        b"multiple values for key abc, this is not supported\n"
    );
    assert!(provider.puts().is_empty());
}

#[tokio::test]
async fn malformed_tags_are_rejected() {
    let server = raw_body_server(&["upload"]).await;
    server.register(Arc::new(MockProvider::new("mock")));

    let (status, _, body) = send(
        &server.router,
        "PUT",
        "/file/mock/123?tag=no-colon-here",
        &[("content-length", "5")],
        Body::from("hello"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.as_ref(), b"invalid tag format\n");
}

#[tokio::test]
async fn raw_body_disabled_is_415() {
    let server = TestServer::new(&["upload"]).await;
    let provider = Arc::new(MockProvider::new("mock"));
    server.register(provider.clone());

    let (status, _, body) = send(
        &server.router,
        "PUT",
        "/file/mock/123",
        &[("content-length", "5")],
        Body::from("hello"),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(
        body.as_ref(),
        b"raw body uploads are not allowed, use multipart form data\n"
    );
    assert!(provider.puts().is_empty());
}

#[tokio::test]
async fn upload_denied_when_type_not_allowed() {
    let server = raw_body_server(&["download"]).await;
    let provider = Arc::new(MockProvider::new("mock"));
    server.register(provider.clone());

    let (status, _, body) = send(
        &server.router,
        "PUT",
        "/file/mock/123",
        &[("content-length", "5")],
        Body::from("hello"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body.as_ref(),
        b"permission denied: request type is not allowed\n"
    );
    assert!(provider.puts().is_empty());
}

#[tokio::test]
async fn zero_content_length_is_rejected() {
    let server = raw_body_server(&["upload"]).await;
    server.register(Arc::new(MockProvider::new("mock")));

    let (status, _, body) = send(
        &server.router,
        "PUT",
        "/file/mock/123",
        &[("content-length", "0")],
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.as_ref(), b"no content to upload\n");
}

#[tokio::test]
async fn unknown_content_length_is_buffered_and_measured() {
    let server = raw_body_server(&["upload"]).await;
    let provider = Arc::new(MockProvider::new("mock"));
    server.register(provider.clone());

    // No Content-Length header at all.
    let (status, _, _) = send(
        &server.router,
        "PUT",
        "/file/mock/123",
        &[],
        Body::from("hello world"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let puts = provider.puts();
    assert_eq!(puts[0].content_length, 11);
    assert_eq!(puts[0].data.as_ref(), b"hello world");
}

#[tokio::test]
async fn unknown_content_length_can_be_refused() {
    let server = TestServer::with_config(&["upload"], |config| {
        config.allow_raw_body = true;
        config.allow_unknown_content_length = false;
    })
    .await;
    server.register(Arc::new(MockProvider::new("mock")));

    let (status, _, body) = send(
        &server.router,
        "PUT",
        "/file/mock/123",
        &[],
        Body::from("hello"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.as_ref(), b"content length must be set\n");
}

#[tokio::test]
async fn buffered_bodies_are_bounded() {
    let server = TestServer::with_config(&["upload"], |config| {
        config.allow_raw_body = true;
        config.max_buffered_body_bytes = 4;
    })
    .await;
    server.register(Arc::new(MockProvider::new("mock")));

    let (status, _, body) = send(
        &server.router,
        "PUT",
        "/file/mock/123",
        &[],
        Body::from("way more than four bytes"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.as_ref(), b"request body too large to buffer\n");
}

fn multipart_body(boundary: &str, field_name: &str, contents: &str) -> String {
    format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"{field_name}\"; filename=\"upload.bin\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         {contents}\r\n\
         --{boundary}--\r\n"
    )
}

#[tokio::test]
async fn multipart_upload_uses_the_file_part() {
    // Raw bodies stay forbidden; multipart is always accepted.
    let server = TestServer::new(&["upload"]).await;
    let provider = Arc::new(MockProvider::new("mock"));
    server.register(provider.clone());

    let boundary = "X-PORTER-TEST-BOUNDARY";
    let body = multipart_body(boundary, "file", "hello");
    let content_type = format!("multipart/form-data; boundary={boundary}");

    let (status, _, _) = send(
        &server.router,
        "PUT",
        "/file/mock/123",
        &[
            ("content-type", content_type.as_str()),
            ("content-length", &body.len().to_string()),
        ],
        Body::from(body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let puts = provider.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].data.as_ref(), b"hello");
    // The length passed to the provider is the part's length, not the
    // framed request length.
    assert_eq!(puts[0].content_length, 5);
    assert!(puts[0].content_type.starts_with("multipart/form-data"));
}

#[tokio::test]
async fn multipart_without_file_part_is_400() {
    let server = TestServer::new(&["upload"]).await;
    server.register(Arc::new(MockProvider::new("mock")));

    let boundary = "X-PORTER-TEST-BOUNDARY";
    let body = multipart_body(boundary, "attachment", "hello");
    let content_type = format!("multipart/form-data; boundary={boundary}");

    let (status, _, body) = send(
        &server.router,
        "PUT",
        "/file/mock/123",
        &[("content-type", content_type.as_str())],
        Body::from(body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.as_ref(), b"no file field in multipart form\n");
}

#[tokio::test]
async fn default_content_type_is_applied() {
    let server = raw_body_server(&["upload"]).await;
    let provider = Arc::new(MockProvider::new("mock"));
    server.register(provider.clone());

    let (status, _, _) = send(
        &server.router,
        "PUT",
        "/file/mock/123",
        &[("content-length", "5")],
        Body::from("hello"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(provider.puts()[0].content_type, "text/plain; charset=utf-8");
}
