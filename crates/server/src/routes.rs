//! Route configuration.

use crate::handlers;
use crate::redact::redact_internal_errors;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
///
/// Every object route has the shape `/{verb}/{provider}/{key…}` with a
/// wildcard key, so multi-segment keys reach handlers verbatim. The
/// key-less variants are routed explicitly to a 400 (the wildcard
/// requires at least one character); only listings accept an empty
/// tail, meaning "no prefix". A method outside a route's set is a 405
/// from the router itself, before any provider or plugin is consulted.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/file/{provider}/{*key}",
            get(handlers::download)
                .put(handlers::upload)
                .post(handlers::upload),
        )
        .route(
            "/file/{provider}",
            get(handlers::missing_key)
                .put(handlers::missing_key)
                .post(handlers::missing_key),
        )
        .route(
            "/file/{provider}/",
            get(handlers::missing_key)
                .put(handlers::missing_key)
                .post(handlers::missing_key),
        )
        .route("/presign/{provider}/{*key}", post(handlers::presign))
        .route("/presign/{provider}", post(handlers::missing_key))
        .route("/presign/{provider}/", post(handlers::missing_key))
        .route("/meta/{provider}/{*key}", get(handlers::metadata))
        .route("/meta/{provider}", get(handlers::missing_key))
        .route("/meta/{provider}/", get(handlers::missing_key))
        .route("/tags/{provider}/{*key}", get(handlers::tags))
        .route("/tags/{provider}", get(handlers::missing_key))
        .route("/tags/{provider}/", get(handlers::missing_key))
        .route("/list/{provider}/{*prefix}", get(handlers::list))
        .route("/list/{provider}", get(handlers::list_root))
        .route("/list/{provider}/", get(handlers::list_root))
        // Uploads are bounded by the handler's own policy (multipart
        // memory cap, buffered-body ceiling), not by the default limit.
        .layer(DefaultBodyLimit::disable())
        .layer(middleware::from_fn(redact_internal_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
