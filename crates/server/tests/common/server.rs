//! Server test utilities.

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use porter_auth::AuthPlugin;
use porter_core::config::{PluginConfig, ServerConfig};
use porter_provider::Provider;
use porter_server::{AppState, Server};
use std::sync::Arc;
use tower::ServiceExt;

/// A test server wrapper driving the router directly, without a
/// listener.
/// Note: #[allow(dead_code)] because each test file compiles common/
/// separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: Router,
    pub state: AppState,
}

#[allow(dead_code)]
impl TestServer {
    /// A server whose default plugin is the builtin `allow-types` with
    /// the given request kinds.
    pub async fn new(allowed_types: &[&str]) -> Self {
        Self::with_config(allowed_types, |_| {}).await
    }

    /// Same, with configuration modifications applied on top.
    pub async fn with_config(
        allowed_types: &[&str],
        modifier: impl FnOnce(&mut ServerConfig),
    ) -> Self {
        let plugin_config = PluginConfig {
            name: "default".to_string(),
            builtin: Some("allow-types".to_string()),
            args: allowed_types.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        };
        let plugin = porter_auth::from_config(&plugin_config)
            .await
            .expect("failed to build allow-types plugin");

        Self::with_plugins(vec![plugin], "default", modifier)
    }

    /// Full control over the plugin list.
    pub fn with_plugins(
        plugins: Vec<Arc<dyn AuthPlugin>>,
        default_plugin: &str,
        modifier: impl FnOnce(&mut ServerConfig),
    ) -> Self {
        let mut config = ServerConfig {
            default_auth_plugin: default_plugin.to_string(),
            ..Default::default()
        };
        modifier(&mut config);

        let server = Server::new(config, plugins).expect("failed to create server");
        let router = server.router();
        let state = server.state().clone();
        Self { router, state }
    }

    /// Register a provider with the server's registry.
    pub fn register(&self, provider: Arc<dyn Provider>) {
        self.state
            .registry
            .register(provider)
            .expect("failed to register provider");
    }
}

/// Send a request through the router and collect the response.
#[allow(dead_code)]
pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Body,
) -> (StatusCode, HeaderMap, Bytes) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(body).expect("failed to build request");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router call failed");

    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    (status, headers, body)
}

/// `send` without headers or body.
#[allow(dead_code)]
pub async fn get(router: &Router, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
    send(router, "GET", uri, &[], Body::empty()).await
}
