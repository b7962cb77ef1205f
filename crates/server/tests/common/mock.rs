//! Hand-rolled provider and plugin mocks.

use async_trait::async_trait;
use bytes::Bytes;
use porter_auth::{AuthPlugin, AuthorizeRequest};
use porter_provider::{
    GetOptions, ListObjectsResponse, ObjectInfo, ObjectStream, Presigner, PresignOperation,
    Provider, ProviderError, ProviderResult, PutOptions, read_all, stream_from_bytes,
};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// One recorded `put_object` call.
#[derive(Clone, Debug)]
#[allow(dead_code)]
pub struct PutRecord {
    pub key: String,
    pub data: Bytes,
    pub content_type: String,
    pub content_length: u64,
    pub tags: BTreeMap<String, String>,
}

#[derive(Default)]
struct MockInner {
    get_body: Option<Bytes>,
    get_info: ObjectInfo,
    not_modified: bool,
    fail_get: bool,
    tags: Option<BTreeMap<String, String>>,
    list_keys: Vec<String>,
    presign_url: String,
    puts: Vec<PutRecord>,
    get_requests: Vec<(String, GetOptions)>,
    list_requests: Vec<String>,
    presign_requests: Vec<(String, PresignOperation)>,
}

/// A scriptable provider that records every call.
pub struct MockProvider {
    id: String,
    auth_plugin: Option<String>,
    presign: bool,
    inner: Mutex<MockInner>,
}

#[allow(dead_code)]
impl MockProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            auth_plugin: None,
            presign: false,
            inner: Mutex::new(MockInner {
                presign_url: "presigned://url".to_string(),
                ..Default::default()
            }),
        }
    }

    pub fn with_auth_plugin(mut self, name: impl Into<String>) -> Self {
        self.auth_plugin = Some(name.into());
        self
    }

    /// Enable the pre-sign capability.
    pub fn with_presign(mut self) -> Self {
        self.presign = true;
        self
    }

    pub fn on_get(&self, body: impl Into<Bytes>) {
        self.inner.lock().unwrap().get_body = Some(body.into());
    }

    pub fn on_get_info(&self, info: ObjectInfo) {
        self.inner.lock().unwrap().get_info = info;
    }

    pub fn on_not_modified(&self) {
        self.inner.lock().unwrap().not_modified = true;
    }

    /// Make `get_object` fail with an opaque backend error.
    pub fn on_get_failure(&self) {
        self.inner.lock().unwrap().fail_get = true;
    }

    pub fn on_tags(&self, tags: BTreeMap<String, String>) {
        self.inner.lock().unwrap().tags = Some(tags);
    }

    pub fn on_list(&self, keys: &[&str]) {
        self.inner.lock().unwrap().list_keys = keys.iter().map(|k| k.to_string()).collect();
    }

    pub fn on_presign_url(&self, url: impl Into<String>) {
        self.inner.lock().unwrap().presign_url = url.into();
    }

    pub fn puts(&self) -> Vec<PutRecord> {
        self.inner.lock().unwrap().puts.clone()
    }

    pub fn get_requests(&self) -> Vec<(String, GetOptions)> {
        self.inner.lock().unwrap().get_requests.clone()
    }

    pub fn list_requests(&self) -> Vec<String> {
        self.inner.lock().unwrap().list_requests.clone()
    }

    pub fn presign_requests(&self) -> Vec<(String, PresignOperation)> {
        self.inner.lock().unwrap().presign_requests.clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn auth_plugin(&self) -> Option<&str> {
        self.auth_plugin.as_deref()
    }

    async fn get_object(
        &self,
        key: &str,
        opts: GetOptions,
    ) -> ProviderResult<(ObjectStream, ObjectInfo)> {
        let mut inner = self.inner.lock().unwrap();
        inner.get_requests.push((key.to_string(), opts));

        if inner.fail_get {
            return Err(ProviderError::Backend("backend exploded".into()));
        }
        if inner.not_modified {
            return Err(ProviderError::NotModified);
        }
        match &inner.get_body {
            Some(body) => Ok((stream_from_bytes(body.clone()), inner.get_info.clone())),
            None => Err(ProviderError::NotFound),
        }
    }

    async fn put_object(
        &self,
        key: &str,
        data: ObjectStream,
        opts: PutOptions,
    ) -> ProviderResult<()> {
        let data = read_all(data).await?;
        self.inner.lock().unwrap().puts.push(PutRecord {
            key: key.to_string(),
            data,
            content_type: opts.content_type,
            content_length: opts.content_length,
            tags: opts.tags,
        });
        Ok(())
    }

    async fn get_tags(&self, key: &str) -> ProviderResult<Option<BTreeMap<String, String>>> {
        if key.is_empty() {
            return Err(ProviderError::NotFound);
        }
        Ok(self.inner.lock().unwrap().tags.clone())
    }

    async fn list_objects(&self, prefix: &str) -> ProviderResult<ListObjectsResponse> {
        let mut inner = self.inner.lock().unwrap();
        inner.list_requests.push(prefix.to_string());
        Ok(ListObjectsResponse {
            keys: inner.list_keys.clone(),
        })
    }

    fn presigner(&self) -> Option<&dyn Presigner> {
        if self.presign { Some(self) } else { None }
    }
}

#[async_trait]
impl Presigner for MockProvider {
    async fn presign_url(&self, key: &str, op: PresignOperation) -> ProviderResult<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.presign_requests.push((key.to_string(), op));
        Ok(inner.presign_url.clone())
    }
}

/// A plugin that always answers with the same status.
#[derive(Debug)]
pub struct FixedStatusPlugin {
    name: String,
    status: Option<tonic::Status>,
}

#[allow(dead_code)]
impl FixedStatusPlugin {
    pub fn allow(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: None,
        }
    }

    pub fn deny(name: impl Into<String>, status: tonic::Status) -> Self {
        Self {
            name: name.into(),
            status: Some(status),
        }
    }
}

#[async_trait]
impl AuthPlugin for FixedStatusPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn authorize(&self, _request: AuthorizeRequest) -> Result<(), tonic::Status> {
        match &self.status {
            None => Ok(()),
            Some(status) => Err(status.clone()),
        }
    }
}
