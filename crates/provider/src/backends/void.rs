//! A provider that does nothing.
//!
//! Reads serve a constant body, writes are drained and discarded. Useful
//! as a wiring smoke test and as the cheapest possible target for
//! benchmarking the facade itself.

use crate::error::ProviderResult;
use crate::traits::{
    GetOptions, ListObjectsResponse, ObjectInfo, ObjectStream, Provider, PutOptions, read_all,
    stream_from_bytes,
};
use async_trait::async_trait;
use std::collections::BTreeMap;

pub struct VoidProvider {
    id: String,
    auth_plugin: Option<String>,
}

impl VoidProvider {
    pub fn new(id: impl Into<String>, auth_plugin: Option<String>) -> Self {
        Self {
            id: id.into(),
            auth_plugin,
        }
    }
}

#[async_trait]
impl Provider for VoidProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn auth_plugin(&self) -> Option<&str> {
        self.auth_plugin.as_deref()
    }

    async fn get_object(
        &self,
        _key: &str,
        _opts: GetOptions,
    ) -> ProviderResult<(ObjectStream, ObjectInfo)> {
        Ok((stream_from_bytes("null\n"), ObjectInfo::default()))
    }

    async fn put_object(
        &self,
        _key: &str,
        data: ObjectStream,
        _opts: PutOptions,
    ) -> ProviderResult<()> {
        // Consume the stream fully so the client sees a complete upload.
        read_all(data).await?;
        Ok(())
    }

    async fn get_tags(&self, _key: &str) -> ProviderResult<Option<BTreeMap<String, String>>> {
        Ok(None)
    }

    async fn list_objects(&self, _prefix: &str) -> ProviderResult<ListObjectsResponse> {
        Ok(ListObjectsResponse::default())
    }
}
