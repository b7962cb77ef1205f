//! A provider that logs every operation.
//!
//! Like the void provider it stores nothing, but each call is traced
//! with its parameters. Handy when debugging client integrations.

use crate::error::ProviderResult;
use crate::traits::{
    GetOptions, ListObjectsResponse, ObjectInfo, ObjectStream, Provider, PutOptions,
    stream_from_bytes,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::BTreeMap;

pub struct LogProvider {
    id: String,
    auth_plugin: Option<String>,
}

impl LogProvider {
    pub fn new(id: impl Into<String>, auth_plugin: Option<String>) -> Self {
        Self {
            id: id.into(),
            auth_plugin,
        }
    }
}

/// Human-readable size for log lines.
fn human_size(len: u64) -> String {
    if len < 1024 {
        format!("{len}b")
    } else if len < 1024 * 1024 {
        format!("{}kb", len / 1024)
    } else {
        format!("{}mb", len / 1024 / 1024)
    }
}

#[async_trait]
impl Provider for LogProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn auth_plugin(&self) -> Option<&str> {
        self.auth_plugin.as_deref()
    }

    async fn get_object(
        &self,
        key: &str,
        _opts: GetOptions,
    ) -> ProviderResult<(ObjectStream, ObjectInfo)> {
        tracing::info!(provider = %self.id, key, "get object");
        Ok((stream_from_bytes("Hello World!\n"), ObjectInfo::default()))
    }

    async fn put_object(
        &self,
        key: &str,
        mut data: ObjectStream,
        opts: PutOptions,
    ) -> ProviderResult<()> {
        let mut size: u64 = 0;
        while let Some(chunk) = data.next().await {
            size += chunk?.len() as u64;
        }

        tracing::info!(
            provider = %self.id,
            key,
            size = %human_size(size),
            content_type = %opts.content_type,
            tags = opts.tags.len(),
            "put object"
        );
        Ok(())
    }

    async fn get_tags(&self, key: &str) -> ProviderResult<Option<BTreeMap<String, String>>> {
        tracing::info!(provider = %self.id, key, "get tags");
        Ok(None)
    }

    async fn list_objects(&self, prefix: &str) -> ProviderResult<ListObjectsResponse> {
        tracing::info!(provider = %self.id, prefix, "list objects");
        Ok(ListObjectsResponse::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_size_buckets() {
        assert_eq!(human_size(5), "5b");
        assert_eq!(human_size(2048), "2kb");
        assert_eq!(human_size(3 * 1024 * 1024), "3mb");
    }

    #[tokio::test]
    async fn put_consumes_stream() {
        let p = LogProvider::new("log0", None);
        p.put_object("k", stream_from_bytes("hello"), PutOptions::default())
            .await
            .unwrap();
    }
}
