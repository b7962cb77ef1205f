//! Generic cloud provider addressed by a driver URL.
//!
//! Backed by the `object_store` crate, which maps the URL scheme to a
//! store implementation (`s3://`, `az://`, `gs://`, `file://`,
//! `memory://`). Credentials come from the ambient environment of the
//! selected store. Tags are not part of the generic surface, so
//! `get_tags` reports no tag support.

use crate::error::{ProviderError, ProviderResult};
use crate::traits::{
    GetOptions, ListObjectsResponse, ObjectInfo, ObjectStream, Provider, PutOptions, read_all,
};
use async_trait::async_trait;
use futures::StreamExt;
use object_store::path::Path as StorePath;
use object_store::{Attribute, Attributes, ObjectStore, PutPayload};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use url::Url;

pub struct CloudProvider {
    id: String,
    auth_plugin: Option<String>,
    store: Box<dyn ObjectStore>,
    base: StorePath,
}

impl CloudProvider {
    pub fn new(
        id: impl Into<String>,
        auth_plugin: Option<String>,
        driver_url: &str,
    ) -> ProviderResult<Self> {
        let url = Url::parse(driver_url)
            .map_err(|err| ProviderError::Config(format!("invalid driver URL: {err}")))?;
        let (store, base) = object_store::parse_url(&url)
            .map_err(|err| ProviderError::Config(format!("could not open store: {err}")))?;

        Ok(Self {
            id: id.into(),
            auth_plugin,
            store,
            base,
        })
    }

    fn location(&self, key: &str) -> StorePath {
        if self.base.as_ref().is_empty() {
            StorePath::from(key)
        } else {
            StorePath::from(format!("{}/{}", self.base, key))
        }
    }

    /// Strip the base path from a listed location, yielding the key.
    fn key_of(&self, location: &StorePath) -> String {
        let full = location.to_string();
        if self.base.as_ref().is_empty() {
            return full;
        }
        let base = format!("{}/", self.base);
        full.strip_prefix(&base).map(str::to_string).unwrap_or(full)
    }

    fn to_chrono(ts: OffsetDateTime) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(ts.unix_timestamp(), ts.nanosecond())
    }

    fn from_chrono(ts: chrono::DateTime<chrono::Utc>) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(ts.timestamp())
            .ok()
            .map(|t| t + time::Duration::nanoseconds(i64::from(ts.timestamp_subsec_nanos())))
    }
}

fn map_store_error(err: object_store::Error) -> ProviderError {
    match err {
        object_store::Error::NotFound { .. } => ProviderError::NotFound,
        object_store::Error::NotModified { .. } => ProviderError::NotModified,
        object_store::Error::PermissionDenied { .. } | object_store::Error::Unauthenticated { .. } => {
            ProviderError::Denied
        }
        other => ProviderError::backend(other),
    }
}

#[async_trait]
impl Provider for CloudProvider {
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
        let options = object_store::GetOptions {
            if_modified_since: opts.if_modified_since.and_then(Self::to_chrono),
            ..Default::default()
        };

        let result = self
            .store
            .get_opts(&self.location(key), options)
            .await
            .map_err(map_store_error)?;

        let info = ObjectInfo {
            last_modified: Self::from_chrono(result.meta.last_modified),
            content_length: Some(result.meta.size as u64),
            content_type: None,
        };

        let stream = result
            .into_stream()
            .map(|chunk| chunk.map_err(map_store_error))
            .boxed();
        Ok((stream, info))
    }

    async fn put_object(
        &self,
        key: &str,
        data: ObjectStream,
        opts: PutOptions,
    ) -> ProviderResult<()> {
        let data = read_all(data).await?;

        let mut attributes = Attributes::new();
        if !opts.content_type.is_empty() {
            attributes.insert(Attribute::ContentType, opts.content_type.into());
        }
        let put_opts = object_store::PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&self.location(key), PutPayload::from(data), put_opts)
            .await
            .map_err(map_store_error)?;
        Ok(())
    }

    async fn get_tags(&self, _key: &str) -> ProviderResult<Option<BTreeMap<String, String>>> {
        Ok(None)
    }

    async fn list_objects(&self, prefix: &str) -> ProviderResult<ListObjectsResponse> {
        // The store lists on path-segment boundaries; the facade prefix
        // is a raw string. List the directory part and filter the rest.
        let dir = prefix.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let list_prefix = if dir.is_empty() {
            if self.base.as_ref().is_empty() {
                None
            } else {
                Some(self.base.clone())
            }
        } else {
            Some(self.location(dir))
        };

        let mut stream = self.store.list(list_prefix.as_ref());
        let mut keys = Vec::new();
        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(map_store_error)?;
            let key = self.key_of(&meta.location);
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(ListObjectsResponse { keys })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{read_all, stream_from_bytes};

    fn memory_provider() -> CloudProvider {
        CloudProvider::new("cloud0", None, "memory:///").unwrap()
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let p = memory_provider();
        let opts = PutOptions {
            content_type: "application/octet-stream".to_string(),
            content_length: 5,
            tags: BTreeMap::new(),
        };
        p.put_object("a/b", stream_from_bytes("hello"), opts)
            .await
            .unwrap();

        let (stream, info) = p.get_object("a/b", GetOptions::default()).await.unwrap();
        assert_eq!(read_all(stream).await.unwrap().as_ref(), b"hello");
        assert_eq!(info.content_length, Some(5));
        assert!(info.last_modified.is_some());
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let p = memory_provider();
        assert!(matches!(
            p.get_object("nope", GetOptions::default()).await,
            Err(ProviderError::NotFound)
        ));
    }

    #[tokio::test]
    async fn unmodified_object_short_circuits() {
        let p = memory_provider();
        p.put_object("k", stream_from_bytes("v"), PutOptions::default())
            .await
            .unwrap();

        let opts = GetOptions {
            if_modified_since: Some(OffsetDateTime::now_utc() + time::Duration::hours(1)),
        };
        assert!(matches!(
            p.get_object("k", opts).await,
            Err(ProviderError::NotModified)
        ));
    }

    #[tokio::test]
    async fn list_filters_by_raw_prefix() {
        let p = memory_provider();
        for key in ["123/a", "123/b", "12x"] {
            p.put_object(key, stream_from_bytes("v"), PutOptions::default())
                .await
                .unwrap();
        }

        let listed = p.list_objects("12").await.unwrap();
        assert_eq!(listed.keys, vec!["123/a", "123/b", "12x"]);

        let listed = p.list_objects("123/").await.unwrap();
        assert_eq!(listed.keys, vec!["123/a", "123/b"]);
    }

    #[test]
    fn invalid_url_is_a_config_error() {
        assert!(matches!(
            CloudProvider::new("c", None, "not a url"),
            Err(ProviderError::Config(_))
        ));
    }
}
