//! In-process provider backed by a map.
//!
//! The full contract is implemented: tags, conditional reads and
//! listings. Contents live only as long as the provider instance, so a
//! reload of the provider definition starts it empty.

use crate::error::{ProviderError, ProviderResult};
use crate::traits::{
    GetOptions, ListObjectsResponse, ObjectInfo, ObjectStream, Provider, PutOptions, read_all,
    stream_from_bytes,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use time::OffsetDateTime;

#[derive(Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    last_modified: OffsetDateTime,
    tags: BTreeMap<String, String>,
}

pub struct MemoryProvider {
    id: String,
    auth_plugin: Option<String>,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryProvider {
    pub fn new(id: impl Into<String>, auth_plugin: Option<String>) -> Self {
        Self {
            id: id.into(),
            auth_plugin,
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Seed an object with an explicit modification time. Intended for
    /// tests and local development.
    pub fn insert(
        &self,
        key: impl Into<String>,
        data: impl Into<Bytes>,
        content_type: impl Into<String>,
        tags: BTreeMap<String, String>,
        last_modified: OffsetDateTime,
    ) {
        self.objects.write().expect("lock poisoned").insert(
            key.into(),
            StoredObject {
                data: data.into(),
                content_type: content_type.into(),
                last_modified,
                tags,
            },
        );
    }
}

#[async_trait]
impl Provider for MemoryProvider {
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
        let object = {
            let objects = self.objects.read().expect("lock poisoned");
            objects.get(key).cloned().ok_or(ProviderError::NotFound)?
        };

        // Strict "not after": an equal timestamp is not modified.
        if let Some(since) = opts.if_modified_since {
            if object.last_modified <= since {
                return Err(ProviderError::NotModified);
            }
        }

        let info = ObjectInfo {
            last_modified: Some(object.last_modified),
            content_length: Some(object.data.len() as u64),
            content_type: Some(object.content_type.clone()),
        };
        Ok((stream_from_bytes(object.data), info))
    }

    async fn put_object(
        &self,
        key: &str,
        data: ObjectStream,
        opts: PutOptions,
    ) -> ProviderResult<()> {
        // Drain outside the lock; the lock is never held across awaits.
        let data = read_all(data).await?;
        self.insert(
            key,
            data,
            opts.content_type,
            opts.tags,
            OffsetDateTime::now_utc(),
        );
        Ok(())
    }

    async fn get_tags(&self, key: &str) -> ProviderResult<Option<BTreeMap<String, String>>> {
        let objects = self.objects.read().expect("lock poisoned");
        let object = objects.get(key).ok_or(ProviderError::NotFound)?;
        Ok(Some(object.tags.clone()))
    }

    async fn list_objects(&self, prefix: &str) -> ProviderResult<ListObjectsResponse> {
        let objects = self.objects.read().expect("lock poisoned");
        let mut keys: Vec<String> = objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(ListObjectsResponse { keys })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn provider() -> MemoryProvider {
        MemoryProvider::new("mem0", None)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let p = provider();
        let opts = PutOptions {
            content_type: "text/plain".to_string(),
            content_length: 5,
            tags: BTreeMap::from([("a".to_string(), "1".to_string())]),
        };
        p.put_object("dir/key", stream_from_bytes("hello"), opts)
            .await
            .unwrap();

        let (stream, info) = p.get_object("dir/key", GetOptions::default()).await.unwrap();
        assert_eq!(read_all(stream).await.unwrap().as_ref(), b"hello");
        assert_eq!(info.content_length, Some(5));
        assert_eq!(info.content_type.as_deref(), Some("text/plain"));

        let tags = p.get_tags("dir/key").await.unwrap().unwrap();
        assert_eq!(tags.get("a").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let p = provider();
        assert!(matches!(
            p.get_object("nope", GetOptions::default()).await,
            Err(ProviderError::NotFound)
        ));
        assert!(matches!(
            p.get_tags("nope").await,
            Err(ProviderError::NotFound)
        ));
    }

    #[tokio::test]
    async fn equal_timestamp_is_not_modified() {
        let p = provider();
        let stamp = datetime!(2024-05-01 12:00:00 UTC);
        p.insert("k", "v", "text/plain", BTreeMap::new(), stamp);

        let opts = GetOptions {
            if_modified_since: Some(stamp),
        };
        assert!(matches!(
            p.get_object("k", opts).await,
            Err(ProviderError::NotModified)
        ));

        // A strictly older threshold serves the object.
        let opts = GetOptions {
            if_modified_since: Some(stamp - time::Duration::seconds(1)),
        };
        assert!(p.get_object("k", opts).await.is_ok());
    }

    #[tokio::test]
    async fn list_filters_by_raw_prefix() {
        let p = provider();
        let stamp = OffsetDateTime::now_utc();
        p.insert("123/a", "x", "", BTreeMap::new(), stamp);
        p.insert("123/b", "x", "", BTreeMap::new(), stamp);
        p.insert("12x", "x", "", BTreeMap::new(), stamp);

        let listed = p.list_objects("12").await.unwrap();
        assert_eq!(listed.keys, vec!["123/a", "123/b", "12x"]);

        let listed = p.list_objects("123/").await.unwrap();
        assert_eq!(listed.keys, vec!["123/a", "123/b"]);

        let listed = p.list_objects("").await.unwrap();
        assert_eq!(listed.keys.len(), 3);
    }
}
