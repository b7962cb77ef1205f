//! Provider trait definitions.

use crate::error::ProviderResult;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::collections::BTreeMap;
use std::pin::Pin;
use time::OffsetDateTime;

/// A boxed stream of bytes, used for both downloads and uploads.
pub type ObjectStream = Pin<Box<dyn Stream<Item = ProviderResult<Bytes>> + Send>>;

/// Build an [`ObjectStream`] over a single in-memory buffer.
pub fn stream_from_bytes(data: impl Into<Bytes>) -> ObjectStream {
    futures::stream::once(futures::future::ready(Ok(data.into()))).boxed()
}

/// Drain an [`ObjectStream`] into memory.
pub async fn read_all(mut stream: ObjectStream) -> ProviderResult<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer.freeze())
}

/// Parameters for a read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// If set, the provider must short-circuit with
    /// [`ProviderError::NotModified`](crate::ProviderError::NotModified)
    /// when the object's modification time is not after this timestamp
    /// (equal timestamps count as not modified).
    pub if_modified_since: Option<OffsetDateTime>,
}

/// Parameters for a write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Content type of the object.
    pub content_type: String,
    /// Exact length of the data stream in bytes.
    pub content_length: u64,
    /// Tags to attach to the object. Keys are unique by construction.
    pub tags: BTreeMap<String, String>,
}

/// Metadata returned with a read. The server only acts on fields that
/// are present.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectInfo {
    /// When the object was last modified.
    pub last_modified: Option<OffsetDateTime>,
    /// Length of the object in bytes.
    pub content_length: Option<u64>,
    /// Content type of the object.
    pub content_type: Option<String>,
}

/// A listing result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListObjectsResponse {
    /// Keys of the objects found.
    pub keys: Vec<String>,
}

/// The operation a pre-signed URL delegates to its bearer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresignOperation {
    Download,
    Upload,
}

/// A backend adapter mediating a uniform key→bytes+metadata interface
/// over a storage system.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// The provider id, unique among all registered providers.
    fn id(&self) -> &str;

    /// Name of the auth plugin governing this provider. When `None`,
    /// the server's default plugin is used.
    fn auth_plugin(&self) -> Option<&str> {
        None
    }

    /// Open the object at `key` for reading. The returned stream is
    /// consumed (and thereby released) by the caller.
    async fn get_object(
        &self,
        key: &str,
        opts: GetOptions,
    ) -> ProviderResult<(ObjectStream, ObjectInfo)>;

    /// Store the object at `key`, consuming `data` fully.
    /// `opts.content_length` is the exact length of `data`.
    async fn put_object(
        &self,
        key: &str,
        data: ObjectStream,
        opts: PutOptions,
    ) -> ProviderResult<()>;

    /// Fetch the tags of the object at `key`. `None` means the backend
    /// has no tag support (distinct from an empty tag set).
    async fn get_tags(&self, key: &str) -> ProviderResult<Option<BTreeMap<String, String>>>;

    /// List keys under `prefix` (possibly empty).
    async fn list_objects(&self, prefix: &str) -> ProviderResult<ListObjectsResponse>;

    /// The pre-sign capability, if this provider has one.
    fn presigner(&self) -> Option<&dyn Presigner> {
        None
    }
}

/// Capability to issue URLs that delegate a single operation to the
/// client, bypassing the facade.
#[async_trait]
pub trait Presigner: Send + Sync {
    async fn presign_url(&self, key: &str, op: PresignOperation) -> ProviderResult<String>;
}
