//! Local filesystem provider.
//!
//! Objects are plain files under a root directory; the key maps to the
//! relative path. Tags are not supported. Modification times come from
//! the filesystem, so conditional reads work at mtime granularity.

use crate::error::{ProviderError, ProviderResult};
use crate::traits::{
    GetOptions, ListObjectsResponse, ObjectInfo, ObjectStream, Provider, PutOptions,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

/// Chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Suffix counter for in-flight temp files.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct FsProvider {
    id: String,
    auth_plugin: Option<String>,
    root: PathBuf,
}

impl FsProvider {
    pub async fn new(
        id: impl Into<String>,
        auth_plugin: Option<String>,
        root: impl AsRef<Path>,
    ) -> ProviderResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            id: id.into(),
            auth_plugin,
            root,
        })
    }

    /// Resolve a key to a path under the root, rejecting anything that
    /// could escape it.
    fn key_path(&self, key: &str) -> ProviderResult<PathBuf> {
        if key.starts_with('/') || key.starts_with('\\') {
            return Err(ProviderError::Config(format!(
                "key must be relative: {key}"
            )));
        }
        for component in Path::new(key).components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(ProviderError::Config(format!(
                        "key contains unsafe path component: {key}"
                    )));
                }
            }
        }
        Ok(self.root.join(key))
    }

    fn map_io(err: std::io::Error) -> ProviderError {
        if err.kind() == std::io::ErrorKind::NotFound {
            ProviderError::NotFound
        } else {
            ProviderError::Io(err)
        }
    }
}

#[async_trait]
impl Provider for FsProvider {
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
        let path = self.key_path(key)?;
        let meta = fs::metadata(&path).await.map_err(Self::map_io)?;
        if !meta.is_file() {
            return Err(ProviderError::NotFound);
        }

        let last_modified = meta
            .modified()
            .ok()
            .map(|t: SystemTime| OffsetDateTime::from(t));

        if let (Some(since), Some(modified)) = (opts.if_modified_since, last_modified) {
            if modified <= since {
                return Err(ProviderError::NotModified);
            }
        }

        let file = fs::File::open(&path).await.map_err(Self::map_io)?;
        let stream = ReaderStream::with_capacity(file, STREAM_CHUNK_SIZE)
            .map(|chunk| chunk.map_err(ProviderError::Io))
            .boxed();

        let info = ObjectInfo {
            last_modified,
            content_length: Some(meta.len()),
            content_type: None,
        };
        Ok((stream, info))
    }

    async fn put_object(
        &self,
        key: &str,
        mut data: ObjectStream,
        _opts: PutOptions,
    ) -> ProviderResult<()> {
        let path = self.key_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a temp file, then rename, so readers never observe a
        // partially written object.
        let tmp = path.with_extension(format!(
            "tmp.{}",
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let mut file = fs::File::create(&tmp).await?;
        while let Some(chunk) = data.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    drop(file);
                    let _ = fs::remove_file(&tmp).await;
                    return Err(err);
                }
            };
            if let Err(err) = file.write_all(&chunk).await {
                drop(file);
                let _ = fs::remove_file(&tmp).await;
                return Err(err.into());
            }
        }
        file.flush().await?;
        drop(file);

        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get_tags(&self, _key: &str) -> ProviderResult<Option<BTreeMap<String, String>>> {
        // The filesystem has no tag store.
        Ok(None)
    }

    async fn list_objects(&self, prefix: &str) -> ProviderResult<ListObjectsResponse> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    let rel = path
                        .strip_prefix(&self.root)
                        .expect("entry is under the root");
                    let key = rel.to_string_lossy().replace('\\', "/");
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }

        keys.sort();
        Ok(ListObjectsResponse { keys })
    }
}
