//! AWS S3 provider using the official SDK.

use crate::error::{ProviderError, ProviderResult};
use crate::traits::{
    GetOptions, ListObjectsResponse, ObjectInfo, ObjectStream, Presigner, PresignOperation,
    Provider, PutOptions, read_all,
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use futures::StreamExt;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::BTreeMap;
use std::time::Duration;
use time::OffsetDateTime;

/// Lifetime of issued pre-signed URLs.
const PRESIGN_EXPIRY: Duration = Duration::from_secs(15 * 60);

/// Settings needed to build an [`S3Provider`].
#[derive(Clone, Debug, Default)]
pub struct S3Settings {
    pub bucket: String,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub endpoint: Option<String>,
    pub presign: bool,
}

pub struct S3Provider {
    id: String,
    auth_plugin: Option<String>,
    client: Client,
    bucket: String,
    presign: bool,
}

impl S3Provider {
    pub async fn new(
        id: impl Into<String>,
        auth_plugin: Option<String>,
        settings: S3Settings,
    ) -> ProviderResult<Self> {
        if settings.bucket.is_empty() {
            return Err(ProviderError::Config("bucket is required".to_string()));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = settings.region.clone() {
            loader = loader.region(Region::new(region));
        }
        if let Some(profile) = settings.profile.as_deref() {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = settings.endpoint.clone() {
            // Custom endpoints (MinIO and friends) want path-style URLs.
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        let client = Client::from_conf(builder.build());

        Ok(Self {
            id: id.into(),
            auth_plugin,
            client,
            bucket: settings.bucket,
            presign: settings.presign,
        })
    }

    fn aws_time(dt: &aws_sdk_s3::primitives::DateTime) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(dt.secs())
            .ok()
            .map(|t| t + time::Duration::nanoseconds(i64::from(dt.subsec_nanos())))
    }

    /// Probe the object's modification time and short-circuit with
    /// `NotModified` when it is not after the threshold.
    async fn check_modified_since(&self, key: &str, since: OffsetDateTime) -> ProviderResult<()> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    ProviderError::NotFound
                } else {
                    ProviderError::backend(service_err)
                }
            })?;

        if let Some(modified) = head.last_modified().and_then(Self::aws_time) {
            if modified <= since {
                return Err(ProviderError::NotModified);
            }
        }
        Ok(())
    }
}

/// Map an SDK error by its service code.
fn map_code_error<E, R>(err: aws_sdk_s3::error::SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    match err.code() {
        Some("NoSuchKey") | Some("NotFound") | Some("NoSuchTagSet") => ProviderError::NotFound,
        Some("AccessDenied") => ProviderError::Denied,
        _ => ProviderError::backend(err),
    }
}

/// Render tags as the URL-encoded query string the Tagging header expects.
fn tagging_header(tags: &BTreeMap<String, String>) -> String {
    tags.iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k, NON_ALPHANUMERIC),
                utf8_percent_encode(v, NON_ALPHANUMERIC)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[async_trait]
impl Provider for S3Provider {
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
        if let Some(since) = opts.if_modified_since {
            self.check_modified_since(key, since).await?;
        }

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    ProviderError::NotFound
                } else if service_err.meta().code() == Some("AccessDenied") {
                    ProviderError::Denied
                } else {
                    ProviderError::backend(service_err)
                }
            })?;

        let info = ObjectInfo {
            last_modified: output.last_modified().and_then(Self::aws_time),
            content_length: output.content_length().and_then(|len| u64::try_from(len).ok()),
            content_type: output.content_type().map(str::to_string),
        };

        let stream = futures::stream::try_unfold(output.body, |mut body| async move {
            match body.try_next().await {
                Ok(Some(chunk)) => Ok(Some((chunk, body))),
                Ok(None) => Ok(None),
                Err(err) => Err(ProviderError::backend(err)),
            }
        })
        .boxed();

        Ok((stream, info))
    }

    async fn put_object(
        &self,
        key: &str,
        data: ObjectStream,
        opts: PutOptions,
    ) -> ProviderResult<()> {
        // The SDK signs the payload with a known length, so the stream
        // is drained first; the facade has already bounded it.
        let data = read_all(data).await?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(&opts.content_type)
            .content_length(opts.content_length as i64)
            .body(ByteStream::from(data));

        if !opts.tags.is_empty() {
            request = request.tagging(tagging_header(&opts.tags));
        }

        request.send().await.map_err(map_code_error)?;
        Ok(())
    }

    async fn get_tags(&self, key: &str) -> ProviderResult<Option<BTreeMap<String, String>>> {
        let output = self
            .client
            .get_object_tagging()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(map_code_error)?;

        let tags = output
            .tag_set()
            .iter()
            .map(|tag| (tag.key().to_string(), tag.value().to_string()))
            .collect();
        Ok(Some(tags))
    }

    async fn list_objects(&self, prefix: &str) -> ProviderResult<ListObjectsResponse> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(map_code_error)?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }
        }
        Ok(ListObjectsResponse { keys })
    }

    fn presigner(&self) -> Option<&dyn Presigner> {
        if self.presign { Some(self) } else { None }
    }
}

#[async_trait]
impl Presigner for S3Provider {
    async fn presign_url(&self, key: &str, op: PresignOperation) -> ProviderResult<String> {
        let config = PresigningConfig::expires_in(PRESIGN_EXPIRY)
            .map_err(|err| ProviderError::Config(err.to_string()))?;

        let uri = match op {
            PresignOperation::Download => self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(config)
                .await
                .map_err(map_code_error)?
                .uri()
                .to_string(),
            PresignOperation::Upload => self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(config)
                .await
                .map_err(map_code_error)?
                .uri()
                .to_string(),
        };
        Ok(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagging_header_encodes_pairs() {
        let tags = BTreeMap::from([
            ("plain".to_string(), "value".to_string()),
            ("needs space".to_string(), "a&b".to_string()),
        ]);
        assert_eq!(
            tagging_header(&tags),
            "needs%20space=a%26b&plain=value"
        );
    }

    #[test]
    fn aws_time_converts_epoch() {
        let dt = aws_sdk_s3::primitives::DateTime::from_secs(100);
        assert_eq!(
            S3Provider::aws_time(&dt),
            Some(OffsetDateTime::from_unix_timestamp(100).unwrap())
        );
    }

    #[tokio::test]
    async fn empty_bucket_is_a_config_error() {
        let result = S3Provider::new("s3", None, S3Settings::default()).await;
        assert!(matches!(result, Err(ProviderError::Config(_))));
    }
}
