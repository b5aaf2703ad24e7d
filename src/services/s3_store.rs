//! S3-compatible remote store backed by the AWS SDK.

use crate::{
    models::{
        identity::ObjectIdentity,
        remote_object::{ListingPage, RemoteObject},
    },
    services::remote_store::{PageStream, RemoteError, RemoteResult, RemoteStore},
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    error::{ProvideErrorMetadata, SdkError},
    primitives::ByteStream,
    types::Object,
};
use futures::stream;
use std::path::Path;
use tracing::{debug, instrument};

/// Service error code S3 returns when every request against a bucket is refused.
const ACCESS_DISABLED_CODE: &str = "AllAccessDisabled";

/// Largest page ListObjectsV2 will return.
pub const MAX_PAGE_SIZE: i32 = 1000;

/// Where the next ListObjectsV2 request should start.
enum Cursor {
    Start,
    After(String),
    Done,
}

/// Connection settings for [`S3RemoteStore::connect`].
#[derive(Clone, Debug, Default)]
pub struct S3Settings {
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services (e.g. MinIO).
    pub endpoint: Option<String>,
    /// Use `endpoint/bucket/key` addressing instead of virtual-hosted style.
    pub force_path_style: bool,
    pub page_size: i32,
}

pub struct S3RemoteStore {
    client: Client,
    bucket: String,
    page_size: i32,
}

impl std::fmt::Debug for S3RemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3RemoteStore")
            .field("bucket", &self.bucket)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl S3RemoteStore {
    /// Build a client from the ambient AWS configuration plus `settings`.
    pub async fn connect(settings: S3Settings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = settings.region.clone() {
            loader = loader.region(aws_config::Region::new(region));
        }
        if let Some(endpoint) = settings.endpoint.as_deref() {
            let lower = endpoint.to_ascii_lowercase();
            let endpoint = if lower.starts_with("http://") || lower.starts_with("https://") {
                endpoint.to_string()
            } else {
                format!("http://{endpoint}")
            };
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let conf = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(settings.force_path_style)
            .build();

        Self::new(Client::from_conf(conf), settings.bucket, settings.page_size)
    }

    pub fn new(client: Client, bucket: impl Into<String>, page_size: i32) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    async fn fetch_page(&self, token: Option<String>) -> RemoteResult<(ListingPage, Cursor)> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(self.page_size)
            .set_continuation_token(token)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let objects = output
            .contents()
            .iter()
            .filter_map(listed_object)
            .collect::<Vec<_>>();

        let next = match (output.is_truncated(), output.next_continuation_token()) {
            (Some(true), Some(token)) => Cursor::After(token.to_string()),
            _ => Cursor::Done,
        };

        debug!(bucket = %self.bucket, objects = objects.len(), "fetched listing page");
        Ok((ListingPage { objects }, next))
    }
}

/// Convert one listing entry, skipping entries that lack a key or a size.
fn listed_object(object: &Object) -> Option<RemoteObject> {
    let key = object.key()?;
    let Some(size) = object.size() else {
        debug!(key, "skipping listing entry without a size");
        return None;
    };
    Some(RemoteObject::new(key, size))
}

/// Map an SDK failure, singling out the access-disabled service code.
fn map_sdk_error<E>(err: SdkError<E>) -> RemoteError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let access_disabled = err
        .as_service_error()
        .and_then(|service_err| service_err.code())
        == Some(ACCESS_DISABLED_CODE);

    if access_disabled {
        RemoteError::AccessDisabled
    } else {
        RemoteError::Service(Box::new(err))
    }
}

#[async_trait]
impl RemoteStore for S3RemoteStore {
    fn list_pages(&self) -> PageStream<'_> {
        Box::pin(stream::unfold(Cursor::Start, move |cursor| async move {
            let token = match cursor {
                Cursor::Done => return None,
                Cursor::Start => None,
                Cursor::After(token) => Some(token),
            };
            match self.fetch_page(token).await {
                Ok((page, next)) => Some((Ok(page), next)),
                Err(err) => Some((Err(err), Cursor::Done)),
            }
        }))
    }

    #[instrument(skip(self, path), fields(backend = "s3", bucket = %self.bucket))]
    async fn upload(&self, identity: &ObjectIdentity, path: &Path) -> RemoteResult<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|err| RemoteError::Transfer {
                path: path.display().to_string(),
                source: Box::new(err),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(identity.as_str())
            .body(body)
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
