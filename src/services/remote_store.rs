//! Remote store abstraction consumed by the reconciler and the uploader.

use crate::models::{
    identity::ObjectIdentity,
    remote_object::{ListingPage, RemoteObject},
};
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::{path::Path, pin::Pin};
use thiserror::Error;

/// Boxed lazy sequence of listing pages.
pub type PageStream<'a> = Pin<Box<dyn Stream<Item = RemoteResult<ListingPage>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The store refuses every request for this bucket.
    #[error("access to the bucket is disabled; check the account's permissions")]
    AccessDisabled,
    #[error("remote store request failed: {0}")]
    Service(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("could not read `{path}` for upload: {source}")]
    Transfer {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// A named bucket the engine can list and upload into.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List every object in the bucket, one page at a time.
    ///
    /// The stream ends after the last page. Access-disabled failures surface
    /// as [`RemoteError::AccessDisabled`] on the first item.
    fn list_pages(&self) -> PageStream<'_>;

    /// Upload the file at `path` under `identity`, replacing any existing object.
    async fn upload(&self, identity: &ObjectIdentity, path: &Path) -> RemoteResult<()>;

    /// Short backend name used in logs.
    fn backend_name(&self) -> &'static str;

    /// Drain [`RemoteStore::list_pages`] into a single listing.
    async fn list_all(&self) -> RemoteResult<Vec<RemoteObject>> {
        let pages: Vec<ListingPage> = self.list_pages().try_collect().await?;
        Ok(pages.into_iter().flat_map(|page| page.objects).collect())
    }
}
