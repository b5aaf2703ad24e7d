//! Decides whether a local file must be transferred.
//!
//! The fingerprint is `(identity, size)` only. A file whose contents change
//! without changing length is not detected.

use crate::{
    models::identity::ObjectIdentity,
    services::metadata_cache::{CacheResult, MetadataCache},
};

#[derive(Clone, Debug)]
pub struct UploadDecision {
    cache: MetadataCache,
}

impl UploadDecision {
    pub fn new(cache: MetadataCache) -> Self {
        Self { cache }
    }

    /// True unless the cache holds `identity` with exactly `size` bytes.
    pub async fn needs_upload(&self, identity: &ObjectIdentity, size: i64) -> CacheResult<bool> {
        Ok(!self.cache.contains(identity, size).await?)
    }
}
