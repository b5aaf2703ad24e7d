//! Uploader — walks the data directory and pushes files the cache does not
//! already know about.
//!
//! The cache row is written only after the store acknowledges the transfer.
//! A crash in between is healed by the next reconciliation pass.

use crate::{
    errors::SyncResult,
    models::local_file::LocalFileEntry,
    services::{
        key_builder::{Clock, KeyBuilder},
        local_scan,
        metadata_cache::MetadataCache,
        remote_store::RemoteStore,
        upload_decision::UploadDecision,
    },
};
use std::{path::Path, sync::Arc};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Regular files examined.
    pub scanned: usize,
    pub uploaded: usize,
    /// Files already present remotely under the same identity and size.
    pub skipped: usize,
}

pub struct Uploader {
    store: Arc<dyn RemoteStore>,
    cache: MetadataCache,
    decision: UploadDecision,
    keys: KeyBuilder,
    clock: Arc<dyn Clock>,
}

impl Uploader {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        cache: MetadataCache,
        keys: KeyBuilder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            decision: UploadDecision::new(cache.clone()),
            cache,
            keys,
            clock,
        }
    }

    /// Upload every `root/{source_id}/{name}` file that needs it.
    ///
    /// Stops at the first remote, cache, or filesystem failure. Files uploaded
    /// before the failure keep their cache rows.
    pub async fn sync_directory(&self, root: &Path) -> SyncResult<SyncSummary> {
        let mut summary = SyncSummary::default();

        for (source_id, dir) in local_scan::source_dirs(root).await? {
            for entry in local_scan::source_files(&source_id, &dir).await? {
                summary.scanned += 1;
                if self.sync_file(&entry).await? {
                    summary.uploaded += 1;
                } else {
                    summary.skipped += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Returns whether a transfer happened.
    async fn sync_file(&self, entry: &LocalFileEntry) -> SyncResult<bool> {
        let identity = self.keys.build_identity(&entry.source_id, &entry.name);

        if !self.decision.needs_upload(&identity, entry.size).await? {
            debug!(identity = %identity, size = entry.size, "already present");
            return Ok(false);
        }

        self.store.upload(&identity, &entry.path).await?;
        self.cache
            .upsert(&identity, entry.size, self.clock.now())
            .await?;

        info!(identity = %identity, size = entry.size, "uploaded");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::SyncError,
        models::identity::ObjectIdentity,
        services::{
            key_builder::Granularity,
            reconciler::{ReconcileOutcome, Reconciler},
            remote_store::RemoteError,
        },
        test_support::{FixedClock, MemoryRemoteStore, at, temp_cache},
    };
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _db_dir: TempDir,
        data: TempDir,
        cache: MetadataCache,
        store: Arc<MemoryRemoteStore>,
        clock: Arc<FixedClock>,
    }

    impl Fixture {
        async fn new() -> Self {
            let (db_dir, cache) = temp_cache().await;
            Self {
                _db_dir: db_dir,
                data: tempfile::tempdir().unwrap(),
                cache,
                store: Arc::new(MemoryRemoteStore::default()),
                clock: Arc::new(FixedClock::new(at(2024, 3, 1, 9, 0, 0))),
            }
        }

        fn write(&self, relative: &str, contents: &[u8]) {
            let path = self.data.path().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }

        fn uploader(&self, granularity: Granularity) -> Uploader {
            Uploader::new(
                self.store.clone(),
                self.cache.clone(),
                KeyBuilder::new(granularity, self.clock.clone()),
                self.clock.clone(),
            )
        }
    }

    #[tokio::test]
    async fn skips_file_already_cached_with_same_size() {
        let fx = Fixture::new().await;
        fx.write("dev1/a.txt", b"0123456789");
        fx.cache.upsert(&"dev1/a.txt".into(), 10, at(2024, 1, 1, 0, 0, 0)).await.unwrap();

        let summary = fx.uploader(Granularity::Never).sync_directory(fx.data.path()).await.unwrap();

        assert_eq!(summary, SyncSummary { scanned: 1, uploaded: 0, skipped: 1 });
        assert!(fx.store.uploads().is_empty());
    }

    #[tokio::test]
    async fn uploads_file_whose_size_changed() {
        let fx = Fixture::new().await;
        fx.write("dev1/a.txt", b"0123456789");
        let id = ObjectIdentity::from("dev1/a.txt");
        fx.cache.upsert(&id, 7, at(2024, 1, 1, 0, 0, 0)).await.unwrap();

        let summary = fx.uploader(Granularity::Never).sync_directory(fx.data.path()).await.unwrap();

        assert_eq!(summary.uploaded, 1);
        assert_eq!(fx.store.uploads(), vec![id.clone()]);
        assert_eq!(fx.store.object(&id).as_deref(), Some(&b"0123456789"[..]));
        assert!(!UploadDecision::new(fx.cache.clone()).needs_upload(&id, 10).await.unwrap());
        let record = fx.cache.get(&id).await.unwrap().unwrap();
        assert_eq!(record.last_seen, at(2024, 3, 1, 9, 0, 0));
    }

    #[tokio::test]
    async fn ignores_stray_files_and_nested_directories() {
        let fx = Fixture::new().await;
        fx.write("top-level.txt", b"ignored");
        fx.write("dev1/nested/deep.txt", b"ignored");
        fx.write("dev1/a.txt", b"abc");
        fx.write("dev2/b.txt", b"defg");

        let summary = fx.uploader(Granularity::Never).sync_directory(fx.data.path()).await.unwrap();

        assert_eq!(summary, SyncSummary { scanned: 2, uploaded: 2, skipped: 0 });
        assert_eq!(
            fx.store.uploads(),
            vec![ObjectIdentity::from("dev1/a.txt"), ObjectIdentity::from("dev2/b.txt")]
        );
    }

    #[tokio::test]
    async fn second_run_uploads_nothing() {
        let fx = Fixture::new().await;
        fx.write("dev1/a.txt", b"abc");
        let uploader = fx.uploader(Granularity::Never);

        uploader.sync_directory(fx.data.path()).await.unwrap();
        let again = uploader.sync_directory(fx.data.path()).await.unwrap();

        assert_eq!(again.uploaded, 0);
        assert_eq!(fx.store.uploads().len(), 1);
    }

    #[tokio::test]
    async fn new_time_bucket_reuploads_unchanged_file() {
        let fx = Fixture::new().await;
        fx.write("dev1/a.txt", b"abc");
        let uploader = fx.uploader(Granularity::Days);

        uploader.sync_directory(fx.data.path()).await.unwrap();
        fx.clock.set(at(2024, 3, 2, 9, 0, 0));
        uploader.sync_directory(fx.data.path()).await.unwrap();

        assert_eq!(
            fx.store.uploads(),
            vec![
                ObjectIdentity::from("dev1/20240301/a.txt"),
                ObjectIdentity::from("dev1/20240302/a.txt"),
            ]
        );
    }

    #[tokio::test]
    async fn failed_upload_propagates_without_cache_write() {
        let fx = Fixture::new().await;
        fx.write("dev1/a.txt", b"abc");
        fx.store.fail_uploads();

        let err = fx
            .uploader(Granularity::Never)
            .sync_directory(fx.data.path())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Remote(RemoteError::Service(_))));
        assert!(fx.cache.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_data_directory_is_an_io_error() {
        let fx = Fixture::new().await;
        let absent = fx.data.path().join("absent");

        let err = fx.uploader(Granularity::Never).sync_directory(&absent).await.unwrap_err();

        assert!(matches!(err, SyncError::Io(_)));
    }

    #[tokio::test]
    async fn reconcile_repairs_upload_missing_from_cache() {
        let fx = Fixture::new().await;
        fx.write("dev1/a.txt", b"abc");
        fx.uploader(Granularity::Never).sync_directory(fx.data.path()).await.unwrap();

        // Simulate a crash between the transfer and the cache write.
        fx.cache.delete(&"dev1/a.txt".into()).await.unwrap();
        let reconciler = Reconciler::new(fx.store.clone(), fx.cache.clone(), fx.clock.clone());
        let outcome = reconciler.reconcile().await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Applied(s) if s.added == 1));

        let summary = fx.uploader(Granularity::Never).sync_directory(fx.data.path()).await.unwrap();
        assert_eq!(summary.uploaded, 0);
        assert_eq!(fx.store.uploads().len(), 1);
    }
}
