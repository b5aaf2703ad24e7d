//! Brings the metadata cache into exact agreement with the remote listing.
//!
//! The cache is only trusted after a pass completes: an upload interrupted
//! between the transfer and the cache write is repaired here, because the
//! object shows up in the next listing.

use crate::{
    errors::SyncResult,
    models::{identity::ObjectIdentity, remote_object::RemoteObject},
    services::{
        key_builder::Clock,
        metadata_cache::{CacheChanges, MetadataCache},
        remote_store::{RemoteError, RemoteStore},
    },
};
use std::{collections::HashMap, sync::Arc};
use tracing::{info, warn};

/// Counts of rows touched by one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl ReconcileSummary {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.deleted == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The cache now mirrors the listing.
    Applied(ReconcileSummary),
    /// The store reported access disabled; the cache was left as it was.
    ListingUnavailable,
}

/// Diff `remote` against `cached`.
///
/// Identities present on both sides with equal sizes produce no change, so
/// their `last_seen` is not refreshed. Output is sorted by identity.
pub fn plan_changes(
    remote: &HashMap<ObjectIdentity, i64>,
    cached: &HashMap<ObjectIdentity, i64>,
) -> CacheChanges {
    let mut changes = CacheChanges::default();

    for (identity, &size) in remote {
        match cached.get(identity) {
            None => changes.inserts.push((identity.clone(), size)),
            Some(&cached_size) if cached_size != size => {
                changes.updates.push((identity.clone(), size))
            }
            Some(_) => {}
        }
    }

    changes.deletes = cached
        .keys()
        .filter(|identity| !remote.contains_key(*identity))
        .cloned()
        .collect();

    changes.inserts.sort();
    changes.updates.sort();
    changes.deletes.sort();
    changes
}

pub struct Reconciler {
    store: Arc<dyn RemoteStore>,
    cache: MetadataCache,
    clock: Arc<dyn Clock>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RemoteStore>, cache: MetadataCache, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            cache,
            clock,
        }
    }

    /// Fetch the full remote listing and mirror it into the cache in one
    /// transaction.
    ///
    /// Only [`RemoteError::AccessDisabled`] is absorbed; every other remote
    /// failure is returned to the caller with the cache unchanged.
    pub async fn reconcile(&self) -> SyncResult<ReconcileOutcome> {
        let listing = match self.store.list_all().await {
            Ok(listing) => listing,
            Err(RemoteError::AccessDisabled) => {
                warn!(
                    backend = self.store.backend_name(),
                    "Access to the bucket is disabled. Please check permissions."
                );
                return Ok(ReconcileOutcome::ListingUnavailable);
            }
            Err(err) => return Err(err.into()),
        };

        let remote = index_listing(listing);
        let cached = self.cache.list_all().await?;
        let changes = plan_changes(&remote, &cached);

        self.cache.apply(&changes, self.clock.now()).await?;

        for (identity, size) in &changes.inserts {
            info!(identity = %identity, size, "added");
        }
        for (identity, size) in &changes.updates {
            info!(identity = %identity, size, "updated");
        }
        for identity in &changes.deletes {
            info!(identity = %identity, "deleted");
        }

        Ok(ReconcileOutcome::Applied(ReconcileSummary {
            added: changes.inserts.len(),
            updated: changes.updates.len(),
            deleted: changes.deletes.len(),
        }))
    }
}

/// Key a listing by identity. A repeated key keeps its last size.
fn index_listing(listing: Vec<RemoteObject>) -> HashMap<ObjectIdentity, i64> {
    listing
        .into_iter()
        .map(|object| (object.identity, object.size))
        .collect()
}
