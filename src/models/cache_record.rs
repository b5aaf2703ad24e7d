//! A row of the local metadata cache.

use crate::models::identity::ObjectIdentity;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Cached view of one remote object.
///
/// Rows are written by the reconciler from the remote listing, or by the
/// uploader right after a successful transfer. After a completed
/// reconciliation pass the set of rows matches the remote listing exactly.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct CacheRecord {
    /// Remote object key (primary key).
    pub identity: ObjectIdentity,

    /// Size in bytes as last observed remotely or uploaded.
    pub size: i64,

    /// Local time, with its offset, when this row was last inserted or changed.
    pub last_seen: DateTime<FixedOffset>,
}
