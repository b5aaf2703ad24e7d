//! Error taxonomy shared across the sync engine.
//!
//! Each layer owns a narrow error enum (`ConfigError` here, `CacheError` and
//! `RemoteError` next to the services that raise them). `SyncError` is the
//! union returned by the reconciler and the uploader.

use crate::services::{metadata_cache::CacheError, remote_store::RemoteError};
use std::io;
use thiserror::Error;

/// Invalid configuration. Always fatal and surfaced at startup, before any
/// remote or cache work begins.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unrecognized time bucket granularity `{0}`")]
    InvalidGranularity(String),
    #[error("invalid value `{value}` for {name}")]
    InvalidValue { name: &'static str, value: String },
    #[error("no bucket configured; set OBJECT_SYNC_BUCKET or pass --bucket")]
    MissingBucket,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("local I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;
