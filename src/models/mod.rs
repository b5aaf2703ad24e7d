//! Core data models for the bucket mirror.
//!
//! These types describe the three views of an object that the sync engine
//! joins on `ObjectIdentity`: the remote listing, the local SQLite cache, and
//! the files discovered on disk.

pub mod cache_record;
pub mod identity;
pub mod local_file;
pub mod remote_object;
