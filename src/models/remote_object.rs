//! The remote store's read-only description of an object.

use crate::models::identity::ObjectIdentity;
use serde::{Deserialize, Serialize};

/// One entry of a bucket listing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RemoteObject {
    pub identity: ObjectIdentity,
    pub size: i64,
}

impl RemoteObject {
    pub fn new(identity: impl Into<ObjectIdentity>, size: i64) -> Self {
        Self {
            identity: identity.into(),
            size,
        }
    }
}

/// A single page of a bucket listing.
#[derive(Clone, Debug, Default)]
pub struct ListingPage {
    pub objects: Vec<RemoteObject>,
}
