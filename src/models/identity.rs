//! The key every remote object, cache row, and local candidate is joined on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator placed between the components of an identity.
pub const IDENTITY_SEPARATOR: char = '/';

/// Remote object key in the form `source_id/[time_bucket/]name`.
///
/// Two distinct `(source_id, bucket, name)` triples never produce the same
/// identity as long as no component contains [`IDENTITY_SEPARATOR`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct ObjectIdentity(String);

impl ObjectIdentity {
    /// Compose an identity from its parts. An empty `time_bucket` is omitted.
    pub fn compose(source_id: &str, time_bucket: &str, name: &str) -> Self {
        if time_bucket.is_empty() {
            Self(format!("{source_id}{IDENTITY_SEPARATOR}{name}"))
        } else {
            Self(format!(
                "{source_id}{IDENTITY_SEPARATOR}{time_bucket}{IDENTITY_SEPARATOR}{name}"
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ObjectIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ObjectIdentity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
