//! Derives remote object identities from a source, a file name, and the
//! current time bucket.
//!
//! With any granularity other than [`Granularity::Never`] the same file maps
//! to a new identity every time the bucket rolls over, so unchanged files are
//! uploaded again once per period. Each bucket acts as a snapshot namespace.

use crate::{errors::ConfigError, models::identity::ObjectIdentity};
use chrono::{DateTime, FixedOffset, Local};
use std::{fmt, str::FromStr, sync::Arc};

/// Source of wall-clock time for bucket and `last_seen` stamps.
///
/// Readings carry the offset of the zone they were taken in, and buckets
/// follow that zone's calendar.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Width of the period that namespaces object identities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Granularity {
    Seconds,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
    #[default]
    Never,
}

impl Granularity {
    /// `strftime` pattern for the bucket, or `None` when buckets are disabled.
    fn pattern(self) -> Option<&'static str> {
        match self {
            Granularity::Seconds => Some("%Y%m%d%H%M%S"),
            Granularity::Hours => Some("%Y%m%d%H"),
            Granularity::Days => Some("%Y%m%d"),
            // Week of year, Sunday as first day (00-53).
            Granularity::Weeks => Some("%Y%U"),
            Granularity::Months => Some("%Y%m"),
            Granularity::Years => Some("%Y"),
            Granularity::Never => None,
        }
    }

    /// Render the bucket containing `at` on its own local calendar.
    /// Empty for `Never`.
    pub fn bucket(self, at: DateTime<FixedOffset>) -> String {
        match self.pattern() {
            Some(pattern) => at.format(pattern).to_string(),
            None => String::new(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Seconds => "seconds",
            Granularity::Hours => "hours",
            Granularity::Days => "days",
            Granularity::Weeks => "weeks",
            Granularity::Months => "months",
            Granularity::Years => "years",
            Granularity::Never => "never",
        }
    }
}

impl FromStr for Granularity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seconds" => Ok(Granularity::Seconds),
            "hours" => Ok(Granularity::Hours),
            "days" => Ok(Granularity::Days),
            "weeks" => Ok(Granularity::Weeks),
            "months" => Ok(Granularity::Months),
            "years" => Ok(Granularity::Years),
            "never" => Ok(Granularity::Never),
            _ => Err(ConfigError::InvalidGranularity(s.to_string())),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds `source_id/[time_bucket/]name` identities.
#[derive(Clone)]
pub struct KeyBuilder {
    granularity: Granularity,
    clock: Arc<dyn Clock>,
}

impl KeyBuilder {
    pub fn new(granularity: Granularity, clock: Arc<dyn Clock>) -> Self {
        Self { granularity, clock }
    }

    /// Identity for `name` under `source_id` in the current time bucket.
    pub fn build_identity(&self, source_id: &str, name: &str) -> ObjectIdentity {
        let bucket = self.granularity.bucket(self.clock.now());
        ObjectIdentity::compose(source_id, &bucket, name)
    }
}

impl fmt::Debug for KeyBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBuilder")
            .field("granularity", &self.granularity)
            .finish_non_exhaustive()
    }
}
