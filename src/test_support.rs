//! Fakes shared by the unit tests: an in-memory bucket, a settable clock,
//! and a throwaway SQLite cache.

use crate::{
    models::{
        identity::ObjectIdentity,
        remote_object::{ListingPage, RemoteObject},
    },
    services::{
        key_builder::Clock,
        metadata_cache::MetadataCache,
        remote_store::{PageStream, RemoteError, RemoteResult, RemoteStore},
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use futures::stream;
use std::{
    collections::BTreeMap,
    fmt, io,
    path::Path,
    sync::{Arc, Mutex},
};
use tempfile::TempDir;
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{
    layer::{Context, Layer, SubscriberExt},
    registry,
};

/// A UTC wall-clock reading.
pub fn at(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> DateTime<FixedOffset> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
        .single()
        .expect("valid timestamp")
        .fixed_offset()
}

/// A wall-clock reading in a zone `hours` away from UTC.
pub fn at_offset(
    hours: i32,
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    min: u32,
    sec: u32,
) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(hours * 3600)
        .expect("valid offset")
        .with_ymd_and_hms(year, month, day, hour, min, sec)
        .single()
        .expect("valid timestamp")
}

pub async fn temp_cache() -> (TempDir, MetadataCache) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("cache.db").display());
    let cache = MetadataCache::open(&url).await.expect("open cache");
    (dir, cache)
}

pub struct FixedClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap()
    }
}

/// Records the level and message of every event emitted while installed.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl EventLog {
    /// Capture events on the current thread until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        tracing::subscriber::set_default(registry().with(self.clone()))
    }

    /// How many events at `level` carried exactly `message`.
    pub fn count(&self, level: Level, message: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, m)| *l == level && m == message)
            .count()
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for EventLog {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.events
            .lock()
            .unwrap()
            .push((*event.metadata().level(), visitor.0));
    }
}

#[derive(Default)]
struct BucketState {
    objects: BTreeMap<ObjectIdentity, Bytes>,
    uploads: Vec<ObjectIdentity>,
    page_size: Option<usize>,
    access_disabled: bool,
    fail_listing: bool,
    fail_uploads: bool,
}

/// Bucket held in memory, with switches for the failure modes the engine
/// distinguishes.
#[derive(Default)]
pub struct MemoryRemoteStore {
    state: Mutex<BucketState>,
}

impl MemoryRemoteStore {
    /// Seed objects of the given sizes (contents are zero bytes).
    pub fn with_objects<const N: usize>(objects: [(&str, i64); N]) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().unwrap();
            for (identity, size) in objects {
                state
                    .objects
                    .insert(identity.into(), Bytes::from(vec![0u8; size as usize]));
            }
        }
        store
    }

    pub fn set_page_size(&self, size: usize) {
        self.state.lock().unwrap().page_size = Some(size.max(1));
    }

    pub fn disable_access(&self) {
        self.state.lock().unwrap().access_disabled = true;
    }

    pub fn fail_listing(&self) {
        self.state.lock().unwrap().fail_listing = true;
    }

    pub fn fail_uploads(&self) {
        self.state.lock().unwrap().fail_uploads = true;
    }

    /// Identities uploaded so far, in order.
    pub fn uploads(&self) -> Vec<ObjectIdentity> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn object(&self, identity: &ObjectIdentity) -> Option<Bytes> {
        self.state.lock().unwrap().objects.get(identity).cloned()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    fn list_pages(&self) -> PageStream<'_> {
        let state = self.state.lock().unwrap();
        if state.access_disabled {
            return Box::pin(stream::iter([Err(RemoteError::AccessDisabled)]));
        }
        if state.fail_listing {
            let err = io::Error::other("listing failed");
            return Box::pin(stream::iter([Err(RemoteError::Service(Box::new(err)))]));
        }

        let objects: Vec<RemoteObject> = state
            .objects
            .iter()
            .map(|(identity, data)| RemoteObject::new(identity.clone(), data.len() as i64))
            .collect();
        let page_size = state.page_size.unwrap_or(usize::MAX).min(objects.len().max(1));
        let pages: Vec<RemoteResult<ListingPage>> = objects
            .chunks(page_size)
            .map(|chunk| {
                Ok(ListingPage {
                    objects: chunk.to_vec(),
                })
            })
            .collect();
        Box::pin(stream::iter(pages))
    }

    async fn upload(&self, identity: &ObjectIdentity, path: &Path) -> RemoteResult<()> {
        if self.state.lock().unwrap().fail_uploads {
            let err = io::Error::other("upload rejected");
            return Err(RemoteError::Service(Box::new(err)));
        }
        let data = tokio::fs::read(path)
            .await
            .map_err(|err| RemoteError::Transfer {
                path: path.display().to_string(),
                source: Box::new(err),
            })?;

        let mut state = self.state.lock().unwrap();
        state.objects.insert(identity.clone(), Bytes::from(data));
        state.uploads.push(identity.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
