//! Hierarchical, path-addressed document store with live subscriptions.
//!
//! Entities live at `{collection}/{uid}[/{entityId}[/{field}]]`. The
//! [`RemoteStore`] trait is the whole contract the boards rely on; the
//! realtime database and the in-process store both implement it.

pub mod firebase;
pub mod local;
pub mod sse;
pub mod tree;

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("write conflict at {0}")]
    Conflict(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("could not decode data: {0}")]
    Decode(String),
    #[error("subscription closed")]
    Closed,
    #[error("storage error: {0}")]
    Io(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One delivery from a live subscription.
pub type StoreEvent = Result<Snapshot, StoreError>;

/// Read-modify-write step for [`RemoteStore::transaction`]. May be called
/// more than once if the value changes underneath it.
pub type TransactionFn = Box<dyn Fn(&Value) -> Value + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Todos,
    Topics,
    Hobbies,
    Users,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todos => "todos",
            Self::Topics => "topics",
            Self::Hobbies => "hobbies",
            Self::Users => "users",
        }
    }
}

/// A validated location in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StorePath {
    segments: Vec<String>,
}

const FORBIDDEN: &[char] = &['.', '$', '#', '[', ']', '/'];

fn check_segment(segment: &str) -> StoreResult<()> {
    if segment.is_empty() {
        return Err(StoreError::InvalidPath("empty path segment".into()));
    }
    if segment.contains(FORBIDDEN) || segment.chars().any(char::is_control) {
        return Err(StoreError::InvalidPath(format!(
            "segment `{}` contains a reserved character",
            segment
        )));
    }
    Ok(())
}

impl StorePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// `{collection}/{uid}`, the namespace of one user's entities.
    pub fn collection(collection: Collection, uid: &str) -> StoreResult<Self> {
        Self::root().child(collection.as_str())?.child(uid)
    }

    pub fn child(&self, segment: &str) -> StoreResult<Self> {
        check_segment(segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// Parse `a/b/c`. Leading and trailing slashes are ignored.
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let mut path = Self::root();
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            path = path.child(segment)?;
        }
        Ok(path)
    }

    /// Unchecked; for paths assembled from segments that came out of the
    /// store itself.
    pub(crate) fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { segments })
    }

    pub fn join(&self, other: &StorePath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    pub fn starts_with(&self, prefix: &StorePath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// A write at one path is visible to a listener at the other.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// The value at a path at one moment. `Null` means nothing is stored there.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: StorePath,
    pub value: Value,
}

impl Snapshot {
    pub fn new(path: StorePath, value: Value) -> Self {
        Self { path, value }
    }

    pub fn exists(&self) -> bool {
        !self.value.is_null()
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.value
            .as_object()
            .into_iter()
            .flat_map(|map| map.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Decode each child into `T`. Children that do not decode come back in
    /// the second list as `(key, reason)`.
    pub fn decode_children<T: DeserializeOwned>(&self) -> (Vec<(String, T)>, Vec<(String, String)>) {
        let mut decoded = Vec::new();
        let mut rejected = Vec::new();
        for (key, value) in self.children() {
            match serde_json::from_value::<T>(value.clone()) {
                Ok(item) => decoded.push((key.to_string(), item)),
                Err(e) => rejected.push((key.to_string(), e.to_string())),
            }
        }
        decoded.sort_by(|a, b| a.0.cmp(&b.0));
        (decoded, rejected)
    }
}

/// The store contract the boards and the login flow depend on.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Append `value` under `path` with a generated key; returns the key.
    async fn create(&self, path: &StorePath, value: Value) -> StoreResult<String>;

    /// Overwrite whatever is at `path`.
    async fn set(&self, path: &StorePath, value: Value) -> StoreResult<()>;

    /// Merge the given top-level keys into the object at `path`.
    async fn update(&self, path: &StorePath, partial: Map<String, Value>) -> StoreResult<()>;

    async fn remove(&self, path: &StorePath) -> StoreResult<()>;

    /// One-shot read. `Null` when absent.
    async fn get(&self, path: &StorePath) -> StoreResult<Value>;

    /// Atomically replace the value at `path` with `apply(current)`,
    /// computed from the authoritative value. Returns what was written.
    async fn transaction(&self, path: &StorePath, apply: TransactionFn) -> StoreResult<Value>;

    /// Live view of `path`: the current value first, then one event per
    /// change, until the subscription is closed or dropped.
    fn subscribe(&self, path: &StorePath) -> Subscription;
}

/// Runs a producer's cleanup exactly once: on explicit close or when the
/// last handle goes away.
struct Teardown(Mutex<Option<Box<dyn FnOnce() + Send>>>);

impl Teardown {
    fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Mutex::new(Some(Box::new(f))))
    }

    fn run(&self) {
        let f = match self.0.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(f) = f {
            f();
        }
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.run();
    }
}

/// A live subscription. Closing it (or dropping it) stops the producer, after
/// which no further events are delivered.
pub struct Subscription {
    path: StorePath,
    events: mpsc::UnboundedReceiver<StoreEvent>,
    teardown: Arc<Teardown>,
}

impl Subscription {
    pub fn new(
        path: StorePath,
        events: mpsc::UnboundedReceiver<StoreEvent>,
        teardown: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            path,
            events,
            teardown: Arc::new(Teardown::new(teardown)),
        }
    }

    /// A subscription that reports `error` once and then ends.
    pub fn failed(path: StorePath, error: StoreError) -> Self {
        let (tx, rx) = mpsc::unbounded();
        let _ = tx.unbounded_send(Err(error));
        Self::new(path, rx, || {})
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    pub async fn next_event(&mut self) -> Option<StoreEvent> {
        self.events.next().await
    }

    pub fn unsubscribe(mut self) {
        self.teardown.run();
        self.events.close();
    }

    /// Shareable handle for pulling events from spawned tasks.
    pub fn into_feed(self) -> Feed {
        let Subscription {
            path,
            events,
            teardown,
        } = self;
        Feed {
            path,
            events: Arc::new(tokio::sync::Mutex::new(events)),
            teardown,
        }
    }
}

impl Stream for Subscription {
    type Item = StoreEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("path", &self.path).finish()
    }
}

/// Cloneable handle over a subscription. Each `next()` waits for one event;
/// `close()` tears the producer down so pending and future `next()` calls
/// return `None`.
#[derive(Clone)]
pub struct Feed {
    path: StorePath,
    events: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<StoreEvent>>>,
    teardown: Arc<Teardown>,
}

impl Feed {
    pub fn path(&self) -> &StorePath {
        &self.path
    }

    pub async fn next(&self) -> Option<StoreEvent> {
        let mut events = self.events.lock().await;
        events.next().await
    }

    pub fn close(&self) {
        self.teardown.run();
    }
}

impl fmt::Debug for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feed").field("path", &self.path).finish()
    }
}

/// Build a `{key: value}` object for [`RemoteStore::update`].
pub fn fields<I, K>(entries: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
