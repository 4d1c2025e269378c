//! In-process store with the realtime database's semantics.
//!
//! Backs offline mode (persisted to a JSON file) and the tests. Keys come
//! from the same time-ordered push-key scheme the database uses, so listing
//! children by key lists them in creation order.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use futures::channel::mpsc;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::tree::{get_at, merge_at, normalize, set_at};
use super::{
    RemoteStore, Snapshot, StoreError, StorePath, StoreResult, Subscription, TransactionFn,
};

const PUSH_CHARS: &[u8] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Generates 20-character keys: 8 for the millisecond timestamp, 12 random.
/// Keys made in the same millisecond increment the random part so they still
/// sort in creation order.
#[derive(Debug, Default)]
struct PushKeys {
    last_ms: i64,
    last_rand: [u8; 12],
}

impl PushKeys {
    fn next(&mut self, now_ms: i64) -> String {
        if now_ms <= self.last_ms {
            for digit in self.last_rand.iter_mut().rev() {
                if *digit == 63 {
                    *digit = 0;
                } else {
                    *digit += 1;
                    break;
                }
            }
        } else {
            self.last_ms = now_ms;
            let random = Uuid::new_v4();
            for (digit, byte) in self.last_rand.iter_mut().zip(random.as_bytes()) {
                *digit = byte % 64;
            }
        }

        let mut key = [0u8; 20];
        let mut ts = self.last_ms.max(0) as u64;
        for slot in key[..8].iter_mut().rev() {
            *slot = PUSH_CHARS[(ts % 64) as usize];
            ts /= 64;
        }
        for (slot, digit) in key[8..].iter_mut().zip(self.last_rand) {
            *slot = PUSH_CHARS[digit as usize];
        }
        String::from_utf8_lossy(&key).into_owned()
    }
}

struct Subscriber {
    id: u64,
    path: StorePath,
    tx: mpsc::UnboundedSender<super::StoreEvent>,
}

struct Inner {
    root: Value,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
    keys: PushKeys,
    file: Option<PathBuf>,
}

#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<Mutex<Inner>>,
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore {
    /// Empty, memory-only store.
    pub fn new() -> Self {
        Self::with_root(Value::Null, None)
    }

    /// Store persisted to `path`, loading what is already there.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let root = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Value::Null,
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| StoreError::Decode(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Value::Null,
            Err(e) => return Err(StoreError::Io(format!("{}: {}", path.display(), e))),
        };
        log::info!("Opened local store at {}", path.display());
        Ok(Self::with_root(normalize(root), Some(path)))
    }

    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("keepup")
            .join("store.json")
    }

    fn with_root(root: Value, file: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                root,
                subscribers: Vec::new(),
                next_subscriber: 0,
                keys: PushKeys::default(),
                file,
            })),
        }
    }

    /// The whole document tree.
    pub fn dump(&self) -> Value {
        match self.inner.lock() {
            Ok(inner) => inner.root.clone(),
            Err(poisoned) => poisoned.into_inner().root.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().map(|inner| inner.subscribers.len()).unwrap_or(0)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Io("local store lock poisoned".into()))
    }

    /// Apply `edit` to the tree, save it, and only then notify every
    /// listener whose view of the tree changed. A failed edit or save leaves
    /// the tree as it was.
    fn write<T>(
        &self,
        path: &StorePath,
        edit: impl FnOnce(&mut Inner) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut inner = self.lock()?;

        let before: Vec<(u64, Value)> = inner
            .subscribers
            .iter()
            .filter(|s| s.path.overlaps(path))
            .map(|s| (s.id, get_at(&inner.root, &s.path)))
            .collect();
        let previous = inner.root.clone();

        let out = match edit(&mut *inner) {
            Ok(out) => out,
            Err(e) => {
                inner.root = previous;
                return Err(e);
            }
        };
        if let Some(file) = inner.file.clone() {
            if let Err(e) = persist(&file, &inner.root) {
                inner.root = previous;
                return Err(e);
            }
        }

        let Inner {
            root, subscribers, ..
        } = &mut *inner;
        for (id, old) in before {
            let Some(sub) = subscribers.iter().find(|s| s.id == id) else {
                continue;
            };
            let now = get_at(root, &sub.path);
            if now != old {
                let _ = sub
                    .tx
                    .unbounded_send(Ok(Snapshot::new(sub.path.clone(), now)));
            }
        }
        subscribers.retain(|s| !s.tx.is_closed());
        Ok(out)
    }
}

fn persist(file: &Path, root: &Value) -> StoreResult<()> {
    if let Some(parent) = file.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
    }
    let json = serde_json::to_string_pretty(root).map_err(|e| StoreError::Io(e.to_string()))?;
    std::fs::write(file, json).map_err(|e| {
        log::error!("Failed to save local store {}: {}", file.display(), e);
        StoreError::Io(e.to_string())
    })
}

fn remove_subscriber(inner: &Weak<Mutex<Inner>>, id: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut guard = match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.subscribers.retain(|s| s.id != id);
}

#[async_trait]
impl RemoteStore for LocalStore {
    async fn create(&self, path: &StorePath, value: Value) -> StoreResult<String> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let key = {
            let mut inner = self.lock()?;
            inner.keys.next(now_ms)
        };
        let child = path.child(&key)?;
        self.write(&child, |inner| {
            set_at(&mut inner.root, &child, value);
            Ok(())
        })?;
        log::debug!("Created {}", child);
        Ok(key)
    }

    async fn set(&self, path: &StorePath, value: Value) -> StoreResult<()> {
        self.write(path, |inner| {
            set_at(&mut inner.root, path, value);
            Ok(())
        })
    }

    async fn update(&self, path: &StorePath, partial: Map<String, Value>) -> StoreResult<()> {
        self.write(path, |inner| {
            merge_at(&mut inner.root, path, &partial);
            Ok(())
        })
    }

    async fn remove(&self, path: &StorePath) -> StoreResult<()> {
        self.write(path, |inner| {
            set_at(&mut inner.root, path, Value::Null);
            Ok(())
        })
    }

    async fn get(&self, path: &StorePath) -> StoreResult<Value> {
        let inner = self.lock()?;
        Ok(get_at(&inner.root, path))
    }

    async fn transaction(&self, path: &StorePath, apply: TransactionFn) -> StoreResult<Value> {
        self.write(path, |inner| {
            let current = get_at(&inner.root, path);
            let next = normalize(apply(&current));
            set_at(&mut inner.root, path, next.clone());
            Ok(next)
        })
    }

    fn subscribe(&self, path: &StorePath) -> Subscription {
        let (tx, rx) = mpsc::unbounded();
        let mut inner = match self.lock() {
            Ok(inner) => inner,
            Err(e) => return Subscription::failed(path.clone(), e),
        };

        let id = inner.next_subscriber;
        inner.next_subscriber += 1;
        let current = get_at(&inner.root, path);
        let _ = tx.unbounded_send(Ok(Snapshot::new(path.clone(), current)));
        inner.subscribers.push(Subscriber {
            id,
            path: path.clone(),
            tx,
        });
        drop(inner);

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(path.clone(), rx, move || remove_subscriber(&weak, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> StorePath {
        StorePath::parse(s).unwrap()
    }

    #[test]
    fn push_keys_sort_in_creation_order() {
        let mut keys = PushKeys::default();
        let mut made = vec![keys.next(1_000), keys.next(1_000), keys.next(1_000), keys.next(2_000)];
        // Clock going backwards still yields increasing keys.
        made.push(keys.next(1_500));
        assert!(made.iter().all(|k| k.len() == 20));
        let mut sorted = made.clone();
        sorted.sort();
        assert_eq!(made, sorted);
        sorted.dedup();
        assert_eq!(sorted.len(), made.len());
    }

    #[tokio::test]
    async fn subscribe_fires_immediately_then_on_change() {
        let store = LocalStore::new();
        let list = p("todos/u");
        let mut sub = store.subscribe(&list);

        let first = sub.next_event().await.unwrap().unwrap();
        assert!(!first.exists());

        let key = store.create(&list, json!({ "text": "a" })).await.unwrap();
        let second = sub.next_event().await.unwrap().unwrap();
        assert_eq!(second.value, json!({ key.clone(): { "text": "a" } }));

        store
            .update(&list.child(&key).unwrap(), crate::store::fields([("text", json!("b"))]))
            .await
            .unwrap();
        let third = sub.next_event().await.unwrap().unwrap();
        assert_eq!(third.value[&key]["text"], json!("b"));
    }

    #[tokio::test]
    async fn unrelated_writes_do_not_notify() {
        let store = LocalStore::new();
        let mut sub = store.subscribe(&p("todos/alice"));
        sub.next_event().await;

        store.set(&p("todos/bob/x"), json!({ "text": "b" })).await.unwrap();
        store.set(&p("todos/alice/y"), json!({ "text": "a" })).await.unwrap();

        let next = sub.next_event().await.unwrap().unwrap();
        assert_eq!(next.value, json!({ "y": { "text": "a" } }));
    }

    #[tokio::test]
    async fn identical_writes_do_not_notify() {
        let store = LocalStore::new();
        store.set(&p("a/b"), json!(1)).await.unwrap();
        let mut sub = store.subscribe(&p("a"));
        sub.next_event().await;

        store.set(&p("a/b"), json!(1)).await.unwrap();
        store.set(&p("a/b"), json!(2)).await.unwrap();
        let next = sub.next_event().await.unwrap().unwrap();
        assert_eq!(next.value, json!({ "b": 2 }));
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let store = LocalStore::new();
        let sub = store.subscribe(&p("hobbies/u"));
        assert_eq!(store.subscriber_count(), 1);
        sub.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);

        let dropped = store.subscribe(&p("hobbies/u"));
        drop(dropped);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn transaction_reads_authoritative_value() {
        let store = LocalStore::new();
        let cell = p("hobbies/u/h/days/Wed");
        let flip: fn() -> TransactionFn =
            || Box::new(|v: &Value| Value::Bool(!v.as_bool().unwrap_or(false)));

        assert_eq!(store.transaction(&cell, flip()).await.unwrap(), json!(true));
        assert_eq!(store.transaction(&cell, flip()).await.unwrap(), json!(false));
        assert_eq!(store.get(&cell).await.unwrap(), json!(false));
    }

    #[tokio::test]
    async fn remove_deletes_subtree() {
        let store = LocalStore::new();
        let topic = p("topics/u/t1");
        store
            .set(&topic, json!({ "title": "x", "todos": [{ "id": 1, "text": "a" }] }))
            .await
            .unwrap();
        store.remove(&topic).await.unwrap();
        assert_eq!(store.get(&topic).await.unwrap(), Value::Null);
        assert_eq!(store.get(&p("topics/u/t1/todos/0")).await.unwrap(), Value::Null);
        assert_eq!(store.dump(), Value::Null);
    }

    #[tokio::test]
    async fn persists_to_file_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("keepup").join("store.json");

        let store = LocalStore::open(&file).unwrap();
        store.set(&p("users/u"), json!({ "email": "u@example.com" })).await.unwrap();

        let reopened = LocalStore::open(&file).unwrap();
        assert_eq!(
            reopened.get(&p("users/u/email")).await.unwrap(),
            json!("u@example.com")
        );
    }

    #[tokio::test]
    async fn failed_save_leaves_tree_and_subscribers_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("x");
        let store = LocalStore::open(blocked.join("store.json")).unwrap();

        let mut sub = store.subscribe(&p("todos/u"));
        assert_eq!(sub.next_event().await.unwrap().unwrap().value, Value::Null);

        // A plain file where the store's directory should be.
        std::fs::write(&blocked, "not a directory").unwrap();

        let result = store.set(&p("todos/u/t1"), json!({ "text": "a" })).await;
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert_eq!(store.get(&p("todos/u/t1")).await.unwrap(), Value::Null);
        assert_eq!(store.dump(), Value::Null);

        // Once saving works again the next event is the next write, with no
        // trace of the failed one.
        std::fs::remove_file(&blocked).unwrap();
        store.set(&p("todos/u/t2"), json!({ "text": "b" })).await.unwrap();
        let next = sub.next_event().await.unwrap().unwrap();
        assert_eq!(next.value, json!({ "t2": { "text": "b" } }));
    }
}
