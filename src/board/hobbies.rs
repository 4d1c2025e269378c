use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::{BoardError, encode, logged};
use crate::core::hobby::{Day, Hobby};
use crate::core::session::SessionContext;
use crate::store::{Collection, RemoteStore, StoreEvent, StorePath, Subscription};

/// The signed-in user's weekly hobby grid, mirrored from `hobbies/{uid}`.
pub struct HobbyBoard {
    store: Arc<dyn RemoteStore>,
    session: SessionContext,
    list_path: StorePath,
    hobbies: Vec<Hobby>,
    error: Option<String>,
    loaded: bool,
}

impl HobbyBoard {
    pub fn new(store: Arc<dyn RemoteStore>, session: SessionContext) -> Result<Self, BoardError> {
        let list_path = StorePath::collection(Collection::Hobbies, session.uid())?;
        Ok(Self {
            store,
            session,
            list_path,
            hobbies: Vec::new(),
            error: None,
            loaded: false,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn subscribe(&self) -> Subscription {
        self.store.subscribe(&self.list_path)
    }

    pub fn apply(&mut self, event: StoreEvent) {
        match event {
            Ok(snapshot) => {
                let (decoded, rejected) = snapshot.decode_children::<Hobby>();
                for (id, reason) in rejected {
                    log::warn!("Skipping hobby {}: {}", id, reason);
                }
                self.hobbies = decoded
                    .into_iter()
                    .map(|(id, mut hobby)| {
                        hobby.id = id;
                        hobby
                    })
                    .collect();
                self.error = None;
                self.loaded = true;
            }
            Err(e) => {
                log::error!("Hobby subscription failed: {}", e);
                self.error = Some(e.to_string());
            }
        }
    }

    pub fn hobbies(&self) -> &[Hobby] {
        &self.hobbies
    }

    pub fn get(&self, id: &str) -> Option<&Hobby> {
        self.hobbies.iter().find(|h| h.id == id)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Start tracking a hobby with an empty week.
    pub fn add_hobby(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<String, BoardError>> + Send + use<> {
        let store = self.store.clone();
        let list_path = self.list_path.clone();
        let hobby = Hobby::new(name.trim());
        async move {
            if hobby.name.is_empty() {
                return Err(BoardError::EmptyName);
            }
            let value = encode(&hobby)?;
            logged("add hobby", store.create(&list_path, value).await)
        }
    }

    /// Flip one day cell against the stored value, not this board's copy, so
    /// two clients toggling at once both take effect. Resolves to the value
    /// that was written. A hobby deleted elsewhere in the meantime is left
    /// deleted and reported as not found.
    pub fn toggle_day(
        &self,
        hobby_id: &str,
        day: Day,
    ) -> impl Future<Output = Result<bool, BoardError>> + Send + use<> {
        let store = self.store.clone();
        let target = self
            .get(hobby_id)
            .map(|h| h.id.clone())
            .ok_or_else(|| BoardError::NotFound(hobby_id.to_string()));
        let list_path = self.list_path.clone();
        let label = day.label();
        async move {
            let id = target?;
            let hobby_path = list_path.child(&id)?;
            let written = logged(
                "toggle hobby day",
                store
                    .transaction(&hobby_path, Box::new(move |current: &Value| flip_day(current, label)))
                    .await,
            )?;
            if written.is_null() {
                return Err(BoardError::NotFound(id));
            }
            Ok(written
                .get("days")
                .and_then(|days| days.get(label))
                .and_then(Value::as_bool)
                .unwrap_or(false))
        }
    }

    pub fn delete_hobby(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<(), BoardError>> + Send + use<> {
        let store = self.store.clone();
        let target = self
            .get(id)
            .map(|h| h.id.clone())
            .ok_or_else(|| BoardError::NotFound(id.to_string()));
        let list_path = self.list_path.clone();
        async move {
            let path = list_path.child(&target?)?;
            logged("delete hobby", store.remove(&path).await)
        }
    }
}

/// The hobby with one day flipped. Nothing stored means nothing to flip.
fn flip_day(current: &Value, label: &str) -> Value {
    let Some(hobby) = current.as_object() else {
        return Value::Null;
    };
    let mut hobby = hobby.clone();
    let days = hobby
        .entry("days")
        .or_insert_with(|| Value::Object(Map::new()));
    if !days.is_object() {
        *days = Value::Object(Map::new());
    }
    if let Some(days) = days.as_object_mut() {
        let done = days.get(label).and_then(Value::as_bool).unwrap_or(false);
        days.insert(label.to_string(), Value::Bool(!done));
    }
    Value::Object(hobby)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::testing::alice;
    use crate::store::local::LocalStore;
    use serde_json::json;

    async fn echo(board: &mut HobbyBoard, sub: &mut Subscription) {
        let event = sub.next_event().await.expect("subscription ended");
        board.apply(event);
    }

    async fn board_with_hobby(store: Arc<LocalStore>) -> (HobbyBoard, Subscription, String) {
        let mut board = HobbyBoard::new(store, alice()).unwrap();
        let mut sub = board.subscribe();
        echo(&mut board, &mut sub).await;
        let id = board.add_hobby(" Running ").await.unwrap();
        echo(&mut board, &mut sub).await;
        (board, sub, id)
    }

    #[tokio::test]
    async fn new_hobby_has_empty_week() {
        let (board, _sub, id) = board_with_hobby(Arc::new(LocalStore::new())).await;
        let hobby = board.get(&id).unwrap();
        assert_eq!(hobby.name, "Running");
        assert_eq!(hobby.done_count(), 0);
        assert!(Day::ALL.iter().all(|d| !hobby.is_done(*d)));
    }

    #[tokio::test]
    async fn wednesday_toggled_once_then_twice() {
        let store = Arc::new(LocalStore::new());
        let (mut board, mut sub, id) = board_with_hobby(store.clone()).await;

        assert_eq!(board.toggle_day(&id, Day::Wed).await, Ok(true));
        echo(&mut board, &mut sub).await;
        assert!(board.get(&id).unwrap().is_done(Day::Wed));
        assert_eq!(board.get(&id).unwrap().done_count(), 1);

        assert_eq!(board.toggle_day(&id, Day::Wed).await, Ok(false));
        echo(&mut board, &mut sub).await;
        assert!(!board.get(&id).unwrap().is_done(Day::Wed));

        let cell = StorePath::parse(&format!("hobbies/alice/{}/days/Wed", id)).unwrap();
        assert_eq!(store.get(&cell).await.unwrap(), json!(false));
    }

    #[tokio::test]
    async fn toggle_follows_stored_value_not_local_copy() {
        let store = Arc::new(LocalStore::new());
        let (board, _sub, id) = board_with_hobby(store.clone()).await;

        // Another client ticks Friday; this board has not seen it yet.
        let cell = StorePath::parse(&format!("hobbies/alice/{}/days/Fri", id)).unwrap();
        store.set(&cell, json!(true)).await.unwrap();
        assert!(!board.get(&id).unwrap().is_done(Day::Fri));

        assert_eq!(board.toggle_day(&id, Day::Fri).await, Ok(false));
    }

    #[tokio::test]
    async fn blank_name_and_unknown_ids() {
        let (board, _sub, _id) = board_with_hobby(Arc::new(LocalStore::new())).await;
        assert_eq!(board.add_hobby("  ").await, Err(BoardError::EmptyName));
        assert_eq!(
            board.toggle_day("missing", Day::Mon).await,
            Err(BoardError::NotFound("missing".into()))
        );
    }

    #[tokio::test]
    async fn toggle_after_remote_delete_does_not_recreate() {
        let store = Arc::new(LocalStore::new());
        let (board, _sub, id) = board_with_hobby(store.clone()).await;

        // Another client deletes the hobby; this board still lists it.
        let hobby = StorePath::parse(&format!("hobbies/alice/{}", id)).unwrap();
        store.remove(&hobby).await.unwrap();

        assert_eq!(
            board.toggle_day(&id, Day::Tue).await,
            Err(BoardError::NotFound(id.clone()))
        );
        assert_eq!(store.get(&hobby).await.unwrap(), Value::Null);
    }

    #[test]
    fn flip_day_keeps_name_and_other_days() {
        let flipped = flip_day(&json!({ "name": "Yoga", "days": { "Mon": true } }), "Tue");
        assert_eq!(flipped, json!({ "name": "Yoga", "days": { "Mon": true, "Tue": true } }));
        let back = flip_day(&flipped, "Mon");
        assert_eq!(back["days"]["Mon"], json!(false));
        assert_eq!(flip_day(&Value::Null, "Mon"), Value::Null);
    }

    #[tokio::test]
    async fn delete_removes_hobby() {
        let (mut board, mut sub, id) = board_with_hobby(Arc::new(LocalStore::new())).await;
        board.toggle_day(&id, Day::Sun).await.unwrap();
        echo(&mut board, &mut sub).await;
        board.delete_hobby(&id).await.unwrap();
        echo(&mut board, &mut sub).await;
        assert!(board.hobbies().is_empty());
    }
}
