use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::{BoardError, encode, logged};
use crate::core::session::SessionContext;
use crate::core::topic::{Subtask, SubtaskId, Topic, next_subtask_id};
use crate::store::{
    Collection, RemoteStore, Snapshot, StoreEvent, StorePath, Subscription, fields,
};

/// The signed-in user's topics, mirrored from `topics/{uid}`.
pub struct TopicBoard {
    store: Arc<dyn RemoteStore>,
    session: SessionContext,
    list_path: StorePath,
    topics: Vec<Topic>,
    rejected: Vec<String>,
    /// What the store last said, for undoing optimistic edits.
    last: Option<Snapshot>,
    error: Option<String>,
    loaded: bool,
}

impl TopicBoard {
    pub fn new(store: Arc<dyn RemoteStore>, session: SessionContext) -> Result<Self, BoardError> {
        let list_path = StorePath::collection(Collection::Topics, session.uid())?;
        Ok(Self {
            store,
            session,
            list_path,
            topics: Vec::new(),
            rejected: Vec::new(),
            last: None,
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
                self.load(&snapshot);
                self.last = Some(snapshot);
                self.error = None;
                self.loaded = true;
            }
            Err(e) => {
                log::error!("Topic subscription failed: {}", e);
                self.error = Some(e.to_string());
            }
        }
    }

    /// Drop local edits the store never accepted and show the last snapshot
    /// again. Call after a failed write.
    pub fn resync(&mut self) {
        if let Some(snapshot) = self.last.take() {
            self.load(&snapshot);
            self.last = Some(snapshot);
        }
    }

    fn load(&mut self, snapshot: &Snapshot) {
        let (decoded, rejected) = snapshot.decode_children::<Topic>();
        self.topics = decoded
            .into_iter()
            .map(|(id, mut topic)| {
                topic.id = id;
                topic
            })
            .collect();
        for (id, reason) in &rejected {
            log::warn!("Skipping topic {}: {}", id, reason);
        }
        self.rejected = rejected.into_iter().map(|(id, _)| id).collect();
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn get(&self, id: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == id)
    }

    pub fn rejected(&self) -> &[String] {
        &self.rejected
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

    /// Create a topic, or overwrite title and sub-tasks of `existing_id`.
    /// Resolves to the topic id.
    pub fn add_or_update(
        &self,
        title: &str,
        subtasks: Vec<Subtask>,
        existing_id: Option<String>,
    ) -> impl Future<Output = Result<String, BoardError>> + Send + use<> {
        let store = self.store.clone();
        let list_path = self.list_path.clone();
        let title = title.trim().to_string();
        let user_id = self.session.uid().to_string();
        async move {
            if title.is_empty() {
                return Err(BoardError::EmptyTitle);
            }
            match existing_id {
                Some(id) => {
                    let path = list_path.child(&id)?;
                    let partial = fields([
                        ("title", json!(title)),
                        ("todos", encode(&subtasks)?),
                    ]);
                    logged("update topic", store.update(&path, partial).await)?;
                    Ok(id)
                }
                None => {
                    let topic = Topic {
                        id: String::new(),
                        title,
                        subtasks,
                        user_id,
                    };
                    let value = encode(&topic)?;
                    logged("add topic", store.create(&list_path, value).await)
                }
            }
        }
    }

    /// Remove a topic; its sub-tasks live inside it and go with it.
    pub fn delete_topic(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<(), BoardError>> + Send + use<> {
        let store = self.store.clone();
        let target = self
            .get(id)
            .map(|t| t.id.clone())
            .ok_or_else(|| BoardError::NotFound(id.to_string()));
        let list_path = self.list_path.clone();
        async move {
            let path = list_path.child(&target?)?;
            logged("delete topic", store.remove(&path).await)
        }
    }

    /// Flip a sub-task here right away and write the topic's whole sub-task
    /// list back. Resolves to the new value.
    pub fn toggle_subtask(
        &mut self,
        topic_id: &str,
        subtask_id: SubtaskId,
    ) -> impl Future<Output = Result<bool, BoardError>> + Send + use<> {
        let store = self.store.clone();
        let list_path = self.list_path.clone();
        let flipped = self
            .topics
            .iter_mut()
            .find(|t| t.id == topic_id)
            .ok_or_else(|| BoardError::NotFound(topic_id.to_string()))
            .and_then(|topic| {
                let completed = topic
                    .toggle_subtask(subtask_id)
                    .ok_or_else(|| BoardError::NotFound(subtask_id.to_string()))?;
                Ok((topic.id.clone(), topic.subtasks.clone(), completed))
            });
        async move {
            let (id, subtasks, completed) = flipped?;
            let path = list_path.child(&id)?;
            let partial = fields([("todos", encode(&subtasks)?)]);
            logged("toggle sub-task", store.update(&path, partial).await)?;
            Ok(completed)
        }
    }
}

/// The topic editor's working copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicDraft {
    title: String,
    subtasks: Vec<Subtask>,
    existing_id: Option<String>,
}

impl TopicDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_topic(topic: &Topic) -> Self {
        Self {
            title: topic.title.clone(),
            subtasks: topic.subtasks.clone(),
            existing_id: Some(topic.id.clone()),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    pub fn existing_id(&self) -> Option<&str> {
        self.existing_id.as_deref()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Append a sub-task. Blank text is ignored.
    pub fn add_subtask(&mut self, text: &str) -> Option<SubtaskId> {
        self.add_subtask_at(text, Utc::now().timestamp_millis())
    }

    fn add_subtask_at(&mut self, text: &str, now_ms: SubtaskId) -> Option<SubtaskId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let id = next_subtask_id(&self.subtasks, now_ms);
        self.subtasks.push(Subtask {
            id,
            text: text.to_string(),
            completed: false,
        });
        Some(id)
    }

    pub fn remove_subtask(&mut self, id: SubtaskId) -> bool {
        let before = self.subtasks.len();
        self.subtasks.retain(|s| s.id != id);
        self.subtasks.len() != before
    }

    pub fn toggle_subtask(&mut self, id: SubtaskId) {
        if let Some(subtask) = self.subtasks.iter_mut().find(|s| s.id == id) {
            subtask.completed = !subtask.completed;
        }
    }

    /// `(title, sub-tasks, id being edited)`, ready for
    /// [`TopicBoard::add_or_update`].
    pub fn submit(self) -> (String, Vec<Subtask>, Option<String>) {
        (self.title, self.subtasks, self.existing_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::testing::{DenyingStore, alice};
    use crate::store::StoreError;
    use crate::store::local::LocalStore;
    use serde_json::Value;

    async fn echo(board: &mut TopicBoard, sub: &mut Subscription) {
        let event = sub.next_event().await.expect("subscription ended");
        board.apply(event);
    }

    fn draft_with(title: &str, items: &[&str]) -> TopicDraft {
        let mut draft = TopicDraft::new();
        draft.set_title(title);
        for (i, item) in items.iter().enumerate() {
            draft.add_subtask_at(item, 1_000 + i as i64);
        }
        draft
    }

    #[test]
    fn draft_ids_stay_unique_within_topic() {
        let mut draft = TopicDraft::new();
        let a = draft.add_subtask_at("a", 500).unwrap();
        let b = draft.add_subtask_at("b", 500).unwrap();
        let c = draft.add_subtask_at("c", 100).unwrap();
        assert_eq!((a, b, c), (500, 501, 502));
        assert_eq!(draft.add_subtask_at("   ", 900), None);

        assert!(draft.remove_subtask(b));
        assert!(!draft.remove_subtask(b));
        let texts: Vec<&str> = draft.subtasks().iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn create_then_edit_in_place() {
        let store = Arc::new(LocalStore::new());
        let mut board = TopicBoard::new(store, alice()).unwrap();
        let mut sub = board.subscribe();
        echo(&mut board, &mut sub).await;

        let (title, subtasks, existing) = draft_with(" Trip ", &["tickets", "hotel"]).submit();
        let id = board.add_or_update(&title, subtasks, existing).await.unwrap();
        echo(&mut board, &mut sub).await;

        let topic = board.get(&id).unwrap().clone();
        assert_eq!(topic.title, "Trip");
        assert_eq!(topic.subtasks.len(), 2);
        assert_eq!(topic.user_id, "alice");

        let mut draft = TopicDraft::from_topic(&topic);
        assert_eq!(draft.existing_id(), Some(id.as_str()));
        draft.set_title("Trip to Rome");
        draft.add_subtask_at("bags", 5_000);
        let (title, subtasks, existing) = draft.submit();
        let same = board.add_or_update(&title, subtasks, existing).await.unwrap();
        echo(&mut board, &mut sub).await;

        assert_eq!(same, id);
        assert_eq!(board.topics().len(), 1);
        let topic = board.get(&id).unwrap();
        assert_eq!(topic.title, "Trip to Rome");
        assert_eq!(topic.subtasks.len(), 3);
        assert_eq!(topic.user_id, "alice");
    }

    #[tokio::test]
    async fn empty_title_is_rejected() {
        let board = TopicBoard::new(Arc::new(LocalStore::new()), alice()).unwrap();
        assert_eq!(
            board.add_or_update("  ", Vec::new(), None).await,
            Err(BoardError::EmptyTitle)
        );
    }

    #[tokio::test]
    async fn delete_takes_subtasks_with_it() {
        let store = Arc::new(LocalStore::new());
        let mut board = TopicBoard::new(store.clone(), alice()).unwrap();
        let mut sub = board.subscribe();
        echo(&mut board, &mut sub).await;

        let (title, subtasks, existing) = draft_with("Garden", &["seeds", "soil"]).submit();
        let id = board.add_or_update(&title, subtasks, existing).await.unwrap();
        echo(&mut board, &mut sub).await;

        board.delete_topic(&id).await.unwrap();
        echo(&mut board, &mut sub).await;

        assert!(board.topics().is_empty());
        let leftover = StorePath::parse(&format!("topics/alice/{}/todos", id)).unwrap();
        assert_eq!(store.get(&leftover).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn subtask_toggle_is_optimistic_and_persisted() {
        let store = Arc::new(LocalStore::new());
        let mut board = TopicBoard::new(store.clone(), alice()).unwrap();
        let mut sub = board.subscribe();
        echo(&mut board, &mut sub).await;

        let (title, subtasks, existing) = draft_with("Books", &["Dune", "Emma"]).submit();
        let id = board.add_or_update(&title, subtasks, existing).await.unwrap();
        echo(&mut board, &mut sub).await;

        let write = board.toggle_subtask(&id, 1_001);
        assert!(board.get(&id).unwrap().subtask(1_001).unwrap().completed);
        assert_eq!(write.await, Ok(true));

        let stored = StorePath::parse(&format!("topics/alice/{}/todos/1/completed", id)).unwrap();
        assert_eq!(store.get(&stored).await.unwrap(), json!(true));

        echo(&mut board, &mut sub).await;
        assert_eq!(board.get(&id).unwrap().completed_count(), 1);

        assert_eq!(
            board.toggle_subtask(&id, 42).await,
            Err(BoardError::NotFound("42".into()))
        );
    }

    #[tokio::test]
    async fn denied_subtask_toggle_is_undone_by_resync() {
        let mut board = TopicBoard::new(Arc::new(DenyingStore), alice()).unwrap();
        let path = StorePath::parse("topics/alice").unwrap();
        board.apply(Ok(Snapshot::new(
            path,
            json!({
                "t1": {
                    "title": "Books",
                    "todos": [{ "id": 1, "text": "Dune", "completed": false }],
                    "userId": "alice"
                }
            }),
        )));

        let write = board.toggle_subtask("t1", 1);
        assert!(board.get("t1").unwrap().subtask(1).unwrap().completed);
        assert!(matches!(write.await, Err(BoardError::Store(StoreError::PermissionDenied(_)))));

        board.resync();
        assert!(!board.get("t1").unwrap().subtask(1).unwrap().completed);
        assert_eq!(board.get("t1").unwrap().title, "Books");
    }
}
