use std::future::Future;
use std::sync::Arc;

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde_json::json;

use super::{BoardError, encode, logged};
use crate::core::session::SessionContext;
use crate::core::tab::Tab;
use crate::core::todo::{NewTodo, Todo};
use crate::store::{
    Collection, RemoteStore, StoreEvent, StorePath, Subscription, fields,
};

/// The signed-in user's todos, mirrored from `todos/{uid}`.
pub struct TodoBoard {
    store: Arc<dyn RemoteStore>,
    session: SessionContext,
    list_path: StorePath,
    todos: Vec<Todo>,
    orphaned: Vec<String>,
    error: Option<String>,
    loaded: bool,
}

impl TodoBoard {
    pub fn new(store: Arc<dyn RemoteStore>, session: SessionContext) -> Result<Self, BoardError> {
        let list_path = StorePath::collection(Collection::Todos, session.uid())?;
        Ok(Self {
            store,
            session,
            list_path,
            todos: Vec::new(),
            orphaned: Vec::new(),
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

    /// Take in one delivery from the subscription.
    pub fn apply(&mut self, event: StoreEvent) {
        match event {
            Ok(snapshot) => {
                let (decoded, rejected) = snapshot.decode_children::<Todo>();
                self.todos = decoded
                    .into_iter()
                    .map(|(id, mut todo)| {
                        todo.id = id;
                        todo
                    })
                    .collect();
                for (id, reason) in &rejected {
                    log::warn!("Skipping todo {}: {}", id, reason);
                }
                self.orphaned = rejected.into_iter().map(|(id, _)| id).collect();
                self.error = None;
                self.loaded = true;
            }
            Err(e) => {
                log::error!("Todo subscription failed: {}", e);
                self.error = Some(e.to_string());
            }
        }
    }

    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    pub fn get(&self, id: &str) -> Option<&Todo> {
        self.todos.iter().find(|t| t.id == id)
    }

    /// Ids of stored records that could not be shown, e.g. an unknown type.
    pub fn orphaned(&self) -> &[String] {
        &self.orphaned
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

    /// Todos whose type matches the tab. Empty for the non-todo tabs.
    pub fn visible_for(&self, tab: Tab) -> Vec<&Todo> {
        let Some(kind) = tab.todo_kind() else {
            return Vec::new();
        };
        self.todos.iter().filter(|t| t.kind == kind).collect()
    }

    /// Every todo dated exactly `date`, whatever its type.
    pub fn on_day(&self, date: NaiveDate) -> Vec<&Todo> {
        self.todos.iter().filter(|t| t.is_on(date)).collect()
    }

    /// Store a new todo. Resolves to the generated id.
    pub fn add(
        &self,
        draft: NewTodo,
    ) -> impl Future<Output = Result<String, BoardError>> + Send + use<> {
        let store = self.store.clone();
        let path = self.list_path.clone();
        let todo = Todo::from_draft(&draft, self.session.uid());
        async move {
            if todo.text.is_empty() {
                return Err(BoardError::EmptyText);
            }
            let value = encode(&todo)?;
            let id = logged("add todo", store.create(&path, value).await)?;
            log::debug!("Added {} todo {}", todo.kind, id);
            Ok(id)
        }
    }

    /// Flip `completed` relative to what this board last saw, and stamp the
    /// completion time. Resolves to the new value.
    pub fn toggle_completion(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<bool, BoardError>> + Send + use<> {
        let store = self.store.clone();
        let target = self
            .get(id)
            .map(|todo| (todo.id.clone(), !todo.completed))
            .ok_or_else(|| BoardError::NotFound(id.to_string()));
        let list_path = self.list_path.clone();
        async move {
            let (id, completed) = target?;
            let path = list_path.child(&id)?;
            let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            let partial = fields([
                ("completed", json!(completed)),
                ("lastCompletedDate", json!(stamp)),
            ]);
            logged("toggle todo", store.update(&path, partial).await)?;
            Ok(completed)
        }
    }

    pub fn delete(&self, id: &str) -> impl Future<Output = Result<(), BoardError>> + Send + use<> {
        let store = self.store.clone();
        let target = self
            .get(id)
            .map(|todo| todo.id.clone())
            .ok_or_else(|| BoardError::NotFound(id.to_string()));
        let list_path = self.list_path.clone();
        async move {
            let path = list_path.child(&target?)?;
            logged("delete todo", store.remove(&path).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::testing::{DenyingStore, alice};
    use crate::core::calendar::{MonthView, month_grid};
    use crate::core::todo::TodoKind;
    use crate::store::StoreError;
    use crate::store::local::LocalStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn echo(board: &mut TodoBoard, sub: &mut Subscription) {
        let event = sub.next_event().await.expect("subscription ended");
        board.apply(event);
    }

    fn milk() -> NewTodo {
        NewTodo {
            text: "Buy milk".into(),
            date: date(2024, 3, 1),
            kind: TodoKind::Daily,
            repeating: false,
        }
    }

    #[tokio::test]
    async fn add_echoes_back_one_todo() {
        let store = Arc::new(LocalStore::new());
        let mut board = TodoBoard::new(store.clone(), alice()).unwrap();
        let mut sub = board.subscribe();
        echo(&mut board, &mut sub).await;
        assert!(board.is_loaded());
        assert!(board.todos().is_empty());

        let id = board.add(milk()).await.unwrap();
        echo(&mut board, &mut sub).await;

        assert_eq!(board.todos().len(), 1);
        let todo = &board.todos()[0];
        assert_eq!(todo.id, id);
        assert_eq!(todo.text, "Buy milk");
        assert!(!todo.completed);
        assert_eq!(todo.repeat_interval, Some(1));
        assert_eq!(todo.user_id, "alice");

        let path = StorePath::parse(&format!("todos/alice/{}", id)).unwrap();
        let stored = store.get(&path).await.unwrap();
        assert_eq!(stored["date"], json!("2024-03-01"));
        assert_eq!(stored["type"], json!("daily"));
        assert_eq!(stored["repeatInterval"], json!(1));
        assert_eq!(stored["userId"], json!("alice"));

        assert_eq!(board.visible_for(Tab::Daily).len(), 1);
        assert!(board.visible_for(Tab::Weekly).is_empty());
        assert!(board.visible_for(Tab::Hobby).is_empty());
        assert_eq!(board.on_day(date(2024, 3, 1)).len(), 1);
        assert!(board.on_day(date(2024, 3, 2)).is_empty());

        let grid = month_grid(&MonthView::new(date(2024, 3, 1)), date(2024, 3, 1), board.todos());
        let cell = grid.cells.iter().find(|c| c.date == date(2024, 3, 1)).unwrap();
        assert!(cell.in_month);
        assert_eq!(cell.todos.len(), 1);
        assert_eq!(cell.todos[0].text, "Buy milk");
        assert!(grid.cells.iter().filter(|c| c.date != date(2024, 3, 1)).all(|c| c.todos.is_empty()));
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let board = TodoBoard::new(Arc::new(LocalStore::new()), alice()).unwrap();
        let mut draft = milk();
        draft.text = "   ".into();
        assert_eq!(board.add(draft).await, Err(BoardError::EmptyText));
    }

    #[tokio::test]
    async fn toggle_twice_restores_completed() {
        let store = Arc::new(LocalStore::new());
        let mut board = TodoBoard::new(store, alice()).unwrap();
        let mut sub = board.subscribe();
        echo(&mut board, &mut sub).await;
        let id = board.add(milk()).await.unwrap();
        echo(&mut board, &mut sub).await;

        assert_eq!(board.toggle_completion(&id).await, Ok(true));
        echo(&mut board, &mut sub).await;
        let first = board.get(&id).unwrap().clone();
        assert!(first.completed);
        assert!(first.last_completed_date.is_some());

        assert_eq!(board.toggle_completion(&id).await, Ok(false));
        echo(&mut board, &mut sub).await;
        assert!(!board.get(&id).unwrap().completed);
        assert_eq!(board.get(&id).unwrap().date, date(2024, 3, 1));
    }

    #[tokio::test]
    async fn delete_removes_and_unknown_ids_fail() {
        let store = Arc::new(LocalStore::new());
        let mut board = TodoBoard::new(store, alice()).unwrap();
        let mut sub = board.subscribe();
        echo(&mut board, &mut sub).await;
        let id = board.add(milk()).await.unwrap();
        echo(&mut board, &mut sub).await;

        board.delete(&id).await.unwrap();
        echo(&mut board, &mut sub).await;
        assert!(board.todos().is_empty());

        assert_eq!(
            board.delete(&id).await,
            Err(BoardError::NotFound(id.clone()))
        );
        assert_eq!(
            board.toggle_completion(&id).await,
            Err(BoardError::NotFound(id))
        );
    }

    #[tokio::test]
    async fn unknown_type_is_counted_not_shown() {
        let store = Arc::new(LocalStore::new());
        store
            .set(
                &StorePath::parse("todos/alice").unwrap(),
                json!({
                    "a": { "text": "ok", "date": "2024-03-01", "type": "weekly" },
                    "b": { "text": "odd", "date": "2024-03-01", "type": "yearly" },
                }),
            )
            .await
            .unwrap();
        let mut board = TodoBoard::new(store, alice()).unwrap();
        let mut sub = board.subscribe();
        echo(&mut board, &mut sub).await;

        assert_eq!(board.todos().len(), 1);
        assert_eq!(board.orphaned(), ["b".to_string()]);
        assert!(board.on_day(date(2024, 3, 1)).iter().all(|t| t.id == "a"));
    }

    #[tokio::test]
    async fn read_and_write_errors_surface() {
        let mut board = TodoBoard::new(Arc::new(DenyingStore), alice()).unwrap();
        let mut sub = board.subscribe();
        echo(&mut board, &mut sub).await;
        assert!(board.error().is_some());
        assert!(!board.is_loaded());

        assert!(matches!(
            board.add(milk()).await,
            Err(BoardError::Store(StoreError::PermissionDenied(_)))
        ));
    }

    #[tokio::test]
    async fn boards_only_see_their_owner() {
        let store = Arc::new(LocalStore::new());
        store
            .set(
                &StorePath::parse("todos/bob/x").unwrap(),
                json!({ "text": "bob's", "date": "2024-03-01", "type": "daily" }),
            )
            .await
            .unwrap();
        let mut board = TodoBoard::new(store, alice()).unwrap();
        let mut sub = board.subscribe();
        echo(&mut board, &mut sub).await;
        assert!(board.todos().is_empty());
    }
}
