use chrono::NaiveDate;

use crate::auth::{AuthError, AuthSession};
use crate::core::hobby::Day;
use crate::core::session::SessionState;
use crate::core::topic::SubtaskId;
use crate::store::StoreEvent;

/// Which board a feed or a write belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Todos,
    Topics,
    Hobbies,
}

impl FeedKind {
    pub const ALL: [FeedKind; 3] = [FeedKind::Todos, FeedKind::Topics, FeedKind::Hobbies];
}

#[derive(Debug, Clone)]
pub enum Message {
    // Session
    SessionRestored(Result<Option<AuthSession>, String>),
    LoginEmailChanged(String),
    LoginPasswordChanged(String),
    SignIn,
    SignInFinished(Result<AuthSession, AuthError>),
    CreateAccount,
    DismissCreatePrompt,
    SignOut,
    SessionChanged(Option<SessionState>),
    RefreshToken(u64),
    TokenRefreshed(u64, Result<AuthSession, AuthError>),
    KeyringResult(Result<(), String>),

    // Live data, tagged with session epoch and feed generation
    FeedEvent(u64, FeedKind, u64, Option<StoreEvent>),
    WriteFinished(u64, FeedKind, Result<(), String>),
    DismissError,

    // Todos
    TodoInputChanged(String),
    TodoDateChanged(String),
    TodoRepeatingToggled(bool),
    AddTodo,
    ToggleTodo(String),
    DeleteTodo(String),

    // Calendar
    CalendarPrevMonth,
    CalendarNextMonth,
    CalendarSelectDay(NaiveDate),

    // Topics
    OpenTopicEditor(Option<String>),
    CloseTopicEditor,
    DraftTitleChanged(String),
    DraftSubtaskInputChanged(String),
    DraftAddSubtask,
    DraftRemoveSubtask(SubtaskId),
    DraftToggleSubtask(SubtaskId),
    SaveTopic,
    DeleteTopic(String),
    ToggleSubtask(String, SubtaskId),

    // Hobbies
    HobbyInputChanged(String),
    AddHobby,
    ToggleHobbyDay(String, Day),
    DeleteHobby(String),

    // Settings
    OpenSettings,
    CloseSettings,
    SetDatabaseUrl(String),
    SetApiKey(String),
    ToggleRememberSession,
    ToggleDebugLogging,
    SetStartTab(usize),
}
