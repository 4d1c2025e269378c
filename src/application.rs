use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use cosmic::app::{Core, Task as CosmicTask, context_drawer};
use cosmic::iced::{Alignment, Length};
use cosmic::widget::{button, column, container, icon, nav_bar, row, scrollable, text};
use cosmic::{Application, Element, executor};
use futures::StreamExt;
use futures::channel::mpsc;

use crate::auth::keyring::{self, SavedSession};
use crate::auth::{AuthError, AuthSession, register_user, validate_credentials};
use crate::backend::Backend;
use crate::board::BoardError;
use crate::board::hobbies::HobbyBoard;
use crate::board::todos::TodoBoard;
use crate::board::topics::{TopicBoard, TopicDraft};
use crate::config::{APP_ID, KeepUpConfig};
use crate::core::calendar::{MonthView, day_detail, month_grid};
use crate::core::hobby::Day;
use crate::core::session::{SessionContext, SessionManager, SessionState};
use crate::core::tab::{Tab, TabShell};
use crate::core::todo::NewTodo;
use crate::fl;
use crate::message::{FeedKind, Message};
use crate::pages;
use crate::store::{Feed, RemoteStore, StoreEvent};

/// Receiving end of [`SessionManager::watch`], shared with the pull task.
type SessionWatch = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<SessionState>>>;

/// Refresh the ID token this long before it runs out.
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

pub struct Flags {
    pub config: KeepUpConfig,
    pub cosmic_config: cosmic::cosmic_config::Config,
}

/// What the login page currently holds.
#[derive(Debug, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub busy: bool,
    pub error: Option<String>,
    /// Sign-in failed on credentials; ask whether to create the account.
    pub offer_create: bool,
}

/// Live view-models for one signed-in session, plus the feeds that keep them
/// current.
struct Boards {
    todos: TodoBoard,
    topics: TopicBoard,
    hobbies: HobbyBoard,
    feeds: HashMap<FeedKind, Feed>,
    /// Bumped whenever the feeds are reopened, so events from the old ones
    /// are dropped.
    generation: u64,
}

impl Boards {
    fn new(store: Arc<dyn RemoteStore>, ctx: SessionContext) -> Result<Self, BoardError> {
        Ok(Self {
            todos: TodoBoard::new(store.clone(), ctx.clone())?,
            topics: TopicBoard::new(store.clone(), ctx.clone())?,
            hobbies: HobbyBoard::new(store, ctx)?,
            feeds: HashMap::new(),
            generation: 0,
        })
    }

    fn apply(&mut self, kind: FeedKind, event: StoreEvent) {
        match kind {
            FeedKind::Todos => self.todos.apply(event),
            FeedKind::Topics => self.topics.apply(event),
            FeedKind::Hobbies => self.hobbies.apply(event),
        }
    }

    /// Show a failed write. Topics also drop their optimistic edit.
    fn write_failed(&mut self, kind: FeedKind, message: String) {
        match kind {
            FeedKind::Todos => self.todos.set_error(message),
            FeedKind::Topics => {
                self.topics.resync();
                self.topics.set_error(message);
            }
            FeedKind::Hobbies => self.hobbies.set_error(message),
        }
    }

    fn clear_errors(&mut self) {
        self.todos.clear_error();
        self.topics.clear_error();
        self.hobbies.clear_error();
    }

    fn errors(&self) -> impl Iterator<Item = &str> {
        [self.todos.error(), self.topics.error(), self.hobbies.error()]
            .into_iter()
            .flatten()
    }

    fn close_feeds(&mut self) {
        for (_, feed) in self.feeds.drain() {
            feed.close();
        }
    }

    /// Close whatever is open and subscribe all three boards again.
    fn open_feeds(&mut self, epoch: u64) -> CosmicTask<Message> {
        self.close_feeds();
        self.generation += 1;
        let generation = self.generation;

        let mut batch = Vec::new();
        for kind in FeedKind::ALL {
            let subscription = match kind {
                FeedKind::Todos => self.todos.subscribe(),
                FeedKind::Topics => self.topics.subscribe(),
                FeedKind::Hobbies => self.hobbies.subscribe(),
            };
            let feed = subscription.into_feed();
            log::debug!("Opened feed {:?} on {}", kind, feed.path());
            batch.push(pull(epoch, kind, generation, feed.clone()));
            self.feeds.insert(kind, feed);
        }
        CosmicTask::batch(batch)
    }
}

pub struct KeepUp {
    core: Core,
    nav_model: nav_bar::Model,
    config: KeepUpConfig,
    cosmic_config: cosmic::cosmic_config::Config,
    sessions: SessionManager,
    session_watch: SessionWatch,
    backend: Option<Backend>,
    auth_session: Option<AuthSession>,
    boards: Option<Boards>,
    shell: TabShell,
    show_settings: bool,
    /// App-level failure (backend setup, token refresh) shown in the banner.
    app_error: Option<String>,

    login: LoginForm,
    todo_input: String,
    todo_date_input: String,
    todo_repeating: bool,
    month: MonthView,
    hobby_input: String,
    topic_draft: Option<TopicDraft>,
    subtask_input: String,
}

impl Application for KeepUp {
    type Executor = executor::Default;
    type Flags = Flags;
    type Message = Message;

    const APP_ID: &'static str = APP_ID;

    fn core(&self) -> &Core {
        &self.core
    }

    fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    fn init(core: Core, flags: Self::Flags) -> (Self, CosmicTask<Self::Message>) {
        let config = flags.config;
        let cosmic_config = flags.cosmic_config;

        let mut nav_model = nav_bar::Model::default();
        for tab in Tab::ALL {
            nav_model
                .insert()
                .text(pages::settings::tab_name(*tab))
                .icon(icon::from_name(tab.icon_name()).icon())
                .data(*tab);
        }

        let (backend, app_error) = match Backend::from_config(&config) {
            Ok(backend) => (Some(backend), None),
            Err(e) => {
                log::error!("Failed to set up backend: {}", e);
                (None, Some(e))
            }
        };

        let mut sessions = SessionManager::new();
        let session_watch = Arc::new(tokio::sync::Mutex::new(sessions.watch()));

        let month = MonthView::today();
        let mut app = Self {
            core,
            nav_model,
            shell: TabShell::new(config.start_tab()),
            sessions,
            session_watch,
            backend,
            auth_session: None,
            boards: None,
            show_settings: false,
            app_error,
            login: LoginForm::default(),
            todo_input: String::new(),
            todo_date_input: month.selected.format("%Y-%m-%d").to_string(),
            todo_repeating: false,
            month,
            hobby_input: String::new(),
            topic_draft: None,
            subtask_input: String::new(),
            config,
            cosmic_config,
        };
        app.activate_nav(app.shell.active());

        let restore = app.backend.clone().filter(|_| app.config.remember_session);
        let task = match restore {
            Some(backend) => {
                let auth = backend.auth.clone();
                let backend_key = app.config.backend_key().to_string();
                CosmicTask::perform(
                    async move {
                        let Some(saved) = keyring::load_session(&backend_key).await? else {
                            return Ok(None);
                        };
                        auth.refresh(&saved.email, &saved.refresh_token)
                            .await
                            .map(Some)
                            .map_err(|e| e.to_string())
                    },
                    |result| cosmic::Action::App(Message::SessionRestored(result)),
                )
            }
            None => {
                app.sessions.sign_out();
                CosmicTask::none()
            }
        };

        let watch = watch_sessions(app.session_watch.clone());
        (app, CosmicTask::batch(vec![task, watch]))
    }

    fn nav_model(&self) -> Option<&nav_bar::Model> {
        match self.sessions.state() {
            SessionState::SignedIn(_) => Some(&self.nav_model),
            _ => None,
        }
    }

    fn on_nav_select(&mut self, id: nav_bar::Id) -> CosmicTask<Message> {
        if let Some(tab) = self.nav_model.data::<Tab>(id).copied() {
            if self.shell.select(tab) {
                log::debug!("Switched to {} tab", tab.as_tag());
            }
            self.show_settings = false;
            self.nav_model.activate(id);
        }
        CosmicTask::none()
    }

    fn update(&mut self, message: Message) -> CosmicTask<Message> {
        match message {
            // --- Session ---
            Message::SessionRestored(result) => match result {
                Ok(Some(session)) => return self.start_session(session),
                Ok(None) => self.sessions.sign_out(),
                Err(e) => {
                    log::warn!("Could not restore session: {}", e);
                    self.sessions.sign_out();
                }
            },

            Message::LoginEmailChanged(value) => {
                self.login.email = value;
                self.login.offer_create = false;
            }

            Message::LoginPasswordChanged(value) => {
                self.login.password = value;
                self.login.offer_create = false;
            }

            Message::SignIn => {
                if self.login.busy {
                    return CosmicTask::none();
                }
                let email = self.login.email.trim().to_string();
                let password = self.login.password.clone();
                if let Err(e) = validate_credentials(&email, &password) {
                    self.login.error = Some(e.to_string());
                    return CosmicTask::none();
                }
                let backend = match self.ensure_backend() {
                    Ok(backend) => backend,
                    Err(e) => {
                        self.login.error = Some(e);
                        return CosmicTask::none();
                    }
                };
                self.login.busy = true;
                self.login.error = None;
                self.login.offer_create = false;
                let auth = backend.auth.clone();
                return CosmicTask::perform(
                    async move { auth.sign_in(&email, &password).await },
                    |result| cosmic::Action::App(Message::SignInFinished(result)),
                );
            }

            Message::CreateAccount => {
                if self.login.busy {
                    return CosmicTask::none();
                }
                let backend = match self.ensure_backend() {
                    Ok(backend) => backend,
                    Err(e) => {
                        self.login.error = Some(e);
                        return CosmicTask::none();
                    }
                };
                self.login.busy = true;
                self.login.error = None;
                self.login.offer_create = false;
                let email = self.login.email.trim().to_string();
                let password = self.login.password.clone();
                return CosmicTask::perform(
                    async move {
                        let session = backend.auth.create_account(&email, &password).await?;
                        backend.set_token(Some(session.id_token.clone()));
                        register_user(backend.store.as_ref(), &session.identity).await?;
                        Ok::<_, AuthError>(session)
                    },
                    |result| cosmic::Action::App(Message::SignInFinished(result)),
                );
            }

            Message::SignInFinished(result) => {
                self.login.busy = false;
                match result {
                    Ok(session) => {
                        self.login.password.clear();
                        self.login.error = None;
                        return self.start_session(session);
                    }
                    Err(e) => {
                        log::warn!("Sign-in failed: {}", e);
                        self.login.offer_create = e.offers_account_creation();
                        self.login.error = Some(e.to_string());
                    }
                }
            }

            Message::DismissCreatePrompt => {
                self.login.offer_create = false;
            }

            Message::SignOut => return self.sign_out(),

            Message::SessionChanged(state) => {
                let Some(state) = state else {
                    return CosmicTask::none();
                };
                match state {
                    SessionState::SignedOut => {
                        // A newer sign-in may already have mounted its boards.
                        if self.sessions.current().is_none() {
                            if let Some(mut boards) = self.boards.take() {
                                boards.close_feeds();
                                log::debug!("Dropped boards after sign-out");
                            }
                            self.auth_session = None;
                        }
                    }
                    SessionState::SignedIn(ctx) => {
                        log::debug!("Session {} is live", ctx.epoch);
                    }
                    SessionState::Loading => {}
                }
                return watch_sessions(self.session_watch.clone());
            }

            Message::RefreshToken(epoch) => {
                if !self.sessions.is_current(epoch) {
                    return CosmicTask::none();
                }
                let (Some(backend), Some(session)) = (&self.backend, &self.auth_session) else {
                    return CosmicTask::none();
                };
                let auth = backend.auth.clone();
                let email = session.identity.email.clone();
                let refresh_token = session.refresh_token.clone();
                return CosmicTask::perform(
                    async move { auth.refresh(&email, &refresh_token).await },
                    move |result| cosmic::Action::App(Message::TokenRefreshed(epoch, result)),
                );
            }

            Message::TokenRefreshed(epoch, result) => {
                if !self.sessions.is_current(epoch) {
                    return CosmicTask::none();
                }
                match result {
                    Ok(session) => {
                        log::info!("Refreshed token for {}", session.identity.email);
                        if let Some(backend) = &self.backend {
                            backend.set_token(Some(session.id_token.clone()));
                        }
                        let mut batch = vec![self.schedule_refresh(epoch, session.expires_in)];
                        if self.config.remember_session {
                            batch.push(self.remember(&session));
                        }
                        if let Some(boards) = self.boards.as_mut() {
                            batch.push(boards.open_feeds(epoch));
                        }
                        self.auth_session = Some(session);
                        return CosmicTask::batch(batch);
                    }
                    Err(e) => {
                        log::error!("Failed to refresh token: {}", e);
                        self.app_error = Some(e.to_string());
                    }
                }
            }

            Message::KeyringResult(result) => {
                if let Err(e) = result {
                    log::warn!("Keyring: {}", e);
                }
            }

            // --- Live data ---
            Message::FeedEvent(epoch, kind, generation, event) => {
                if !self.sessions.is_current(epoch) {
                    return CosmicTask::none();
                }
                let Some(boards) = self.boards.as_mut() else {
                    return CosmicTask::none();
                };
                if generation != boards.generation {
                    return CosmicTask::none();
                }
                match event {
                    Some(event) => {
                        boards.apply(kind, event);
                        if let Some(feed) = boards.feeds.get(&kind) {
                            return pull(epoch, kind, generation, feed.clone());
                        }
                    }
                    None => {
                        log::debug!("Feed {:?} ended", kind);
                        boards.feeds.remove(&kind);
                    }
                }
            }

            Message::WriteFinished(epoch, kind, result) => {
                if !self.sessions.is_current(epoch) {
                    return CosmicTask::none();
                }
                if let (Err(e), Some(boards)) = (result, self.boards.as_mut()) {
                    boards.write_failed(kind, e);
                }
            }

            Message::DismissError => {
                self.app_error = None;
                if let Some(boards) = self.boards.as_mut() {
                    boards.clear_errors();
                }
            }

            // --- Todos ---
            Message::TodoInputChanged(value) => {
                self.todo_input = value;
            }

            Message::TodoDateChanged(value) => {
                if let Ok(date) = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
                    self.month.select_day(date);
                }
                self.todo_date_input = value;
            }

            Message::TodoRepeatingToggled(value) => {
                self.todo_repeating = value;
            }

            Message::AddTodo => {
                let Some(kind) = self.shell.active().todo_kind() else {
                    return CosmicTask::none();
                };
                let text = self.todo_input.trim().to_string();
                if text.is_empty() {
                    return CosmicTask::none();
                }
                let Some((epoch, boards)) = self.live_boards() else {
                    return CosmicTask::none();
                };
                let draft = NewTodo {
                    text,
                    date: self.month.selected,
                    kind,
                    repeating: self.todo_repeating,
                };
                let write = boards.todos.add(draft);
                self.todo_input.clear();
                self.todo_repeating = false;
                return write_task(epoch, FeedKind::Todos, write);
            }

            Message::ToggleTodo(id) => {
                if let Some((epoch, boards)) = self.live_boards() {
                    return write_task(epoch, FeedKind::Todos, boards.todos.toggle_completion(&id));
                }
            }

            Message::DeleteTodo(id) => {
                if let Some((epoch, boards)) = self.live_boards() {
                    return write_task(epoch, FeedKind::Todos, boards.todos.delete(&id));
                }
            }

            // --- Calendar ---
            Message::CalendarPrevMonth => {
                self.month.prev_month();
                self.sync_date_input();
            }

            Message::CalendarNextMonth => {
                self.month.next_month();
                self.sync_date_input();
            }

            Message::CalendarSelectDay(date) => {
                self.month.select_day(date);
                self.sync_date_input();
            }

            // --- Topics ---
            Message::OpenTopicEditor(id) => {
                let draft = match id {
                    Some(id) => match self.boards.as_ref().and_then(|b| b.topics.get(&id)) {
                        Some(topic) => TopicDraft::from_topic(topic),
                        None => return CosmicTask::none(),
                    },
                    None => TopicDraft::new(),
                };
                self.topic_draft = Some(draft);
                self.subtask_input.clear();
                self.core.window.show_context = true;
            }

            Message::CloseTopicEditor => {
                self.close_topic_editor();
            }

            Message::DraftTitleChanged(value) => {
                if let Some(draft) = self.topic_draft.as_mut() {
                    draft.set_title(value);
                }
            }

            Message::DraftSubtaskInputChanged(value) => {
                self.subtask_input = value;
            }

            Message::DraftAddSubtask => {
                if let Some(draft) = self.topic_draft.as_mut() {
                    if draft.add_subtask(&self.subtask_input).is_some() {
                        self.subtask_input.clear();
                    }
                }
            }

            Message::DraftRemoveSubtask(id) => {
                if let Some(draft) = self.topic_draft.as_mut() {
                    draft.remove_subtask(id);
                }
            }

            Message::DraftToggleSubtask(id) => {
                if let Some(draft) = self.topic_draft.as_mut() {
                    draft.toggle_subtask(id);
                }
            }

            Message::SaveTopic => {
                let Some(draft) = self.topic_draft.as_ref() else {
                    return CosmicTask::none();
                };
                if draft.title().trim().is_empty() {
                    return CosmicTask::none();
                }
                let (title, subtasks, existing_id) = draft.clone().submit();
                let Some((epoch, boards)) = self.live_boards() else {
                    return CosmicTask::none();
                };
                let write = boards.topics.add_or_update(&title, subtasks, existing_id);
                self.close_topic_editor();
                return write_task(epoch, FeedKind::Topics, write);
            }

            Message::DeleteTopic(id) => {
                if let Some((epoch, boards)) = self.live_boards() {
                    return write_task(epoch, FeedKind::Topics, boards.topics.delete_topic(&id));
                }
            }

            Message::ToggleSubtask(topic_id, subtask_id) => {
                if let Some((epoch, boards)) = self.live_boards_mut() {
                    let write = boards.topics.toggle_subtask(&topic_id, subtask_id);
                    return write_task(epoch, FeedKind::Topics, write);
                }
            }

            // --- Hobbies ---
            Message::HobbyInputChanged(value) => {
                self.hobby_input = value;
            }

            Message::AddHobby => {
                let name = self.hobby_input.trim().to_string();
                if name.is_empty() {
                    return CosmicTask::none();
                }
                if let Some((epoch, boards)) = self.live_boards() {
                    let write = boards.hobbies.add_hobby(&name);
                    self.hobby_input.clear();
                    return write_task(epoch, FeedKind::Hobbies, write);
                }
            }

            Message::ToggleHobbyDay(id, day) => {
                if let Some((epoch, boards)) = self.live_boards() {
                    return write_task(epoch, FeedKind::Hobbies, boards.hobbies.toggle_day(&id, day));
                }
            }

            Message::DeleteHobby(id) => {
                if let Some((epoch, boards)) = self.live_boards() {
                    return write_task(epoch, FeedKind::Hobbies, boards.hobbies.delete_hobby(&id));
                }
            }

            // --- Settings ---
            Message::OpenSettings => {
                self.show_settings = true;
            }

            Message::CloseSettings => {
                self.show_settings = false;
            }

            Message::SetDatabaseUrl(value) => {
                self.config.database_url = value;
                self.save_config();
                self.reset_backend();
            }

            Message::SetApiKey(value) => {
                self.config.api_key = value;
                self.save_config();
                self.reset_backend();
            }

            Message::ToggleRememberSession => {
                self.config.remember_session = !self.config.remember_session;
                self.save_config();
                if !self.config.remember_session {
                    return self.forget();
                }
                if let Some(session) = self.auth_session.clone() {
                    return self.remember(&session);
                }
            }

            Message::ToggleDebugLogging => {
                self.config.debug_logging = !self.config.debug_logging;
                keepup::set_debug_logging(self.config.debug_logging);
                self.save_config();
            }

            Message::SetStartTab(index) => {
                if let Some(tab) = Tab::ALL.get(index) {
                    self.config.start_tab = tab.as_tag().to_string();
                    self.save_config();
                }
            }
        }

        CosmicTask::none()
    }

    fn header_end(&self) -> Vec<Element<'_, Message>> {
        let mut header_row = row().spacing(4);

        if self.topic_editor_available() {
            header_row = header_row.push(
                button::icon(icon::from_name("list-add-symbolic"))
                    .on_press(Message::OpenTopicEditor(None)),
            );
        }

        if self.sessions.current().is_some() {
            header_row = header_row.push(
                button::icon(icon::from_name("system-log-out-symbolic"))
                    .on_press(Message::SignOut),
            );
        }

        header_row = header_row.push(
            button::icon(icon::from_name("emblem-system-symbolic"))
                .on_press(Message::OpenSettings),
        );

        vec![header_row.into()]
    }

    fn context_drawer(&self) -> Option<context_drawer::ContextDrawer<'_, Message>> {
        let draft = self.topic_draft.as_ref()?;
        let title = if draft.existing_id().is_some() {
            fl!("topics-edit")
        } else {
            fl!("topics-new")
        };
        Some(
            context_drawer::context_drawer(
                container(scrollable(
                    container(pages::topics::topic_editor(draft, &self.subtask_input)).padding(16),
                ))
                .width(Length::Fill),
                Message::CloseTopicEditor,
            )
            .title(title),
        )
    }

    fn on_escape(&mut self) -> CosmicTask<Message> {
        if self.topic_draft.is_some() {
            self.close_topic_editor();
        } else if self.show_settings {
            self.show_settings = false;
        }
        CosmicTask::none()
    }

    fn view(&self) -> Element<'_, Message> {
        let page = if self.show_settings {
            pages::settings::settings_view(
                &self.config,
                self.sessions.current().map(|ctx| ctx.identity.email.as_str()),
            )
        } else {
            match self.sessions.state() {
                SessionState::Loading => container(text::body(fl!("loading")))
                    .center_x(Length::Fill)
                    .center_y(Length::Fill)
                    .into(),
                SessionState::SignedOut => {
                    pages::login::login_view(&self.login, self.config.is_offline())
                }
                SessionState::SignedIn(_) => self.tab_view(),
            }
        };

        let errors: Vec<&str> = self
            .app_error
            .as_deref()
            .into_iter()
            .chain(self.boards.iter().flat_map(|b| b.errors()))
            .collect();
        if errors.is_empty() {
            return page;
        }

        let mut banner = column().spacing(4);
        for error in errors {
            banner = banner.push(text::body(error.to_string()));
        }
        let banner = row()
            .spacing(8)
            .padding([8, 16])
            .align_y(Alignment::Center)
            .push(icon::from_name("dialog-warning-symbolic").size(16).icon())
            .push(banner.width(Length::Fill))
            .push(button::standard(fl!("dismiss")).on_press(Message::DismissError));

        column().push(banner).push(page).into()
    }
}

impl KeepUp {
    fn tab_view(&self) -> Element<'_, Message> {
        let Some(boards) = self.boards.as_ref() else {
            return container(text::body(fl!("loading")))
                .center_x(Length::Fill)
                .into();
        };
        let today = chrono::Local::now().date_naive();
        let form = pages::todos::TodoForm {
            input: &self.todo_input,
            date: self.month.selected,
            repeating: self.todo_repeating,
        };

        let tab = self.shell.active();
        match tab {
            Tab::Hobby => pages::hobbies::hobbies_view(
                boards.hobbies.hobbies(),
                &self.hobby_input,
                Day::from_weekday(today.weekday()),
            ),
            Tab::Daily | Tab::Weekly | Tab::Monthly => pages::todos::todos_view(
                pages::settings::tab_name(tab),
                &boards.todos.visible_for(tab),
                &form,
                boards.todos.orphaned().len(),
                today,
            ),
            Tab::Calendar => {
                let todos = boards.todos.todos();
                let grid = month_grid(&self.month, today, todos);
                let detail = day_detail(self.month.selected, todos);
                pages::calendar::calendar_view(
                    &self.month,
                    &grid,
                    &detail,
                    &form,
                    &self.todo_date_input,
                    today,
                )
            }
            Tab::Topics => pages::topics::topics_view(boards.topics.topics()),
        }
    }

    /// Mount the boards for a fresh session and start everything that hangs
    /// off it: feeds, token refresh and the remembered session.
    fn start_session(&mut self, session: AuthSession) -> CosmicTask<Message> {
        let backend = match self.ensure_backend() {
            Ok(backend) => backend,
            Err(e) => {
                self.app_error = Some(e);
                self.sessions.sign_out();
                return CosmicTask::none();
            }
        };
        if let Some(mut old) = self.boards.take() {
            old.close_feeds();
        }
        backend.set_token(Some(session.id_token.clone()));
        let ctx = self.sessions.sign_in(session.identity.clone());
        let epoch = ctx.epoch;

        let mut boards = match Boards::new(backend.store.clone(), ctx) {
            Ok(boards) => boards,
            Err(e) => {
                log::error!("Failed to set up boards: {}", e);
                self.app_error = Some(e.to_string());
                self.sessions.sign_out();
                return CosmicTask::none();
            }
        };

        let mut batch = vec![boards.open_feeds(epoch)];
        if backend.is_remote() {
            batch.push(self.schedule_refresh(epoch, session.expires_in));
        }
        if self.config.remember_session {
            batch.push(self.remember(&session));
        }

        self.boards = Some(boards);
        self.auth_session = Some(session);
        self.shell = TabShell::new(self.config.start_tab());
        self.activate_nav(self.shell.active());
        self.show_settings = false;
        self.app_error = None;

        CosmicTask::batch(batch)
    }

    /// Boards are dropped when the session watch reports the sign-out.
    fn sign_out(&mut self) -> CosmicTask<Message> {
        self.sessions.sign_out();
        self.auth_session = None;
        self.close_topic_editor();
        self.show_settings = false;
        if let Some(backend) = self.backend.take() {
            backend.set_token(None);
        }
        self.forget()
    }

    fn schedule_refresh(&self, epoch: u64, expires_in: u64) -> CosmicTask<Message> {
        let wait = Duration::from_secs(expires_in)
            .saturating_sub(REFRESH_MARGIN)
            .max(Duration::from_secs(30));
        log::debug!("Refreshing token in {}s", wait.as_secs());
        CosmicTask::perform(tokio::time::sleep(wait), move |_| {
            cosmic::Action::App(Message::RefreshToken(epoch))
        })
    }

    fn remember(&self, session: &AuthSession) -> CosmicTask<Message> {
        let backend_key = self.config.backend_key().to_string();
        let saved = SavedSession {
            email: session.identity.email.clone(),
            refresh_token: session.refresh_token.clone(),
        };
        CosmicTask::perform(
            async move { keyring::store_session(&backend_key, &saved).await },
            |result| cosmic::Action::App(Message::KeyringResult(result)),
        )
    }

    fn forget(&self) -> CosmicTask<Message> {
        let backend_key = self.config.backend_key().to_string();
        CosmicTask::perform(
            async move { keyring::delete_session(&backend_key).await },
            |result| cosmic::Action::App(Message::KeyringResult(result)),
        )
    }

    /// The backend for the next sign-in, built from config on first use.
    fn ensure_backend(&mut self) -> Result<Backend, String> {
        if let Some(backend) = &self.backend {
            return Ok(backend.clone());
        }
        let backend = Backend::from_config(&self.config)?;
        self.backend = Some(backend.clone());
        Ok(backend)
    }

    /// Config changes reach the backend at the next sign-in.
    fn reset_backend(&mut self) {
        if self.sessions.current().is_none() {
            self.backend = None;
            self.app_error = None;
        }
    }

    fn live_boards(&self) -> Option<(u64, &Boards)> {
        let epoch = self.sessions.current()?.epoch;
        Some((epoch, self.boards.as_ref()?))
    }

    fn live_boards_mut(&mut self) -> Option<(u64, &mut Boards)> {
        let epoch = self.sessions.current()?.epoch;
        Some((epoch, self.boards.as_mut()?))
    }

    fn topic_editor_available(&self) -> bool {
        !self.show_settings
            && self.boards.is_some()
            && self.shell.active() == Tab::Topics
    }

    fn close_topic_editor(&mut self) {
        self.topic_draft = None;
        self.subtask_input.clear();
        self.core.window.show_context = false;
    }

    fn sync_date_input(&mut self) {
        self.todo_date_input = self.month.selected.format("%Y-%m-%d").to_string();
    }

    fn activate_nav(&mut self, tab: Tab) {
        let id = self
            .nav_model
            .iter()
            .find(|id| self.nav_model.data::<Tab>(*id) == Some(&tab));
        if let Some(id) = id {
            self.nav_model.activate(id);
        }
    }

    fn save_config(&self) {
        use cosmic::cosmic_config::CosmicConfigEntry;
        if let Err(e) = self.config.write_entry(&self.cosmic_config) {
            log::error!("Failed to save config: {:?}", e);
        }
    }
}

/// Wait for the next session transition.
fn watch_sessions(watch: SessionWatch) -> CosmicTask<Message> {
    CosmicTask::perform(
        async move { watch.lock().await.next().await },
        |state| cosmic::Action::App(Message::SessionChanged(state)),
    )
}

/// Wait for the next event on `feed` and hand it back tagged with where it
/// came from.
fn pull(epoch: u64, kind: FeedKind, generation: u64, feed: Feed) -> CosmicTask<Message> {
    CosmicTask::perform(async move { feed.next().await }, move |event| {
        cosmic::Action::App(Message::FeedEvent(epoch, kind, generation, event))
    })
}

/// Run a board write and report only whether it failed; the result itself
/// arrives through the feed.
fn write_task<T: Send + 'static>(
    epoch: u64,
    kind: FeedKind,
    write: impl Future<Output = Result<T, BoardError>> + Send + 'static,
) -> CosmicTask<Message> {
    CosmicTask::perform(write, move |result| {
        cosmic::Action::App(Message::WriteFinished(
            epoch,
            kind,
            result.map(|_| ()).map_err(|e| e.to_string()),
        ))
    })
}
