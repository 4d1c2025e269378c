//! Who is signed in, and the stream of sign-in / sign-out transitions.
//!
//! There is no ambient "current user": a [`SessionContext`] is handed to each
//! board when it is built and the board lives exactly as long as that
//! session. Every sign-in opens a new epoch so late events from an earlier
//! session can be recognised and dropped.

use futures::channel::mpsc;
use serde::{Deserialize, Serialize};

/// The authenticated user as far as the app cares: a namespace key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

/// Explicit per-session value passed into every board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub identity: Identity,
    pub epoch: u64,
}

impl SessionContext {
    pub fn uid(&self) -> &str {
        &self.identity.uid
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Loading,
    SignedOut,
    SignedIn(SessionContext),
}

impl SessionState {
    pub fn context(&self) -> Option<&SessionContext> {
        match self {
            Self::SignedIn(ctx) => Some(ctx),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionManager {
    state: SessionState,
    epoch: u64,
    watchers: Vec<mpsc::UnboundedSender<SessionState>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn current(&self) -> Option<&SessionContext> {
        self.state.context()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether `epoch` still belongs to the live session.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.current().is_some_and(|ctx| ctx.epoch == epoch)
    }

    /// Stream of state changes. Yields the current state first.
    pub fn watch(&mut self) -> mpsc::UnboundedReceiver<SessionState> {
        let (tx, rx) = mpsc::unbounded();
        let _ = tx.unbounded_send(self.state.clone());
        self.watchers.push(tx);
        rx
    }

    pub fn sign_in(&mut self, identity: Identity) -> SessionContext {
        self.epoch += 1;
        let ctx = SessionContext {
            identity,
            epoch: self.epoch,
        };
        log::info!("Signed in as {} (session {})", ctx.identity.email, ctx.epoch);
        self.transition(SessionState::SignedIn(ctx.clone()));
        ctx
    }

    pub fn sign_out(&mut self) {
        if let Some(ctx) = self.current() {
            log::info!("Signing out {} (session {})", ctx.identity.email, ctx.epoch);
        }
        self.transition(SessionState::SignedOut);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        self.state = next;
        let state = self.state.clone();
        // Closed receivers drop out here.
        self.watchers
            .retain(|tx| tx.unbounded_send(state.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn alice() -> Identity {
        Identity {
            uid: "alice".into(),
            email: "alice@example.com".into(),
        }
    }

    #[tokio::test]
    async fn watch_replays_current_then_transitions() {
        let mut sessions = SessionManager::new();
        let mut rx = sessions.watch();
        assert_eq!(rx.next().await, Some(SessionState::Loading));

        sessions.sign_out();
        let ctx = sessions.sign_in(alice());
        sessions.sign_out();

        assert_eq!(rx.next().await, Some(SessionState::SignedOut));
        assert_eq!(rx.next().await, Some(SessionState::SignedIn(ctx)));
        assert_eq!(rx.next().await, Some(SessionState::SignedOut));
    }

    #[test]
    fn each_sign_in_opens_new_epoch() {
        let mut sessions = SessionManager::new();
        let first = sessions.sign_in(alice());
        sessions.sign_out();
        assert!(!sessions.is_current(first.epoch));

        let second = sessions.sign_in(alice());
        assert!(second.epoch > first.epoch);
        assert!(sessions.is_current(second.epoch));
        assert!(!sessions.is_current(first.epoch));
        assert_eq!(sessions.current().map(|c| c.uid()), Some("alice"));
    }

    #[tokio::test]
    async fn stale_sign_out_is_read_after_new_sign_in() {
        let mut sessions = SessionManager::new();
        let mut rx = sessions.watch();
        assert_eq!(rx.next().await, Some(SessionState::Loading));

        let first = sessions.sign_in(alice());
        sessions.sign_out();
        let second = sessions.sign_in(alice());

        assert_eq!(rx.next().await, Some(SessionState::SignedIn(first)));
        // The sign-out is delivered while a newer session is already live.
        assert_eq!(rx.next().await, Some(SessionState::SignedOut));
        assert!(sessions.current().is_some());
        assert!(sessions.is_current(second.epoch));
        assert_eq!(rx.next().await, Some(SessionState::SignedIn(second)));
    }

    #[test]
    fn dropped_watchers_are_pruned() {
        let mut sessions = SessionManager::new();
        let rx = sessions.watch();
        drop(rx);
        sessions.sign_out();
        assert!(sessions.watchers.is_empty());
    }
}
