//! Stream sessions: identity, lifecycle and guarded delivery.
//!
//! Every callback a session makes goes through [`StreamSession::deliver`]
//! (or one of its terminal variants), which checks the state first. No
//! lock is held while the callback runs, so [`StreamSession::cancel`]
//! never waits on observer code. Once it returns no new delivery from that
//! session starts, even if the transport is slow to notice the abort.

use parking_lot::Mutex;
use std::fmt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Unique identity of one request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Mint a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle of a session.
///
/// `Idle → Streaming → {Completed | Cancelled | Errored}`, passing through
/// `Completing` while the completion marker is being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, request not issued yet.
    Idle,
    /// Request issued, fragments are being forwarded.
    Streaming,
    /// Completion marker received and being delivered.
    Completing,
    /// Finished normally.
    Completed,
    /// Stopped by the caller or superseded by a newer session.
    Cancelled,
    /// Stopped by a transport failure or an error event.
    Errored,
}

impl SessionState {
    /// Whether no further transition is possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Errored)
    }

    /// Whether the session can still be cancelled.
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Streaming | Self::Completing)
    }
}

/// One logical request/response exchange.
pub struct StreamSession {
    id: SessionId,
    state: Mutex<SessionState>,
    cancel: CancellationToken,
}

impl StreamSession {
    /// Create an idle session.
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            state: Mutex::new(SessionState::Idle),
            cancel: CancellationToken::new(),
        }
    }

    /// Session identity.
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Token raised when the session is cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Move from `Idle` to `Streaming`.
    pub fn begin(&self) -> bool {
        self.transition(SessionState::Idle, SessionState::Streaming)
    }

    /// Cancel the session.
    ///
    /// Returns `true` if this call moved a live session to `Cancelled`.
    /// Cancelling an idle or finished session does nothing.
    pub fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if !state.is_live() {
            return false;
        }
        *state = SessionState::Cancelled;
        drop(state);
        self.cancel.cancel();
        true
    }

    /// Run `deliver` if the session is still streaming.
    pub fn deliver(&self, deliver: impl FnOnce()) -> bool {
        if self.state() != SessionState::Streaming {
            return false;
        }
        deliver();
        true
    }

    /// Deliver the completion marker and finish the session.
    ///
    /// A cancel that lands while `deliver` runs wins: the session ends
    /// `Cancelled`, not `Completed`.
    pub fn complete(&self, deliver: impl FnOnce()) -> bool {
        if !self.transition(SessionState::Streaming, SessionState::Completing) {
            return false;
        }
        deliver();
        self.transition(SessionState::Completing, SessionState::Completed);
        true
    }

    /// Mark the session failed, then deliver the failure.
    pub fn fail(&self, deliver: impl FnOnce()) -> bool {
        if !self.transition(SessionState::Streaming, SessionState::Errored) {
            return false;
        }
        deliver();
        true
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let mut state = self.state.lock();
        if *state != from {
            return false;
        }
        *state = to;
        true
    }
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_session_lifecycle_completed() {
        let session = StreamSession::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.deliver(|| {}));

        assert!(session.begin());
        assert!(!session.begin());
        assert!(session.deliver(|| {}));

        let seen = Cell::new(None);
        assert!(session.complete(|| seen.set(Some(session.state()))));
        assert_eq!(seen.get(), Some(SessionState::Completing));
        assert_eq!(session.state(), SessionState::Completed);

        assert!(!session.cancel());
        assert!(!session.fail(|| {}));
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn test_session_cancel_drops_late_events() {
        let session = StreamSession::new();
        session.begin();

        assert!(session.cancel());
        assert!(session.cancel_token().is_cancelled());
        assert!(!session.cancel());

        let delivered = Cell::new(0);
        session.deliver(|| delivered.set(delivered.get() + 1));
        session.complete(|| delivered.set(delivered.get() + 1));
        session.fail(|| delivered.set(delivered.get() + 1));

        assert_eq!(delivered.get(), 0);
        assert_eq!(session.state(), SessionState::Cancelled);
    }

    #[test]
    fn test_session_cancel_from_inside_delivery() {
        let session = StreamSession::new();
        session.begin();

        assert!(session.complete(|| {
            assert!(session.cancel());
        }));
        assert_eq!(session.state(), SessionState::Cancelled);
    }

    #[test]
    fn test_session_fail_is_terminal() {
        let session = StreamSession::new();
        session.begin();

        assert!(session.fail(|| {}));
        assert_eq!(session.state(), SessionState::Errored);
        assert!(session.state().is_terminal());
        assert!(!session.cancel());
    }

    #[test]
    fn test_session_cancel_does_not_wait_for_delivery() {
        use std::sync::mpsc;
        use std::sync::Arc;
        use std::thread;
        use std::time::Duration;

        let session = Arc::new(StreamSession::new());
        session.begin();

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let delivering = Arc::clone(&session);
        let deliverer = thread::spawn(move || {
            delivering.deliver(|| {
                entered_tx.send(()).unwrap();
                let _ = release_rx.recv_timeout(Duration::from_secs(5));
            })
        });

        entered_rx.recv().unwrap();
        assert!(session.cancel());
        release_tx.send(()).unwrap();

        assert!(deliverer.join().unwrap());
        assert!(!session.deliver(|| {}));
        assert_eq!(session.state(), SessionState::Cancelled);
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(StreamSession::new().id(), StreamSession::new().id());
    }
}
