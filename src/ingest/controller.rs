//! Ingest Controller: one in-flight response per conversation view.
//!
//! [`IngestController::send`] supersedes whatever session is still live,
//! resets the [`DisplayScheduler`], and spawns a task that reads the new
//! session's stream:
//!
//! - text deltas go to the scheduler, which paces them into
//!   [`StreamObserver::on_delta`];
//! - chart payloads go straight to [`StreamObserver::on_chart_data`];
//! - the completion marker completes the scheduler, then calls
//!   [`StreamObserver::on_done`];
//! - error events and transport failures halt the scheduler and call
//!   [`StreamObserver::on_error`].
//!
//! No controller or scheduler lock is held while an observer runs, so an
//! observer may take its own application locks and the caller of
//! [`IngestController::cancel_stream`] may hold them too. `on_delta` runs on
//! the pacing thread, outside the Tokio runtime: hand a follow-up
//! [`IngestController::send`] to the runtime rather than calling it there.

use super::session::{SessionId, SessionState, StreamSession};
use super::transport::{ChatRequest, ContextId, Transport};
use super::wire::{ChartPayload, FrameDecoder, WireEvent};
use crate::actor::{sink, DisplayScheduler, UpdateSink};
use crate::error::IngestError;
use crate::pacing::PacingConfig;
use futures::StreamExt;
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Receiver of a session's callbacks.
pub trait StreamObserver: Send + Sync + 'static {
    /// Paced text: everything revealed so far.
    fn on_delta(&self, revealed: &str);

    /// The response is complete. `context` is set when the backend minted
    /// a conversation id for this exchange.
    fn on_done(&self, context: Option<ContextId>);

    /// A structured side payload arrived.
    fn on_chart_data(&self, payload: ChartPayload) {
        let _ = payload;
    }

    /// The session failed. Use [`IngestError::notice`] for display.
    fn on_error(&self, error: &IngestError) {
        let _ = error;
    }
}

/// The live session and the task reading its stream.
struct Active {
    session: Arc<StreamSession>,
    task: JoinHandle<()>,
}

/// Owns the single active stream session.
pub struct IngestController {
    transport: Arc<dyn Transport>,
    scheduler: Arc<DisplayScheduler>,
    active: Mutex<Option<Active>>,
}

impl IngestController {
    /// Create a controller with its own scheduler.
    pub fn new(transport: impl Transport, pacing: PacingConfig) -> Self {
        Self::with_scheduler(Arc::new(transport), Arc::new(DisplayScheduler::new(pacing)))
    }

    /// Create a controller around an existing scheduler.
    pub fn with_scheduler(transport: Arc<dyn Transport>, scheduler: Arc<DisplayScheduler>) -> Self {
        Self {
            transport,
            scheduler,
            active: Mutex::new(None),
        }
    }

    /// The scheduler pacing this controller's text.
    pub const fn scheduler(&self) -> &Arc<DisplayScheduler> {
        &self.scheduler
    }

    /// Start a new session, cancelling any live one first.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn send(&self, request: ChatRequest, observer: Arc<dyn StreamObserver>) -> SessionId {
        let session = Arc::new(StreamSession::new());
        let id = session.id();

        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            if previous.session.cancel() {
                info!(previous = %previous.session.id(), next = %id, "superseding live session");
            }
            previous.task.abort();
        }

        let generation = self.scheduler.begin();
        session.begin();
        info!(session = %id, context = ?request.context, mode = ?request.mode, "session started");

        let ingest = SessionIngest {
            session: Arc::clone(&session),
            scheduler: Arc::clone(&self.scheduler),
            generation,
            on_update: {
                let observer = Arc::clone(&observer);
                sink(move |text| observer.on_delta(text))
            },
            observer,
        };
        let task = tokio::spawn(ingest.run(Arc::clone(&self.transport), request));

        *active = Some(Active { session, task });
        id
    }

    /// Cancel the live session, if any.
    ///
    /// Returns `true` if a session was cancelled. Already revealed text is
    /// kept; nothing further is delivered from that session.
    pub fn cancel_stream(&self) -> bool {
        let active = self.active.lock();
        let Some(active) = active.as_ref() else {
            return false;
        };
        if !active.session.cancel() {
            return false;
        }

        active.task.abort();
        self.scheduler.halt();
        info!(session = %active.session.id(), "session cancelled");
        true
    }

    /// State of the most recent session, `Idle` if there was none.
    pub fn state(&self) -> SessionState {
        self.active
            .lock()
            .as_ref()
            .map_or(SessionState::Idle, |a| a.session.state())
    }

    /// Whether a session is currently streaming.
    pub fn is_streaming(&self) -> bool {
        self.state().is_live()
    }

    /// Id of the most recent session.
    pub fn active_session(&self) -> Option<SessionId> {
        self.active.lock().as_ref().map(|a| a.session.id())
    }
}

impl Drop for IngestController {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.session.cancel();
            active.task.abort();
        }
    }
}

/// Everything one session's reader task needs.
struct SessionIngest {
    session: Arc<StreamSession>,
    scheduler: Arc<DisplayScheduler>,
    /// Scheduler generation owned by this session.
    generation: u64,
    observer: Arc<dyn StreamObserver>,
    on_update: UpdateSink,
}

impl SessionIngest {
    async fn run(self, transport: Arc<dyn Transport>, request: ChatRequest) {
        let token = self.session.cancel_token();

        let opened = tokio::select! {
            biased;
            () = token.cancelled() => return,
            opened = transport.open(&request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(err) => return self.fail(err),
        };

        let mut decoder = FrameDecoder::new();
        loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => return,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(bytes)) => {
                    if self.dispatch_all(decoder.feed(&bytes)).is_break() {
                        return;
                    }
                }
                Some(Err(err)) => return self.fail(err),
                None => {
                    if self.dispatch_all(decoder.finish()).is_continue() {
                        self.fail(IngestError::UnexpectedEof);
                    }
                    return;
                }
            }
        }
    }

    fn dispatch_all(&self, events: Vec<WireEvent>) -> ControlFlow<()> {
        for event in events {
            self.dispatch(event)?;
        }
        ControlFlow::Continue(())
    }

    fn dispatch(&self, event: WireEvent) -> ControlFlow<()> {
        let delivered = match event {
            WireEvent::Delta(text) => self
                .session
                .deliver(|| self.scheduler.add_chunk_in(self.generation, &text, &self.on_update)),
            WireEvent::Chart(payload) => self
                .session
                .deliver(|| self.observer.on_chart_data(payload)),
            WireEvent::Done(context) => {
                debug!(session = %self.session.id(), ?context, "completion received");
                self.session.complete(|| {
                    self.scheduler.complete_in(self.generation, &self.on_update);
                    self.observer.on_done(context);
                });
                return ControlFlow::Break(());
            }
            WireEvent::Error(message) => {
                self.fail(IngestError::Remote(message));
                return ControlFlow::Break(());
            }
        };

        if delivered {
            ControlFlow::Continue(())
        } else {
            debug!(session = %self.session.id(), "dropping event for inactive session");
            ControlFlow::Break(())
        }
    }

    fn fail(&self, err: IngestError) {
        self.session.fail(|| {
            warn!(session = %self.session.id(), error = %err, "session failed");
            self.scheduler.halt_in(self.generation);
            self.observer.on_error(&err);
        });
    }
}
