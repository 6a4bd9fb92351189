//! Display Scheduler: paced reveal of one session's text.
//!
//! The scheduler owns a [`Pacer`] behind a lock and at most one
//! [`PacingTask`] that ticks it. Every session is tagged with a
//! generation number, bumped by [`DisplayScheduler::reset`] and
//! [`DisplayScheduler::halt`]. A task only touches the pacer while its
//! generation is current, and it checks the generation again right before
//! calling the presentation sink.
//!
//! The sink never runs under the scheduler lock, so `reset` and `halt`
//! never wait on presentation code. Once either returns no new callback
//! from the previous session starts; an update that was already being
//! delivered on the pacing thread may still finish.

use super::ticker::PacingTask;
use crate::pacing::{Pacer, PacingConfig};
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Presentation sink: receives the full revealed-so-far text.
pub type UpdateSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Wrap a closure as an [`UpdateSink`].
pub fn sink<F>(f: F) -> UpdateSink
where
    F: Fn(&str) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Pacer plus whether the current session was halted.
struct Slot {
    pacer: Pacer,
    halted: bool,
}

/// Paced reveal of an append-only text stream.
pub struct DisplayScheduler {
    config: PacingConfig,
    slot: Arc<Mutex<Slot>>,
    /// Current session. Only changed while `slot` is locked.
    generation: Arc<AtomicU64>,
    task: Mutex<Option<PacingTask>>,
}

impl DisplayScheduler {
    /// Create a scheduler with the given pacing configuration.
    pub fn new(config: PacingConfig) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                pacer: Pacer::new(config.clone()),
                halted: false,
            })),
            generation: Arc::new(AtomicU64::new(0)),
            config,
            task: Mutex::new(None),
        }
    }

    /// The pacing configuration.
    pub const fn config(&self) -> &PacingConfig {
        &self.config
    }

    /// Clear all state and stop any running pacing loop.
    pub fn reset(&self) {
        self.begin();
    }

    /// Reset and return the generation of the fresh session.
    pub(crate) fn begin(&self) -> u64 {
        let generation = {
            let mut slot = self.slot.lock();
            slot.pacer.reset();
            slot.halted = false;
            self.bump()
        };
        self.stop_task();
        generation
    }

    /// Stop the pacing loop but keep the text as it is.
    ///
    /// Used when a session is cancelled or fails: whatever was revealed
    /// stays revealed, and nothing more is until the next reset.
    pub fn halt(&self) {
        {
            let mut slot = self.slot.lock();
            slot.halted = true;
            self.bump();
        }
        self.stop_task();
    }

    /// Halt only if `generation` is still the current session.
    pub(crate) fn halt_in(&self, generation: u64) {
        {
            let mut slot = self.slot.lock();
            if self.generation() != generation {
                return;
            }
            slot.halted = true;
            self.bump();
        }
        self.stop_task();
    }

    /// Append a fragment.
    ///
    /// The first fragment of a session starts the pacing loop and wires
    /// `on_update` as its sink. Later calls only grow the buffer.
    pub fn add_chunk(&self, fragment: &str, on_update: &UpdateSink) {
        self.add_chunk_in(self.generation(), fragment, on_update);
    }

    /// Append a fragment on behalf of session `generation`.
    ///
    /// Fragments of a superseded session are dropped.
    pub(crate) fn add_chunk_in(&self, generation: u64, fragment: &str, on_update: &UpdateSink) {
        let mut slot = self.slot.lock();
        if self.generation() != generation {
            return;
        }
        if !slot.pacer.push(fragment, Instant::now()) || slot.halted {
            return;
        }

        let task = self.spawn_task(generation, Arc::clone(on_update));
        drop(slot);

        if let Some(previous) = self.task.lock().replace(task) {
            previous.cancel();
        }
    }

    /// Mark the source complete.
    ///
    /// If pacing has not started yet the whole text is revealed through
    /// `on_update` right away. Otherwise the running loop drains and
    /// delivers the final update itself.
    pub fn complete(&self, on_update: &UpdateSink) {
        self.complete_in(self.generation(), on_update);
    }

    /// Complete session `generation`, if it is still current and running.
    pub(crate) fn complete_in(&self, generation: u64, on_update: &UpdateSink) {
        let text = {
            let mut slot = self.slot.lock();
            if slot.halted || self.generation() != generation {
                return;
            }
            slot.pacer.finish().map(str::to_owned)
        };

        if let Some(text) = text {
            if self.generation() == generation {
                on_update(&text);
            }
        }
    }

    /// Everything received in the current session.
    pub fn full_content(&self) -> String {
        self.slot.lock().pacer.full_content().to_string()
    }

    /// Everything revealed in the current session.
    pub fn displayed_content(&self) -> String {
        self.slot.lock().pacer.displayed_content().to_string()
    }

    /// Whether the received text is complete and fully revealed.
    pub fn is_reveal_complete(&self) -> bool {
        self.slot.lock().pacer.buffer().is_reveal_complete()
    }

    /// Whether a pacing loop is currently alive.
    pub fn is_pacing(&self) -> bool {
        self.task.lock().as_ref().is_some_and(PacingTask::is_running)
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Start a new generation. Callers hold the slot lock.
    fn bump(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    fn spawn_task(&self, generation: u64, on_update: UpdateSink) -> PacingTask {
        let slot = Arc::clone(&self.slot);
        let current = Arc::clone(&self.generation);
        debug!(generation, "starting pacing loop");

        PacingTask::spawn(self.config.tick_interval, move |now| {
            let (update, terminal) = {
                let mut slot = slot.lock();
                if current.load(Ordering::Acquire) != generation {
                    return ControlFlow::Break(());
                }
                let frame = slot.pacer.tick(now);
                (frame.update().map(str::to_owned), frame.is_terminal())
            };

            if let Some(text) = update {
                if current.load(Ordering::Acquire) != generation {
                    return ControlFlow::Break(());
                }
                on_update(&text);
            }

            if terminal {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    fn stop_task(&self) {
        if let Some(task) = self.task.lock().take() {
            task.cancel();
        }
    }
}

impl Default for DisplayScheduler {
    fn default() -> Self {
        Self::new(PacingConfig::default())
    }
}

impl Drop for DisplayScheduler {
    fn drop(&mut self) {
        self.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn fast_config() -> PacingConfig {
        PacingConfig::default()
            .with_frame_interval(Duration::from_millis(1))
            .with_tick_interval(Duration::from_millis(1))
    }

    fn recorder() -> (UpdateSink, Arc<Mutex<Vec<String>>>) {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&updates);
        let on_update = sink(move |text| seen.lock().push(text.to_string()));
        (on_update, updates)
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out waiting");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_scheduler_reveals_everything_once() {
        let scheduler = DisplayScheduler::new(fast_config());
        let (on_update, updates) = recorder();

        for chunk in ["The ", "quick ", "brown fox"] {
            scheduler.add_chunk(chunk, &on_update);
        }
        scheduler.complete(&on_update);

        let full = "The quick brown fox";
        wait_until(|| updates.lock().last().is_some_and(|u| u == full));
        wait_until(|| !scheduler.is_pacing());

        let updates = updates.lock();
        assert_eq!(updates.iter().filter(|u| *u == full).count(), 1);
        for update in updates.iter() {
            assert!(full.starts_with(update.as_str()));
        }
        assert_eq!(scheduler.displayed_content(), scheduler.full_content());
        assert!(scheduler.is_reveal_complete());
    }

    #[test]
    fn test_scheduler_short_response_fast_path() {
        let config = fast_config().with_startup_delay(Duration::from_secs(10));
        let scheduler = DisplayScheduler::new(config);
        let (on_update, updates) = recorder();

        scheduler.add_chunk("hi", &on_update);
        scheduler.complete(&on_update);

        assert_eq!(*updates.lock(), vec!["hi".to_string()]);
        assert_eq!(scheduler.displayed_content(), "hi");
    }

    #[test]
    fn test_scheduler_only_first_sink_is_wired() {
        let config = fast_config().with_startup_delay(Duration::from_millis(20));
        let scheduler = DisplayScheduler::new(config);
        let (first, first_updates) = recorder();
        let (second, second_updates) = recorder();

        scheduler.add_chunk("ab", &first);
        scheduler.add_chunk("cd", &second);
        scheduler.complete(&first);

        wait_until(|| scheduler.is_reveal_complete());
        assert!(second_updates.lock().is_empty());
        assert_eq!(first_updates.lock().last().map(String::as_str), Some("abcd"));
    }

    #[test]
    fn test_scheduler_reset_stops_callbacks() {
        let config = fast_config()
            .with_chars_per_frame(1)
            .with_frame_interval(Duration::from_millis(5));
        let scheduler = DisplayScheduler::new(config);
        let (on_update, updates) = recorder();

        scheduler.add_chunk(&"x".repeat(1000), &on_update);
        wait_until(|| !updates.lock().is_empty());

        scheduler.reset();
        let seen = updates.lock().len();
        thread::sleep(Duration::from_millis(50));

        assert_eq!(updates.lock().len(), seen);
        assert_eq!(scheduler.full_content(), "");
        assert_eq!(scheduler.displayed_content(), "");
        assert!(!scheduler.is_pacing());
    }

    #[test]
    fn test_scheduler_halt_keeps_revealed_text() {
        let config = fast_config()
            .with_chars_per_frame(1)
            .with_frame_interval(Duration::from_millis(5));
        let scheduler = DisplayScheduler::new(config);
        let (on_update, updates) = recorder();

        scheduler.add_chunk(&"y".repeat(1000), &on_update);
        wait_until(|| !updates.lock().is_empty());

        scheduler.halt();
        let shown = scheduler.displayed_content();
        thread::sleep(Duration::from_millis(50));

        assert!(!shown.is_empty());
        assert_eq!(scheduler.displayed_content(), shown);
        assert_eq!(scheduler.full_content().len(), 1000);
    }

    #[test]
    fn test_scheduler_reset_is_idempotent() {
        let scheduler = DisplayScheduler::default();
        scheduler.reset();
        scheduler.reset();
        assert_eq!(scheduler.full_content(), "");
        assert_eq!(scheduler.displayed_content(), "");
    }

    #[test]
    fn test_scheduler_new_session_after_reset() {
        let scheduler = DisplayScheduler::new(fast_config());
        let (on_update, updates) = recorder();

        scheduler.add_chunk("first session text", &on_update);
        scheduler.reset();
        updates.lock().clear();

        scheduler.add_chunk("second", &on_update);
        scheduler.complete(&on_update);
        wait_until(|| scheduler.is_reveal_complete() && !scheduler.is_pacing());

        assert_eq!(updates.lock().last().map(String::as_str), Some("second"));
        assert!(updates.lock().iter().all(|u| "second".starts_with(u.as_str())));
    }

    #[test]
    fn test_scheduler_halt_does_not_wait_on_a_blocked_sink() {
        let config = fast_config().with_chars_per_frame(1);
        let scheduler = Arc::new(DisplayScheduler::new(config));
        let screen = Arc::new(std::sync::Mutex::new(String::new()));
        let shown = Arc::clone(&screen);
        let on_update = sink(move |text| {
            let mut screen = shown.lock().unwrap();
            screen.clear();
            screen.push_str(text);
        });

        scheduler.add_chunk(&"z".repeat(5000), &on_update);
        wait_until(|| !screen.lock().unwrap().is_empty());

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let held = Arc::clone(&screen);
        let halting = Arc::clone(&scheduler);
        let stopper = thread::spawn(move || {
            let _screen = held.lock().unwrap();
            thread::sleep(Duration::from_millis(20));
            halting.halt();
            let _ = done_tx.send(());
        });

        assert!(
            done_rx.recv_timeout(Duration::from_secs(3)).is_ok(),
            "halt blocked behind the sink"
        );
        stopper.join().unwrap();
        thread::sleep(Duration::from_millis(20));

        let settled = screen.lock().unwrap().clone();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(*screen.lock().unwrap(), settled);
        assert!(!scheduler.is_pacing());
    }

    #[test]
    fn test_scheduler_drops_fragments_of_superseded_generation() {
        let scheduler = DisplayScheduler::new(fast_config());
        let (on_update, updates) = recorder();

        let stale = scheduler.begin();
        let current = scheduler.begin();
        scheduler.add_chunk_in(stale, "old", &on_update);
        scheduler.complete_in(stale, &on_update);
        scheduler.halt_in(stale);

        assert_eq!(scheduler.full_content(), "");
        assert!(updates.lock().is_empty());

        scheduler.add_chunk_in(current, "new", &on_update);
        scheduler.complete_in(current, &on_update);
        wait_until(|| scheduler.is_reveal_complete());
        assert_eq!(updates.lock().last().map(String::as_str), Some("new"));
    }

    #[test]
    fn test_scheduler_complete_after_halt_is_silent() {
        let config = fast_config().with_startup_delay(Duration::from_secs(10));
        let scheduler = DisplayScheduler::new(config);
        let (on_update, updates) = recorder();

        scheduler.add_chunk("partial", &on_update);
        scheduler.halt();
        scheduler.complete(&on_update);

        assert!(updates.lock().is_empty());
        assert_eq!(scheduler.displayed_content(), "");
        assert_eq!(scheduler.full_content(), "partial");
    }
}
