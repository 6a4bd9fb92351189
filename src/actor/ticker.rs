//! Pacing Task: dedicated thread that drives one session's reveal.
//!
//! The task wakes at a regular interval and hands the current instant to
//! its tick callback until the callback asks to stop or the task is
//! cancelled. Cancellation goes through a channel, so a sleeping task
//! wakes up and exits at once instead of finishing its interval.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::ops::ControlFlow;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::trace;

/// A cancellable, periodically ticking thread.
pub struct PacingTask {
    /// Handle to the pacing thread.
    handle: Option<JoinHandle<()>>,
    /// Cancellation signal.
    cancel_tx: Sender<()>,
}

impl PacingTask {
    /// Spawn a task that calls `on_tick` every `interval`.
    ///
    /// The first tick runs immediately. The task stops when `on_tick`
    /// returns [`ControlFlow::Break`] or when [`PacingTask::cancel`] is
    /// called.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to spawn the pacing thread.
    pub fn spawn<F>(interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(Instant) -> ControlFlow<()> + Send + 'static,
    {
        // One slot is enough: a second cancel has nothing new to say.
        let (cancel_tx, cancel_rx) = bounded(1);

        let handle = thread::Builder::new()
            .name("trickle-pacer".to_string())
            .spawn(move || {
                Self::run_loop(&cancel_rx, interval, &mut on_tick);
            })
            .expect("Failed to spawn pacing thread");

        Self {
            handle: Some(handle),
            cancel_tx,
        }
    }

    /// Ask the task to stop. Safe to call any number of times.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.try_send(());
    }

    /// Whether the thread is still alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the task and wait for its thread to finish.
    pub fn join(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Main pacing loop.
    fn run_loop<F>(cancel_rx: &Receiver<()>, interval: Duration, on_tick: &mut F)
    where
        F: FnMut(Instant) -> ControlFlow<()>,
    {
        let mut frame = 0u64;
        let mut next_tick = Instant::now();
        trace!("pacing task started");

        loop {
            match cancel_rx.recv_deadline(next_tick) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }

            let now = Instant::now();
            if on_tick(now).is_break() {
                break;
            }

            frame += 1;
            next_tick += interval;

            // Behind schedule: skip missed ticks rather than bursting
            if next_tick < now {
                next_tick = now + interval;
            }
        }

        trace!(frames = frame, "pacing task stopped");
    }
}

impl Drop for PacingTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_pacing_task_ticks_until_break() {
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&ticks);

        let task = PacingTask::spawn(Duration::from_millis(1), move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) + 1 >= 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        task.join();
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_pacing_task_cancel() {
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&ticks);

        let task = PacingTask::spawn(Duration::from_millis(5), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        });

        thread::sleep(Duration::from_millis(20));
        task.cancel();
        task.cancel();
        thread::sleep(Duration::from_millis(100));
        assert!(!task.is_running());

        let seen = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
        task.join();
    }
}
