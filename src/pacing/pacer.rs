//! Pacer: the clock-driven reveal state machine.
//!
//! The pacer never looks at a clock itself. Callers pass the current
//! [`Instant`] into [`Pacer::push`] and [`Pacer::tick`], which keeps every
//! timing decision reproducible in tests. The threaded driver lives in
//! [`crate::actor::DisplayScheduler`].

use super::buffer::DisplayBuffer;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Tunables for the reveal pace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Characters to accumulate before pacing may start.
    pub min_buffer_size: usize,
    /// Characters revealed per frame.
    pub chars_per_frame: usize,
    /// Minimum time between two frames.
    #[serde(with = "crate::config::millis")]
    pub frame_interval: Duration,
    /// Longest time a short first fragment is held back before pacing starts.
    #[serde(with = "crate::config::millis")]
    pub startup_delay: Duration,
    /// Period of the timer that drives the pacing loop.
    #[serde(with = "crate::config::millis")]
    pub tick_interval: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_buffer_size: 10,
            chars_per_frame: 2,
            frame_interval: Duration::from_millis(20),
            startup_delay: Duration::from_millis(50),
            tick_interval: Duration::from_millis(16),
        }
    }
}

impl PacingConfig {
    /// Set the startup threshold in characters.
    #[must_use]
    pub const fn with_min_buffer_size(mut self, chars: usize) -> Self {
        self.min_buffer_size = chars;
        self
    }

    /// Set how many characters each frame reveals.
    #[must_use]
    pub const fn with_chars_per_frame(mut self, chars: usize) -> Self {
        self.chars_per_frame = chars;
        self
    }

    /// Set the minimum time between frames.
    #[must_use]
    pub const fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Set the startup delay for short first fragments.
    #[must_use]
    pub const fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Set the pacing timer period.
    #[must_use]
    pub const fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}

/// Where the pacer is in its session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No text yet.
    Idle,
    /// Text arrived but pacing has not started.
    Armed {
        /// Pacing starts at this instant at the latest.
        deadline: Instant,
    },
    /// Frames are being revealed.
    Running,
    /// The terminal update has been produced.
    Finished,
}

/// Outcome of one pacing tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Pacing has not started yet.
    Waiting,
    /// Too soon after the previous frame; nothing done.
    Throttled,
    /// Everything received is revealed; waiting for more text.
    Idle,
    /// More text was revealed.
    Advanced(&'a str),
    /// The complete text; pacing is over after this.
    Final(&'a str),
    /// Pacing is over and there is nothing left to deliver.
    Finished,
}

impl<'a> Frame<'a> {
    /// Text to hand to the presentation sink, if any.
    pub const fn update(&self) -> Option<&'a str> {
        match *self {
            Self::Advanced(text) | Self::Final(text) => Some(text),
            _ => None,
        }
    }

    /// Whether the pacing loop should stop after this frame.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Final(_) | Self::Finished)
    }
}

/// Reveal state machine for one session.
#[derive(Debug, Clone)]
pub struct Pacer {
    config: PacingConfig,
    buffer: DisplayBuffer,
    phase: Phase,
    /// When the last non-throttled frame ran.
    last_frame: Option<Instant>,
    /// Byte length of the text last handed out for display.
    emitted: usize,
}

impl Pacer {
    /// Create a pacer with the given configuration.
    pub fn new(config: PacingConfig) -> Self {
        Self {
            config,
            buffer: DisplayBuffer::new(),
            phase: Phase::Idle,
            last_frame: None,
            emitted: 0,
        }
    }

    /// The active configuration.
    pub const fn config(&self) -> &PacingConfig {
        &self.config
    }

    /// Everything received so far.
    pub fn full_content(&self) -> &str {
        self.buffer.received()
    }

    /// Everything revealed so far.
    pub fn displayed_content(&self) -> &str {
        self.buffer.revealed()
    }

    /// The underlying buffer.
    pub const fn buffer(&self) -> &DisplayBuffer {
        &self.buffer
    }

    /// Whether frames are being (or have been) revealed.
    pub const fn is_started(&self) -> bool {
        matches!(self.phase, Phase::Running | Phase::Finished)
    }

    /// Whether the terminal update has been produced.
    pub const fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished)
    }

    /// Append a fragment.
    ///
    /// Returns `true` when this is the first fragment of the session, i.e.
    /// when the caller should start driving [`Pacer::tick`].
    pub fn push(&mut self, fragment: &str, now: Instant) -> bool {
        debug_assert!(
            !self.buffer.is_source_complete(),
            "fragment pushed after completion"
        );
        self.buffer.push(fragment);

        match self.phase {
            Phase::Idle => {
                self.phase = if self.threshold_reached() {
                    Phase::Running
                } else {
                    Phase::Armed {
                        deadline: now + self.config.startup_delay,
                    }
                };
                true
            }
            Phase::Armed { .. } if self.threshold_reached() => {
                self.phase = Phase::Running;
                false
            }
            _ => false,
        }
    }

    /// Mark the source complete.
    ///
    /// If pacing never started, everything is revealed at once and the
    /// text is returned for immediate display. A running pacer is left to
    /// drain through [`Pacer::tick`].
    pub fn finish(&mut self) -> Option<&str> {
        self.buffer.mark_source_complete();

        match self.phase {
            Phase::Idle | Phase::Armed { .. } => {
                self.phase = Phase::Finished;
                if self.buffer.is_empty() {
                    return None;
                }
                self.buffer.reveal_all();
                self.emitted = self.buffer.received().len();
                Some(self.buffer.revealed())
            }
            Phase::Running | Phase::Finished => None,
        }
    }

    /// Run one pacing frame at `now`.
    pub fn tick(&mut self, now: Instant) -> Frame<'_> {
        match self.phase {
            Phase::Idle => return Frame::Waiting,
            Phase::Finished => return Frame::Finished,
            Phase::Armed { deadline } => {
                if now < deadline && !self.threshold_reached() {
                    return Frame::Waiting;
                }
                self.phase = Phase::Running;
            }
            Phase::Running => {}
        }

        if let Some(last) = self.last_frame {
            if now.saturating_duration_since(last) < self.config.frame_interval {
                return Frame::Throttled;
            }
        }
        self.last_frame = Some(now);

        let advanced = self.buffer.advance(self.config.chars_per_frame.max(1)) > 0;
        let revealed_len = self.buffer.revealed().len();

        if self.buffer.is_reveal_complete() {
            self.phase = Phase::Finished;
            if self.emitted == revealed_len {
                // The complete text already went out on an earlier frame.
                return Frame::Finished;
            }
            self.emitted = revealed_len;
            return Frame::Final(self.buffer.revealed());
        }

        if advanced {
            self.emitted = revealed_len;
            Frame::Advanced(self.buffer.revealed())
        } else {
            Frame::Idle
        }
    }

    /// Return to a clean state, keeping the configuration.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.phase = Phase::Idle;
        self.last_frame = None;
        self.emitted = 0;
    }

    fn threshold_reached(&self) -> bool {
        self.buffer.received_graphemes() >= self.config.min_buffer_size
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(PacingConfig::default())
    }
}
