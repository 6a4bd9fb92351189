//! Actor Model: threads that drive the paced reveal.
//!
//! The pacing state itself is a plain value ([`crate::pacing::Pacer`]). This
//! module wraps it in a [`DisplayScheduler`] that owns one cancellable
//! [`PacingTask`] per session:
//!
//! ```text
//! ┌──────────────┐   add_chunk / complete   ┌──────────────────┐
//! │    Ingest    │ ───────────────────────▶ │ DisplayScheduler │
//! └──────────────┘                          │   Mutex<Pacer>   │
//!                                           └──────────────────┘
//!                                                    ▲ tick
//!                                                    │
//! ┌──────────────┐      on_update(text)     ┌──────────────────┐
//! │ Presentation │ ◀─────────────────────── │   Pacing Task    │
//! └──────────────┘                          └──────────────────┘
//! ```

mod scheduler;
mod ticker;

pub use scheduler::{sink, DisplayScheduler, UpdateSink};
pub use ticker::PacingTask;
