//! # Trickle
//!
//! Paced token-stream display for AI chat clients.
//!
//! An assistant's answer arrives as an irregular burst of text fragments.
//! Trickle reveals it at a smooth, bounded rate instead, independent of
//! network jitter, while keeping fragments in order and making sure a new
//! request cleanly cancels the previous one.
//!
//! ## Core Concepts
//!
//! - **Pacing**: a [`Pacer`] reveals a few characters per frame from an
//!   append-only [`DisplayBuffer`], after a short bounded startup delay
//! - **Scheduler**: [`DisplayScheduler`] drives the pacer from a single
//!   cancellable thread per session
//! - **Ingest**: [`IngestController`] reads the SSE stream, routes text to the
//!   scheduler and side payloads straight to the observer
//! - **One active session**: starting a request supersedes the previous one;
//!   late events from cancelled sessions are dropped
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trickle::{ChatRequest, Config, HttpTransport, IngestController};
//!
//! let config = Config::from_env();
//! let transport = HttpTransport::new(&config.http)?;
//! let controller = IngestController::new(transport, config.pacing);
//!
//! controller.send(ChatRequest::new("Hello!"), Arc::new(MyObserver));
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod actor;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pacing;

// Re-exports for convenience
pub use actor::{sink, DisplayScheduler, PacingTask, UpdateSink};
pub use config::Config;
pub use error::{IngestError, Notice, Result};
pub use ingest::{
    ChartPayload, ChatMode, ChatRequest, ContextId, HttpConfig, HttpTransport, IngestController,
    SessionId, SessionState, StreamObserver, Transport,
};
pub use pacing::{DisplayBuffer, Frame, Pacer, PacingConfig};
