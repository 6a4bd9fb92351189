//! Ingest: one live assistant-response stream at a time.
//!
//! ```text
//! Transport ──bytes──▶ FrameDecoder ──WireEvent──▶ IngestController
//!                                                    │        │
//!                                          Delta ────┘        └──── Chart / Done / Error
//!                                            ▼                          ▼
//!                                    DisplayScheduler              StreamObserver
//! ```
//!
//! - [`Transport`] opens a byte stream for a [`ChatRequest`];
//!   [`HttpTransport`] talks to the chat backend.
//! - [`FrameDecoder`] splits the stream into [`WireEvent`]s.
//! - [`StreamSession`] checks its state before every delivery so cancelled sessions stay silent.
//! - [`IngestController`] enforces the single active session.

mod controller;
mod http;
mod session;
mod transport;
mod wire;

pub use controller::{IngestController, StreamObserver};
pub use http::{HttpConfig, HttpTransport};
pub use session::{SessionId, SessionState, StreamSession};
pub use transport::{ByteStream, ChatMode, ChatRequest, ContextId, Transport};
pub use wire::{ChartPayload, FrameDecoder, WireEvent};
