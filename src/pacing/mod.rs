//! Pacing: turn an append-only text buffer into a smooth, bounded-rate reveal.
//!
//! Network delivery is bursty. A response may arrive as one large fragment
//! or as hundreds of tiny ones. This module decouples "bytes received" from
//! "characters shown":
//!
//! - [`DisplayBuffer`] holds the received text and the revealed prefix.
//! - [`Pacer`] decides when pacing starts and how far each frame reveals.
//!
//! Both are plain values driven by explicit instants. Threading lives in
//! [`crate::actor`].
//!
//! # Example
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use trickle::pacing::{Frame, Pacer, PacingConfig};
//!
//! let t0 = Instant::now();
//! let mut pacer = Pacer::new(PacingConfig::default());
//! pacer.push("Hello, world", t0);
//! assert_eq!(pacer.tick(t0), Frame::Advanced("He"));
//! assert_eq!(pacer.tick(t0 + Duration::from_millis(20)), Frame::Advanced("Hell"));
//! ```

mod buffer;
mod pacer;

pub use buffer::DisplayBuffer;
pub use pacer::{Frame, Pacer, PacingConfig};
