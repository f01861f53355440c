//! # Runlog
//!
//! An experiment-logging facility. Callers emit structured records (maps of
//! field -> value) at a steady cadence; the crate:
//!
//! * retains a bounded window of recent records in memory for random access
//! * optionally appends every record durably to a compressed, append-only file
//! * optionally broadcasts every record live to TCP subscribers, with a
//!   bounded replay of recent history for late joiners
//!
//! ## Main Components
//!
//! * `Logger`: the orchestrator, built through `LoggerBuilder`
//! * `History`: bounded in-memory record buffer with FIFO eviction
//! * `Broadcaster`: TCP fan-out with per-subscriber bounded queues
//! * `Appender`: the durable sequential-append boundary (plain or LZ4)
//! * `Subscription`: the subscriber-side client
//!
//! ## Quick Start
//!
//! ```
//! use runlog::{Capacity, Logger, record};
//!
//! let mut logger = Logger::builder()
//!     .capacity(Capacity::Bounded(100))
//!     .build()?;
//!
//! for step in 0..3 {
//!     logger.log(record! { "step": step, "loss": 1.0 / (step + 1) as f64 })?;
//! }
//!
//! // Random access into the retained window, newest last.
//! assert_eq!(logger.get(-1)?["step"], 2);
//! logger.close()?;
//! # Ok::<(), runlog::Error>(())
//! ```
//!
//! Durable output and live streaming are opt-in:
//!
//! ```no_run
//! use runlog::{Capacity, Logger, record};
//!
//! let mut logger = Logger::builder()
//!     .file("metrics.jsonl.lz4")
//!     .stream("127.0.0.1:5557".parse().unwrap())
//!     .stream_backlog(Capacity::Bounded(50))
//!     .build()?;
//! logger.log(record! { "epoch": 1 })?;
//! logger.flush()?;
//! # Ok::<(), runlog::Error>(())
//! ```

pub mod appender;
pub mod broadcast;
pub mod client;
pub mod error;
pub mod formatter;
pub mod history;
pub mod logger;
pub mod reader;
pub mod record;

pub use appender::{Appender, CompressedAppender, PlainAppender};
pub use broadcast::Broadcaster;
pub use client::Subscription;
pub use error::{Error, Result};
pub use formatter::{Formatter, SimpleFormatter};
pub use history::{Capacity, History};
pub use logger::{Logger, LoggerBuilder};
pub use record::{Codec, PlainCodec, Record};

#[doc(hidden)]
pub use serde_json as __json;
