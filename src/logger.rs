use std::io;
use std::net::SocketAddr;
use std::ops::Index;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::appender::{self, Appender};
use crate::broadcast::Broadcaster;
use crate::error::{Error, Result};
use crate::formatter::Formatter;
use crate::history::{Capacity, History};
use crate::reader;
use crate::record::{from_line, to_line, Codec, PlainCodec, Record};

/// The orchestrator: one `log()` call fans a record out to the console
/// formatter, the in-memory history, the durable appender and the
/// broadcaster, in that order.
///
/// The logger exclusively owns all of those resources. Dropping it (or
/// calling [`close`](Logger::close) explicitly) flushes and closes each of
/// them exactly once; subsequent `close` calls are no-ops.
///
/// # Examples
///
/// ```
/// use runlog::{Capacity, Logger, record};
///
/// let mut logger = Logger::builder()
///     .capacity(Capacity::Bounded(100))
///     .build()?;
/// logger.log(record! { "step": 1, "loss": 0.5 })?;
///
/// assert_eq!(logger.len(), 1);
/// assert_eq!(logger.get(-1)?["step"], 1);
/// logger.close()?;
/// # Ok::<(), runlog::Error>(())
/// ```
pub struct Logger {
    history: History,
    appender: Option<Box<dyn Appender>>,
    broadcaster: Option<Broadcaster>,
    formatter: Option<Box<dyn Formatter>>,
    codec: Arc<dyn Codec>,
    dirty: bool,
    closed: bool,
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Logs one record.
    ///
    /// The record is formatted for the console (when a formatter is
    /// configured), serialized exactly once, appended to the in-memory
    /// history, written to the durable file (when configured) and published
    /// to subscribers (when streaming). Formatter failures are reported and
    /// swallowed; everything else on this path propagates to the caller.
    /// When the durable write fails, the record is still present in the
    /// in-memory history, which was appended first.
    pub fn log(&mut self, record: Record) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidState("logger is closed"));
        }
        if let Some(formatter) = &self.formatter {
            let mut out = io::stdout().lock();
            if let Err(error) = formatter.format(&record, &mut out) {
                warn!(%error, "record formatter failed");
            }
        }
        let line = if self.appender.is_some() || self.broadcaster.is_some() {
            Some(to_line(&record, self.codec.as_ref())?)
        } else {
            None
        };
        self.history.push(record);
        if let (Some(appender), Some(line)) = (self.appender.as_mut(), line.as_deref()) {
            appender.write(line.as_bytes())?;
            self.dirty = true;
        }
        if let (Some(broadcaster), Some(line)) = (self.broadcaster.as_ref(), line) {
            broadcaster.publish(Arc::from(line));
        }
        Ok(())
    }

    /// Returns the retained record at a zero-based or negative index.
    pub fn get(&self, index: i64) -> Result<&Record> {
        self.history.get(index)
    }

    /// Number of records currently retained in memory.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Iterates retained records from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.history.iter()
    }

    /// Finalizes pending durable output.
    ///
    /// A no-op when nothing was written since the last flush, so the
    /// compressor's finalize step only runs when there is something to
    /// finalize.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(appender) = self.appender.as_mut() {
            appender.flush_if_dirty()?;
        }
        self.dirty = false;
        Ok(())
    }

    /// Flushes, closes the durable appender and stops the broadcaster.
    ///
    /// Idempotent: the first call does the work and surfaces any error once;
    /// later calls are no-ops. Dropping the logger calls this automatically.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut first_error = None;
        if self.dirty {
            if let Some(appender) = self.appender.as_mut() {
                if let Err(error) = appender.flush_if_dirty() {
                    first_error.get_or_insert(error);
                }
            }
            self.dirty = false;
        }
        if let Some(mut appender) = self.appender.take() {
            if let Err(error) = appender.close() {
                first_error.get_or_insert(error);
            }
        }
        if let Some(mut broadcaster) = self.broadcaster.take() {
            broadcaster.close();
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Re-populates the in-memory history from a durable log file.
    ///
    /// Records are read in their original order and appended subject to the
    /// history's capacity, so only the newest window survives. Lines that
    /// would be evicted immediately are skipped before parsing. Returns the
    /// total number of records in the file.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let lines = reader::read_lines(path.as_ref())?;
        let total = lines.len();
        let keep = match self.history.capacity() {
            Capacity::Bounded(limit) => total.min(limit),
            Capacity::Unbounded => total,
        };
        for line in &lines[total - keep..] {
            let record = from_line(line, self.codec.as_ref())?;
            self.history.push(record);
        }
        Ok(total)
    }

    /// The streaming endpoint's bound address, when streaming is enabled.
    ///
    /// Useful when the logger was configured with port 0.
    pub fn stream_addr(&self) -> Option<SocketAddr> {
        self.broadcaster.as_ref().map(Broadcaster::local_addr)
    }

    /// Number of currently connected stream subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.broadcaster
            .as_ref()
            .map(Broadcaster::session_count)
            .unwrap_or(0)
    }
}

impl Index<i64> for Logger {
    type Output = Record;

    /// Panicking sugar for [`get`](Logger::get), mirroring container
    /// indexing conventions.
    fn index(&self, index: i64) -> &Record {
        match self.history.get(index) {
            Ok(record) => record,
            Err(error) => panic!("{error}"),
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            warn!(%error, "error while closing logger");
        }
    }
}

/// Construction-time configuration for [`Logger`].
///
/// All options are independent: a logger may keep history without a file,
/// stream without history, or any other combination.
pub struct LoggerBuilder {
    capacity: Capacity,
    path: Option<PathBuf>,
    appender: Option<Box<dyn Appender>>,
    stream: Option<SocketAddr>,
    stream_backlog: Capacity,
    formatter: Option<Box<dyn Formatter>>,
    codec: Arc<dyn Codec>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            capacity: Capacity::Bounded(0),
            path: None,
            appender: None,
            stream: None,
            stream_backlog: Capacity::Bounded(0),
            formatter: None,
            codec: Arc::new(PlainCodec),
        }
    }

    /// How many records to retain in memory for indexed access.
    /// Defaults to `Bounded(0)`: records are discarded after the handlers run.
    pub fn capacity(mut self, capacity: impl Into<Capacity>) -> Self {
        self.capacity = capacity.into();
        self
    }

    /// Appends every record to this file. A `.lz4` extension enables
    /// compression; an existing file is appended to, not truncated.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Installs a custom durable appender in place of a file path.
    pub fn appender(mut self, appender: Box<dyn Appender>) -> Self {
        self.appender = Some(appender);
        self
    }

    /// Publishes every record to TCP subscribers on this address.
    pub fn stream(mut self, addr: SocketAddr) -> Self {
        self.stream = Some(addr);
        self
    }

    /// How many recent records to replay to late-joining subscribers.
    /// Only meaningful with [`stream`](LoggerBuilder::stream); defaults to
    /// `Bounded(0)` (new subscribers only see records published after they
    /// joined).
    pub fn stream_backlog(mut self, capacity: impl Into<Capacity>) -> Self {
        self.stream_backlog = capacity.into();
        self
    }

    /// Prints every record to standard output through this formatter.
    pub fn formatter(mut self, formatter: impl Formatter + 'static) -> Self {
        self.formatter = Some(Box::new(formatter));
        self
    }

    /// Installs serialize/deserialize hooks for non-primitive value types.
    pub fn codec(mut self, codec: impl Codec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Opens the configured resources and builds the logger.
    pub fn build(self) -> Result<Logger> {
        let appender = match (self.appender, self.path) {
            (Some(appender), _) => Some(appender),
            (None, Some(path)) => Some(appender::open_path(&path)?),
            (None, None) => None,
        };
        let broadcaster = match self.stream {
            Some(addr) => Some(Broadcaster::bind(addr, self.stream_backlog)?),
            None => None,
        };
        Ok(Logger {
            history: History::new(self.capacity),
            appender,
            broadcaster,
            formatter: self.formatter,
            codec: self.codec,
            dirty: false,
            closed: false,
        })
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
