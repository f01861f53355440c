use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use lz4_flex::frame::FrameEncoder;

use crate::error::{Error, Result};

/// File extension that selects compressed output.
pub const COMPRESSED_EXTENSION: &str = "lz4";

/// The durable sequential-append primitive the logger writes through.
///
/// Implementations own the underlying file handle. The contract mirrors a
/// compressed append-only log:
///
/// * [`write`](Appender::write) is called once per serialized record, with
///   the newline terminator already included.
/// * [`flush_if_dirty`](Appender::flush_if_dirty) finalizes whatever was
///   written since the last flush as a durable, decodable segment. It must
///   be a no-op, not an error, when nothing was written in between.
/// * [`close`](Appender::close) is idempotent; calls after the first
///   successful close are no-ops.
///
/// The handler-style injection point also exists for tests: the logger
/// builder accepts any boxed `Appender` in place of a file path.
pub trait Appender: Send {
    /// Appends one serialized record. Returns the number of bytes written.
    fn write(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Finalizes pending output when dirty; no-op when clean.
    fn flush_if_dirty(&mut self) -> Result<()>;

    /// Flushes and releases the underlying handle. Safe to call repeatedly.
    fn close(&mut self) -> Result<()>;
}

/// Opens the appender matching the path's extension.
///
/// A `.lz4` extension selects [`CompressedAppender`]; anything else gets the
/// plain newline-delimited [`PlainAppender`]. Existing files are appended
/// to, never truncated.
pub fn open_path(path: &Path) -> Result<Box<dyn Appender>> {
    let compressed = path
        .extension()
        .map(|ext| ext == COMPRESSED_EXTENSION)
        .unwrap_or(false);
    if compressed {
        Ok(Box::new(CompressedAppender::open(path)?))
    } else {
        Ok(Box::new(PlainAppender::open(path)?))
    }
}

fn open_for_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Writes records to an uncompressed newline-delimited JSON file.
pub struct PlainAppender {
    writer: Option<BufWriter<File>>,
    dirty: bool,
    poisoned: bool,
}

impl PlainAppender {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: Some(BufWriter::new(open_for_append(path)?)),
            dirty: false,
            poisoned: false,
        })
    }
}

impl Appender for PlainAppender {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        if self.poisoned {
            return Err(Error::InvalidState(
                "appender poisoned by an earlier write failure",
            ));
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or(Error::InvalidState("appender is closed"))?;
        // A partial write leaves a truncated line in the buffer; appending
        // another record onto it would glue the two into one malformed line.
        if let Err(error) = writer.write_all(bytes) {
            self.poisoned = true;
            return Err(error.into());
        }
        self.dirty = true;
        Ok(bytes.len())
    }

    fn flush_if_dirty(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or(Error::InvalidState("appender is closed"))?;
        writer.flush()?;
        self.dirty = false;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        self.dirty = false;
        Ok(())
    }
}

enum Compressor<W: Write + Send> {
    /// No frame in progress; the next write starts one.
    Idle(W),
    /// A frame is open and accepting records.
    Encoding(Box<FrameEncoder<W>>),
    /// A write failed mid-record, leaving a truncated line in the open
    /// frame. Appending more records would glue them onto the broken one.
    Poisoned,
    Closed,
}

/// Writes records through an LZ4 frame encoder.
///
/// Each dirty flush finishes the current frame, leaving the output a valid
/// sequence of self-delimiting frames; the next write starts a new frame.
/// Reopening an existing file appends further frames after the ones already
/// on disk. The decode side ([`crate::reader`]) iterates frames to EOF.
///
/// A failed write poisons the appender: the open frame ends in a truncated
/// record, so every later call fails with
/// [`Error::InvalidState`] instead of corrupting subsequent records.
pub struct CompressedAppender<W: Write + Send = File> {
    state: Compressor<W>,
    dirty: bool,
}

impl CompressedAppender<File> {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(open_for_append(path)?))
    }
}

impl<W: Write + Send> CompressedAppender<W> {
    /// Wraps an arbitrary byte sink. File-backed callers go through
    /// [`open`](CompressedAppender::open).
    pub fn new(writer: W) -> Self {
        Self {
            state: Compressor::Idle(writer),
            dirty: false,
        }
    }

    fn finish_frame(encoder: Box<FrameEncoder<W>>) -> Result<W> {
        encoder.finish().map_err(|error| {
            Error::Io(io::Error::new(io::ErrorKind::Other, error))
        })
    }
}

impl<W: Write + Send> Appender for CompressedAppender<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        match std::mem::replace(&mut self.state, Compressor::Closed) {
            Compressor::Idle(writer) => {
                let mut encoder = Box::new(FrameEncoder::new(writer));
                if let Err(error) = encoder.write_all(bytes) {
                    self.state = Compressor::Poisoned;
                    return Err(error.into());
                }
                self.state = Compressor::Encoding(encoder);
            }
            Compressor::Encoding(mut encoder) => {
                if let Err(error) = encoder.write_all(bytes) {
                    self.state = Compressor::Poisoned;
                    return Err(error.into());
                }
                self.state = Compressor::Encoding(encoder);
            }
            Compressor::Poisoned => {
                self.state = Compressor::Poisoned;
                return Err(Error::InvalidState(
                    "appender poisoned by an earlier write failure",
                ));
            }
            Compressor::Closed => {
                return Err(Error::InvalidState("appender is closed"));
            }
        }
        self.dirty = true;
        Ok(bytes.len())
    }

    fn flush_if_dirty(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        match std::mem::replace(&mut self.state, Compressor::Closed) {
            Compressor::Idle(writer) => self.state = Compressor::Idle(writer),
            Compressor::Encoding(encoder) => {
                self.state = Compressor::Idle(Self::finish_frame(encoder)?);
            }
            Compressor::Poisoned => {
                self.state = Compressor::Poisoned;
                return Err(Error::InvalidState(
                    "appender poisoned by an earlier write failure",
                ));
            }
            Compressor::Closed => {
                return Err(Error::InvalidState("appender is closed"));
            }
        }
        self.dirty = false;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, Compressor::Closed) {
            Compressor::Encoding(encoder) => {
                Self::finish_frame(encoder)?;
            }
            // The broken frame is discarded rather than finalized; the sink
            // already refused bytes once and the frame would not parse as a
            // whole record anyway.
            Compressor::Idle(_) | Compressor::Poisoned | Compressor::Closed => {}
        }
        self.dirty = false;
        Ok(())
    }
}
