use std::io::{BufRead, BufReader};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::Result;
use crate::record::{from_line, Codec, PlainCodec, Record};

/// Subscriber-side handle to a streaming logger.
///
/// Connecting yields the broadcaster's bounded backlog first (when one is
/// configured), followed by the unbounded live tail, with no gap and no
/// duplicate in between. Records arrive as newline-delimited JSON.
///
/// # Examples
///
/// ```no_run
/// use runlog::Subscription;
///
/// let mut subscription = Subscription::connect("127.0.0.1:5557")?;
/// while let Some(entry) = subscription.recv()? {
///     println!("{entry:?}");
/// }
/// # Ok::<(), runlog::Error>(())
/// ```
pub struct Subscription {
    reader: BufReader<TcpStream>,
}

impl Subscription {
    /// Connects to a broadcaster's listening endpoint.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Ok(Self {
            reader: BufReader::new(stream),
        })
    }

    /// Receives the next record, or `None` once the logger closed the stream.
    pub fn recv(&mut self) -> Result<Option<Record>> {
        self.recv_with(&PlainCodec)
    }

    /// Like [`recv`](Subscription::recv), decoding through a custom codec.
    pub fn recv_with(&mut self, codec: &dyn Codec) -> Result<Option<Record>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        from_line(&line, codec).map(Some)
    }

    /// Bounds how long a `recv` call may wait for the next record.
    pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }
}
