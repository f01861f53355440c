use std::collections::VecDeque;
use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::history::Capacity;

/// Queue slots reserved for live records on top of the backlog snapshot.
/// A subscriber that falls this far behind its socket is disconnected.
const LIVE_QUEUE_SLACK: usize = 256;

/// Fans every published record out, in publication order, to all connected
/// TCP subscribers.
///
/// The broadcaster owns a bounded backlog of the most recently published
/// lines, sized independently of the logger's in-memory history. A subscriber
/// moves through `Connecting -> ReplayingBacklog -> Live -> Closed`: on
/// accept, the backlog snapshot is taken and the session registered under a
/// single lock, so a record published concurrently lands either in the
/// snapshot or behind it in the session queue, never in both and never in
/// neither. With a zero-capacity backlog the replay phase is empty and the
/// session is live immediately.
///
/// Each session drains its own bounded queue on a dedicated writer thread.
/// `publish` only ever does a non-blocking enqueue: a subscriber whose queue
/// is full is disconnected rather than allowed to stall the producer.
pub struct Broadcaster {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    accept_handle: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<State>,
    shutdown: AtomicBool,
}

struct State {
    backlog: VecDeque<Arc<str>>,
    backlog_capacity: Capacity,
    sessions: Vec<Session>,
    next_session: u64,
}

/// Producer-side handle to one connected subscriber.
struct Session {
    id: u64,
    queue: SyncSender<Arc<str>>,
}

impl Broadcaster {
    /// Binds the listening endpoint and starts the accept loop.
    ///
    /// Use port 0 to bind an ephemeral port; the chosen address is available
    /// through [`local_addr`](Broadcaster::local_addr).
    pub fn bind(addr: SocketAddr, backlog_capacity: Capacity) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                backlog: VecDeque::new(),
                backlog_capacity,
                sessions: Vec::new(),
                next_session: 0,
            }),
            shutdown: AtomicBool::new(false),
        });
        let accept_shared = Arc::clone(&shared);
        let accept_handle = thread::Builder::new()
            .name("runlog-accept".into())
            .spawn(move || accept_loop(listener, accept_shared))?;
        debug!(%local_addr, "broadcaster listening");
        Ok(Self {
            shared,
            local_addr,
            accept_handle: Some(accept_handle),
        })
    }

    /// The address subscribers connect to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Appends the line to the backlog and enqueues it to every live session.
    ///
    /// Never blocks on subscriber I/O. Sessions that cannot keep up or whose
    /// writer already went away are dropped here.
    pub fn publish(&self, line: Arc<str>) {
        let mut state = self.shared.state.lock();
        match state.backlog_capacity {
            Capacity::Bounded(0) => {}
            Capacity::Bounded(limit) => {
                if state.backlog.len() >= limit {
                    state.backlog.pop_front();
                }
                state.backlog.push_back(Arc::clone(&line));
            }
            Capacity::Unbounded => state.backlog.push_back(Arc::clone(&line)),
        }
        state.sessions.retain(|session| {
            match session.queue.try_send(Arc::clone(&line)) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(session = session.id, "subscriber too slow, dropping");
                    false
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!(session = session.id, "subscriber disconnected");
                    false
                }
            }
        });
    }

    /// Number of currently registered subscriber sessions.
    pub fn session_count(&self) -> usize {
        self.shared.state.lock().sessions.len()
    }

    /// Stops accepting connections and releases all live sessions.
    ///
    /// Writer threads finish whatever is already queued, then exit; replays
    /// still in flight are truncated at best effort.
    pub fn close(&mut self) {
        if self.shared.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.state.lock().sessions.clear();
        // The accept loop is parked in accept(); poke it so it can observe
        // the shutdown flag.
        let _ = TcpStream::connect(self.local_addr);
        if let Some(handle) = self.accept_handle.take() {
            let _ = handle.join();
        }
        debug!("broadcaster closed");
    }
}

impl Drop for Broadcaster {
    fn drop(&mut self) {
        self.close();
    }
}

fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        let stream = match listener.accept() {
            Ok((stream, _)) => stream,
            Err(error) => {
                if shared.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                warn!(%error, "accept failed");
                continue;
            }
        };
        if shared.shutdown.load(Ordering::SeqCst) {
            break;
        }
        if let Err(error) = register_session(stream, &shared) {
            warn!(%error, "could not register subscriber");
        }
    }
}

/// Snapshots the backlog into a fresh session queue and registers the
/// session, all under one critical section with respect to `publish`.
fn register_session(stream: TcpStream, shared: &Arc<Shared>) -> std::io::Result<()> {
    stream.set_nodelay(true)?;
    let mut state = shared.state.lock();
    // Sized so the entire snapshot fits without blocking.
    let (sender, receiver) = sync_channel(state.backlog.len() + LIVE_QUEUE_SLACK);
    for line in &state.backlog {
        // Cannot fail: the queue was sized for the whole snapshot.
        let _ = sender.try_send(Arc::clone(line));
    }
    let id = state.next_session;
    state.next_session += 1;
    state.sessions.push(Session { id, queue: sender });
    drop(state);

    debug!(session = id, "subscriber connected");
    let spawned = thread::Builder::new()
        .name(format!("runlog-sub-{id}"))
        .spawn(move || deliver(stream, receiver, id));
    if let Err(error) = spawned {
        shared.state.lock().sessions.retain(|session| session.id != id);
        return Err(error);
    }
    Ok(())
}

/// Per-session writer loop: drains the queue into the socket until either
/// end goes away.
fn deliver(mut stream: TcpStream, queue: Receiver<Arc<str>>, id: u64) {
    while let Ok(line) = queue.recv() {
        if stream.write_all(line.as_bytes()).is_err() {
            break;
        }
    }
    debug!(session = id, "subscriber session closed");
}
