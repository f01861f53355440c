use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use runlog::{record, Appender, Error, Logger, Result};

/// Appender double that records every interaction, in place of a real file.
struct RecordingAppender {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    flushes: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl RecordingAppender {
    fn new() -> (
        Self,
        Arc<Mutex<Vec<Vec<u8>>>>,
        Arc<AtomicUsize>,
        Arc<AtomicUsize>,
    ) {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let flushes = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));
        (
            Self {
                writes: writes.clone(),
                flushes: flushes.clone(),
                closes: closes.clone(),
            },
            writes,
            flushes,
            closes,
        )
    }
}

impl Appender for RecordingAppender {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        self.writes.lock().unwrap().push(bytes.to_vec());
        Ok(bytes.len())
    }

    fn flush_if_dirty(&mut self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_capacity_two_scenario() {
    let mut logger = Logger::builder().capacity(2usize).build().unwrap();
    logger.log(record! { "name": "a" }).unwrap();
    logger.log(record! { "name": "b" }).unwrap();
    logger.log(record! { "name": "c" }).unwrap();

    assert_eq!(logger.len(), 2);
    assert_eq!(logger.get(-1).unwrap()["name"], "c");
    assert_eq!(logger.get(0).unwrap()["name"], "b");
    assert!(
        matches!(logger.get(2), Err(Error::OutOfRange { .. })),
        "the evicted record must be unreachable"
    );
}

#[test]
fn test_index_sugar() {
    let mut logger = Logger::builder().capacity(4usize).build().unwrap();
    logger.log(record! { "step": 1 }).unwrap();
    logger.log(record! { "step": 2 }).unwrap();

    assert_eq!(logger[-1]["step"], 2);
    assert_eq!(logger[0]["step"], 1);
}

#[test]
#[should_panic]
fn test_index_sugar_panics_out_of_range() {
    let logger = Logger::builder().capacity(4usize).build().unwrap();
    let _ = &logger[0];
}

#[test]
fn test_default_capacity_discards() {
    let mut logger = Logger::builder().build().unwrap();
    for i in 0..5 {
        logger.log(record! { "i": i }).unwrap();
    }

    assert_eq!(logger.len(), 0);
    assert!(logger.get(0).is_err());
}

#[test]
fn test_one_write_per_record_newline_terminated() {
    let (appender, writes, _, _) = RecordingAppender::new();
    let mut logger = Logger::builder().appender(Box::new(appender)).build().unwrap();
    logger.log(record! { "i": 1 }).unwrap();
    logger.log(record! { "i": 2 }).unwrap();

    let writes = writes.lock().unwrap();
    assert_eq!(writes.len(), 2, "exactly one write call per record");
    for bytes in writes.iter() {
        assert_eq!(bytes.last(), Some(&b'\n'), "records are newline-terminated");
    }
}

#[test]
fn test_flush_only_when_dirty() {
    let (appender, _, flushes, _) = RecordingAppender::new();
    let mut logger = Logger::builder().appender(Box::new(appender)).build().unwrap();

    // Nothing written yet: flushing must not reach the appender.
    logger.flush().unwrap();
    assert_eq!(flushes.load(Ordering::SeqCst), 0);

    logger.log(record! { "i": 1 }).unwrap();
    logger.flush().unwrap();
    assert_eq!(flushes.load(Ordering::SeqCst), 1);

    // Clean again: still exactly one underlying flush.
    logger.flush().unwrap();
    assert_eq!(flushes.load(Ordering::SeqCst), 1);

    logger.log(record! { "i": 2 }).unwrap();
    logger.flush().unwrap();
    assert_eq!(flushes.load(Ordering::SeqCst), 2);
}

#[test]
fn test_close_is_idempotent() {
    let (appender, _, _, closes) = RecordingAppender::new();
    let mut logger = Logger::builder().appender(Box::new(appender)).build().unwrap();
    logger.log(record! { "i": 1 }).unwrap();

    logger.close().unwrap();
    logger.close().unwrap();
    logger.close().unwrap();

    assert_eq!(closes.load(Ordering::SeqCst), 1, "close must run exactly once");
}

#[test]
fn test_log_after_close_fails() {
    let mut logger = Logger::builder().capacity(2usize).build().unwrap();
    logger.close().unwrap();

    assert!(matches!(
        logger.log(record! { "i": 1 }),
        Err(Error::InvalidState(_))
    ));
}

#[test]
fn test_drop_closes_exactly_once() {
    let (appender, _, flushes, closes) = RecordingAppender::new();
    {
        let mut logger = Logger::builder().appender(Box::new(appender)).build().unwrap();
        logger.log(record! { "i": 1 }).unwrap();
    }

    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(flushes.load(Ordering::SeqCst), 1, "drop flushes pending output");
}

#[test]
fn test_explicit_close_then_drop_does_not_reclose() {
    let (appender, _, _, closes) = RecordingAppender::new();
    {
        let mut logger = Logger::builder().appender(Box::new(appender)).build().unwrap();
        logger.close().unwrap();
    }

    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_history_still_appended_when_durable_write_fails() {
    struct FailingAppender;
    impl Appender for FailingAppender {
        fn write(&mut self, _bytes: &[u8]) -> Result<usize> {
            Err(Error::InvalidState("write always fails"))
        }
        fn flush_if_dirty(&mut self) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    let mut logger = Logger::builder()
        .capacity(4usize)
        .appender(Box::new(FailingAppender))
        .build()
        .unwrap();

    assert!(logger.log(record! { "i": 1 }).is_err());
    // The in-memory append happens before the durable step and survives it.
    assert_eq!(logger.len(), 1);
    assert_eq!(logger.get(0).unwrap()["i"], 1);
}
