//! Fixtures shared by the unit tests.

use flate2::Compression;
use flate2::write::{GzEncoder, ZlibEncoder};
use std::io;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub(crate) fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub(crate) fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Observes reads and closing of a [`TrackedBody`] after it was moved away.
#[derive(Debug, Default)]
pub(crate) struct Tracker {
    reads: AtomicUsize,
    closed: AtomicBool,
}

impl Tracker {
    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A body counting every `read` call and flagging when it is dropped.
#[derive(Debug)]
pub(crate) struct TrackedBody {
    content: Result<Cursor<Vec<u8>>, io::ErrorKind>,
    tracker: Arc<Tracker>,
}

impl TrackedBody {
    pub(crate) fn new(content: Vec<u8>) -> (Self, Arc<Tracker>) {
        let tracker = Arc::new(Tracker::default());
        (Self { content: Ok(Cursor::new(content)), tracker: Arc::clone(&tracker) }, tracker)
    }

    /// A body whose every read fails with `kind`.
    pub(crate) fn failing(kind: io::ErrorKind) -> Self {
        Self { content: Err(kind), tracker: Arc::default() }
    }
}

impl Read for TrackedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.tracker.reads.fetch_add(1, Ordering::SeqCst);
        match &mut self.content {
            Ok(cursor) => cursor.read(buf),
            Err(kind) => Err(io::Error::new(*kind, "body read failed")),
        }
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        self.tracker.closed.store(true, Ordering::SeqCst);
    }
}
