//! Decompressing streams over response bodies.
//!
//! [`open`] is the single factory: it picks a decoder for the resolved [`Encoding`] and, for
//! gzip, optionally borrows the decoder state from a [`ReaderPool`].
//!
//! # Releasing
//!
//! A [`DecodedStream`] owns the raw body for its whole life. Releasing the stream, either
//! through [`DecodedStream::release`] or by dropping it, closes the body for every encoding and
//! returns a pooled gzip state to its pool. Because release consumes the stream, it can only
//! happen once.

mod gzip;
mod inflate;
mod zlib;

pub use gzip::{GzipReader, GzipState};
pub use inflate::DEFAULT_BUFFER_SIZE;
pub(crate) use inflate::MIN_BUFFER_SIZE;
pub use zlib::ZlibReader;

use crate::Encoding;
use crate::error::DecodeError;
use crate::pool::ReaderPool;
use std::fmt;
use std::io;
use std::io::Read;
use tracing::trace;

/// Opens a decoded stream over `body`.
///
/// With `pool` set, gzip bodies are decoded by a state borrowed from the pool; identity and
/// deflate bodies never touch the pool.
///
/// # Errors
///
/// Returns [`DecodeError::Init`] when the compressed framing is invalid or the header is cut
/// short, and [`DecodeError::Io`] when reading the header from `body` fails. The body is
/// dropped in both cases.
pub fn open<B: Read>(body: B, encoding: Encoding, pool: Option<&ReaderPool>) -> Result<DecodedStream<B>, DecodeError> {
    let kind = match (encoding, pool) {
        (Encoding::Identity, _) => Kind::Identity(body),
        (Encoding::Deflate, _) => Kind::Deflate(ZlibReader::new(body, DEFAULT_BUFFER_SIZE)?),
        (Encoding::Gzip, None) => Kind::Gzip(GzipReader::new(body, DEFAULT_BUFFER_SIZE)?),
        (Encoding::Gzip, Some(pool)) => Kind::Gzip(GzipReader::pooled(body, pool)?),
    };

    trace!(%encoding, compressed = encoding.is_compressed(), pooled = pool.is_some(), "opened decoded stream");
    Ok(DecodedStream { kind })
}

/// A readable, decompressed view of a response body.
pub struct DecodedStream<B> {
    kind: Kind<B>,
}

enum Kind<B> {
    Identity(B),
    Deflate(ZlibReader<B>),
    Gzip(GzipReader<B>),
}

impl<B> DecodedStream<B> {
    /// Returns the encoding this stream decodes.
    pub fn encoding(&self) -> Encoding {
        match &self.kind {
            Kind::Identity(_) => Encoding::Identity,
            Kind::Deflate(_) => Encoding::Deflate,
            Kind::Gzip(_) => Encoding::Gzip,
        }
    }

    /// Returns whether the decoder state is borrowed from a [`ReaderPool`].
    pub fn is_pooled(&self) -> bool {
        matches!(&self.kind, Kind::Gzip(reader) if reader.is_pooled())
    }

    /// Releases the stream, closing the body and returning any pooled decoder state.
    ///
    /// Dropping the stream has the same effect.
    pub fn release(self) {
        trace!(encoding = %self.encoding(), "releasing decoded stream");
        drop(self);
    }
}

impl<B: Read> Read for DecodedStream<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.kind {
            Kind::Identity(body) => body.read(buf),
            Kind::Deflate(reader) => reader.read(buf),
            Kind::Gzip(reader) => reader.read(buf),
        }
    }
}

impl<B> fmt::Debug for DecodedStream<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Identity(_) => f.debug_struct("DecodedStream").field("encoding", &Encoding::Identity).finish_non_exhaustive(),
            Kind::Deflate(reader) => f.debug_struct("DecodedStream").field("reader", reader).finish(),
            Kind::Gzip(reader) => f.debug_struct("DecodedStream").field("reader", reader).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeInitError;
    use crate::testing::{TrackedBody, gzip, zlib};

    fn read_all<B: Read>(mut stream: DecodedStream<B>) -> Vec<u8> {
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        stream.release();
        out
    }

    #[test]
    fn test_identity_passthrough() {
        let (body, tracker) = TrackedBody::new(b"plain text".to_vec());
        let stream = open(body, Encoding::Identity, None).unwrap();
        assert_eq!(stream.encoding(), Encoding::Identity);
        assert!(!stream.is_pooled());

        assert_eq!(read_all(stream), b"plain text");
        assert!(tracker.is_closed());
    }

    #[test]
    fn test_gzip_round_trip() {
        let payload = "The quick brown fox jumps over the lazy dog. ".repeat(50);
        let (body, tracker) = TrackedBody::new(gzip(payload.as_bytes()));

        let stream = open(body, Encoding::Gzip, None).unwrap();
        assert_eq!(stream.encoding(), Encoding::Gzip);
        assert_eq!(read_all(stream), payload.as_bytes());
        assert!(tracker.is_closed());
    }

    #[test]
    fn test_deflate_round_trip_closes_body() {
        let (body, tracker) = TrackedBody::new(zlib(b"deflated"));
        let stream = open(body, Encoding::Deflate, None).unwrap();
        assert_eq!(read_all(stream), b"deflated");
        assert!(tracker.is_closed());
    }

    #[test]
    fn test_pooled_gzip_returns_state() {
        let pool = ReaderPool::new();

        let first = gzip(b"pooled");
        let stream = open(&first[..], Encoding::Gzip, Some(&pool)).unwrap();
        assert!(stream.is_pooled());
        assert_eq!(pool.idle(), 0);
        assert_eq!(read_all(stream), b"pooled");
        assert_eq!(pool.idle(), 1);

        // the idle state is reused instead of allocating another one
        let second = gzip(b"again");
        let stream = open(&second[..], Encoding::Gzip, Some(&pool)).unwrap();
        assert_eq!(pool.idle(), 0);
        drop(stream);
        assert_eq!(pool.idle(), 1);
    }

    // inspecting a stream needs no bound on the body type
    fn describe<B>(stream: &DecodedStream<B>) -> (Encoding, bool) {
        (stream.encoding(), stream.is_pooled())
    }

    #[test]
    fn test_describe_stream() {
        let pool = ReaderPool::new();
        let compressed = gzip(b"described");

        let pooled = open(&compressed[..], Encoding::Gzip, Some(&pool)).unwrap();
        assert_eq!(describe(&pooled), (Encoding::Gzip, true));

        let owned = open(&compressed[..], Encoding::Gzip, None).unwrap();
        assert_eq!(describe(&owned), (Encoding::Gzip, false));
        assert!(format!("{owned:?}").contains("pooled: false"));
    }

    #[test]
    fn test_pool_is_ignored_for_other_encodings() {
        let pool = ReaderPool::new();
        let compressed = zlib(b"zlib");
        let stream = open(&compressed[..], Encoding::Deflate, Some(&pool)).unwrap();
        assert!(!stream.is_pooled());
        assert_eq!(read_all(stream), b"zlib");
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_invalid_gzip_is_decode_init_error() {
        for pool in [None, Some(ReaderPool::new())] {
            let (body, tracker) = TrackedBody::new(b"<html>not gzip</html>".to_vec());
            let error = open(body, Encoding::Gzip, pool.as_ref()).unwrap_err();
            assert!(matches!(error, DecodeError::Init { source: DecodeInitError::InvalidGzipMagic { .. } }));
            assert!(tracker.is_closed());

            // a failed reset still hands the state back
            if let Some(pool) = pool {
                assert_eq!(pool.idle(), 1);
            }
        }
    }

    #[test]
    fn test_header_io_error_is_not_init_error() {
        let body = TrackedBody::failing(io::ErrorKind::ConnectionReset);
        let error = open(body, Encoding::Gzip, None).unwrap_err();
        match error {
            DecodeError::Io { source } => assert_eq!(source.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
