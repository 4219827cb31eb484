//! Buffered raw inflate state behind the poolable gzip decoder.
//!
//! The state owns the input buffer and the `flate2` decompressor but never the source itself,
//! which lets a single instance be reset and driven over a different body each time.
//! `flate2::read::GzDecoder` can't be reset onto a new source, so gzip framing is read here and
//! only the deflate payload is handed to `Decompress`.

use flate2::{Decompress, FlushDecompress, Status};
use std::fmt;
use std::io;
use std::io::{ErrorKind, Read};
use tracing::trace;

/// The default size of the input buffer each inflater reads the compressed body into.
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Input buffers smaller than this are rounded up, so a header can always be peeked in one piece.
pub(crate) const MIN_BUFFER_SIZE: usize = 512;

pub(crate) struct Inflater {
    decompress: Decompress,
    buf: Box<[u8]>,
    /// next unread byte in `buf`
    pos: usize,
    /// end of valid data in `buf`
    end: usize,
}

/// Outcome of a single [`Inflater::inflate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Inflated {
    pub(crate) written: usize,
    pub(crate) stream_end: bool,
}

impl Inflater {
    pub(crate) fn new(buffer_size: usize) -> Self {
        let buffer_size = buffer_size.max(MIN_BUFFER_SIZE);
        Self {
            decompress: Decompress::new(false),
            buf: vec![0u8; buffer_size].into_boxed_slice(),
            pos: 0,
            end: 0,
        }
    }

    /// Drops any buffered input and returns the decompressor to its initial state.
    pub(crate) fn reset(&mut self) {
        self.decompress.reset(false);
        self.pos = 0;
        self.end = 0;
    }

    /// Resets only the decompressor, keeping buffered input, so the next stream in the same
    /// body can be inflated.
    pub(crate) fn restart(&mut self) {
        self.decompress.reset(false);
    }

    pub(crate) fn buffer_size(&self) -> usize {
        self.buf.len()
    }

    fn buffered(&self) -> usize {
        self.end - self.pos
    }

    /// Refills the buffer when it is drained. Returns the number of buffered bytes, zero on EOF.
    fn fill<R: Read>(&mut self, src: &mut R) -> io::Result<usize> {
        if self.pos == self.end {
            self.pos = 0;
            self.end = read_retrying(src, &mut self.buf)?;
        }
        Ok(self.buffered())
    }

    /// Returns up to `n` buffered bytes without consuming them, reading from `src` until `n`
    /// bytes are available or the source is exhausted.
    pub(crate) fn peek<R: Read>(&mut self, src: &mut R, n: usize) -> io::Result<&[u8]> {
        debug_assert!(n <= self.buf.len());

        if self.buffered() < n {
            self.buf.copy_within(self.pos..self.end, 0);
            self.end -= self.pos;
            self.pos = 0;

            while self.end < n {
                let read = read_retrying(src, &mut self.buf[self.end..])?;
                if read == 0 {
                    break;
                }
                self.end += read;
            }
        }

        let available = self.buffered().min(n);
        Ok(&self.buf[self.pos..self.pos + available])
    }

    pub(crate) fn consume(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.end);
    }

    /// Fills `out` with bytes that are not part of the compressed stream (headers and
    /// trailers). Returns `Ok(false)` when the source ends before `out` is full.
    pub(crate) fn read_exact_framing<R: Read>(&mut self, src: &mut R, out: &mut [u8]) -> io::Result<bool> {
        let mut filled = 0;
        while filled < out.len() {
            let available = self.fill(src)?;
            if available == 0 {
                return Ok(false);
            }

            let len = available.min(out.len() - filled);
            out[filled..filled + len].copy_from_slice(&self.buf[self.pos..self.pos + len]);
            self.consume(len);
            filled += len;
        }
        Ok(true)
    }

    /// Inflates buffered input from `src` into `dst`.
    ///
    /// Input following the end of the compressed stream stays buffered, ready for a trailer to
    /// be read through [`Inflater::read_exact_framing`].
    pub(crate) fn inflate<R: Read>(&mut self, src: &mut R, dst: &mut [u8]) -> io::Result<Inflated> {
        if dst.is_empty() {
            return Ok(Inflated { written: 0, stream_end: false });
        }

        loop {
            let eof = self.fill(src)? == 0;
            let flush = if eof { FlushDecompress::Finish } else { FlushDecompress::None };

            let before_in = self.decompress.total_in();
            let before_out = self.decompress.total_out();

            let input = &self.buf[self.pos..self.end];
            let status = self
                .decompress
                .decompress(input, dst, flush)
                .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;

            let consumed = (self.decompress.total_in() - before_in) as usize;
            let written = (self.decompress.total_out() - before_out) as usize;
            self.consume(consumed);

            match status {
                Status::StreamEnd => {
                    trace!(total_in = self.decompress.total_in(), total_out = self.decompress.total_out(), "inflate stream end");
                    return Ok(Inflated { written, stream_end: true });
                }
                Status::Ok | Status::BufError if written == 0 && eof => {
                    return Err(io::Error::new(ErrorKind::UnexpectedEof, "compressed stream truncated"));
                }
                Status::Ok | Status::BufError if written == 0 => continue,
                Status::Ok | Status::BufError => return Ok(Inflated { written, stream_end: false }),
            }
        }
    }
}

impl fmt::Debug for Inflater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inflater")
            .field("buffer_size", &self.buf.len())
            .field("buffered", &self.buffered())
            .field("total_in", &self.decompress.total_in())
            .field("total_out", &self.decompress.total_out())
            .finish()
    }
}

fn read_retrying<R: Read>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match src.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::DeflateEncoder;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut src: &[u8] = b"abcdef";
        let mut inflater = Inflater::new(0);

        assert_eq!(inflater.peek(&mut src, 2).unwrap(), b"ab");
        assert_eq!(inflater.peek(&mut src, 3).unwrap(), b"abc");

        let mut out = [0u8; 4];
        assert!(inflater.read_exact_framing(&mut src, &mut out).unwrap());
        assert_eq!(&out, b"abcd");
    }

    #[test]
    fn test_peek_across_short_reads() {
        // a reader handing out a single byte per call
        struct OneByte<'a>(&'a [u8]);
        impl Read for OneByte<'_> {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0.is_empty() || buf.is_empty() {
                    return Ok(0);
                }
                buf[0] = self.0[0];
                self.0 = &self.0[1..];
                Ok(1)
            }
        }

        let mut src = OneByte(b"xyz");
        let mut inflater = Inflater::new(0);
        assert_eq!(inflater.peek(&mut src, 2).unwrap(), b"xy");
        inflater.consume(1);
        assert_eq!(inflater.peek(&mut src, 2).unwrap(), b"yz");
        inflater.consume(2);
        assert!(inflater.peek(&mut src, 2).unwrap().is_empty());
    }

    #[test]
    fn test_read_exact_framing_truncated() {
        let mut src: &[u8] = b"abc";
        let mut inflater = Inflater::new(0);
        let mut out = [0u8; 8];
        assert!(!inflater.read_exact_framing(&mut src, &mut out).unwrap());
    }

    fn inflate_all(inflater: &mut Inflater, mut src: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; 64 * 1024];
        let mut total = 0;
        loop {
            let inflated = inflater.inflate(&mut src, &mut out[total..]).unwrap();
            total += inflated.written;
            if inflated.stream_end {
                break;
            }
        }
        out.truncate(total);
        out
    }

    #[test]
    fn test_inflate_raw() {
        let compressed = deflate(b"hello inflater");
        let mut inflater = Inflater::new(0);
        assert_eq!(inflate_all(&mut inflater, &compressed), b"hello inflater");
    }

    #[test]
    fn test_inflate_truncated() {
        let compressed = deflate(&[7u8; 4096]);
        let mut src = &compressed[..compressed.len() / 2];
        let mut inflater = Inflater::new(0);

        let mut out = vec![0u8; 8192];
        let error = loop {
            match inflater.inflate(&mut src, &mut out) {
                Ok(inflated) => assert!(!inflated.stream_end),
                Err(e) => break e,
            }
        };
        assert_eq!(error.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_reset_reuses_state() {
        let mut inflater = Inflater::new(0);

        for payload in [&b"first"[..], &b"second payload"[..]] {
            inflater.reset();
            assert_eq!(inflate_all(&mut inflater, &deflate(payload)), payload);
        }
    }
}
