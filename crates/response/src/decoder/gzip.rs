//! Gzip decoding as described in [RFC 1952](https://www.rfc-editor.org/rfc/rfc1952).
//!
//! The reusable part of a gzip decoder (inflate window, input buffer, running CRC) lives in
//! [`GzipState`], detached from any source. [`GzipReader`] pairs a state with one response body,
//! and gives the state back to its [`ReaderPool`] when it is released.

use crate::Encoding;
use crate::decoder::inflate::Inflater;
use crate::error::{DecodeError, DecodeInitError};
use crate::pool::ReaderPool;
use crate::utils::ensure;
use flate2::Crc;
use std::fmt;
use std::io;
use std::io::{ErrorKind, Read};
use tracing::{debug, trace};

const MAGIC: [u8; 2] = [0x1f, 0x8b];
const METHOD_DEFLATE: u8 = 8;

const FHCRC: u8 = 1 << 1;
const FEXTRA: u8 = 1 << 2;
const FNAME: u8 = 1 << 3;
const FCOMMENT: u8 = 1 << 4;
const FRESERVED: u8 = 0xe0;

/// The source-independent state of a gzip decoder.
///
/// A state is cheap to [`reset`](GzipState::reset) and expensive to build, which is why
/// [`ReaderPool`] keeps idle ones around.
pub struct GzipState {
    inflater: Inflater,
    crc: Crc,
}

impl GzipState {
    pub(crate) fn new(buffer_size: usize) -> Self {
        Self { inflater: Inflater::new(buffer_size), crc: Crc::new() }
    }

    /// Clears everything left over from the previous source.
    pub(crate) fn reset(&mut self) {
        self.inflater.reset();
        self.crc.reset();
    }

    pub(crate) fn buffer_size(&self) -> usize {
        self.inflater.buffer_size()
    }

    /// Resets the state and reads the first member header from `src`.
    pub(crate) fn begin<R: Read>(&mut self, src: &mut R) -> Result<(), DecodeError> {
        self.reset();
        read_header(&mut self.inflater, src)
    }

    /// Checks the CRC-32 and ISIZE trailer of the member that just ended.
    fn finish_member<R: Read>(&mut self, src: &mut R) -> io::Result<()> {
        let mut trailer = [0u8; 8];
        if !self.inflater.read_exact_framing(src, &mut trailer)? {
            return Err(io::Error::new(ErrorKind::UnexpectedEof, "gzip trailer truncated"));
        }

        let expected_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let expected_size = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);

        if expected_crc != self.crc.sum() {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("gzip crc mismatch, expected {expected_crc:#010x}, actual {:#010x}", self.crc.sum()),
            ));
        }
        if expected_size != self.crc.amount() {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("gzip size mismatch, expected {expected_size}, actual {}", self.crc.amount()),
            ));
        }
        Ok(())
    }

    /// Starts the next member when more input follows a finished one. Returns `false` at the
    /// end of the body.
    fn next_member<R: Read>(&mut self, src: &mut R) -> io::Result<bool> {
        if self.inflater.peek(src, 1)?.is_empty() {
            return Ok(false);
        }

        trace!("reading next gzip member");
        self.inflater.restart();
        self.crc.reset();
        read_header(&mut self.inflater, src)?;
        Ok(true)
    }
}

impl fmt::Debug for GzipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GzipState").field("inflater", &self.inflater).field("crc", &self.crc.sum()).finish()
    }
}

/// Reads the member header, leaving the inflater positioned on the deflate data.
fn read_header<R: Read>(inflater: &mut Inflater, src: &mut R) -> Result<(), DecodeError> {
    let mut header = HeaderReader { inflater, src, crc: Crc::new() };

    let mut fixed = [0u8; 10];
    header.read(&mut fixed)?;

    let magic = [fixed[0], fixed[1]];
    ensure!(magic == MAGIC, DecodeInitError::InvalidGzipMagic { found: magic });

    let method = fixed[2];
    ensure!(method == METHOD_DEFLATE, DecodeInitError::UnsupportedMethod { encoding: Encoding::Gzip, method });

    let flags = fixed[3];
    ensure!(flags & FRESERVED == 0, DecodeInitError::ReservedFlags { flags });

    if flags & FEXTRA != 0 {
        let mut len = [0u8; 2];
        header.read(&mut len)?;
        header.skip(usize::from(u16::from_le_bytes(len)))?;
    }
    if flags & FNAME != 0 {
        header.skip_zero_terminated()?;
    }
    if flags & FCOMMENT != 0 {
        header.skip_zero_terminated()?;
    }
    if flags & FHCRC != 0 {
        // the header crc covers every byte before itself
        let actual = (header.crc.sum() & 0xffff) as u16;
        let mut stored = [0u8; 2];
        header.read(&mut stored)?;
        let expected = u16::from_le_bytes(stored);
        ensure!(expected == actual, DecodeInitError::HeaderChecksum { expected, actual });
    }

    trace!(flags, "gzip header parsed");
    Ok(())
}

struct HeaderReader<'a, R> {
    inflater: &'a mut Inflater,
    src: &'a mut R,
    crc: Crc,
}

impl<R: Read> HeaderReader<'_, R> {
    fn read(&mut self, out: &mut [u8]) -> Result<(), DecodeError> {
        if !self.inflater.read_exact_framing(&mut *self.src, out)? {
            return Err(DecodeInitError::truncated_header(Encoding::Gzip).into());
        }
        self.crc.update(out);
        Ok(())
    }

    fn skip(&mut self, mut len: usize) -> Result<(), DecodeError> {
        let mut scratch = [0u8; 256];
        while len > 0 {
            let n = len.min(scratch.len());
            self.read(&mut scratch[..n])?;
            len -= n;
        }
        Ok(())
    }

    fn skip_zero_terminated(&mut self) -> Result<(), DecodeError> {
        let mut byte = [0u8; 1];
        loop {
            self.read(&mut byte)?;
            if byte[0] == 0 {
                return Ok(());
            }
        }
    }
}

/// A reader decoding a gzip body.
///
/// Multi-member bodies are decoded as one continuous stream. Each member's trailer is verified
/// once its deflate data ends.
pub struct GzipReader<B> {
    state: Option<GzipState>,
    pool: Option<ReaderPool>,
    body: B,
    done: bool,
}

impl<B: Read> GzipReader<B> {
    /// Creates a reader with a freshly allocated state, reading the header eagerly.
    pub(crate) fn new(mut body: B, buffer_size: usize) -> Result<Self, DecodeError> {
        let mut state = GzipState::new(buffer_size);
        read_header(&mut state.inflater, &mut body)?;
        debug!("gzip decoder created");
        Ok(Self { state: Some(state), pool: None, body, done: false })
    }

    /// Creates a reader backed by a state borrowed from `pool`.
    ///
    /// When the header can't be read the state is handed back before the error is returned.
    pub(crate) fn pooled(mut body: B, pool: &ReaderPool) -> Result<Self, DecodeError> {
        let mut state = pool.acquire();
        if let Err(e) = state.begin(&mut body) {
            debug!(cause = %e, "failed to reset pooled gzip decoder");
            pool.release(state);
            return Err(e);
        }
        Ok(Self { state: Some(state), pool: Some(pool.clone()), body, done: false })
    }
}

impl<B> GzipReader<B> {
    /// Returns whether the state came from a [`ReaderPool`] and goes back to it on drop.
    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }
}

impl<B: Read> Read for GzipReader<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(state) = self.state.as_mut() else {
            return Ok(0);
        };

        while !self.done && !buf.is_empty() {
            let inflated = state.inflater.inflate(&mut self.body, buf)?;
            state.crc.update(&buf[..inflated.written]);

            if inflated.stream_end {
                state.finish_member(&mut self.body)?;
                self.done = !state.next_member(&mut self.body)?;
            }

            if inflated.written > 0 {
                return Ok(inflated.written);
            }
        }
        Ok(0)
    }
}

impl<B> Drop for GzipReader<B> {
    fn drop(&mut self) {
        if let (Some(state), Some(pool)) = (self.state.take(), self.pool.as_ref()) {
            pool.release(state);
        }
    }
}

impl<B> fmt::Debug for GzipReader<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GzipReader")
            .field("state", &self.state)
            .field("pooled", &self.pool.is_some())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
