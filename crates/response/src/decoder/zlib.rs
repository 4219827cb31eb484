//! Decoder for `Content-Encoding: deflate`, which carries a zlib stream
//! ([RFC 1950](https://www.rfc-editor.org/rfc/rfc1950)).

use crate::Encoding;
use crate::decoder::inflate::MIN_BUFFER_SIZE;
use crate::error::{DecodeError, DecodeInitError};
use crate::utils::ensure;
use flate2::read::ZlibDecoder;
use std::fmt;
use std::io;
use std::io::{Chain, Cursor, ErrorKind, Read};
use tracing::debug;

const METHOD_DEFLATE: u8 = 8;
const MAX_WINDOW_BITS: u8 = 7;
const FDICT: u8 = 1 << 5;

/// A reader decoding a zlib body with a dedicated, never pooled, `flate2` decoder.
///
/// The header bytes are checked up front and then replayed in front of the body, so the
/// decoder sees the complete stream and verifies the Adler-32 trailer itself.
pub struct ZlibReader<B> {
    decoder: ZlibDecoder<Chain<Cursor<[u8; 2]>, B>>,
}

impl<B: Read> ZlibReader<B> {
    /// Creates the reader, validating the two byte zlib header before any data is inflated.
    pub(crate) fn new(mut body: B, buffer_size: usize) -> Result<Self, DecodeError> {
        let mut header = [0u8; 2];
        let read = read_header(&mut body, &mut header)?;
        ensure!(read == header.len(), DecodeInitError::truncated_header(Encoding::Deflate));
        check_header(header[0], header[1])?;

        let buf = vec![0u8; buffer_size.max(MIN_BUFFER_SIZE)];
        debug!("deflate decoder created");
        Ok(Self { decoder: ZlibDecoder::new_with_buf(Cursor::new(header).chain(body), buf) })
    }
}

/// Reads until `header` is full or the body ends, returning the number of bytes read.
fn read_header<B: Read>(body: &mut B, header: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < header.len() {
        match body.read(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Validates CMF and FLG.
fn check_header(cmf: u8, flg: u8) -> Result<(), DecodeInitError> {
    let method = cmf & 0x0f;
    ensure!(method == METHOD_DEFLATE, DecodeInitError::UnsupportedMethod { encoding: Encoding::Deflate, method });

    let window_bits = cmf >> 4;
    ensure!(
        window_bits <= MAX_WINDOW_BITS,
        DecodeInitError::invalid_zlib_header(format!("window size 2^{} exceeds 32K", window_bits + 8))
    );

    ensure!(
        ((u16::from(cmf) << 8) | u16::from(flg)) % 31 == 0,
        DecodeInitError::invalid_zlib_header(format!("header check failed for {cmf:#04x} {flg:#04x}"))
    );

    ensure!(flg & FDICT == 0, DecodeInitError::PresetDictionary);
    Ok(())
}

impl<B: Read> Read for ZlibReader<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}

impl<B> fmt::Debug for ZlibReader<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZlibReader")
            .field("total_in", &self.decoder.total_in())
            .field("total_out", &self.decoder.total_out())
            .finish_non_exhaustive()
    }
}
