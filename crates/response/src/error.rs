use std::io;
use std::str::Utf8Error;
use thiserror::Error;

use crate::Encoding;

/// Any failure surfaced by [`Response`](crate::Response).
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("decode init error: {source}")]
    DecodeInit {
        #[from]
        source: DecodeInitError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("parse error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("url resolution error: {source}")]
    UrlResolution {
        #[from]
        source: UrlResolutionError,
    },
}

impl ResponseError {
    pub(crate) fn body_consumed() -> Self {
        Self::Io { source: io::Error::other("response body already consumed") }
    }

    /// Returns whether the body's compressed framing was rejected before decoding began.
    pub fn is_decode_init(&self) -> bool {
        matches!(self, Self::DecodeInit { .. })
    }
}

impl From<DecodeError> for ResponseError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::Init { source } => Self::DecodeInit { source },
            DecodeError::Io { source } => Self::Io { source },
        }
    }
}

/// Error raised while opening a decoded stream over a response body.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{source}")]
    Init {
        #[from]
        source: DecodeInitError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl DecodeError {
    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Mid-stream framing problems surface through `Read`, so they are carried as `InvalidData`.
impl From<DecodeError> for io::Error {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::Io { source } => source,
            DecodeError::Init { source } => io::Error::new(io::ErrorKind::InvalidData, source),
        }
    }
}

/// Malformed or unsupported compressed framing, detected while reading the stream header.
#[derive(Debug, Error)]
pub enum DecodeInitError {
    #[error("invalid gzip magic bytes: {found:02x?}")]
    InvalidGzipMagic { found: [u8; 2] },

    #[error("unsupported {encoding} compression method: {method}")]
    UnsupportedMethod { encoding: Encoding, method: u8 },

    #[error("reserved gzip header flags set: {flags:#04x}")]
    ReservedFlags { flags: u8 },

    #[error("gzip header checksum mismatch, expected {expected:#06x}, actual {actual:#06x}")]
    HeaderChecksum { expected: u16, actual: u16 },

    #[error("invalid zlib header: {reason}")]
    InvalidZlibHeader { reason: String },

    #[error("zlib preset dictionary is not supported")]
    PresetDictionary,

    #[error("{encoding} header truncated")]
    TruncatedHeader { encoding: Encoding },
}

impl DecodeInitError {
    pub fn invalid_zlib_header<S: ToString>(str: S) -> Self {
        Self::InvalidZlibHeader { reason: str.to_string() }
    }

    pub fn truncated_header(encoding: Encoding) -> Self {
        Self::TruncatedHeader { encoding }
    }
}

/// The decoded content could not be viewed as text or JSON.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid json body: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("body is not valid utf8: {source}")]
    InvalidText {
        #[from]
        source: Utf8Error,
    },
}

/// The effective URL of a redirect response could not be determined.
#[derive(Debug, Error)]
pub enum UrlResolutionError {
    #[error("redirect response has no location header")]
    MissingLocation,

    #[error("invalid location header: {reason}")]
    InvalidLocation { reason: String },
}

impl UrlResolutionError {
    pub fn invalid_location<S: ToString>(str: S) -> Self {
        Self::InvalidLocation { reason: str.to_string() }
    }
}
