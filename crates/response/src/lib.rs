//! A decompressing, caching decorator over HTTP responses
//!
//! This crate wraps a response received by any blocking HTTP client and takes care of the
//! body: it picks the right decoder from the `Content-Encoding` header, decodes the body at
//! most once, and serves every later view from the cached bytes.
//!
//! # Features
//!
//! - Transparent `gzip` and `deflate` decoding, other encodings pass through untouched
//! - Eager header validation, so broken framing is reported before any data is read
//! - One-time materialization of the decoded body, shared by the text and JSON views
//! - A thread-safe pool of reusable gzip decoder states
//! - Status classification and redirect-aware URL resolution
//!
//! # Example
//!
//! ```
//! use micro_response::Response;
//! use std::io::Write;
//! use url::Url;
//!
//! let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
//! encoder.write_all(br#"{"hello":"world"}"#)?;
//! let body = encoder.finish()?;
//!
//! let inner = http::Response::builder()
//!     .status(200)
//!     .header("Content-Encoding", "gzip")
//!     .body(&body[..])?;
//! let mut response = Response::new(inner, Url::parse("http://example.com/greeting")?);
//!
//! assert!(response.is_ok());
//! assert!(response.is_gzipped());
//! assert_eq!(response.json()?["hello"], "world");
//!
//! // decoded once, served from the cache afterwards
//! assert_eq!(response.text()?, r#"{"hello":"world"}"#);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! - [`encoding`]: classification of the `Content-Encoding` header
//! - [`decoder`]: the decoded stream factory and the gzip/zlib readers
//! - [`pool`]: reuse of gzip decoder states across responses
//! - [`Response`]: the content cache and the views built on it
//!
//! # Errors
//!
//! Every fallible operation returns a [`ResponseError`] (or a [`DecodeError`] from the
//! decoder layer). Errors are never swallowed or replaced with default content, and a failed
//! decode leaves the content cache empty.
//!
//! # Concurrency
//!
//! All operations are blocking and run on the caller's thread. A [`ReaderPool`] may be shared
//! freely between threads, while a [`Response`] is meant to be consumed by one caller at a time.

pub mod decoder;
pub mod encoding;
pub mod pool;

mod error;
mod response;
mod utils;

#[cfg(test)]
mod testing;

pub use decoder::DecodedStream;
pub use encoding::Encoding;
pub use error::DecodeError;
pub use error::DecodeInitError;
pub use error::ParseError;
pub use error::ResponseError;
pub use error::UrlResolutionError;
pub use pool::PoolConfig;
pub use pool::ReaderPool;
pub use response::Response;
