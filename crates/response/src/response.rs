//! The response decorator.
//!
//! [`Response`] wraps an [`http::Response`] whose body is a blocking [`Read`] stream, together
//! with the URL of the request that produced it. The body can be consumed once, either decoded
//! through [`Response::content`] (and the views built on it) or untouched through
//! [`Response::read_raw_body`].

use crate::decoder;
use crate::decoder::DecodedStream;
use crate::error::{ParseError, ResponseError, UrlResolutionError};
use crate::{Encoding, ReaderPool};
use bytes::Bytes;
use http::header::LOCATION;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::io::Read;
use tracing::{debug, trace};
use url::Url;

/// An HTTP response with lazily decoded, cached content.
///
/// The decoded content is computed at most once. Methods reading the body take `&mut self`;
/// share a `Response` between threads only behind a lock.
#[derive(Debug)]
pub struct Response<B> {
    inner: http::Response<Option<B>>,
    request_url: Url,
    reason: Option<String>,
    content: Option<Bytes>,
}

impl<B> Response<B> {
    /// Wraps a completed response to a request sent to `request_url`.
    pub fn new(inner: http::Response<B>, request_url: Url) -> Self {
        Self { inner: inner.map(Some), request_url, reason: None, content: None }
    }

    /// Sets the reason phrase received on the status line, replacing the canonical one.
    #[must_use]
    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// The URL the request was sent to, before any redirect.
    pub fn request_url(&self) -> &Url {
        &self.request_url
    }

    /// The wrapped response. Its body is `None` once it has been consumed.
    pub fn inner(&self) -> &http::Response<Option<B>> {
        &self.inner
    }

    pub fn into_inner(self) -> http::Response<Option<B>> {
        self.inner
    }

    /// The body encoding announced by the `Content-Encoding` header.
    pub fn encoding(&self) -> Encoding {
        Encoding::from_headers(self.inner.headers())
    }

    /// Returns whether the body is declared as gzip encoded.
    pub fn is_gzipped(&self) -> bool {
        self.encoding() == Encoding::Gzip
    }

    /// Returns whether the status code is below 400.
    pub fn is_ok(&self) -> bool {
        self.status().as_u16() < 400
    }

    /// The status line text, such as `200 OK`.
    pub fn reason(&self) -> String {
        let status = self.status();
        match self.reason.as_deref().or_else(|| status.canonical_reason()) {
            Some(phrase) => format!("{} {phrase}", status.as_str()),
            None => status.as_str().to_owned(),
        }
    }

    /// The `Location` header resolved against the request URL.
    ///
    /// # Errors
    ///
    /// Fails when the header is missing, isn't visible ASCII, or can't be resolved into a URL.
    pub fn location(&self) -> Result<Url, ResponseError> {
        let location = self.inner.headers().get(LOCATION).ok_or(UrlResolutionError::MissingLocation)?;
        let location = location.to_str().map_err(UrlResolutionError::invalid_location)?;

        Ok(self.request_url.join(location.trim()).map_err(UrlResolutionError::invalid_location)?)
    }

    /// The URL this response finally answers for.
    ///
    /// For `301`, `302`, `303` and `307` responses it is the resolved [`location`](Self::location),
    /// otherwise the request URL.
    ///
    /// # Errors
    ///
    /// Fails when a redirect response carries no usable `Location` header.
    pub fn url(&self) -> Result<Url, ResponseError> {
        match self.status() {
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER | StatusCode::TEMPORARY_REDIRECT => {
                self.location()
            }
            _ => Ok(self.request_url.clone()),
        }
    }

    /// Returns the cached decoded content, if the body was already decoded.
    pub fn cached_content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    fn take_body(&mut self) -> Result<B, ResponseError> {
        self.inner.body_mut().take().ok_or_else(ResponseError::body_consumed)
    }
}

impl<B: Read> Response<B> {
    /// Returns the decoded content, decoding and caching the body on first call.
    ///
    /// Later calls return the cached bytes without touching the body.
    ///
    /// # Errors
    ///
    /// Decoder and I/O errors are returned unchanged and leave the cache empty. The body is
    /// consumed by the first attempt, so retrying after a failure reports an I/O error.
    pub fn content(&mut self) -> Result<&Bytes, ResponseError> {
        self.materialize(None)
    }

    /// Like [`content`](Self::content), decoding gzip bodies with a state borrowed from `pool`.
    ///
    /// # Errors
    ///
    /// See [`content`](Self::content).
    pub fn content_with_pool(&mut self, pool: &ReaderPool) -> Result<&Bytes, ResponseError> {
        self.materialize(Some(pool))
    }

    fn materialize(&mut self, pool: Option<&ReaderPool>) -> Result<&Bytes, ResponseError> {
        let content = match self.content.take() {
            Some(content) => {
                trace!(len = content.len(), "content cache hit");
                content
            }
            None => self.decode_body(pool)?,
        };
        Ok(self.content.insert(content))
    }

    fn decode_body(&mut self, pool: Option<&ReaderPool>) -> Result<Bytes, ResponseError> {
        let encoding = self.encoding();
        let body = self.take_body()?;

        let mut stream = decoder::open(body, encoding, pool).inspect_err(|e| {
            debug!(%encoding, cause = %e, "failed to open decoded stream");
        })?;

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).inspect_err(|e| {
            debug!(%encoding, cause = %e, "failed to read decoded stream");
        })?;
        stream.release();

        trace!(%encoding, len = buf.len(), "content cached");
        Ok(Bytes::from(buf))
    }

    /// Hands out a decoded stream over the body without caching anything.
    ///
    /// # Errors
    ///
    /// Fails when the body was already consumed or its compressed framing is invalid.
    pub fn decoded_reader(&mut self) -> Result<DecodedStream<B>, ResponseError> {
        let encoding = self.encoding();
        Ok(decoder::open(self.take_body()?, encoding, None)?)
    }

    /// Like [`decoded_reader`](Self::decoded_reader), decoding gzip bodies with a state
    /// borrowed from `pool`. The state returns to the pool when the stream is released.
    ///
    /// # Errors
    ///
    /// See [`decoded_reader`](Self::decoded_reader).
    pub fn decoded_reader_from_pool(&mut self, pool: &ReaderPool) -> Result<DecodedStream<B>, ResponseError> {
        let encoding = self.encoding();
        Ok(decoder::open(self.take_body()?, encoding, Some(pool))?)
    }

    /// Reads the body as received, without decoding, and closes it.
    ///
    /// This bypasses the content cache; the body can't be decoded afterwards.
    ///
    /// # Errors
    ///
    /// Fails when the body was already consumed or reading it fails.
    pub fn read_raw_body(&mut self) -> Result<Bytes, ResponseError> {
        let mut body = self.take_body()?;
        let mut buf = Vec::new();
        body.read_to_end(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// The decoded content as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Fails when decoding fails or the content isn't valid UTF-8.
    pub fn text(&mut self) -> Result<String, ResponseError> {
        let content = self.content()?;
        let text = std::str::from_utf8(content).map_err(ParseError::from)?;
        Ok(text.to_owned())
    }

    /// The decoded content parsed as a dynamic JSON document.
    ///
    /// # Errors
    ///
    /// Fails when decoding fails or the content isn't valid JSON.
    pub fn json(&mut self) -> Result<serde_json::Value, ResponseError> {
        self.json_as()
    }

    /// The decoded content deserialized from JSON into `T`.
    ///
    /// # Errors
    ///
    /// Fails when decoding fails or the content doesn't deserialize into `T`.
    pub fn json_as<T: DeserializeOwned>(&mut self) -> Result<T, ResponseError> {
        let content = self.content()?;
        Ok(serde_json::from_slice(content).map_err(ParseError::from)?)
    }
}
