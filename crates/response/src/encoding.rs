//! Classification of the `Content-Encoding` header.
//!
//! Only single, non-chained encodings are recognized. Anything that is not `gzip` or `deflate`
//! is treated as an uncompressed body and passed through untouched.

use http::HeaderMap;
use http::header::CONTENT_ENCODING;
use std::fmt;

/// The content coding applied to a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    /// No transformation, the body is read as-is.
    #[default]
    Identity,
    /// RFC 1952 gzip member(s).
    Gzip,
    /// RFC 1950 zlib stream, which is what `deflate` means on the wire.
    Deflate,
}

impl Encoding {
    /// Resolves an encoding from a raw header value.
    ///
    /// The value is trimmed and compared case-insensitively. Unknown, empty or missing
    /// values fall back to [`Encoding::Identity`].
    pub fn resolve(header_value: Option<&str>) -> Self {
        match header_value.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("gzip") => Self::Gzip,
            Some(value) if value.eq_ignore_ascii_case("deflate") => Self::Deflate,
            _ => Self::Identity,
        }
    }

    /// Resolves the encoding from the first `Content-Encoding` header in `headers`.
    ///
    /// Header values which are not visible ASCII resolve to [`Encoding::Identity`].
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::resolve(headers.get(CONTENT_ENCODING).and_then(|value| value.to_str().ok()))
    }

    /// Returns the canonical token of the encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Identity => "identity",
            Encoding::Gzip => "gzip",
            Encoding::Deflate => "deflate",
        }
    }

    /// Returns whether bodies in this encoding go through a decompressor.
    pub fn is_compressed(&self) -> bool {
        !matches!(self, Encoding::Identity)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_resolve_gzip_mixed_case_and_padding() {
        assert_eq!(Encoding::resolve(Some("  GZIP ")), Encoding::Gzip);
        assert_eq!(Encoding::resolve(Some("gzip")), Encoding::Gzip);
        assert_eq!(Encoding::resolve(Some("\tGzIp\r\n")), Encoding::Gzip);
    }

    #[test]
    fn test_resolve_deflate() {
        assert_eq!(Encoding::resolve(Some("Deflate")), Encoding::Deflate);
        assert_eq!(Encoding::resolve(Some(" deflate ")), Encoding::Deflate);
    }

    #[test]
    fn test_resolve_fallback_to_identity() {
        assert_eq!(Encoding::resolve(None), Encoding::Identity);
        assert_eq!(Encoding::resolve(Some("")), Encoding::Identity);
        assert_eq!(Encoding::resolve(Some("br")), Encoding::Identity);
        assert_eq!(Encoding::resolve(Some("zstd")), Encoding::Identity);
        // chained codings are not supported
        assert_eq!(Encoding::resolve(Some("gzip, deflate")), Encoding::Identity);
        assert_eq!(Encoding::resolve(Some("x-gzip")), Encoding::Identity);
    }

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(Encoding::from_headers(&headers), Encoding::Identity);

        headers.insert(CONTENT_ENCODING, HeaderValue::from_static(" GZIP "));
        assert_eq!(Encoding::from_headers(&headers), Encoding::Gzip);

        headers.insert(CONTENT_ENCODING, HeaderValue::from_bytes(b"gzip\xff").unwrap());
        assert_eq!(Encoding::from_headers(&headers), Encoding::Identity);
    }

    #[test]
    fn test_display() {
        assert_eq!(Encoding::Gzip.to_string(), "gzip");
        assert_eq!(Encoding::Deflate.as_str(), "deflate");
        assert!(!Encoding::Identity.is_compressed());
        assert!(Encoding::Gzip.is_compressed());
        assert!(Encoding::Deflate.is_compressed());
    }
}
