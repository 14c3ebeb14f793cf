use std::fmt;

/// What went wrong while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// `.` or `:` missing, or a length field / container count has no digits.
    HeaderMalformed,
    /// The 3-letter type code is not one of the eight built-in codes.
    UnknownType,
    /// A length field is too long, too large for the guard, or larger than
    /// the bytes left in the buffer.
    LengthOverflow,
    /// A Bounds Guard byte budget was exceeded.
    ResourceLimitExceeded,
    /// Container nesting exceeded `max_nesting_depth`.
    DepthExceeded,
    /// The buffer ended before the value was complete.
    TruncatedInput,
    /// A child crossed its container's declared end before the declared
    /// count was reached.
    BoundaryOverflow,
    /// The declared child count does not match the children in the span.
    MismatchedCount,
    /// The declared content length does not match the bytes the count and
    /// children occupy.
    MismatchedLength,
    InvalidUtf8,
    InvalidNumber,
    InvalidBoolean,
    InvalidNull,
    /// Bytes follow the root value.
    TrailingData,
}

impl ParseErrorKind {
    fn describe(self) -> &'static str {
        match self {
            ParseErrorKind::HeaderMalformed => "malformed header",
            ParseErrorKind::UnknownType => "unknown type code",
            ParseErrorKind::LengthOverflow => "length field overflow",
            ParseErrorKind::ResourceLimitExceeded => "resource limit exceeded",
            ParseErrorKind::DepthExceeded => "nesting depth exceeded",
            ParseErrorKind::TruncatedInput => "truncated input",
            ParseErrorKind::BoundaryOverflow => "child crosses container boundary",
            ParseErrorKind::MismatchedCount => "container count mismatch",
            ParseErrorKind::MismatchedLength => "container length mismatch",
            ParseErrorKind::InvalidUtf8 => "invalid UTF-8",
            ParseErrorKind::InvalidNumber => "invalid number",
            ParseErrorKind::InvalidBoolean => "invalid boolean",
            ParseErrorKind::InvalidNull => "null with non-empty content",
            ParseErrorKind::TrailingData => "trailing data after root value",
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A decode failure and the byte offset where it was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at byte {offset}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Errors that can occur while encoding a value tree.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    /// A name exceeds `max_name_length`.
    #[error("name too long ({len} bytes, max {max})")]
    NameTooLong { len: usize, max: usize },

    /// A value's content exceeds `max_content_length`.
    #[error("content of {name:?} too long ({len} bytes, max {max})")]
    ContentTooLong { name: String, len: usize, max: usize },

    /// NaN and infinities have no canonical form.
    #[error("cannot encode non-finite float {value} ({name:?})")]
    NonFiniteFloat { name: String, value: f64 },

    /// Containers nest deeper than `max_nesting_depth`.
    #[error("nesting depth exceeds {max}")]
    DepthExceeded { max: usize },

    /// The byte after the header would be a digit and merge into CONTENTLEN.
    #[error("value {name:?} would start with a digit right after its header")]
    AmbiguousHeader { name: String },
}

/// Errors from the stream adapters.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The buffered bytes are not a valid value.
    #[error("decode error: {0}")]
    Parse(#[from] ParseError),

    /// The value could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// An I/O error occurred while reading or writing values.
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended with nothing buffered.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, ParseError>;
pub type EncodeResult<T> = std::result::Result<T, EncodeError>;
pub type StreamResult<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_includes_offset() {
        let err = ParseError::new(ParseErrorKind::MismatchedLength, 12);
        assert_eq!(err.to_string(), "container length mismatch at byte 12");
    }

    #[test]
    fn encode_error_names_value() {
        let err = EncodeError::AmbiguousHeader {
            name: "1st".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "value \"1st\" would start with a digit right after its header"
        );
    }
}
