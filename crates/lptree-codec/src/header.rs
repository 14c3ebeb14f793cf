//! The `TYPE.NAMELEN:CONTENTLEN` token that precedes every value.
//!
//! Wire format:
//! ```text
//! ┌──────────┬─────┬───────────┬─────┬──────────────┬──────────┬─────────────┐
//! │ TYPE(3B) │ '.' │ NAMELEN   │ ':' │ CONTENTLEN   │ NAME     │ CONTENT     │
//! │ "str"... │     │ digits    │     │ digits       │ NAMELEN  │ CONTENTLEN  │
//! └──────────┴─────┴───────────┴─────┴──────────────┴──────────┴─────────────┘
//! ```
//!
//! CONTENTLEN has no terminator: it is the maximal digit run after `:`, and
//! the name starts at the first non-digit byte.

use lptree_value::{TypeCode, TYPE_CODE_LEN};

use crate::error::{ParseError, ParseErrorKind, Result};
use crate::guard::GuardConfig;

/// Shortest possible header: `nul.0:0`.
pub const MIN_HEADER_LEN: usize = TYPE_CODE_LEN + 4;

/// A parsed value header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub type_code: TypeCode,
    /// Declared name length in bytes.
    pub name_len: usize,
    /// Declared content length in bytes.
    pub content_len: usize,
    /// Bytes taken by the header token itself.
    pub header_len: usize,
}

impl Header {
    /// Header + name + content.
    pub fn total_len(&self) -> usize {
        self.header_len
            .saturating_add(self.name_len)
            .saturating_add(self.content_len)
    }
}

/// Parse a header at `at` that may still be arriving.
///
/// Returns `Ok(None)` if the buffer ends before the header does. A
/// CONTENTLEN digit run that reaches the end of the buffer counts as
/// incomplete since another digit may follow. Digit-count and per-field
/// limits are enforced on whatever has arrived.
pub fn peek_header(buf: &[u8], at: usize, config: &GuardConfig) -> Result<Option<Header>> {
    scan(buf, at, config, false)
}

/// Parse a header at `at` in a complete buffer.
///
/// The cursor after a successful read is `at + header.header_len`, the first
/// name byte. Each declared length must fit in the bytes left after the
/// header.
pub fn read_header(buf: &[u8], at: usize, config: &GuardConfig) -> Result<Header> {
    let header = scan(buf, at, config, true)?
        .ok_or(ParseError::new(ParseErrorKind::TruncatedInput, buf.len()))?;

    let body_start = at + header.header_len;
    let remaining = buf.len() - body_start;
    if header.name_len > remaining || header.content_len > remaining {
        return Err(ParseError::new(ParseErrorKind::LengthOverflow, at));
    }
    Ok(header)
}

/// Write `TYPE.NAMELEN:CONTENTLEN` for the given lengths.
pub fn write_header(
    type_code: TypeCode,
    name_len: usize,
    content_len: usize,
    dst: &mut impl bytes::BufMut,
) {
    dst.put_slice(type_code.as_str().as_bytes());
    dst.put_u8(b'.');
    dst.put_slice(name_len.to_string().as_bytes());
    dst.put_u8(b':');
    dst.put_slice(content_len.to_string().as_bytes());
}

/// Length of the header [`write_header`] would emit.
pub fn header_len(name_len: usize, content_len: usize) -> usize {
    TYPE_CODE_LEN + 2 + decimal_len(name_len) + decimal_len(content_len)
}

/// Number of decimal digits in `n`.
pub fn decimal_len(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Parse a run of ASCII digits already known to be non-empty.
pub(crate) fn parse_digits(digits: &[u8]) -> Option<usize> {
    digits.iter().try_fold(0usize, |acc, &b| {
        acc.checked_mul(10)?.checked_add(usize::from(b - b'0'))
    })
}

/// Outcome of scanning a digit run.
enum DigitRun {
    /// Run ended at a non-digit byte at `end`.
    Terminated { end: usize },
    /// Run reached the end of the buffer.
    Exhausted,
}

fn scan_digits(buf: &[u8], start: usize, max_digits: usize) -> Result<DigitRun> {
    let mut pos = start;
    while pos < buf.len() && buf[pos].is_ascii_digit() {
        pos += 1;
        if pos - start > max_digits {
            return Err(ParseError::new(ParseErrorKind::LengthOverflow, start));
        }
    }
    if pos == buf.len() {
        Ok(DigitRun::Exhausted)
    } else {
        Ok(DigitRun::Terminated { end: pos })
    }
}

fn scan(buf: &[u8], at: usize, config: &GuardConfig, complete: bool) -> Result<Option<Header>> {
    let incomplete = |offset: usize| {
        if complete {
            Err(ParseError::new(ParseErrorKind::TruncatedInput, offset))
        } else {
            Ok(None)
        }
    };

    let available = buf.get(at..).unwrap_or_default();
    if available.len() < TYPE_CODE_LEN {
        let could_be_code = TypeCode::ALL
            .iter()
            .any(|code| code.as_str().as_bytes().starts_with(available));
        if !could_be_code {
            return Err(ParseError::new(ParseErrorKind::UnknownType, at));
        }
        return incomplete(buf.len());
    }

    let type_code = TypeCode::from_bytes(&available[..TYPE_CODE_LEN])
        .ok_or(ParseError::new(ParseErrorKind::UnknownType, at))?;

    let dot = at + TYPE_CODE_LEN;
    match buf.get(dot) {
        None => return incomplete(buf.len()),
        Some(b'.') => {}
        Some(_) => return Err(ParseError::new(ParseErrorKind::HeaderMalformed, dot)),
    }

    let name_start = dot + 1;
    let colon = match scan_digits(buf, name_start, config.max_length_digits)? {
        DigitRun::Exhausted => return incomplete(buf.len()),
        DigitRun::Terminated { end } => end,
    };
    if colon == name_start || buf[colon] != b':' {
        return Err(ParseError::new(ParseErrorKind::HeaderMalformed, colon));
    }

    let content_start = colon + 1;
    let end = match scan_digits(buf, content_start, config.max_length_digits)? {
        DigitRun::Terminated { end } => end,
        DigitRun::Exhausted if complete && buf.len() > content_start => buf.len(),
        DigitRun::Exhausted => return incomplete(buf.len()),
    };
    if end == content_start {
        return Err(ParseError::new(ParseErrorKind::HeaderMalformed, end));
    }

    let name_len = parse_digits(&buf[name_start..colon])
        .filter(|len| *len <= config.max_name_length)
        .ok_or(ParseError::new(ParseErrorKind::LengthOverflow, name_start))?;
    let content_len = parse_digits(&buf[content_start..end])
        .filter(|len| *len <= config.max_content_length)
        .ok_or(ParseError::new(ParseErrorKind::LengthOverflow, content_start))?;

    Ok(Some(Header {
        type_code,
        name_len,
        content_len,
        header_len: end - at,
    }))
}
