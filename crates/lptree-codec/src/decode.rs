//! Byte buffer to [`Value`] tree.
//!
//! Containers are descended with an explicit stack of open containers rather
//! than native recursion, so stack use is bounded by `max_nesting_depth`
//! regardless of what the input declares. Each child's declared extent is
//! checked against its container's span from the child's header, before any
//! of the child's name or content is read.

use bytes::{Buf, Bytes, BytesMut};
use lptree_value::{Content, TypeCode, Value};
use tracing::{debug, trace};

use crate::error::{ParseError, ParseErrorKind, Result};
use crate::guard::{Guard, GuardConfig};
use crate::header::{parse_digits, peek_header, read_header, Header, MIN_HEADER_LEN};

/// Decode a buffer holding exactly one value.
///
/// Fails with [`ParseErrorKind::TrailingData`] if bytes follow the root value.
pub fn decode(input: &[u8], config: &GuardConfig) -> Result<Value> {
    let (value, used) = decode_prefix(input, config)?;
    if used != input.len() {
        debug!(used, len = input.len(), "trailing bytes after root value");
        return Err(ParseError::new(ParseErrorKind::TrailingData, used));
    }
    Ok(value)
}

/// Decode one value from the front of `input`.
///
/// Returns the value and the number of bytes it occupied.
pub fn decode_prefix(input: &[u8], config: &GuardConfig) -> Result<(Value, usize)> {
    let result = Guard::new(config, input.len()).and_then(|guard| {
        let mut decoder = Decoder {
            buf: input,
            pos: 0,
            guard,
            open: Vec::new(),
        };
        decoder.run().map(|value| (value, decoder.pos))
    });

    match &result {
        Ok((value, used)) => {
            debug!(type_code = %value.type_code(), used, "decoded value");
        }
        Err(err) => {
            debug!(kind = ?err.kind(), offset = err.offset(), "decode failed");
        }
    }
    result
}

/// Decode the first value in `src` once it has fully arrived.
///
/// Returns `Ok(None)` while the header or the declared span is still
/// incomplete. On success the value's bytes are consumed from `src`. Limits
/// are enforced against the header as soon as it is readable, so an
/// oversized declaration fails before its bytes arrive.
pub fn decode_buffered(src: &mut BytesMut, config: &GuardConfig) -> Result<Option<Value>> {
    let Some(header) = peek_header(src, 0, config)? else {
        return Ok(None);
    };

    let total = header.total_len();
    if total > config.max_total_input_size {
        return Err(ParseError::new(ParseErrorKind::ResourceLimitExceeded, 0));
    }
    if src.len() < total {
        return Ok(None);
    }

    let value = decode(&src[..total], config)?;
    src.advance(total);
    Ok(Some(value))
}

/// A container whose children are still being read.
struct OpenContainer {
    name: String,
    type_code: TypeCode,
    /// Offset of the first byte past the declared content.
    span_end: usize,
    count: usize,
    children: Vec<Value>,
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    guard: Guard<'a>,
    open: Vec<OpenContainer>,
}

impl Decoder<'_> {
    fn run(&mut self) -> Result<Value> {
        loop {
            // None: reading the root. Some(true): innermost container is full.
            let state = self
                .open
                .last()
                .map(|top| top.children.len() == top.count);

            let completed = match state {
                None => self.read_value()?,
                Some(true) => Some(self.close()?),
                Some(false) => {
                    self.check_room_for_child()?;
                    self.read_value()?
                }
            };

            if let Some(value) = completed {
                match self.open.last_mut() {
                    Some(parent) => parent.children.push(value),
                    None => return Ok(value),
                }
            }
        }
    }

    /// Read one value at the cursor. Leaves come back complete; containers
    /// are pushed onto the open stack and `None` is returned.
    fn read_value(&mut self) -> Result<Option<Value>> {
        let start = self.pos;
        let header = self.read_child_header(start)?;
        trace!(
            offset = start,
            type_code = %header.type_code,
            name_len = header.name_len,
            content_len = header.content_len,
            "value header"
        );

        let name_start = start + header.header_len;
        let content_start = name_start + header.name_len;
        let end = content_start + header.content_len;

        if let Some(parent) = self.open.last() {
            if end > parent.span_end {
                let kind = if parent.children.len() + 1 == parent.count {
                    ParseErrorKind::MismatchedLength
                } else {
                    ParseErrorKind::BoundaryOverflow
                };
                return Err(ParseError::new(kind, start));
            }
        }
        if header.type_code.is_leaf() && end > self.buf.len() {
            return Err(ParseError::new(ParseErrorKind::TruncatedInput, self.buf.len()));
        }

        self.guard.charge(header.name_len, name_start)?;
        let name = std::str::from_utf8(&self.buf[name_start..content_start])
            .map_err(|_| ParseError::new(ParseErrorKind::InvalidUtf8, name_start))?
            .to_owned();
        self.pos = content_start;

        if header.type_code.is_container() {
            self.open_container(name, header.type_code, start, end)?;
            return Ok(None);
        }

        self.guard.charge(header.content_len, content_start)?;
        let raw = &self.buf[content_start..end];
        let content = leaf_content(header.type_code, raw, content_start)?;
        self.pos = end;
        Ok(Some(Value { name, content }))
    }

    /// Read the header at `start` without letting its CONTENTLEN digit run
    /// extend past the enclosing span. A header that only parses by reaching
    /// beyond the span is returned as read from the whole buffer, so the
    /// span check in [`Decoder::read_value`] reports the crossing.
    fn read_child_header(&self, start: usize) -> Result<Header> {
        let config = self.guard.config();
        let Some(parent) = self.open.last() else {
            return read_header(self.buf, start, config);
        };
        let window = &self.buf[..parent.span_end.min(self.buf.len())];
        read_header(window, start, config).or_else(|_| read_header(self.buf, start, config))
    }

    fn open_container(
        &mut self,
        name: String,
        type_code: TypeCode,
        start: usize,
        span_end: usize,
    ) -> Result<()> {
        self.guard.enter(start)?;

        let count_start = self.pos;
        let limit = span_end.min(self.buf.len());
        let digits = self.buf[count_start..limit]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits == 0 {
            return Err(ParseError::new(ParseErrorKind::HeaderMalformed, count_start));
        }
        if digits > self.guard.config().max_length_digits {
            return Err(ParseError::new(ParseErrorKind::LengthOverflow, count_start));
        }
        self.guard.charge(digits, count_start)?;
        let count = parse_digits(&self.buf[count_start..count_start + digits])
            .ok_or(ParseError::new(ParseErrorKind::LengthOverflow, count_start))?;
        self.pos = count_start + digits;

        // Never reserve more children than the span could physically hold.
        let room = limit.saturating_sub(self.pos) / MIN_HEADER_LEN;
        self.open.push(OpenContainer {
            name,
            type_code,
            span_end,
            count,
            children: Vec::with_capacity(count.min(room)),
        });
        Ok(())
    }

    /// Called before each child while the innermost container is short of
    /// its declared count.
    fn check_room_for_child(&self) -> Result<()> {
        if self.pos >= self.buf.len() {
            return Err(ParseError::new(ParseErrorKind::TruncatedInput, self.pos));
        }
        if let Some(top) = self.open.last() {
            if self.pos >= top.span_end {
                return Err(ParseError::new(ParseErrorKind::MismatchedCount, self.pos));
            }
        }
        Ok(())
    }

    /// Pop the innermost container once its declared count has been read.
    fn close(&mut self) -> Result<Value> {
        let Some(top) = self.open.pop() else {
            return Err(ParseError::new(ParseErrorKind::MismatchedCount, self.pos));
        };
        self.guard.exit();

        if self.pos != top.span_end {
            let kind = if self.has_undeclared_child(top.span_end) {
                ParseErrorKind::MismatchedCount
            } else {
                ParseErrorKind::MismatchedLength
            };
            return Err(ParseError::new(kind, self.pos));
        }

        let content = match top.type_code {
            TypeCode::Obj => Content::Object(top.children),
            _ => Content::Array(top.children),
        };
        Ok(Value {
            name: top.name,
            content,
        })
    }

    /// True if a whole value fits between the cursor and `span_end`.
    fn has_undeclared_child(&self, span_end: usize) -> bool {
        let window = &self.buf[..span_end.min(self.buf.len())];
        match read_header(window, self.pos, self.guard.config()) {
            Ok(header) => self.pos + header.total_len() <= span_end,
            Err(_) => false,
        }
    }
}

fn leaf_content(type_code: TypeCode, raw: &[u8], offset: usize) -> Result<Content> {
    let content = match type_code {
        TypeCode::Str => Content::String(
            std::str::from_utf8(raw)
                .map_err(|_| ParseError::new(ParseErrorKind::InvalidUtf8, offset))?
                .to_owned(),
        ),
        TypeCode::Int => Content::Integer(
            parse_int(raw).ok_or(ParseError::new(ParseErrorKind::InvalidNumber, offset))?,
        ),
        TypeCode::Flt => Content::Float(
            parse_float(raw).ok_or(ParseError::new(ParseErrorKind::InvalidNumber, offset))?,
        ),
        TypeCode::Bln => match raw {
            b"true" => Content::Boolean(true),
            b"false" => Content::Boolean(false),
            _ => return Err(ParseError::new(ParseErrorKind::InvalidBoolean, offset)),
        },
        TypeCode::Nul if raw.is_empty() => Content::Null,
        TypeCode::Nul => return Err(ParseError::new(ParseErrorKind::InvalidNull, offset)),
        TypeCode::Bin => Content::Binary(Bytes::copy_from_slice(raw)),
        TypeCode::Obj | TypeCode::Arr => {
            return Err(ParseError::new(ParseErrorKind::UnknownType, offset));
        }
    };
    Ok(content)
}

/// `-?[0-9]+`, in range for `i64`.
fn parse_int(raw: &[u8]) -> Option<i64> {
    let digits = raw.strip_prefix(b"-").unwrap_or(raw);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(raw).ok()?.parse().ok()
}

/// `-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?`, finite.
fn parse_float(raw: &[u8]) -> Option<f64> {
    let mut rest = raw.strip_prefix(b"-").unwrap_or(raw);

    let int_digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if int_digits == 0 {
        return None;
    }
    rest = &rest[int_digits..];

    if let Some(frac) = rest.strip_prefix(b".") {
        let frac_digits = frac.iter().take_while(|b| b.is_ascii_digit()).count();
        if frac_digits == 0 {
            return None;
        }
        rest = &frac[frac_digits..];
    }

    if let Some(exp) = rest.strip_prefix(b"e").or_else(|| rest.strip_prefix(b"E")) {
        let exp = exp
            .strip_prefix(b"+")
            .or_else(|| exp.strip_prefix(b"-"))
            .unwrap_or(exp);
        let exp_digits = exp.iter().take_while(|b| b.is_ascii_digit()).count();
        if exp_digits == 0 {
            return None;
        }
        rest = &exp[exp_digits..];
    }

    if !rest.is_empty() {
        return None;
    }
    let value: f64 = std::str::from_utf8(raw).ok()?.parse().ok()?;
    value.is_finite().then_some(value)
}
