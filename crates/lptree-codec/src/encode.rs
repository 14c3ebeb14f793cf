//! [`Value`] tree to canonical bytes.
//!
//! Encoding runs in two passes over the tree, both driven by explicit stacks.
//! The first pass renders leaf content and measures every container
//! bottom-up, so each CONTENTLEN is exact before anything is written. The
//! second pass writes headers, names and content in wire order into a single
//! buffer sized from the first pass.

use std::borrow::Cow;

use bytes::{BufMut, Bytes, BytesMut};
use lptree_value::{Content, Value};
use tracing::trace;

use crate::error::{EncodeError, EncodeResult};
use crate::guard::GuardConfig;
use crate::header::{decimal_len, header_len, write_header};

/// Encode `value` into a new buffer.
pub fn encode(value: &Value, config: &GuardConfig) -> EncodeResult<Bytes> {
    let plan = Plan::build(value, config)?;
    let mut dst = BytesMut::with_capacity(plan.total_len);
    plan.emit(value, &mut dst);
    Ok(dst.freeze())
}

/// Encode `value` and append it to `dst`.
pub fn encode_into(value: &Value, config: &GuardConfig, dst: &mut BytesMut) -> EncodeResult<()> {
    let plan = Plan::build(value, config)?;
    dst.reserve(plan.total_len);
    plan.emit(value, dst);
    Ok(())
}

/// Exact number of bytes [`encode`] would produce.
pub fn encoded_len(value: &Value, config: &GuardConfig) -> EncodeResult<usize> {
    Plan::build(value, config).map(|plan| plan.total_len)
}

/// Measured layout of one value, stored in pre-order.
struct Slot<'a> {
    content_len: usize,
    /// Rendered content of a leaf; `None` for containers.
    leaf: Option<Cow<'a, [u8]>>,
}

/// A container whose children are being measured.
struct Measuring<'a> {
    value: &'a Value,
    children: &'a [Value],
    next: usize,
    slot: usize,
    content_len: usize,
}

struct Plan<'a> {
    slots: Vec<Slot<'a>>,
    total_len: usize,
}

impl<'a> Plan<'a> {
    fn build(root: &'a Value, config: &GuardConfig) -> EncodeResult<Self> {
        let mut slots = Vec::new();
        let mut stack: Vec<Measuring<'a>> = Vec::new();
        let mut root_len = match open(root, config, &mut slots, &mut stack)? {
            Some(len) => len,
            None => 0,
        };

        while let Some(top) = stack.last_mut() {
            let children = top.children;
            let len = match children.get(top.next) {
                Some(child) => {
                    top.next += 1;
                    match open(child, config, &mut slots, &mut stack)? {
                        Some(len) => len,
                        None => continue,
                    }
                }
                None => {
                    let Some(done) = stack.pop() else {
                        break;
                    };
                    if done.content_len > config.max_content_length {
                        return Err(EncodeError::ContentTooLong {
                            name: done.value.name.clone(),
                            len: done.content_len,
                            max: config.max_content_length,
                        });
                    }
                    slots[done.slot].content_len = done.content_len;
                    total_len(done.value, done.content_len)
                }
            };

            match stack.last_mut() {
                Some(parent) => parent.content_len = parent.content_len.saturating_add(len),
                None => root_len = len,
            }
        }

        trace!(total_len = root_len, values = slots.len(), "measured value tree");
        Ok(Self {
            slots,
            total_len: root_len,
        })
    }

    fn emit(&self, root: &Value, dst: &mut BytesMut) {
        let mut slots = self.slots.iter();
        let mut stack = vec![std::slice::from_ref(root).iter()];

        while let Some(level) = stack.last_mut() {
            let Some(value) = level.next() else {
                stack.pop();
                continue;
            };
            let Some(slot) = slots.next() else {
                break;
            };

            write_header(value.type_code(), value.name.len(), slot.content_len, dst);
            dst.put_slice(value.name.as_bytes());
            match &slot.leaf {
                Some(content) => dst.put_slice(content),
                None => {
                    let children = value.children();
                    dst.put_slice(children.len().to_string().as_bytes());
                    stack.push(children.iter());
                }
            }
        }
    }
}

/// Header + name + content for a value with the given content length.
fn total_len(value: &Value, content_len: usize) -> usize {
    header_len(value.name.len(), content_len)
        .saturating_add(value.name.len())
        .saturating_add(content_len)
}

/// Record a slot for `value`. Leaves are measured immediately and their
/// total length returned; containers are pushed onto `stack`.
fn open<'a>(
    value: &'a Value,
    config: &GuardConfig,
    slots: &mut Vec<Slot<'a>>,
    stack: &mut Vec<Measuring<'a>>,
) -> EncodeResult<Option<usize>> {
    if value.name.len() > config.max_name_length {
        return Err(EncodeError::NameTooLong {
            len: value.name.len(),
            max: config.max_name_length,
        });
    }

    let leaf: Cow<'a, [u8]> = match &value.content {
        Content::String(text) => Cow::Borrowed(text.as_bytes()),
        Content::Integer(n) => Cow::Owned(n.to_string().into_bytes()),
        Content::Float(f) if !f.is_finite() => {
            return Err(EncodeError::NonFiniteFloat {
                name: value.name.clone(),
                value: *f,
            });
        }
        Content::Float(f) => Cow::Owned(f.to_string().into_bytes()),
        Content::Boolean(true) => Cow::Borrowed(&b"true"[..]),
        Content::Boolean(false) => Cow::Borrowed(&b"false"[..]),
        Content::Null => Cow::Borrowed(&b""[..]),
        Content::Binary(bytes) => Cow::Borrowed(bytes.as_ref()),
        Content::Object(children) | Content::Array(children) => {
            if stack.len() >= config.max_nesting_depth {
                return Err(EncodeError::DepthExceeded {
                    max: config.max_nesting_depth,
                });
            }
            // Content always opens with the child count.
            check_leading_byte(value, b"0")?;
            stack.push(Measuring {
                value,
                children,
                next: 0,
                slot: slots.len(),
                content_len: decimal_len(children.len()),
            });
            slots.push(Slot {
                content_len: 0,
                leaf: None,
            });
            return Ok(None);
        }
    };

    if leaf.len() > config.max_content_length {
        return Err(EncodeError::ContentTooLong {
            name: value.name.clone(),
            len: leaf.len(),
            max: config.max_content_length,
        });
    }
    check_leading_byte(value, &leaf)?;

    let len = total_len(value, leaf.len());
    slots.push(Slot {
        content_len: leaf.len(),
        leaf: Some(leaf),
    });
    Ok(Some(len))
}

/// CONTENTLEN is the maximal digit run after `:`, so the byte that follows
/// the header must not be a digit.
fn check_leading_byte(value: &Value, content: &[u8]) -> EncodeResult<()> {
    let first = value.name.as_bytes().first().or(content.first());
    match first {
        Some(b) if b.is_ascii_digit() => Err(EncodeError::AmbiguousHeader {
            name: value.name.clone(),
        }),
        _ => Ok(()),
    }
}
