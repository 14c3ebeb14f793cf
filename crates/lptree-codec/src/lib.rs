//! Decoder, encoder and resource guard for the lptree format.
//!
//! Every value is written as a header, a name and a content span:
//! - A 3-letter type code (`str`, `int`, `flt`, `bln`, `nul`, `bin`, `obj`, `arr`)
//! - `.NAMELEN:CONTENTLEN` in decimal
//! - NAMELEN bytes of UTF-8 name, then CONTENTLEN bytes of content
//!
//! Containers carry a decimal child count followed by their children, each a
//! full value. Nothing is escaped and nothing is scanned for delimiters; every
//! read is driven by a declared length and checked against [`GuardConfig`].

pub mod decode;
pub mod encode;
pub mod error;
pub mod guard;
pub mod header;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod codec;

#[cfg(feature = "async")]
pub use codec::ValueCodec;
pub use decode::{decode, decode_buffered, decode_prefix};
pub use encode::{encode, encode_into, encoded_len};
pub use error::{
    EncodeError, EncodeResult, ParseError, ParseErrorKind, Result, StreamError, StreamResult,
};
pub use guard::{Guard, GuardConfig};
pub use header::{peek_header, read_header, Header};
pub use reader::ValueReader;
pub use writer::ValueWriter;
