//! Self-describing, length-prefixed serialization without escaping.
//!
//! Every value is written as `TYPE.NAMELEN:CONTENTLEN` followed by its name
//! and content. Objects and arrays carry a child count and nest full values,
//! so a reader never scans for delimiters.
//!
//! # Crate Structure
//!
//! - [`value`]: the value tree and type codes
//! - [`codec`]: decoder, encoder, resource limits and stream adapters
//!
//! ```
//! use lptree::{decode, encode, GuardConfig, Value};
//!
//! let user = Value::object(
//!     "user",
//!     vec![Value::string("name", "John"), Value::integer("age", 25)],
//! );
//! let cfg = GuardConfig::default();
//! let bytes = encode(&user, &cfg).unwrap();
//! assert_eq!(&bytes[..], b"obj.4:28user2str.4:4nameJohnint.3:2age25");
//! assert_eq!(decode(&bytes, &cfg).unwrap(), user);
//! ```

/// Re-export value types.
pub mod value {
    pub use lptree_value::*;
}

/// Re-export codec types.
pub mod codec {
    pub use lptree_codec::*;
}

pub use lptree_codec::{decode, encode, EncodeError, GuardConfig, ParseError, ParseErrorKind};
pub use lptree_value::{Content, TypeCode, Value};
