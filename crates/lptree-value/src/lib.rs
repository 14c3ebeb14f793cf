//! Value model for the lptree length-prefixed tree format.
//!
//! A document is a single named [`Value`]. Leaves carry text, numbers,
//! booleans, null or raw bytes; objects and arrays carry ordered children.
//! Every value, container elements included, is self-describing: it has its
//! own name and its own wire [`TypeCode`].

pub mod types;
pub mod value;

pub use types::{TypeCode, TYPE_CODE_LEN};
pub use value::{Content, Value};
