//! Built-in type codes.
//!
//! Every value on the wire starts with one of eight 3-letter lowercase codes.
//! Six are leaf types carrying content directly; `obj` and `arr` are
//! containers carrying a child count followed by nested values.

use std::fmt;

/// Length in bytes of every type code.
pub const TYPE_CODE_LEN: usize = 3;

/// Wire type code of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    /// UTF-8 text (`str`).
    Str,
    /// Signed 64-bit integer (`int`).
    Int,
    /// 64-bit float (`flt`).
    Flt,
    /// Boolean, `true` or `false` (`bln`).
    Bln,
    /// Null, always empty content (`nul`).
    Nul,
    /// Raw bytes (`bin`).
    Bin,
    /// Keyed container (`obj`).
    Obj,
    /// Positional container (`arr`).
    Arr,
}

impl TypeCode {
    /// All codes in wire-table order.
    pub const ALL: [TypeCode; 8] = [
        TypeCode::Str,
        TypeCode::Int,
        TypeCode::Flt,
        TypeCode::Bln,
        TypeCode::Nul,
        TypeCode::Bin,
        TypeCode::Obj,
        TypeCode::Arr,
    ];

    /// The 3-letter wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            TypeCode::Str => "str",
            TypeCode::Int => "int",
            TypeCode::Flt => "flt",
            TypeCode::Bln => "bln",
            TypeCode::Nul => "nul",
            TypeCode::Bin => "bin",
            TypeCode::Obj => "obj",
            TypeCode::Arr => "arr",
        }
    }

    /// Parse a wire code. Returns `None` for anything that is not exactly one
    /// of the eight codes.
    pub fn from_bytes(code: &[u8]) -> Option<Self> {
        match code {
            b"str" => Some(TypeCode::Str),
            b"int" => Some(TypeCode::Int),
            b"flt" => Some(TypeCode::Flt),
            b"bln" => Some(TypeCode::Bln),
            b"nul" => Some(TypeCode::Nul),
            b"bin" => Some(TypeCode::Bin),
            b"obj" => Some(TypeCode::Obj),
            b"arr" => Some(TypeCode::Arr),
            _ => None,
        }
    }

    /// Returns true for `obj` and `arr`.
    pub fn is_container(self) -> bool {
        matches!(self, TypeCode::Obj | TypeCode::Arr)
    }

    /// Returns true for the six leaf codes.
    pub fn is_leaf(self) -> bool {
        !self.is_container()
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
