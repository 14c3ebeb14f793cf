//! The value tree the codec reads and writes.

use bytes::Bytes;

use crate::types::TypeCode;

/// A named value: the unit the codec reads and writes.
///
/// Every value carries a name, including array elements whose names are
/// never used for addressing. Names need not be unique among siblings.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    /// The self-describing label written ahead of the content.
    pub name: String,
    /// The typed payload.
    pub content: Content,
}

/// Typed payload of a [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
    Binary(Bytes),
    /// Fields in wire order. Each field's name is its key; duplicates are kept.
    Object(Vec<Value>),
    /// Elements in wire order, addressed by position.
    Array(Vec<Value>),
}

impl Content {
    /// The wire type code for this payload.
    pub fn type_code(&self) -> TypeCode {
        match self {
            Content::String(_) => TypeCode::Str,
            Content::Integer(_) => TypeCode::Int,
            Content::Float(_) => TypeCode::Flt,
            Content::Boolean(_) => TypeCode::Bln,
            Content::Null => TypeCode::Nul,
            Content::Binary(_) => TypeCode::Bin,
            Content::Object(_) => TypeCode::Obj,
            Content::Array(_) => TypeCode::Arr,
        }
    }
}

impl Drop for Content {
    /// Releases nested containers from a work list so dropping a deep tree
    /// does not recurse once per level.
    fn drop(&mut self) {
        let mut pending = match self {
            Content::Object(children) | Content::Array(children)
                if children.iter().any(Value::is_container) =>
            {
                std::mem::take(children)
            }
            _ => return,
        };
        while let Some(mut value) = pending.pop() {
            if let Content::Object(children) | Content::Array(children) = &mut value.content {
                pending.append(children);
            }
        }
    }
}

impl Value {
    /// Create a value from a name and a payload.
    pub fn new(name: impl Into<String>, content: Content) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    pub fn string(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, Content::String(text.into()))
    }

    pub fn integer(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, Content::Integer(value))
    }

    pub fn float(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, Content::Float(value))
    }

    pub fn boolean(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, Content::Boolean(value))
    }

    pub fn null(name: impl Into<String>) -> Self {
        Self::new(name, Content::Null)
    }

    pub fn binary(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self::new(name, Content::Binary(bytes.into()))
    }

    pub fn object(name: impl Into<String>, fields: Vec<Value>) -> Self {
        Self::new(name, Content::Object(fields))
    }

    pub fn array(name: impl Into<String>, elements: Vec<Value>) -> Self {
        Self::new(name, Content::Array(elements))
    }

    /// The value's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wire type code for this value.
    pub fn type_code(&self) -> TypeCode {
        self.content.type_code()
    }

    /// Returns true for objects and arrays.
    pub fn is_container(&self) -> bool {
        self.type_code().is_container()
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.content {
            Content::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.content {
            Content::Integer(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.content {
            Content::Float(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.content {
            Content::Boolean(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match &self.content {
            Content::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.content, Content::Null)
    }

    /// Immediate children of an object or array, in wire order.
    ///
    /// Leaves have no children and return an empty slice.
    pub fn children(&self) -> &[Value] {
        match &self.content {
            Content::Object(children) | Content::Array(children) => children,
            _ => &[],
        }
    }

    /// First field of an object whose name equals `key`.
    ///
    /// Returns `None` for non-objects. Arrays are positional; use [`Value::at`].
    pub fn get(&self, key: &str) -> Option<&Value> {
        match &self.content {
            Content::Object(fields) => fields.iter().find(|field| field.name == key),
            _ => None,
        }
    }

    /// Every field of an object whose name equals `key`, in wire order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        let fields: &[Value] = match &self.content {
            Content::Object(fields) => fields,
            _ => &[],
        };
        fields.iter().filter(move |field| field.name == key)
    }

    /// Element of an array at `index`.
    ///
    /// Returns `None` for non-arrays or an out-of-range index.
    pub fn at(&self, index: usize) -> Option<&Value> {
        match &self.content {
            Content::Array(elements) => elements.get(index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Value {
        Value::object(
            "user",
            vec![
                Value::string("name", "John"),
                Value::integer("age", 25),
                Value::string("name", "Johnny"),
            ],
        )
    }

    #[test]
    fn object_lookup_returns_first_match() {
        let user = user();
        assert_eq!(user.get("name").and_then(Value::as_str), Some("John"));
        assert_eq!(user.get("age").and_then(Value::as_i64), Some(25));
        assert!(user.get("email").is_none());
    }

    #[test]
    fn duplicate_keys_stay_positional() {
        let user = user();
        let names: Vec<_> = user.get_all("name").filter_map(Value::as_str).collect();
        assert_eq!(names, vec!["John", "Johnny"]);
        assert_eq!(user.children()[2].as_str(), Some("Johnny"));
    }

    #[test]
    fn arrays_ignore_names_for_lookup() {
        let items = Value::array(
            "items",
            vec![Value::string("hello", "hello"), Value::integer("num", 42)],
        );
        assert!(items.get("hello").is_none());
        assert_eq!(items.at(1).and_then(Value::as_i64), Some(42));
        assert!(items.at(2).is_none());
        assert!(user().at(0).is_none());
    }

    #[test]
    fn accessors_match_only_their_type() {
        let flag = Value::boolean("flag", true);
        assert_eq!(flag.as_bool(), Some(true));
        assert_eq!(flag.as_i64(), None);
        assert!(flag.children().is_empty());
        assert!(Value::null("n").is_null());
        assert_eq!(
            Value::binary("b", vec![0u8, 255]).as_bytes().map(|b| b.as_ref()),
            Some(&[0u8, 255][..])
        );
        assert_eq!(Value::float("f", 1.5).as_f64(), Some(1.5));
    }

    #[test]
    fn lookup_result_outlives_key() {
        let user = user();
        let found = {
            let key = String::from("age");
            user.get(&key)
        };
        assert_eq!(found.and_then(Value::as_i64), Some(25));
    }

    #[test]
    fn deep_tree_drops_without_recursion() {
        let mut tree = Value::null("leaf");
        for depth in 0..200_000 {
            tree = if depth % 2 == 0 {
                Value::array("a", vec![tree, Value::integer("n", 1)])
            } else {
                Value::object("o", vec![tree])
            };
        }
        assert!(tree.is_container());
        drop(tree);
    }

    #[test]
    fn type_codes_follow_content() {
        assert_eq!(user().type_code(), TypeCode::Obj);
        assert!(user().is_container());
        assert_eq!(Value::null("").type_code(), TypeCode::Nul);
        assert!(!Value::string("s", "").is_container());
    }
}
