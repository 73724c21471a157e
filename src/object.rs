//! PDF object types.
//!
//! The object graph is an arena: objects never own each other across indirect
//! boundaries. An [`Object::Reference`] is only an [`ObjectRef`] key; resolving it
//! goes through [`Document`](crate::document::Document), which owns every
//! indirect object.

use crate::error::{Error, Result};
use bytes::Bytes;
use indexmap::IndexMap;

/// Dictionary entries keyed by name (without the leading `/`).
///
/// Insertion order carries no meaning in PDF but is preserved so that output is
/// deterministic and close to the input.
pub type Dictionary = IndexMap<String, Object>;

/// Whether a stream's bytes are still encoded by its `/Filter` chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Bytes are exactly as the filter chain produced them (as read from a file).
    /// Written back unchanged, even when a filter is unknown to this crate.
    Raw,
    /// Bytes are plaintext; the writer runs them through the filter chain.
    Decoded,
}

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array); literal and hex strings decode to the same bytes
    String(Vec<u8>),
    /// Name (without the leading /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary
    Dictionary(Dictionary),
    /// Stream (dictionary + payload)
    Stream {
        /// Stream dictionary
        dict: Dictionary,
        /// Payload bytes
        data: Bytes,
        /// Encoding state of `data`
        state: StreamState,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl From<ObjectRef> for Object {
    fn from(r: ObjectRef) -> Self {
        Object::Reference(r)
    }
}

impl From<i64> for Object {
    fn from(v: i64) -> Self {
        Object::Integer(v)
    }
}

impl From<bool> for Object {
    fn from(v: bool) -> Self {
        Object::Boolean(v)
    }
}

impl From<Dictionary> for Object {
    fn from(d: Dictionary) -> Self {
        Object::Dictionary(d)
    }
}

impl From<Vec<Object>> for Object {
    fn from(a: Vec<Object>) -> Self {
        Object::Array(a)
    }
}

impl Object {
    /// A name object.
    pub fn name(name: impl Into<String>) -> Self {
        Object::Name(name.into())
    }

    /// A string object.
    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Object::String(bytes.into())
    }

    /// A stream whose bytes are already encoded per its `/Filter` entry.
    pub fn raw_stream(dict: Dictionary, data: impl Into<Bytes>) -> Self {
        Object::Stream {
            dict,
            data: data.into(),
            state: StreamState::Raw,
        }
    }

    /// A stream holding plaintext; the writer encodes it through its `/Filter` entry.
    pub fn decoded_stream(dict: Dictionary, data: impl Into<Bytes>) -> Self {
        Object::Stream {
            dict,
            data: data.into(),
            state: StreamState::Decoded,
        }
    }

    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integer or real, as f64.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Mutable dictionary access. Works for both Dictionary and Stream objects.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// True for stream objects.
    pub fn is_stream(&self) -> bool {
        matches!(self, Object::Stream { .. })
    }

    /// True if this is a dictionary (or stream) whose `/Type` is `type_name`.
    pub fn has_type(&self, type_name: &str) -> bool {
        self.as_dict()
            .and_then(|d| d.get("Type"))
            .and_then(Object::as_name)
            .is_some_and(|t| t == type_name)
    }

    /// Dictionary view or an `InvalidObjectType` error.
    pub fn expect_dict(&self) -> Result<&Dictionary> {
        self.as_dict().ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: self.type_name().to_string(),
        })
    }

    /// Every indirect reference directly contained in this object, including
    /// those nested in arrays and dictionaries. Does not follow references.
    pub fn references(&self) -> Vec<ObjectRef> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(obj) = stack.pop() {
            match obj {
                Object::Reference(r) => out.push(*r),
                Object::Array(items) => stack.extend(items.iter()),
                Object::Dictionary(dict) | Object::Stream { dict, .. } => {
                    stack.extend(dict.values())
                },
                _ => {},
            }
        }
        out
    }

    /// Decode stream data through the default filter registry.
    ///
    /// `/Filter` and `/DecodeParms` must be direct objects; use
    /// [`Document::decode_stream`](crate::document::Document::decode_stream) for
    /// streams read from a file, which resolves indirect entries and decrypts.
    pub fn decode_stream_data(&self) -> Result<Vec<u8>> {
        match self {
            Object::Stream {
                data,
                state: StreamState::Decoded,
                ..
            } => Ok(data.to_vec()),
            Object::Stream { dict, data, .. } => {
                let chain = crate::filters::FilterChain::from_dict(dict)?;
                crate::filters::default_registry().decode(data, &chain, &Default::default())
            },
            _ => Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: self.type_name().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_accessors() {
        assert_eq!(Object::Integer(42).as_integer(), Some(42));
        assert_eq!(Object::Integer(42).as_number(), Some(42.0));
        assert_eq!(Object::name("Type").as_name(), Some("Type"));
        assert_eq!(Object::Boolean(true).as_bool(), Some(true));
        assert_eq!(Object::string("Hello").as_string(), Some(&b"Hello"[..]));
        assert!(Object::Null.is_null());
        assert!(Object::Null.as_integer().is_none());
    }

    #[test]
    fn test_object_dictionary() {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::name("Filespec"));
        let obj = Object::Dictionary(dict);

        assert!(obj.has_type("Filespec"));
        assert!(!obj.has_type("Catalog"));
        assert_eq!(obj.expect_dict().unwrap().len(), 1);
    }

    #[test]
    fn test_object_stream_dict_access() {
        let mut dict = Dictionary::new();
        dict.insert("Length".to_string(), Object::Integer(100));
        let obj = Object::raw_stream(dict, Bytes::from_static(b"stream data"));

        let d = obj.as_dict().unwrap();
        assert_eq!(d.get("Length").unwrap().as_integer(), Some(100));
        assert!(obj.is_stream());
    }

    #[test]
    fn test_expect_dict_error() {
        match Object::Integer(1).expect_dict() {
            Err(Error::InvalidObjectType { expected, found }) => {
                assert_eq!(expected, "Dictionary");
                assert_eq!(found, "Integer");
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_object_ref_display_and_order() {
        let a = ObjectRef::new(10, 0);
        assert_eq!(format!("{}", a), "10 0 R");
        assert!(ObjectRef::new(2, 0) < ObjectRef::new(10, 0));
        assert!(ObjectRef::new(2, 0) < ObjectRef::new(2, 1));
    }

    #[test]
    fn test_references_nested() {
        let mut inner = Dictionary::new();
        inner.insert("F".to_string(), Object::Reference(ObjectRef::new(3, 0)));
        let mut dict = Dictionary::new();
        dict.insert("EF".to_string(), Object::Dictionary(inner));
        dict.insert(
            "Kids".to_string(),
            Object::Array(vec![ObjectRef::new(4, 0).into(), ObjectRef::new(5, 0).into()]),
        );
        let mut refs = Object::Dictionary(dict).references();
        refs.sort();
        assert_eq!(refs, vec![ObjectRef::new(3, 0), ObjectRef::new(4, 0), ObjectRef::new(5, 0)]);
    }

    #[test]
    fn test_decode_stream_no_filter() {
        let obj = Object::raw_stream(Dictionary::new(), Bytes::from_static(b"Hello"));
        assert_eq!(obj.decode_stream_data().unwrap(), b"Hello");
    }

    #[test]
    fn test_decode_stream_single_filter() {
        let mut dict = Dictionary::new();
        dict.insert("Filter".to_string(), Object::name("ASCIIHexDecode"));
        let obj = Object::raw_stream(dict, Bytes::from_static(b"48656C6C6F>"));
        assert_eq!(obj.decode_stream_data().unwrap(), b"Hello");
    }

    #[test]
    fn test_decoded_stream_is_returned_as_is() {
        let mut dict = Dictionary::new();
        dict.insert("Filter".to_string(), Object::name("FlateDecode"));
        let obj = Object::decoded_stream(dict, Bytes::from_static(b"plain"));
        assert_eq!(obj.decode_stream_data().unwrap(), b"plain");
    }

    #[test]
    fn test_decode_stream_not_a_stream() {
        match Object::Integer(42).decode_stream_data() {
            Err(Error::InvalidObjectType { expected, found }) => {
                assert_eq!(expected, "Stream");
                assert_eq!(found, "Integer");
            },
            _ => panic!("Expected InvalidObjectType error"),
        }
    }
}
