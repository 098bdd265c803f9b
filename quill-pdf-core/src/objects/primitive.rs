use crate::objects::{Array, Dictionary, Stream};
use std::fmt;

/// Identity of an indirect object: object number and generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    number: u32,
    generation: u16,
}

impl ObjectId {
    pub fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn generation(&self) -> u16 {
        self.generation
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

/// A PDF name such as `/Type` or `/FlateDecode`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Name(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name(s.to_string())
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name(s)
    }
}

/// Source form of a string object. Preserved so re-serialization keeps the
/// flavor the file used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringFormat {
    #[default]
    Literal,
    Hexadecimal,
}

/// A PDF string: arbitrary bytes, not necessarily text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PdfString {
    pub data: Vec<u8>,
    pub format: StringFormat,
}

impl PdfString {
    pub fn literal(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            format: StringFormat::Literal,
        }
    }

    pub fn hexadecimal(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            format: StringFormat::Hexadecimal,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The native PDF value kinds. Used as the discriminant for cast
/// compatibility checks and schema declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PdfType {
    Null,
    Boolean,
    Integer,
    Real,
    Name,
    String,
    Array,
    Dictionary,
    Stream,
    Reference,
}

impl fmt::Display for PdfType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PdfType::Null => "Null",
            PdfType::Boolean => "Boolean",
            PdfType::Integer => "Integer",
            PdfType::Real => "Real",
            PdfType::Name => "Name",
            PdfType::String => "String",
            PdfType::Array => "Array",
            PdfType::Dictionary => "Dictionary",
            PdfType::Stream => "Stream",
            PdfType::Reference => "Reference",
        };
        f.write_str(name)
    }
}

/// A PDF value. Composite variants hold handles into the owning
/// [`Arena`](crate::objects::Arena) rather than boxed children, so parent
/// links stay non-owning.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(Name),
    String(PdfString),
    Array(Array),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
}

impl Object {
    pub fn kind(&self) -> PdfType {
        match self {
            Object::Null => PdfType::Null,
            Object::Boolean(_) => PdfType::Boolean,
            Object::Integer(_) => PdfType::Integer,
            Object::Real(_) => PdfType::Real,
            Object::Name(_) => PdfType::Name,
            Object::String(_) => PdfType::String,
            Object::Array(_) => PdfType::Array,
            Object::Dictionary(_) => PdfType::Dictionary,
            Object::Stream(_) => PdfType::Stream,
            Object::Reference(_) => PdfType::Reference,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(f) => Some(*f),
            Object::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Object::Reference(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<bool> for Object {
    fn from(b: bool) -> Self {
        Object::Boolean(b)
    }
}

impl From<i32> for Object {
    fn from(i: i32) -> Self {
        Object::Integer(i as i64)
    }
}

impl From<i64> for Object {
    fn from(i: i64) -> Self {
        Object::Integer(i)
    }
}

impl From<f64> for Object {
    fn from(f: f64) -> Self {
        Object::Real(f)
    }
}

impl From<Name> for Object {
    fn from(n: Name) -> Self {
        Object::Name(n)
    }
}

impl From<&str> for Object {
    fn from(s: &str) -> Self {
        Object::String(PdfString::literal(s.as_bytes().to_vec()))
    }
}

impl From<Vec<u8>> for Object {
    fn from(data: Vec<u8>) -> Self {
        Object::String(PdfString::literal(data))
    }
}

impl From<PdfString> for Object {
    fn from(s: PdfString) -> Self {
        Object::String(s)
    }
}

impl From<ObjectId> for Object {
    fn from(id: ObjectId) -> Self {
        Object::Reference(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_ordering() {
        let a = ObjectId::new(1, 0);
        let b = ObjectId::new(1, 1);
        let c = ObjectId::new(2, 0);

        assert!(a < b);
        assert!(b < c);
        assert_eq!(a, ObjectId::new(1, 0));
        assert_eq!(format!("{}", c), "2 0 R");
    }

    #[test]
    fn test_kind_discriminants() {
        assert_eq!(Object::Null.kind(), PdfType::Null);
        assert_eq!(Object::Boolean(true).kind(), PdfType::Boolean);
        assert_eq!(Object::Integer(7).kind(), PdfType::Integer);
        assert_eq!(Object::Real(1.5).kind(), PdfType::Real);
        assert_eq!(Object::from("abc").kind(), PdfType::String);
        assert_eq!(Object::from(Name::new("Type")).kind(), PdfType::Name);
        assert_eq!(Object::Reference(ObjectId::new(3, 0)).kind(), PdfType::Reference);
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Object::from(true), Object::Boolean(true));
        assert_eq!(Object::from(42i64), Object::Integer(42));
        assert_eq!(Object::from(42i32), Object::Integer(42));
        assert_eq!(Object::from(2.5), Object::Real(2.5));
        assert_eq!(
            Object::from("hello"),
            Object::String(PdfString::literal(b"hello".to_vec()))
        );
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Object::Integer(9).as_integer(), Some(9));
        assert_eq!(Object::Integer(9).as_real(), Some(9.0));
        assert_eq!(Object::Real(1.25).as_real(), Some(1.25));
        assert_eq!(Object::Boolean(false).as_bool(), Some(false));
        assert!(Object::Null.is_null());
        assert_eq!(Object::Null.as_integer(), None);

        let name = Object::from(Name::new("Pages"));
        assert_eq!(name.as_name().map(Name::as_str), Some("Pages"));

        let re = Object::Reference(ObjectId::new(3, 0));
        assert_eq!(re.as_reference(), Some(ObjectId::new(3, 0)));
    }

    #[test]
    fn test_string_format_preserved() {
        let lit = PdfString::literal(b"abc".to_vec());
        let hex = PdfString::hexadecimal(b"abc".to_vec());

        assert_eq!(lit.format, StringFormat::Literal);
        assert_eq!(hex.format, StringFormat::Hexadecimal);
        assert_eq!(lit.as_bytes(), hex.as_bytes());
        assert_ne!(lit, hex);
    }
}
