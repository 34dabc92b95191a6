//! Dynamic value representation for EDN data.
//!
//! [`Value`] covers the full EDN value space: nil, booleans, integers
//! (promoting to [`BigInt`] past `i64` or when marked with a trailing `N`),
//! floats, characters, strings, symbols, keywords, lists, vectors, maps,
//! sets and tagged values — plus the results of the built-in reader tags
//! (`Inst` for `#inst`, `Bytes` for `#base64`).
//!
//! `Value` is `Eq + Hash`, so any EDN value can serve as a map key or set
//! element; floats compare and hash by bit pattern, collections hash
//! order-insensitively.
//!
//! The module also holds the small wrapper types that give host data EDN
//! shapes the serde data model does not have on its own:
//!
//! - [`Symbol`] and [`Keyword`] — identifier newtypes; a `String` field
//!   decodes only from EDN strings, a `Keyword` field only from `:keywords`.
//! - [`Tag`] — the generic tagged capability: binds the next tagged value
//!   without consulting any handler.
//! - [`RawEdn`] — captures the exact source text of the next value on
//!   decode, and is spliced back verbatim on encode.
//!
//! These wrappers talk to this crate's serializer and deserializer through
//! private newtype-struct names; under any other serde format they degrade
//! to plain strings (or, for `Tag`, a `[name, value]` pair).

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, SecondsFormat, Utc};
use num_bigint::BigInt;
use serde::de::{self, IntoDeserializer, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::map::{EdnMap, EdnSet};

// Private newtype-struct names used to smuggle EDN-only shapes through the
// serde data model between this crate's two ends.
pub(crate) const KEYWORD_TOKEN: &str = "$serde_edn::private::Keyword";
pub(crate) const SYMBOL_TOKEN: &str = "$serde_edn::private::Symbol";
pub(crate) const TAG_TOKEN: &str = "$serde_edn::private::Tag";
pub(crate) const RAW_TOKEN: &str = "$serde_edn::private::Raw";
pub(crate) const INST_TOKEN: &str = "$serde_edn::private::Inst";
pub(crate) const BIGINT_TOKEN: &str = "$serde_edn::private::BigInt";
pub(crate) const SET_TOKEN: &str = "$serde_edn::private::Set";
pub(crate) const LIST_TOKEN: &str = "$serde_edn::private::List";

/// An EDN symbol: `foo`, `my.ns/foo`, or the bare `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(String);

/// An EDN keyword without its leading colon: `Keyword::from("a")` prints as
/// `:a`, `Keyword::from("ns/a")` as `:ns/a`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Keyword(String);

macro_rules! ident_impl {
    ($ty:ident, $token:ident) => {
        impl $ty {
            #[must_use]
            pub fn new(text: impl Into<String>) -> Self {
                $ty(text.into())
            }

            /// The full text, namespace included, without decoration.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// The part before the namespace separator, if there is one.
            /// The bare `/` symbol has no namespace.
            #[must_use]
            pub fn namespace(&self) -> Option<&str> {
                if self.0 == "/" {
                    return None;
                }
                self.0.split_once('/').map(|(ns, _)| ns)
            }

            /// The part after the namespace separator, or the whole text.
            #[must_use]
            pub fn name(&self) -> &str {
                if self.0 == "/" {
                    return &self.0;
                }
                self.0.split_once('/').map_or(&*self.0, |(_, n)| n)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                $ty(s.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                $ty(s)
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_newtype_struct($token, &self.0)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct V;
                impl<'de> Visitor<'de> for V {
                    type Value = $ty;

                    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                        f.write_str(concat!("an EDN ", stringify!($ty)))
                    }

                    fn visit_str<E: de::Error>(self, v: &str) -> Result<$ty, E> {
                        Ok($ty(v.to_string()))
                    }

                    fn visit_string<E: de::Error>(self, v: String) -> Result<$ty, E> {
                        Ok($ty(v))
                    }

                    fn visit_newtype_struct<D: Deserializer<'de>>(
                        self,
                        d: D,
                    ) -> Result<$ty, D::Error> {
                        d.deserialize_str(self)
                    }
                }
                deserializer.deserialize_newtype_struct($token, V)
            }
        }
    };
}

ident_impl!(Symbol, SYMBOL_TOKEN);
ident_impl!(Keyword, KEYWORD_TOKEN);

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

/// A tagged value bound without handler dispatch: decoding `#inst "…"` into
/// a `Tag` field yields the raw tag name and its undispatched inner value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub tag: String,
    pub value: Value,
}

impl Tag {
    #[must_use]
    pub fn new(tag: impl Into<String>, value: impl Into<Value>) -> Self {
        Tag {
            tag: tag.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.tag, self.value)
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct(TAG_TOKEN, 2)?;
        s.serialize_field("tag", &self.tag)?;
        s.serialize_field("value", &self.value)?;
        s.end()
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = Tag;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an EDN tagged value")
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Tag, A::Error> {
                let tag: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::custom("tag name missing"))?;
                let value: Value = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::custom("tag value missing"))?;
                Ok(Tag { tag, value })
            }
        }
        deserializer.deserialize_newtype_struct(TAG_TOKEN, V)
    }
}

/// A span of raw EDN source. Decoding captures the exact text of the next
/// value, whitespace inside collections preserved; encoding writes the
/// stored text verbatim, separated from its neighbors by single spaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RawEdn(String);

impl RawEdn {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        RawEdn(text.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<RawEdn> for String {
    fn from(raw: RawEdn) -> String {
        raw.0
    }
}

impl Serialize for RawEdn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(RAW_TOKEN, &self.0)
    }
}

impl<'de> Deserialize<'de> for RawEdn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = RawEdn;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("raw EDN text")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<RawEdn, E> {
                Ok(RawEdn(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<RawEdn, E> {
                Ok(RawEdn(v))
            }
        }
        deserializer.deserialize_newtype_struct(RAW_TOKEN, V)
    }
}

/// A dynamically-typed representation of any EDN value.
///
/// Decoding into `Value` is the "generic target" of the binder: `nil`,
/// booleans, numbers, strings, chars, symbols, keywords and collections map
/// to their natural variants, registered tag handlers run (so `#inst`
/// produces [`Value::Inst`]) and unregistered tags wrap their payload in
/// [`Value::Tagged`].
///
/// Lists and vectors both decode to [`Value::Vector`]; [`Value::List`]
/// exists so round lists can be built and emitted programmatically.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    /// Integer past `i64` range, or one marked exact with a trailing `N`.
    BigInt(BigInt),
    Float(f64),
    Char(char),
    String(String),
    Symbol(Symbol),
    Keyword(Keyword),
    List(Vec<Value>),
    Vector(Vec<Value>),
    Map(EdnMap),
    Set(EdnSet),
    /// A tagged value with no registered handler.
    Tagged(String, Box<Value>),
    /// Result of the built-in `#inst` handler.
    Inst(DateTime<Utc>),
    /// Result of the built-in `#base64` handler.
    Bytes(Vec<u8>),
}

impl Value {
    #[inline]
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    #[inline]
    #[must_use]
    pub const fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::BigInt(_) | Value::Float(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(
            self,
            Value::List(_) | Value::Vector(_) | Value::Map(_) | Value::Set(_)
        )
    }

    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_keyword(&self) -> Option<&Keyword> {
        match self {
            Value::Keyword(k) => Some(k),
            _ => None,
        }
    }

    /// The elements of a list or vector.
    #[inline]
    #[must_use]
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) | Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_map(&self) -> Option<&EdnMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_set(&self) -> Option<&EdnSet> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_inst(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Inst(dt) => Some(dt),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Short noun for diagnostics.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::BigInt(_) => "integer",
            Value::Float(_) => "float",
            Value::Char(_) => "character",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Keyword(_) => "keyword",
            Value::List(_) => "list",
            Value::Vector(_) => "vector",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Tagged(..) => "tagged value",
            Value::Inst(_) => "instant",
            Value::Bytes(_) => "byte string",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Nil, Nil) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (BigInt(a), BigInt(b)) => a == b,
            // bit equality keeps NaN usable inside sets and maps
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Char(a), Char(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Symbol(a), Symbol(b)) => a == b,
            (Keyword(a), Keyword(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Vector(a), Vector(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (Set(a), Set(b)) => a == b,
            (Tagged(ta, va), Tagged(tb, vb)) => ta == tb && va == vb,
            (Inst(a), Inst(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Nil => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::BigInt(n) => n.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Char(c) => c.hash(state),
            Value::String(s) => s.hash(state),
            Value::Symbol(s) => s.hash(state),
            Value::Keyword(k) => k.hash(state),
            Value::List(v) | Value::Vector(v) => v.hash(state),
            Value::Map(m) => m.hash(state),
            Value::Set(s) => s.hash(state),
            Value::Tagged(t, v) => {
                t.hash(state);
                v.hash(state);
            }
            Value::Inst(dt) => dt.hash(state),
            Value::Bytes(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match crate::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

macro_rules! int_from {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Int(v as i64)
            }
        }
    )*};
}

int_from!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(n) => Value::Int(n),
            Err(_) => Value::BigInt(BigInt::from(v)),
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Symbol> for Value {
    fn from(v: Symbol) -> Self {
        Value::Symbol(v)
    }
}

impl From<Keyword> for Value {
    fn from(v: Keyword) -> Self {
        Value::Keyword(v)
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Value::BigInt(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Vector(v)
    }
}

impl From<EdnMap> for Value {
    fn from(v: EdnMap) -> Self {
        Value::Map(v)
    }
}

impl From<EdnSet> for Value {
    fn from(v: EdnSet) -> Self {
        Value::Set(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Inst(v)
    }
}

impl From<Tag> for Value {
    fn from(v: Tag) -> Self {
        Value::Tagged(v.tag, Box::new(v.value))
    }
}

impl TryFrom<Value> for i64 {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        match value {
            Value::Int(n) => Ok(n),
            Value::BigInt(ref n) => {
                i64::try_from(n.clone()).map_err(|_| crate::Error::overflow(n, "i64"))
            }
            other => Err(crate::Error::type_mismatch(other.kind(), "i64")),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(n) => Ok(n as f64),
            other => Err(crate::Error::type_mismatch(other.kind(), "f64")),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(crate::Error::type_mismatch(other.kind(), "bool")),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(crate::Error::type_mismatch(other.kind(), "String")),
        }
    }
}

pub(crate) fn format_inst(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::BigInt(n) => {
                serializer.serialize_newtype_struct(BIGINT_TOKEN, &n.to_string())
            }
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Char(c) => serializer.serialize_char(*c),
            Value::String(s) => serializer.serialize_str(s),
            Value::Symbol(s) => s.serialize(serializer),
            Value::Keyword(k) => k.serialize(serializer),
            Value::List(v) => serializer.serialize_newtype_struct(LIST_TOKEN, &Elements(v)),
            Value::Vector(v) => {
                use serde::ser::SerializeSeq;
                let mut seq = serializer.serialize_seq(Some(v.len()))?;
                for item in v {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(m) => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Set(s) => serializer.serialize_newtype_struct(SET_TOKEN, &SetElements(s)),
            Value::Tagged(tag, value) => {
                use serde::ser::SerializeStruct;
                let mut s = serializer.serialize_struct(TAG_TOKEN, 2)?;
                s.serialize_field("tag", tag)?;
                s.serialize_field("value", value)?;
                s.end()
            }
            Value::Inst(dt) => {
                serializer.serialize_newtype_struct(INST_TOKEN, &format_inst(dt))
            }
            Value::Bytes(b) => serializer.serialize_bytes(b),
        }
    }
}

struct Elements<'a>(&'a [Value]);

impl Serialize for Elements<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for item in self.0 {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

struct SetElements<'a>(&'a EdnSet);

impl Serialize for SetElements<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for item in self.0 {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any EDN value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_char<E>(self, v: char) -> Result<Value, E> {
        Ok(Value::Char(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Value, E> {
        Ok(Value::Bytes(v))
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Value, D::Error> {
        Value::deserialize(d)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Vector(items))
    }

    fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let first: Option<Value> = map.next_key()?;
        let first = match first {
            None => return Ok(Value::Map(EdnMap::new())),
            Some(v) => v,
        };
        // the codec's own deserializer smuggles EDN-only shapes through
        // single-entry maps with reserved string keys
        if let Value::String(ref key) = first {
            match key.as_str() {
                k if k == KEYWORD_TOKEN => {
                    let name: String = map.next_value()?;
                    return Ok(Value::Keyword(Keyword(name)));
                }
                k if k == SYMBOL_TOKEN => {
                    let name: String = map.next_value()?;
                    return Ok(Value::Symbol(Symbol(name)));
                }
                k if k == INST_TOKEN => {
                    let text: String = map.next_value()?;
                    let dt = DateTime::parse_from_rfc3339(&text)
                        .map_err(|e| de::Error::custom(format!("bad #inst: {e}")))?;
                    return Ok(Value::Inst(dt.with_timezone(&Utc)));
                }
                k if k == BIGINT_TOKEN => {
                    let digits: String = map.next_value()?;
                    let n: BigInt = digits
                        .parse()
                        .map_err(|e| de::Error::custom(format!("bad big integer: {e}")))?;
                    return Ok(Value::BigInt(n));
                }
                k if k == SET_TOKEN => {
                    let items: Vec<Value> = map.next_value()?;
                    return Ok(Value::Set(items.into_iter().collect()));
                }
                k if k == LIST_TOKEN => {
                    let items: Vec<Value> = map.next_value()?;
                    return Ok(Value::List(items));
                }
                k if k == TAG_TOKEN => {
                    let (tag, value): (String, Value) = map.next_value()?;
                    return Ok(Value::Tagged(tag, Box::new(value)));
                }
                _ => {}
            }
        }
        let mut out = EdnMap::new();
        let value: Value = map.next_value()?;
        out.insert(first, value);
        while let Some((k, v)) = map.next_entry()? {
            out.insert(k, v);
        }
        Ok(Value::Map(out))
    }
}

/// Deserializes host types out of an already-parsed [`Value`]; this is what
/// runs when a tag handler's result is bound into the caller's target.
pub struct ValueDeserializer {
    value: Value,
}

impl ValueDeserializer {
    pub fn new(value: Value) -> Self {
        ValueDeserializer { value }
    }

    fn mismatch(value: &Value, target: &'static str) -> crate::Error {
        crate::Error::type_mismatch(value.kind(), target)
    }
}

impl<'de> IntoDeserializer<'de, crate::Error> for Value {
    type Deserializer = ValueDeserializer;

    fn into_deserializer(self) -> ValueDeserializer {
        ValueDeserializer::new(self)
    }
}

macro_rules! value_de_int {
    ($method:ident, $visit:ident, $ty:ty) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
            match self.value {
                Value::Int(n) => {
                    let narrowed = <$ty>::try_from(n)
                        .map_err(|_| crate::Error::overflow(n, stringify!($ty)))?;
                    visitor.$visit(narrowed)
                }
                Value::BigInt(ref n) => {
                    let narrowed = <$ty>::try_from(n.clone())
                        .map_err(|_| crate::Error::overflow(n, stringify!($ty)))?;
                    visitor.$visit(narrowed)
                }
                ref other => Err(Self::mismatch(other, stringify!($ty))),
            }
        }
    };
}

impl<'de> Deserializer<'de> for ValueDeserializer {
    type Error = crate::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
        match self.value {
            Value::Nil => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Int(n) => visitor.visit_i64(n),
            Value::BigInt(n) => visit_magic(visitor, BIGINT_TOKEN, Value::String(n.to_string())),
            Value::Float(f) => visitor.visit_f64(f),
            Value::Char(c) => visitor.visit_char(c),
            Value::String(s) => visitor.visit_string(s),
            Value::Symbol(s) => {
                visit_magic(visitor, SYMBOL_TOKEN, Value::String(s.as_str().to_string()))
            }
            Value::Keyword(k) => {
                visit_magic(visitor, KEYWORD_TOKEN, Value::String(k.as_str().to_string()))
            }
            Value::List(items) => visit_magic(visitor, LIST_TOKEN, Value::Vector(items)),
            Value::Vector(items) => {
                let mut de = ValueSeqAccess::new(items);
                visitor.visit_seq(&mut de)
            }
            Value::Map(map) => {
                let mut de = ValueMapAccess::new(map);
                visitor.visit_map(&mut de)
            }
            Value::Set(set) => visit_magic(
                visitor,
                SET_TOKEN,
                Value::Vector(set.into_iter().collect()),
            ),
            Value::Tagged(tag, value) => visit_magic(
                visitor,
                TAG_TOKEN,
                Value::Vector(vec![Value::String(tag), *value]),
            ),
            Value::Inst(dt) => visit_magic(visitor, INST_TOKEN, Value::String(format_inst(&dt))),
            Value::Bytes(b) => visitor.visit_byte_buf(b),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
        match self.value {
            Value::Bool(b) => visitor.visit_bool(b),
            ref other => Err(Self::mismatch(other, "bool")),
        }
    }

    value_de_int!(deserialize_i8, visit_i8, i8);
    value_de_int!(deserialize_i16, visit_i16, i16);
    value_de_int!(deserialize_i32, visit_i32, i32);
    value_de_int!(deserialize_i64, visit_i64, i64);
    value_de_int!(deserialize_u8, visit_u8, u8);
    value_de_int!(deserialize_u16, visit_u16, u16);
    value_de_int!(deserialize_u32, visit_u32, u32);
    value_de_int!(deserialize_u64, visit_u64, u64);

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
        self.deserialize_f64(visitor)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
        match self.value {
            Value::Float(f) => visitor.visit_f64(f),
            Value::Int(n) => visitor.visit_f64(n as f64),
            ref other => Err(Self::mismatch(other, "f64")),
        }
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
        match self.value {
            Value::Char(c) => visitor.visit_char(c),
            ref other => Err(Self::mismatch(other, "char")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
        match self.value {
            Value::String(s) => visitor.visit_string(s),
            Value::Inst(dt) => visitor.visit_string(format_inst(&dt)),
            ref other => Err(Self::mismatch(other, "string")),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
        match self.value {
            Value::Bytes(b) => visitor.visit_byte_buf(b),
            Value::String(s) => {
                use base64::Engine as _;
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(s.as_bytes())
                    .map_err(|e| crate::Error::Message(format!("bad base64: {e}")))?;
                visitor.visit_byte_buf(decoded)
            }
            ref other => Err(Self::mismatch(other, "bytes")),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
        match self.value {
            Value::Nil => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
        match self.value {
            Value::Nil => visitor.visit_unit(),
            ref other => Err(Self::mismatch(other, "nil")),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> crate::Result<V::Value> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> crate::Result<V::Value> {
        if name == KEYWORD_TOKEN {
            return match self.value {
                Value::Keyword(k) => visitor.visit_string(k.as_str().to_string()),
                ref other => Err(Self::mismatch(other, "keyword")),
            };
        }
        if name == SYMBOL_TOKEN {
            return match self.value {
                Value::Symbol(s) => visitor.visit_string(s.as_str().to_string()),
                ref other => Err(Self::mismatch(other, "symbol")),
            };
        }
        if name == TAG_TOKEN {
            return match self.value {
                Value::Tagged(tag, value) => {
                    let items = vec![Value::String(tag), *value];
                    let mut de = ValueSeqAccess::new(items);
                    visitor.visit_seq(&mut de)
                }
                ref other => Err(Self::mismatch(other, "tagged value")),
            };
        }
        if name == RAW_TOKEN {
            let text = crate::to_string(&self.value)?;
            return visitor.visit_string(text);
        }
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
        match self.value {
            Value::List(items) | Value::Vector(items) => {
                let mut de = ValueSeqAccess::new(items);
                visitor.visit_seq(&mut de)
            }
            Value::Set(set) => {
                let mut de = ValueSeqAccess::new(set.into_iter().collect());
                visitor.visit_seq(&mut de)
            }
            ref other => Err(Self::mismatch(other, "sequence")),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> crate::Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> crate::Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
        match self.value {
            Value::Map(map) => {
                let mut de = ValueMapAccess::new(map);
                visitor.visit_map(&mut de)
            }
            Value::Set(set) => {
                // a set fills a bool- or unit-valued map
                let mut de = ValueSetFillAccess::new(set);
                visitor.visit_map(&mut de)
            }
            ref other => Err(Self::mismatch(other, "map")),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> crate::Result<V::Value> {
        match self.value {
            Value::Map(map) => {
                let mut de = ValueMapAccess::new(map);
                visitor.visit_map(&mut de)
            }
            ref other => Err(Self::mismatch(other, "map")),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> crate::Result<V::Value> {
        match self.value {
            Value::Keyword(k) => visitor.visit_enum(k.as_str().to_string().into_deserializer()),
            Value::Symbol(s) => visitor.visit_enum(s.as_str().to_string().into_deserializer()),
            Value::String(s) => visitor.visit_enum(s.into_deserializer()),
            Value::Map(map) => {
                let mut iter = map.into_iter();
                let (variant, value) = iter
                    .next()
                    .ok_or_else(|| crate::Error::Message("empty map for enum".into()))?;
                if iter.next().is_some() {
                    return Err(crate::Error::Message(
                        "enum map must have a single entry".into(),
                    ));
                }
                visitor.visit_enum(ValueEnumAccess { variant, value })
            }
            ref other => Err(Self::mismatch(other, "enum")),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
        match self.value {
            Value::Keyword(k) => {
                let k = k.as_str().to_string();
                visitor.visit_string(k)
            }
            Value::Symbol(s) => {
                let s = s.as_str().to_string();
                visitor.visit_string(s)
            }
            Value::String(s) => visitor.visit_string(s),
            ref other => Err(Self::mismatch(other, "identifier")),
        }
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
        visitor.visit_unit()
    }
}

fn visit_magic<'de, V: Visitor<'de>>(
    visitor: V,
    token: &'static str,
    payload: Value,
) -> crate::Result<V::Value> {
    struct Access {
        token: &'static str,
        payload: Option<Value>,
        done: bool,
    }

    impl<'de> de::MapAccess<'de> for Access {
        type Error = crate::Error;

        fn next_key_seed<K: de::DeserializeSeed<'de>>(
            &mut self,
            seed: K,
        ) -> crate::Result<Option<K::Value>> {
            if self.done {
                return Ok(None);
            }
            self.done = true;
            seed.deserialize(ValueDeserializer::new(Value::String(self.token.to_string())))
                .map(Some)
        }

        fn next_value_seed<S: de::DeserializeSeed<'de>>(
            &mut self,
            seed: S,
        ) -> crate::Result<S::Value> {
            let payload = self
                .payload
                .take()
                .ok_or(crate::Error::Internal("magic payload taken twice"))?;
            seed.deserialize(ValueDeserializer::new(payload))
        }
    }

    visitor.visit_map(Access {
        token,
        payload: Some(payload),
        done: false,
    })
}

struct ValueSeqAccess {
    iter: std::vec::IntoIter<Value>,
}

impl ValueSeqAccess {
    fn new(items: Vec<Value>) -> Self {
        ValueSeqAccess {
            iter: items.into_iter(),
        }
    }
}

impl<'de> de::SeqAccess<'de> for &mut ValueSeqAccess {
    type Error = crate::Error;

    fn next_element_seed<S: de::DeserializeSeed<'de>>(
        &mut self,
        seed: S,
    ) -> crate::Result<Option<S::Value>> {
        match self.iter.next() {
            Some(value) => seed.deserialize(ValueDeserializer::new(value)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct ValueMapAccess {
    iter: indexmap::map::IntoIter<Value, Value>,
    pending: Option<Value>,
}

impl ValueMapAccess {
    fn new(map: EdnMap) -> Self {
        ValueMapAccess {
            iter: map.into_iter(),
            pending: None,
        }
    }
}

impl<'de> de::MapAccess<'de> for &mut ValueMapAccess {
    type Error = crate::Error;

    fn next_key_seed<K: de::DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> crate::Result<Option<K::Value>> {
        match self.iter.next() {
            Some((key, value)) => {
                self.pending = Some(value);
                seed.deserialize(ValueKeyDeserializer { key }).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<S: de::DeserializeSeed<'de>>(
        &mut self,
        seed: S,
    ) -> crate::Result<S::Value> {
        let value = self
            .pending
            .take()
            .ok_or(crate::Error::Internal("value read before key"))?;
        seed.deserialize(ValueDeserializer::new(value))
    }
}

/// Map keys reach struct visitors as their bare text: `:kw`, `sym` and
/// `"str"` keys all match a field named after them.
struct ValueKeyDeserializer {
    key: Value,
}

impl<'de> Deserializer<'de> for ValueKeyDeserializer {
    type Error = crate::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> crate::Result<V::Value> {
        match self.key {
            Value::Keyword(k) => visitor.visit_string(k.as_str().to_string()),
            Value::Symbol(s) => visitor.visit_string(s.as_str().to_string()),
            other => ValueDeserializer::new(other).deserialize_any(visitor),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str string bytes
        byte_buf option unit unit_struct newtype_struct seq tuple tuple_struct
        map struct enum identifier ignored_any
    }
}

struct ValueSetFillAccess {
    iter: indexmap::set::IntoIter<Value>,
    pending: bool,
}

impl ValueSetFillAccess {
    fn new(set: EdnSet) -> Self {
        ValueSetFillAccess {
            iter: set.into_iter(),
            pending: false,
        }
    }
}

impl<'de> de::MapAccess<'de> for &mut ValueSetFillAccess {
    type Error = crate::Error;

    fn next_key_seed<K: de::DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> crate::Result<Option<K::Value>> {
        match self.iter.next() {
            Some(key) => {
                self.pending = true;
                seed.deserialize(ValueDeserializer::new(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<S: de::DeserializeSeed<'de>>(
        &mut self,
        seed: S,
    ) -> crate::Result<S::Value> {
        if !self.pending {
            return Err(crate::Error::Internal("value read before key"));
        }
        self.pending = false;
        seed.deserialize(crate::de::SetFillDeserializer)
    }
}

struct ValueEnumAccess {
    variant: Value,
    value: Value,
}

impl<'de> de::EnumAccess<'de> for ValueEnumAccess {
    type Error = crate::Error;
    type Variant = ValueVariantAccess;

    fn variant_seed<S: de::DeserializeSeed<'de>>(
        self,
        seed: S,
    ) -> crate::Result<(S::Value, ValueVariantAccess)> {
        let variant = seed.deserialize(ValueKeyDeserializer { key: self.variant })?;
        Ok((variant, ValueVariantAccess { value: self.value }))
    }
}

struct ValueVariantAccess {
    value: Value,
}

impl<'de> de::VariantAccess<'de> for ValueVariantAccess {
    type Error = crate::Error;

    fn unit_variant(self) -> crate::Result<()> {
        match self.value {
            Value::Nil => Ok(()),
            ref other => Err(crate::Error::type_mismatch(other.kind(), "unit variant")),
        }
    }

    fn newtype_variant_seed<S: de::DeserializeSeed<'de>>(self, seed: S) -> crate::Result<S::Value> {
        seed.deserialize(ValueDeserializer::new(self.value))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> crate::Result<V::Value> {
        ValueDeserializer::new(self.value).deserialize_seq(visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> crate::Result<V::Value> {
        ValueDeserializer::new(self.value).deserialize_map(visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_splitting() {
        let s = Symbol::from("my.ns/foo");
        assert_eq!(s.namespace(), Some("my.ns"));
        assert_eq!(s.name(), "foo");

        let bare = Symbol::from("/");
        assert_eq!(bare.namespace(), None);
        assert_eq!(bare.name(), "/");

        let k = Keyword::from("plain");
        assert_eq!(k.namespace(), None);
        assert_eq!(k.name(), "plain");
    }

    #[test]
    fn displays() {
        assert_eq!(Keyword::from("friday").to_string(), ":friday");
        assert_eq!(Symbol::from("friday").to_string(), "friday");
    }

    #[test]
    fn float_equality_by_bits() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
    }

    #[test]
    fn u64_promotes_past_i64() {
        assert_eq!(Value::from(1u64), Value::Int(1));
        assert!(matches!(Value::from(u64::MAX), Value::BigInt(_)));
    }

    #[test]
    fn try_from_conversions() {
        assert_eq!(i64::try_from(Value::Int(42)).unwrap(), 42);
        assert!(i64::try_from(Value::from("x")).is_err());
        assert_eq!(f64::try_from(Value::Int(2)).unwrap(), 2.0);
        assert!(bool::try_from(Value::Int(1)).is_err());
        assert_eq!(String::try_from(Value::from("hi")).unwrap(), "hi");
    }

    #[test]
    fn value_roundtrip_through_value_deserializer() {
        let original = Value::Tagged(
            "a".into(),
            Box::new(Value::Vector(vec![
                Value::Keyword(Keyword::from("k")),
                Value::Int(1),
            ])),
        );
        let back = Value::deserialize(ValueDeserializer::new(original.clone())).unwrap();
        assert_eq!(original, back);
    }

    #[test]
    fn set_roundtrip_through_value_deserializer() {
        let set: EdnSet = vec![Value::Int(1), Value::Int(2)].into_iter().collect();
        let original = Value::Set(set);
        let back = Value::deserialize(ValueDeserializer::new(original.clone())).unwrap();
        assert_eq!(original, back);
    }
}
