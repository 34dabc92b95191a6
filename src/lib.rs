//! # serde_edn
//!
//! A streaming, serde-compatible codec for EDN (Extensible Data Notation).
//!
//! ## What is EDN?
//!
//! EDN is a textual data-interchange format drawn from Clojure's syntax. Its
//! value space covers `nil`, booleans, integers (arbitrary precision),
//! floats, characters, strings, symbols, keywords, lists, vectors, maps,
//! sets, and tagged values (`#inst "…"`, `#myapp/user {…}`). Commas are
//! whitespace; `;` starts a line comment; `#_` discards the next value.
//!
//! ## Key features
//!
//! - **Streaming**: values are decoded straight off any `io::Read`, one
//!   top-level value at a time, with single-rune lookahead.
//! - **Serde compatible**: works with existing Rust types via
//!   `#[derive(Serialize, Deserialize)]`; struct fields bind to `:keyword`
//!   keys (symbols and strings work too, with a case-insensitive fallback).
//! - **Extensible**: reader tags dispatch to user handlers, per-decoder or
//!   process-wide; `#inst` and `#base64` are built in.
//! - **Tooling included**: [`compact`], [`indent`] and [`pprint`] rewrite
//!   EDN text without touching its values.
//!
//! ## Quick start
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use serde_edn::{from_str, to_string};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Animal {
//!     name: String,
//!     #[serde(rename = "kind")]
//!     species: String,
//! }
//!
//! let cap: Animal = from_str(r#"{:name "Cap'n Jack" :kind "Sparrow"}"#).unwrap();
//! assert_eq!(cap.species, "Sparrow");
//!
//! let edn = to_string(&cap).unwrap();
//! assert_eq!(edn, r#"{:name"Cap'n Jack":kind"Sparrow"}"#);
//! ```
//!
//! ## Dynamic values
//!
//! When the shape isn't known at compile time, decode into [`Value`]:
//!
//! ```rust
//! use serde_edn::{from_str, kw, Value};
//!
//! let v: Value = from_str("{:a 1, :b [true nil]}").unwrap();
//! let map = v.as_map().unwrap();
//! assert_eq!(map.get(&kw!("a")), Some(&Value::Int(1)));
//! ```
//!
//! ## Reader tags
//!
//! ```rust
//! use serde_edn::{Deserializer, Value};
//!
//! let mut de = Deserializer::from_str("#celsius 26.5");
//! de.add_tag_fn("celsius", |v: Value| match v {
//!     Value::Float(c) => Ok(Value::Float(c + 273.0)),
//!     other => Err(format!("#celsius expects a float, got {other}")),
//! });
//! assert_eq!(de.decode::<f64>().unwrap(), 299.5);
//! ```
//!
//! Handlers registered with [`add_tag_fn`] apply process-wide; handlers on a
//! [`Deserializer`] shadow them. Decoding a tag into [`Tag`] captures it
//! raw, without dispatch; decoding into a concrete type with no handler
//! registered is an error.

pub mod de;
pub mod error;
pub mod macros;
pub mod map;
pub mod pprint;
pub mod ser;
pub mod tags;
pub mod value;

mod lexer;
mod parser;

pub use de::{Deserializer, StreamDeserializer};
pub use error::{Error, LexErrorKind, Result};
pub use map::{EdnMap, EdnSet};
pub use pprint::{indent, pprint, PPrintOpts};
pub use ser::{Serializer, ValueSerializer};
pub use tags::{add_tag_fn, TagRegistry};
pub use value::{Keyword, RawEdn, Symbol, Tag, Value, ValueDeserializer};

// compact lives in pprint.rs with the other re-serializers
pub use pprint::compact;

use serde::{de::DeserializeOwned, Serialize};
use std::io;

/// Serializes `value` as EDN text.
///
/// # Errors
///
/// Fails on values EDN cannot express, such as non-finite floats.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_string<T>(value: &T) -> Result<String>
where
    T: ?Sized + Serialize,
{
    let mut serializer = Serializer::new();
    value.serialize(&mut serializer)?;
    Ok(serializer.into_inner())
}

/// Serializes `value` as EDN text in a byte vector.
///
/// # Errors
///
/// Same failure modes as [`to_string`].
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_vec<T>(value: &T) -> Result<Vec<u8>>
where
    T: ?Sized + Serialize,
{
    to_string(value).map(String::into_bytes)
}

/// Serializes `value` as EDN text into `writer`.
///
/// # Errors
///
/// Fails on unserializable values or when the writer does.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_writer<W, T>(mut writer: W, value: &T) -> Result<()>
where
    W: io::Write,
    T: ?Sized + Serialize,
{
    let text = to_string(value)?;
    writer
        .write_all(text.as_bytes())
        .map_err(|e| Error::io(&e))
}

/// Converts any `T: Serialize` into a [`Value`] tree.
///
/// # Errors
///
/// Fails when a private protocol payload is malformed (for example an
/// invalid RFC3339 string smuggled as an instant).
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_value<T>(value: &T) -> Result<Value>
where
    T: ?Sized + Serialize,
{
    value.serialize(ValueSerializer)
}

/// Binds an already-parsed [`Value`] into any `T: Deserialize`.
///
/// # Errors
///
/// Fails with the same type-mismatch and overflow errors as stream
/// decoding.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_value<T>(value: Value) -> Result<T>
where
    T: DeserializeOwned,
{
    T::deserialize(ValueDeserializer::new(value))
}

/// Decodes one EDN value from a string.
///
/// Trailing content after the first value is left unread; use
/// [`Deserializer`] to consume a whole stream.
///
/// # Errors
///
/// Fails on malformed EDN or when the value does not fit `T`.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_str<T>(input: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    Deserializer::from_str(input).decode()
}

/// Decodes one EDN value from bytes.
///
/// # Errors
///
/// Same failure modes as [`from_str`].
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_slice<T>(input: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    Deserializer::from_slice(input).decode()
}

/// Decodes one EDN value from an `io::Read`.
///
/// # Errors
///
/// Same failure modes as [`from_str`], plus IO errors from the reader.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_reader<R, T>(reader: R) -> Result<T>
where
    R: io::Read,
    T: DeserializeOwned,
{
    Deserializer::from_reader(reader).decode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn roundtrip_struct() {
        let point = Point { x: 1, y: -2 };
        let edn = to_string(&point).unwrap();
        assert_eq!(edn, "{:x 1 :y -2}");
        assert_eq!(from_str::<Point>(&edn).unwrap(), point);
    }

    #[test]
    fn roundtrip_value_tree() {
        let v: Value = from_str(r#"{:xs [1 2.5 "three"] :flag true}"#).unwrap();
        let text = to_string(&v).unwrap();
        let back: Value = from_str(&text).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn to_value_matches_decoding() {
        let decoded: Value = from_str("{:x 1 :y -2}").unwrap();
        let built = to_value(&Point { x: 1, y: -2 }).unwrap();
        assert_eq!(decoded, built);
    }

    #[test]
    fn from_value_binds_typed() {
        let v: Value = from_str("{:x 3 :y 4}").unwrap();
        assert_eq!(from_value::<Point>(v).unwrap(), Point { x: 3, y: 4 });
    }

    #[test]
    fn streaming_decodes_each_value() {
        let mut de = Deserializer::from_str("1 :two [3]");
        assert_eq!(de.decode::<i64>().unwrap(), 1);
        assert_eq!(de.decode::<Keyword>().unwrap(), Keyword::from("two"));
        assert_eq!(de.decode::<Vec<i64>>().unwrap(), vec![3]);
        assert!(de.decode::<Value>().unwrap_err().is_eof());
    }

    #[test]
    fn trailing_garbage_detected_by_end() {
        let mut de = Deserializer::from_str("1 2");
        de.decode::<i64>().unwrap();
        assert!(de.end().is_err());

        let mut de = Deserializer::from_str("1 ; done\n");
        de.decode::<i64>().unwrap();
        assert!(de.end().is_ok());
    }
}
