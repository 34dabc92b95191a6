//! EDN serialization: the emitter.
//!
//! [`Serializer`] converts any `T: Serialize` into EDN text with the
//! minimum whitespace that keeps adjacent tokens apart: a single space goes
//! between two bare tokens (symbols, keywords, numbers, chars, `nil`,
//! booleans, and anything opening with `#` or `\`), and nothing else —
//! never after a closing quote or bracket, never before an opening one.
//! `{:a"foo":b zing}` is as compact as it gets while still lexing back to
//! the same value.
//!
//! Emission rules beyond spacing:
//!
//! - floats always carry a fractional part or exponent so they read back as
//!   floats;
//! - chars use the five named forms, a literal for ASCII graphic runes
//!   (except `,`, which is whitespace in EDN), and `\uXXXX` otherwise;
//! - struct fields become keyword keys (`:name`); rename via serde
//!   attributes, or use [`Keyword`]/[`Symbol`] keys in maps directly;
//! - `Value::Bytes` becomes `#base64"…"`, `Value::Inst` becomes
//!   `#inst"…"`, big integers keep their `N` marker;
//! - enum unit variants emit as keywords, data-carrying variants as
//!   single-entry maps `{:variant payload}`.
//!
//! [`ValueSerializer`] is the second serializer in this module: it builds a
//! [`Value`] tree instead of text and backs [`crate::to_value`].
//!
//! [`Keyword`]: crate::Keyword
//! [`Symbol`]: crate::Symbol

use serde::ser::{self, Impossible, Serialize};

use base64::Engine as _;

use crate::error::{Error, Result};
use crate::map::EdnMap;
use crate::value::{
    Value, BIGINT_TOKEN, INST_TOKEN, KEYWORD_TOKEN, LIST_TOKEN, RAW_TOKEN, SET_TOKEN, SYMBOL_TOKEN,
    TAG_TOKEN,
};

/// What the previous write ended with; drives separator insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastWrite {
    /// Nothing written yet.
    None,
    /// A bare token that could fuse with a following bare token.
    Bare,
    /// A closing quote or bracket; nothing fuses with it.
    Closed,
}

/// Which bracket pair the next sequence should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingSeq {
    Set,
    List,
}

/// The EDN text serializer.
pub struct Serializer {
    output: String,
    last: LastWrite,
    pending_seq: Option<PendingSeq>,
}

impl Serializer {
    #[must_use]
    pub fn new() -> Self {
        Serializer {
            output: String::with_capacity(128),
            last: LastWrite::None,
            pending_seq: None,
        }
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.output
    }

    /// Writes one token, inserting a space iff the previous token ended
    /// bare and this one starts bare.
    fn write_token(&mut self, starts_bare: bool, text: &str, ends_bare: bool) {
        if starts_bare && self.last == LastWrite::Bare {
            self.output.push(' ');
        }
        self.output.push_str(text);
        self.last = if ends_bare {
            LastWrite::Bare
        } else {
            LastWrite::Closed
        };
    }

    fn write_bare(&mut self, text: &str) {
        self.write_token(true, text, true);
    }

    fn write_opener(&mut self, text: &str) {
        // `#{` starts with a fusing rune even though it opens a collection
        self.write_token(text.starts_with('#'), text, false);
    }

    fn write_closer(&mut self, text: &str) {
        self.write_token(false, text, false);
    }

    fn write_quoted(&mut self, s: &str) {
        let mut quoted = String::with_capacity(s.len() + 2);
        quoted.push('"');
        for c in s.chars() {
            match c {
                '"' => quoted.push_str("\\\""),
                '\\' => quoted.push_str("\\\\"),
                '\n' => quoted.push_str("\\n"),
                '\r' => quoted.push_str("\\r"),
                '\t' => quoted.push_str("\\t"),
                '\u{0008}' => quoted.push_str("\\b"),
                '\u{000C}' => quoted.push_str("\\f"),
                _ => quoted.push(c),
            }
        }
        quoted.push('"');
        self.write_token(false, &quoted, false);
    }

    fn write_char(&mut self, c: char) {
        let token = char_token(c);
        self.write_bare(&token);
    }

    fn write_float(&mut self, v: f64) -> Result<()> {
        if !v.is_finite() {
            return Err(Error::Message(
                "cannot emit a non-finite float as EDN".to_string(),
            ));
        }
        let mut text = v.to_string();
        if !text.contains(['.', 'e', 'E']) {
            text.push_str(".0");
        }
        self.write_bare(&text);
        Ok(())
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Serializer::new()
    }
}

pub(crate) fn char_token(c: char) -> String {
    match c {
        '\n' => return "\\newline".to_string(),
        '\r' => return "\\return".to_string(),
        ' ' => return "\\space".to_string(),
        '\t' => return "\\tab".to_string(),
        '\u{000C}' => return "\\formfeed".to_string(),
        _ => {}
    }
    let code = c as u32;
    // `,` is whitespace in EDN and would vanish if emitted literally
    if c.is_ascii_graphic() && c != ',' {
        format!("\\{c}")
    } else if code <= 0xFFFF {
        format!("\\u{code:04x}")
    } else {
        // beyond the \uXXXX form; the lexer takes any single scalar
        format!("\\{c}")
    }
}

impl<'a> ser::Serializer for &'a mut Serializer {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = SeqEmitter<'a>;
    type SerializeTuple = SeqEmitter<'a>;
    type SerializeTupleStruct = SeqEmitter<'a>;
    type SerializeTupleVariant = VariantSeqEmitter<'a>;
    type SerializeMap = MapEmitter<'a>;
    type SerializeStruct = StructEmitter<'a>;
    type SerializeStructVariant = VariantStructEmitter<'a>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.write_bare(if v { "true" } else { "false" });
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.write_bare(&v.to_string());
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.write_bare(&v.to_string());
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.serialize_f64(v as f64)
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.write_float(v)
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.write_char(v);
        Ok(())
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.write_quoted(v);
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(v);
        self.write_bare("#base64");
        self.write_quoted(&encoded);
        Ok(())
    }

    fn serialize_none(self) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.write_bare("nil");
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.write_bare(&format!(":{variant}"));
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<()> {
        if name == KEYWORD_TOKEN {
            let text = value.serialize(TextCapture)?;
            self.write_bare(&format!(":{text}"));
            return Ok(());
        }
        if name == SYMBOL_TOKEN {
            let text = value.serialize(TextCapture)?;
            self.write_bare(&text);
            return Ok(());
        }
        if name == INST_TOKEN {
            let text = value.serialize(TextCapture)?;
            self.write_bare("#inst");
            self.write_quoted(&text);
            return Ok(());
        }
        if name == BIGINT_TOKEN {
            let digits = value.serialize(TextCapture)?;
            self.write_bare(&format!("{digits}N"));
            return Ok(());
        }
        if name == RAW_TOKEN {
            let text = value.serialize(TextCapture)?;
            self.write_bare(&text);
            return Ok(());
        }
        if name == SET_TOKEN {
            self.pending_seq = Some(PendingSeq::Set);
            return value.serialize(self);
        }
        if name == LIST_TOKEN {
            self.pending_seq = Some(PendingSeq::List);
            return value.serialize(self);
        }
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()> {
        self.write_opener("{");
        self.write_bare(&format!(":{variant}"));
        value.serialize(&mut *self)?;
        self.write_closer("}");
        Ok(())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<SeqEmitter<'a>> {
        let close = match self.pending_seq.take() {
            Some(PendingSeq::Set) => {
                self.write_opener("#{");
                "}"
            }
            Some(PendingSeq::List) => {
                self.write_opener("(");
                ")"
            }
            None => {
                self.write_opener("[");
                "]"
            }
        };
        Ok(SeqEmitter { ser: self, close })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqEmitter<'a>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqEmitter<'a>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<VariantSeqEmitter<'a>> {
        self.write_opener("{");
        self.write_bare(&format!(":{variant}"));
        self.write_opener("[");
        Ok(VariantSeqEmitter { ser: self })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapEmitter<'a>> {
        self.write_opener("{");
        Ok(MapEmitter { ser: self })
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<StructEmitter<'a>> {
        if name == TAG_TOKEN {
            return Ok(StructEmitter::Tag {
                ser: self,
                tag: None,
            });
        }
        self.write_opener("{");
        Ok(StructEmitter::Plain { ser: self })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<VariantStructEmitter<'a>> {
        self.write_opener("{");
        self.write_bare(&format!(":{variant}"));
        self.write_opener("{");
        Ok(VariantStructEmitter { ser: self })
    }
}

pub struct SeqEmitter<'a> {
    ser: &'a mut Serializer,
    close: &'static str,
}

impl ser::SerializeSeq for SeqEmitter<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.ser.write_closer(self.close);
        Ok(())
    }
}

impl ser::SerializeTuple for SeqEmitter<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.ser.write_closer(self.close);
        Ok(())
    }
}

impl ser::SerializeTupleStruct for SeqEmitter<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.ser.write_closer(self.close);
        Ok(())
    }
}

pub struct VariantSeqEmitter<'a> {
    ser: &'a mut Serializer,
}

impl ser::SerializeTupleVariant for VariantSeqEmitter<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.ser.write_closer("]");
        self.ser.write_closer("}");
        Ok(())
    }
}

pub struct MapEmitter<'a> {
    ser: &'a mut Serializer,
}

impl ser::SerializeMap for MapEmitter<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        key.serialize(&mut *self.ser)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.ser.write_closer("}");
        Ok(())
    }
}

pub enum StructEmitter<'a> {
    Plain {
        ser: &'a mut Serializer,
    },
    /// A [`crate::Tag`] in flight: the `tag` field is captured, then the
    /// `value` field is emitted right after `#name`.
    Tag {
        ser: &'a mut Serializer,
        tag: Option<String>,
    },
}

impl ser::SerializeStruct for StructEmitter<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        match self {
            StructEmitter::Plain { ser } => {
                ser.write_bare(&format!(":{key}"));
                value.serialize(&mut **ser)
            }
            StructEmitter::Tag { ser, tag } => match key {
                "tag" => {
                    *tag = Some(value.serialize(TextCapture)?);
                    Ok(())
                }
                "value" => {
                    let name = tag
                        .take()
                        .ok_or(Error::Internal("tag value emitted before its name"))?;
                    ser.write_bare(&format!("#{name}"));
                    value.serialize(&mut **ser)
                }
                _ => Err(Error::Internal("unexpected field on tag struct")),
            },
        }
    }

    fn end(self) -> Result<()> {
        match self {
            StructEmitter::Plain { ser } => {
                ser.write_closer("}");
                Ok(())
            }
            StructEmitter::Tag { .. } => Ok(()),
        }
    }
}

pub struct VariantStructEmitter<'a> {
    ser: &'a mut Serializer,
}

impl ser::SerializeStructVariant for VariantStructEmitter<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.ser.write_bare(&format!(":{key}"));
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.ser.write_closer("}");
        self.ser.write_closer("}");
        Ok(())
    }
}

/// Captures exactly one string out of a `Serialize` impl; used to pull the
/// payload back out of the private newtype protocols.
struct TextCapture;

macro_rules! capture_err {
    ($($method:ident: $ty:ty,)*) => {$(
        fn $method(self, _v: $ty) -> Result<String> {
            Err(Error::Internal("expected a string payload"))
        }
    )*};
}

impl ser::Serializer for TextCapture {
    type Ok = String;
    type Error = Error;

    type SerializeSeq = Impossible<String, Error>;
    type SerializeTuple = Impossible<String, Error>;
    type SerializeTupleStruct = Impossible<String, Error>;
    type SerializeTupleVariant = Impossible<String, Error>;
    type SerializeMap = Impossible<String, Error>;
    type SerializeStruct = Impossible<String, Error>;
    type SerializeStructVariant = Impossible<String, Error>;

    fn serialize_str(self, v: &str) -> Result<String> {
        Ok(v.to_string())
    }

    capture_err! {
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_f32: f32,
        serialize_f64: f64,
        serialize_char: char,
        serialize_bytes: &[u8],
    }

    fn serialize_none(self) -> Result<String> {
        Err(Error::Internal("expected a string payload"))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<String> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<String> {
        Err(Error::Internal("expected a string payload"))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<String> {
        Err(Error::Internal("expected a string payload"))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<String> {
        Err(Error::Internal("expected a string payload"))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String> {
        Err(Error::Internal("expected a string payload"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(Error::Internal("expected a string payload"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(Error::Internal("expected a string payload"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(Error::Internal("expected a string payload"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::Internal("expected a string payload"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Error::Internal("expected a string payload"))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct> {
        Err(Error::Internal("expected a string payload"))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::Internal("expected a string payload"))
    }
}

/// Serializer that builds a [`Value`] tree; backs [`crate::to_value`].
pub struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = Error;

    type SerializeSeq = ValueSeqBuilder;
    type SerializeTuple = ValueSeqBuilder;
    type SerializeTupleStruct = ValueSeqBuilder;
    type SerializeTupleVariant = ValueVariantSeqBuilder;
    type SerializeMap = ValueMapBuilder;
    type SerializeStruct = ValueStructBuilder;
    type SerializeStructVariant = ValueVariantMapBuilder;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        Ok(Value::Int(v as i64))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        Ok(Value::Int(v as i64))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        Ok(Value::Int(v as i64))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(Value::Int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        Ok(Value::Int(v as i64))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        Ok(Value::Int(v as i64))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        Ok(Value::Int(v as i64))
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        Ok(Value::Float(v as f64))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(Value::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::Char(v))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::Nil)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::Nil)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        Ok(Value::Nil)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::Keyword(crate::Keyword::from(variant)))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Value> {
        if name == KEYWORD_TOKEN {
            let text = value.serialize(TextCapture)?;
            return Ok(Value::Keyword(crate::Keyword::from(text)));
        }
        if name == SYMBOL_TOKEN {
            let text = value.serialize(TextCapture)?;
            return Ok(Value::Symbol(crate::Symbol::from(text)));
        }
        if name == INST_TOKEN {
            let text = value.serialize(TextCapture)?;
            let dt = chrono::DateTime::parse_from_rfc3339(&text)
                .map_err(|e| Error::Message(format!("bad #inst: {e}")))?;
            return Ok(Value::Inst(dt.with_timezone(&chrono::Utc)));
        }
        if name == BIGINT_TOKEN {
            let digits = value.serialize(TextCapture)?;
            let n = digits
                .parse()
                .map_err(|e| Error::Message(format!("bad big integer: {e}")))?;
            return Ok(Value::BigInt(n));
        }
        if name == RAW_TOKEN {
            let text = value.serialize(TextCapture)?;
            return crate::from_str(&text);
        }
        if name == SET_TOKEN {
            let elems = value.serialize(ValueSerializer)?;
            return match elems {
                Value::Vector(items) => Ok(Value::Set(items.into_iter().collect())),
                other => Err(Error::type_mismatch(other.kind(), "set elements")),
            };
        }
        if name == LIST_TOKEN {
            let elems = value.serialize(ValueSerializer)?;
            return match elems {
                Value::Vector(items) => Ok(Value::List(items)),
                other => Err(Error::type_mismatch(other.kind(), "list elements")),
            };
        }
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value> {
        let mut map = EdnMap::new();
        map.insert(
            Value::Keyword(crate::Keyword::from(variant)),
            value.serialize(ValueSerializer)?,
        );
        Ok(Value::Map(map))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<ValueSeqBuilder> {
        Ok(ValueSeqBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<ValueSeqBuilder> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<ValueSeqBuilder> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<ValueVariantSeqBuilder> {
        Ok(ValueVariantSeqBuilder {
            variant,
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<ValueMapBuilder> {
        Ok(ValueMapBuilder {
            map: EdnMap::new(),
            pending: None,
        })
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> Result<ValueStructBuilder> {
        if name == TAG_TOKEN {
            return Ok(ValueStructBuilder::Tag {
                tag: None,
                value: None,
            });
        }
        Ok(ValueStructBuilder::Plain { map: EdnMap::new() })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<ValueVariantMapBuilder> {
        Ok(ValueVariantMapBuilder {
            variant,
            map: EdnMap::new(),
        })
    }
}

pub struct ValueSeqBuilder {
    items: Vec<Value>,
}

impl ser::SerializeSeq for ValueSeqBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Vector(self.items))
    }
}

impl ser::SerializeTuple for ValueSeqBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for ValueSeqBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

pub struct ValueVariantSeqBuilder {
    variant: &'static str,
    items: Vec<Value>,
}

impl ser::SerializeTupleVariant for ValueVariantSeqBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        let mut map = EdnMap::new();
        map.insert(
            Value::Keyword(crate::Keyword::from(self.variant)),
            Value::Vector(self.items),
        );
        Ok(Value::Map(map))
    }
}

pub struct ValueMapBuilder {
    map: EdnMap,
    pending: Option<Value>,
}

impl ser::SerializeMap for ValueMapBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        self.pending = Some(key.serialize(ValueSerializer)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let key = self
            .pending
            .take()
            .ok_or(Error::Internal("map value serialized before key"))?;
        self.map.insert(key, value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Map(self.map))
    }
}

pub enum ValueStructBuilder {
    Plain { map: EdnMap },
    Tag {
        tag: Option<String>,
        value: Option<Value>,
    },
}

impl ser::SerializeStruct for ValueStructBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        match self {
            ValueStructBuilder::Plain { map } => {
                map.insert(
                    Value::Keyword(crate::Keyword::from(key)),
                    value.serialize(ValueSerializer)?,
                );
                Ok(())
            }
            ValueStructBuilder::Tag { tag, value: slot } => match key {
                "tag" => {
                    *tag = Some(value.serialize(TextCapture)?);
                    Ok(())
                }
                "value" => {
                    *slot = Some(value.serialize(ValueSerializer)?);
                    Ok(())
                }
                _ => Err(Error::Internal("unexpected field on tag struct")),
            },
        }
    }

    fn end(self) -> Result<Value> {
        match self {
            ValueStructBuilder::Plain { map } => Ok(Value::Map(map)),
            ValueStructBuilder::Tag { tag, value } => {
                let tag = tag.ok_or(Error::Internal("tag struct missing name"))?;
                let value = value.ok_or(Error::Internal("tag struct missing value"))?;
                Ok(Value::Tagged(tag, Box::new(value)))
            }
        }
    }
}

pub struct ValueVariantMapBuilder {
    variant: &'static str,
    map: EdnMap,
}

impl ser::SerializeStructVariant for ValueVariantMapBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.map.insert(
            Value::Keyword(crate::Keyword::from(key)),
            value.serialize(ValueSerializer)?,
        );
        Ok(())
    }

    fn end(self) -> Result<Value> {
        let mut outer = EdnMap::new();
        outer.insert(
            Value::Keyword(crate::Keyword::from(self.variant)),
            Value::Map(self.map),
        );
        Ok(Value::Map(outer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit<T: Serialize>(value: &T) -> String {
        let mut ser = Serializer::new();
        value.serialize(&mut ser).unwrap();
        ser.into_inner()
    }

    #[test]
    fn bare_tokens_get_one_space() {
        assert_eq!(emit(&vec![1, 2, 3]), "[1 2 3]");
    }

    #[test]
    fn strings_fuse_with_neighbors() {
        assert_eq!(emit(&vec!["a", "b"]), "[\"a\"\"b\"]");
    }

    #[test]
    fn floats_always_read_back_as_floats() {
        assert_eq!(emit(&3.0_f64), "3.0");
        assert_eq!(emit(&-1.2_f64), "-1.2");
        let mut ser = Serializer::new();
        assert!(f64::NAN.serialize(&mut ser).is_err());
    }

    #[test]
    fn char_forms() {
        assert_eq!(char_token('a'), "\\a");
        assert_eq!(char_token('\n'), "\\newline");
        assert_eq!(char_token(' '), "\\space");
        assert_eq!(char_token(','), "\\u002c");
        assert_eq!(char_token('ŋ'), "\\u014b");
        assert_eq!(char_token('\''), "\\'");
    }

    #[test]
    fn bytes_emit_as_base64() {
        let mut ser = Serializer::new();
        ser::Serializer::serialize_bytes(&mut ser, &[0, 6, 7, 8, 9, 128]).unwrap();
        assert_eq!(ser.into_inner(), "#base64\"AAYHCAmA\"");
    }
}
