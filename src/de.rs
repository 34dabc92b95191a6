//! EDN deserialization: the type-directed binder.
//!
//! [`Deserializer`] drives the token parser and implements
//! `serde::Deserializer`, so any `T: Deserialize` can be read straight off a
//! byte stream. The binder owns the per-instance tag registry and the
//! strict-unknown-fields toggle, and supports decoding a sequence of
//! top-level values from one stream.
//!
//! ## How EDN meets the serde data model
//!
//! - `nil`, `true` and `false` arrive as symbol tokens and are reclassified
//!   here; `nil` never decodes into a string target.
//! - Lists, vectors and sets all feed sequence targets; sets additionally
//!   fill bool- or unit-valued maps ("set-like" targets).
//! - Struct keys may be keywords, symbols or strings. Matching is exact
//!   first, ASCII-case-insensitive second; unknown keys are skipped unless
//!   [`Deserializer::disallow_unknown_fields`] was called, and non-text keys
//!   are always skipped.
//! - A tagged value consults the instance registry, then the global one.
//!   With a handler, the payload is decoded generically, transformed, and
//!   the result bound to the caller's target. Without one, a generic target
//!   receives [`Value::Tagged`] and a concrete target fails with
//!   `UnknownTag`.
//! - `#_` discards never reach the binder; the parser walks and drops them.
//!
//! ## Streaming
//!
//! ```rust
//! use serde_edn::Deserializer;
//!
//! let mut de = Deserializer::from_str("1 2 3");
//! assert_eq!(de.decode::<i64>().unwrap(), 1);
//! let rest: Vec<i64> = de.into_iter().collect::<Result<_, _>>().unwrap();
//! assert_eq!(rest, vec![2, 3]);
//! ```

use std::io::{BufReader, Read};
use std::marker::PhantomData;

use serde::de::value::{StrDeserializer, StringDeserializer};
use serde::de::{self, IntoDeserializer, Visitor};
use serde::{forward_to_deserialize_any, Deserialize};

use crate::error::{Error, LexErrorKind, Result};
use crate::lexer::{Token, TokenKind};
use crate::parser::Parser;
use crate::tags::{self, TagRegistry};
use crate::value::{
    Value, ValueDeserializer, BIGINT_TOKEN, KEYWORD_TOKEN, RAW_TOKEN, SET_TOKEN, SYMBOL_TOKEN,
    TAG_TOKEN,
};

/// The streaming EDN deserializer.
///
/// One instance is not safe for concurrent use; it owns the lexer state, the
/// token pushback slot and the buffered reader. Each [`decode`] call
/// produces one top-level value and then returns control.
///
/// [`decode`]: Deserializer::decode
pub struct Deserializer<R> {
    parser: Parser<R>,
    tags: TagRegistry,
    strict_unknown_fields: bool,
}

impl<'a> Deserializer<&'a [u8]> {
    /// Reads EDN from a string slice.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(input: &'a str) -> Self {
        Deserializer::from_slice(input.as_bytes())
    }

    /// Reads EDN from a byte slice.
    pub fn from_slice(input: &'a [u8]) -> Self {
        Deserializer::new(input)
    }
}

impl<R: Read> Deserializer<BufReader<R>> {
    /// Reads EDN from an `io::Read`, buffered.
    pub fn from_reader(reader: R) -> Self {
        Deserializer::new(BufReader::new(reader))
    }
}

impl<R: Read> Deserializer<R> {
    fn new(reader: R) -> Self {
        Deserializer {
            parser: Parser::new(reader),
            tags: TagRegistry::new(),
            strict_unknown_fields: false,
        }
    }

    /// Registers a tag handler on this instance, shadowing any global
    /// handler with the same name. Returns `true` if it replaced a previous
    /// instance registration.
    pub fn add_tag_fn<F>(&mut self, name: impl Into<String>, handler: F) -> bool
    where
        F: Fn(Value) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        self.tags.add(name, handler)
    }

    /// Makes binding fail with `UnknownField` when a map key matches no
    /// field of the target struct, instead of skipping the entry.
    pub fn disallow_unknown_fields(&mut self) {
        self.strict_unknown_fields = true;
    }

    /// Decodes the next top-level value from the stream. Clean end of
    /// stream is [`Error::Eof`].
    pub fn decode<T: de::DeserializeOwned>(&mut self) -> Result<T> {
        self.parser.reset();
        T::deserialize(&mut *self)
    }

    /// Checks that nothing but whitespace remains on the stream.
    pub fn end(&mut self) -> Result<()> {
        match self.parser.next_token() {
            Err(e) if e.is_eof() => Ok(()),
            Err(e) => Err(e),
            Ok(token) => Err(Error::UnexpectedToken(token.kind.describe())),
        }
    }

    /// Iterates the remaining top-level values as `T`.
    pub fn into_iter<T: de::DeserializeOwned>(self) -> StreamDeserializer<R, T> {
        StreamDeserializer {
            de: self,
            failed: false,
            _marker: PhantomData,
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.parser.next_token()
    }

    /// `next_token` for positions where a value must follow; clean EOF
    /// becomes `UnexpectedEof`.
    fn must_token(&mut self) -> Result<Token> {
        self.parser.next_token().map_err(|e| {
            if e.is_eof() {
                Error::UnexpectedEof
            } else {
                e
            }
        })
    }

    /// Resolves a tag token against the registries and runs the handler,
    /// yielding a deserializer over the result. Concrete targets call this;
    /// a missing handler is `UnknownTag`.
    fn tagged_value(&mut self, token: &Token) -> Result<ValueDeserializer> {
        let name = &token.text[1..];
        let handler = tags::resolve(&self.tags, name)
            .ok_or_else(|| Error::UnknownTag(name.to_string()))?;
        let payload = Value::deserialize(&mut *self).map_err(|e| {
            if e.is_eof() {
                Error::UnexpectedEof
            } else {
                e
            }
        })?;
        let result = tags::apply(&*handler, name, payload)?;
        Ok(ValueDeserializer::new(result))
    }

    fn unquote(&self, token: &Token) -> Result<String> {
        unquote_string(&token.text)
            .ok_or(Error::Internal("lexer passed an invalid string literal"))
    }

    fn char_value(&self, token: &Token) -> Result<char> {
        token_to_char(&token.text)
            .ok_or_else(|| Error::lex(LexErrorKind::IllegalRune, self.parser.position()))
    }
}

/// Iterator over a stream of top-level EDN values. Ends at clean EOF; fuses
/// after the first error.
pub struct StreamDeserializer<R, T> {
    de: Deserializer<R>,
    failed: bool,
    _marker: PhantomData<T>,
}

impl<R: Read, T: de::DeserializeOwned> Iterator for StreamDeserializer<R, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        if self.failed {
            return None;
        }
        match self.de.decode() {
            Err(e) if e.is_eof() => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
            Ok(value) => Some(Ok(value)),
        }
    }
}

/// Clean EOF inside an open value is a hard error; only the first token of
/// a top-level value may report it.
fn in_value<T>(result: Result<T>) -> Result<T> {
    result.map_err(|e| if e.is_eof() { Error::UnexpectedEof } else { e })
}

/// Strips the exact-integer marker.
fn strip_n(text: &str) -> &str {
    text.strip_suffix('N').unwrap_or(text)
}

/// Strips the exact-decimal marker.
fn strip_m(text: &str) -> &str {
    text.strip_suffix('M').unwrap_or(text)
}

pub(crate) fn unquote_string(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000C}'),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 {
                    return None;
                }
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

pub(crate) fn token_to_char(text: &str) -> Option<char> {
    let rest = text.strip_prefix('\\')?;
    match rest {
        "newline" => return Some('\n'),
        "return" => return Some('\r'),
        "space" => return Some(' '),
        "tab" => return Some('\t'),
        "formfeed" => return Some('\u{000C}'),
        _ => {}
    }
    let mut chars = rest.chars();
    let first = chars.next()?;
    if chars.next().is_none() {
        return Some(first);
    }
    if first == 'u' && rest.len() == 5 {
        let code = u32::from_str_radix(&rest[1..], 16).ok()?;
        return char::from_u32(code);
    }
    None
}

macro_rules! de_integer {
    ($method:ident, $visit:ident, $ty:ty) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
            let token = self.must_token()?;
            match token.kind {
                TokenKind::Int => {
                    let digits = strip_n(&token.text);
                    let n: $ty = digits
                        .parse()
                        .map_err(|_| Error::overflow(digits, stringify!($ty)))?;
                    visitor.$visit(n)
                }
                TokenKind::Tag => self.tagged_value(&token)?.$method(visitor),
                _ => Err(Error::type_mismatch(
                    token.kind.describe(),
                    stringify!($ty),
                )),
            }
        }
    };
}

impl<'de, R: Read> de::Deserializer<'de> for &mut Deserializer<R> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let token = self.next_token()?;
        match token.kind {
            TokenKind::Symbol => match token.text.as_str() {
                "nil" => visitor.visit_unit(),
                "true" => visitor.visit_bool(true),
                "false" => visitor.visit_bool(false),
                text => visit_text_magic(visitor, SYMBOL_TOKEN, text.to_string()),
            },
            TokenKind::Keyword => {
                visit_text_magic(visitor, KEYWORD_TOKEN, token.text[1..].to_string())
            }
            TokenKind::Int => {
                let digits = strip_n(&token.text);
                match digits.parse::<i64>() {
                    Ok(n) => visitor.visit_i64(n),
                    Err(_) => visit_text_magic(visitor, BIGINT_TOKEN, digits.to_string()),
                }
            }
            TokenKind::Float => {
                let digits = strip_m(&token.text);
                let f: f64 = digits
                    .parse()
                    .map_err(|_| Error::lex(LexErrorKind::BadNumber, self.parser.position()))?;
                visitor.visit_f64(f)
            }
            TokenKind::Char => visitor.visit_char(self.char_value(&token)?),
            TokenKind::String => visitor.visit_string(self.unquote(&token)?),
            TokenKind::ListStart => visitor.visit_seq(CollAccess::new(self, TokenKind::ListEnd)),
            TokenKind::VectorStart => {
                visitor.visit_seq(CollAccess::new(self, TokenKind::VectorEnd))
            }
            TokenKind::SetStart => visitor.visit_map(MagicAccess {
                token: SET_TOKEN,
                body: Some(MagicBody::SetElems(self)),
                keyed: false,
            }),
            TokenKind::MapStart => visitor.visit_map(PairAccess::new(self)),
            TokenKind::Tag => {
                let name = token.text[1..].to_string();
                match tags::resolve(&self.tags, &name) {
                    Some(handler) => {
                        let payload = Value::deserialize(&mut *self).map_err(|e| {
                            if e.is_eof() {
                                Error::UnexpectedEof
                            } else {
                                e
                            }
                        })?;
                        let result = tags::apply(&*handler, &name, payload)?;
                        ValueDeserializer::new(result).deserialize_any(visitor)
                    }
                    None => visitor.visit_map(MagicAccess {
                        token: TAG_TOKEN,
                        body: Some(MagicBody::TaggedPair(self, name)),
                        keyed: false,
                    }),
                }
            }
            TokenKind::ListEnd | TokenKind::VectorEnd | TokenKind::MapEnd => {
                Err(Error::UnbalancedDelimiter(token.kind.describe()))
            }
            TokenKind::Discard => Err(Error::Internal("discard leaked past the parser")),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let token = self.must_token()?;
        match token.kind {
            TokenKind::Symbol if token.text == "true" => visitor.visit_bool(true),
            TokenKind::Symbol if token.text == "false" => visitor.visit_bool(false),
            TokenKind::Tag => self.tagged_value(&token)?.deserialize_bool(visitor),
            _ => Err(Error::type_mismatch(token.kind.describe(), "bool")),
        }
    }

    de_integer!(deserialize_i8, visit_i8, i8);
    de_integer!(deserialize_i16, visit_i16, i16);
    de_integer!(deserialize_i32, visit_i32, i32);
    de_integer!(deserialize_i64, visit_i64, i64);
    de_integer!(deserialize_u8, visit_u8, u8);
    de_integer!(deserialize_u16, visit_u16, u16);
    de_integer!(deserialize_u32, visit_u32, u32);
    de_integer!(deserialize_u64, visit_u64, u64);

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_f64(visitor)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let token = self.must_token()?;
        match token.kind {
            // an integer (even an exact one) fills a float target
            TokenKind::Int | TokenKind::Float => {
                let digits = strip_m(strip_n(&token.text));
                let f: f64 = digits
                    .parse()
                    .map_err(|_| Error::lex(LexErrorKind::BadNumber, self.parser.position()))?;
                visitor.visit_f64(f)
            }
            TokenKind::Tag => self.tagged_value(&token)?.deserialize_f64(visitor),
            _ => Err(Error::type_mismatch(token.kind.describe(), "f64")),
        }
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let token = self.must_token()?;
        match token.kind {
            TokenKind::Char => visitor.visit_char(self.char_value(&token)?),
            TokenKind::Tag => self.tagged_value(&token)?.deserialize_char(visitor),
            _ => Err(Error::type_mismatch(token.kind.describe(), "char")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let token = self.must_token()?;
        match token.kind {
            TokenKind::String => visitor.visit_string(self.unquote(&token)?),
            TokenKind::Tag => self.tagged_value(&token)?.deserialize_str(visitor),
            _ => Err(Error::type_mismatch(token.kind.describe(), "string")),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let token = self.must_token()?;
        match token.kind {
            TokenKind::String => {
                use base64::Engine as _;
                let text = self.unquote(&token)?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(text.as_bytes())
                    .map_err(|e| Error::Message(format!("bad base64: {e}")))?;
                visitor.visit_byte_buf(bytes)
            }
            TokenKind::ListStart => visitor.visit_seq(CollAccess::new(self, TokenKind::ListEnd)),
            TokenKind::VectorStart => {
                visitor.visit_seq(CollAccess::new(self, TokenKind::VectorEnd))
            }
            TokenKind::Tag => self.tagged_value(&token)?.deserialize_bytes(visitor),
            _ => Err(Error::type_mismatch(token.kind.describe(), "bytes")),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let token = self.next_token()?;
        if token.kind == TokenKind::Symbol && token.text == "nil" {
            visitor.visit_none()
        } else {
            self.parser.undo(token)?;
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let token = self.must_token()?;
        match token.kind {
            TokenKind::Symbol if token.text == "nil" => visitor.visit_unit(),
            TokenKind::Tag => self.tagged_value(&token)?.deserialize_unit(visitor),
            _ => Err(Error::type_mismatch(token.kind.describe(), "nil")),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        if name == KEYWORD_TOKEN {
            let token = self.must_token()?;
            return match token.kind {
                TokenKind::Keyword => visitor.visit_string(token.text[1..].to_string()),
                TokenKind::Tag => self
                    .tagged_value(&token)?
                    .deserialize_newtype_struct(name, visitor),
                _ => Err(Error::type_mismatch(token.kind.describe(), "keyword")),
            };
        }
        if name == SYMBOL_TOKEN {
            let token = self.must_token()?;
            return match token.kind {
                TokenKind::Symbol => visitor.visit_string(token.text),
                TokenKind::Tag => self
                    .tagged_value(&token)?
                    .deserialize_newtype_struct(name, visitor),
                _ => Err(Error::type_mismatch(token.kind.describe(), "symbol")),
            };
        }
        if name == TAG_TOKEN {
            // the generic tagged capability: no handler dispatch
            let token = self.must_token()?;
            return match token.kind {
                TokenKind::Tag => {
                    let tag_name = token.text[1..].to_string();
                    visitor.visit_seq(TagPairAccess {
                        de: self,
                        name: Some(tag_name),
                        value_read: false,
                    })
                }
                _ => Err(Error::type_mismatch(token.kind.describe(), "tagged value")),
            };
        }
        if name == RAW_TOKEN {
            let raw = self.parser.capture_next_value()?;
            return visitor.visit_string(raw);
        }
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let token = self.must_token()?;
        match token.kind {
            TokenKind::ListStart => visitor.visit_seq(CollAccess::new(self, TokenKind::ListEnd)),
            TokenKind::VectorStart => {
                visitor.visit_seq(CollAccess::new(self, TokenKind::VectorEnd))
            }
            // a set fills a sequence with its elements
            TokenKind::SetStart => visitor.visit_seq(CollAccess::new(self, TokenKind::MapEnd)),
            TokenKind::Tag => self.tagged_value(&token)?.deserialize_seq(visitor),
            _ => Err(Error::type_mismatch(token.kind.describe(), "sequence")),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        let token = self.must_token()?;
        let end = match token.kind {
            TokenKind::ListStart => TokenKind::ListEnd,
            TokenKind::VectorStart => TokenKind::VectorEnd,
            TokenKind::Tag => return self.tagged_value(&token)?.deserialize_tuple(_len, visitor),
            _ => return Err(Error::type_mismatch(token.kind.describe(), "tuple")),
        };
        let value = visitor.visit_seq(CollAccess::new(&mut *self, end))?;
        // surplus elements in the source are skipped
        loop {
            let token = self.must_token()?;
            if token.kind == end {
                return Ok(value);
            }
            self.parser.undo(token)?;
            self.parser.skip_next_value()?;
        }
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let token = self.must_token()?;
        match token.kind {
            TokenKind::MapStart => visitor.visit_map(PairAccess::new(self)),
            // a set fills a bool- or unit-valued map
            TokenKind::SetStart => visitor.visit_map(SetFillAccess::new(self)),
            TokenKind::Tag => self.tagged_value(&token)?.deserialize_map(visitor),
            _ => Err(Error::type_mismatch(token.kind.describe(), "map")),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let token = self.must_token()?;
        match token.kind {
            TokenKind::MapStart => {
                let strict = self.strict_unknown_fields;
                visitor.visit_map(StructAccess {
                    de: self,
                    fields,
                    struct_name: name,
                    strict,
                })
            }
            TokenKind::Tag => self
                .tagged_value(&token)?
                .deserialize_struct(name, fields, visitor),
            _ => Err(Error::type_mismatch(token.kind.describe(), "map")),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let token = self.must_token()?;
        match token.kind {
            TokenKind::Keyword => {
                let text = token.text[1..].to_string();
                visitor.visit_enum(text.into_deserializer())
            }
            TokenKind::Symbol => visitor.visit_enum(token.text.into_deserializer()),
            TokenKind::String => visitor.visit_enum(self.unquote(&token)?.into_deserializer()),
            TokenKind::MapStart => visitor.visit_enum(EnumAccess { de: self }),
            TokenKind::Tag => self
                .tagged_value(&token)?
                .deserialize_enum(_name, _variants, visitor),
            _ => Err(Error::type_mismatch(token.kind.describe(), "enum")),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let token = self.must_token()?;
        match token.kind {
            TokenKind::Keyword => visitor.visit_string(token.text[1..].to_string()),
            TokenKind::Symbol => visitor.visit_string(token.text),
            TokenKind::String => visitor.visit_string(self.unquote(&token)?),
            _ => Err(Error::type_mismatch(token.kind.describe(), "identifier")),
        }
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let token = self.must_token()?;
        self.parser.undo(token)?;
        self.parser.skip_next_value()?;
        visitor.visit_unit()
    }
}

/// Elements of a list, vector or set until the matching closer. Sequence
/// targets append; hashability is the concern of the key-bearing accesses
/// below, so a bad element here is a plain type mismatch.
struct CollAccess<'a, R> {
    de: &'a mut Deserializer<R>,
    end: TokenKind,
}

impl<'a, R: Read> CollAccess<'a, R> {
    fn new(de: &'a mut Deserializer<R>, end: TokenKind) -> Self {
        CollAccess { de, end }
    }
}

impl<'de, R: Read> de::SeqAccess<'de> for CollAccess<'_, R> {
    type Error = Error;

    fn next_element_seed<S: de::DeserializeSeed<'de>>(
        &mut self,
        seed: S,
    ) -> Result<Option<S::Value>> {
        let token = self.de.must_token()?;
        if token.kind == self.end {
            return Ok(None);
        }
        self.de.parser.undo(token)?;
        in_value(seed.deserialize(&mut *self.de)).map(Some)
    }
}

/// Key-value pairs of a map until `}`. Keys that are collections but fail
/// to bind into the target key type surface as `Unhashable`.
struct PairAccess<'a, R> {
    de: &'a mut Deserializer<R>,
}

impl<'a, R: Read> PairAccess<'a, R> {
    fn new(de: &'a mut Deserializer<R>) -> Self {
        PairAccess { de }
    }
}

fn key_seed_result<T>(
    result: Result<T>,
    key_was_collection: bool,
    position: usize,
) -> Result<T> {
    match result {
        Err(Error::TypeMismatch { .. }) if key_was_collection => {
            Err(Error::Unhashable { position })
        }
        other => other,
    }
}

fn is_opener(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::ListStart | TokenKind::VectorStart | TokenKind::MapStart | TokenKind::SetStart
    )
}

impl<'de, R: Read> de::MapAccess<'de> for PairAccess<'_, R> {
    type Error = Error;

    fn next_key_seed<K: de::DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        let token = self.de.must_token()?;
        if token.kind == TokenKind::MapEnd {
            return Ok(None);
        }
        let collection = is_opener(token.kind);
        let position = self.de.parser.position();
        self.de.parser.undo(token)?;
        key_seed_result(
            in_value(seed.deserialize(&mut *self.de)).map(Some),
            collection,
            position,
        )
    }

    fn next_value_seed<S: de::DeserializeSeed<'de>>(&mut self, seed: S) -> Result<S::Value> {
        in_value(seed.deserialize(&mut *self.de))
    }
}

/// A set literal binding into a map target: each element becomes a key and
/// the value is synthesized (`true` for bools, unit for unit types).
struct SetFillAccess<'a, R> {
    de: &'a mut Deserializer<R>,
}

impl<'a, R: Read> SetFillAccess<'a, R> {
    fn new(de: &'a mut Deserializer<R>) -> Self {
        SetFillAccess { de }
    }
}

impl<'de, R: Read> de::MapAccess<'de> for SetFillAccess<'_, R> {
    type Error = Error;

    fn next_key_seed<K: de::DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        let token = self.de.must_token()?;
        if token.kind == TokenKind::MapEnd {
            return Ok(None);
        }
        let collection = is_opener(token.kind);
        let position = self.de.parser.position();
        self.de.parser.undo(token)?;
        key_seed_result(
            in_value(seed.deserialize(&mut *self.de)).map(Some),
            collection,
            position,
        )
    }

    fn next_value_seed<S: de::DeserializeSeed<'de>>(&mut self, seed: S) -> Result<S::Value> {
        seed.deserialize(SetFillDeserializer)
    }
}

/// Produces the synthesized value for set-like map targets.
pub(crate) struct SetFillDeserializer;

impl<'de> de::Deserializer<'de> for SetFillDeserializer {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_bool(true)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str string bytes
        byte_buf option newtype_struct seq tuple tuple_struct map struct enum
        identifier ignored_any
    }
}

/// Struct binding: text keys matched against field names, exact first, then
/// ASCII-case-insensitive. Non-text keys and (outside strict mode) unknown
/// keys are skipped along with their values.
struct StructAccess<'a, R> {
    de: &'a mut Deserializer<R>,
    fields: &'static [&'static str],
    struct_name: &'static str,
    strict: bool,
}

impl<'de, R: Read> de::MapAccess<'de> for StructAccess<'_, R> {
    type Error = Error;

    fn next_key_seed<K: de::DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        loop {
            let token = self.de.must_token()?;
            let key = match token.kind {
                TokenKind::MapEnd => return Ok(None),
                TokenKind::Keyword => token.text[1..].to_string(),
                TokenKind::Symbol
                    if !matches!(token.text.as_str(), "nil" | "true" | "false") =>
                {
                    token.text
                }
                TokenKind::String => self.de.unquote(&token)?,
                _ => {
                    // not usable as a field name: drop the whole pair
                    self.de.parser.undo(token)?;
                    self.de.parser.skip_next_value()?;
                    self.de.parser.skip_next_value()?;
                    continue;
                }
            };
            let matched = self
                .fields
                .iter()
                .find(|f| **f == key)
                .or_else(|| self.fields.iter().find(|f| f.eq_ignore_ascii_case(&key)));
            match matched {
                Some(field) => {
                    let de: StrDeserializer<Error> = (*field).into_deserializer();
                    return seed.deserialize(de).map(Some);
                }
                None if self.strict => {
                    return Err(Error::UnknownField {
                        field: key,
                        target: self.struct_name,
                    });
                }
                None => {
                    self.de.parser.skip_next_value()?;
                    continue;
                }
            }
        }
    }

    fn next_value_seed<S: de::DeserializeSeed<'de>>(&mut self, seed: S) -> Result<S::Value> {
        in_value(seed.deserialize(&mut *self.de))
    }
}

/// `(name, value)` pair for the generic [`crate::Tag`] capability.
struct TagPairAccess<'a, R> {
    de: &'a mut Deserializer<R>,
    name: Option<String>,
    value_read: bool,
}

impl<'de, R: Read> de::SeqAccess<'de> for TagPairAccess<'_, R> {
    type Error = Error;

    fn next_element_seed<S: de::DeserializeSeed<'de>>(
        &mut self,
        seed: S,
    ) -> Result<Option<S::Value>> {
        if let Some(name) = self.name.take() {
            let de: StringDeserializer<Error> = name.into_deserializer();
            return seed.deserialize(de).map(Some);
        }
        if !self.value_read {
            self.value_read = true;
            return in_value(seed.deserialize(&mut *self.de)).map(Some);
        }
        Ok(None)
    }
}

/// Single-entry map with a reserved key, used to hand EDN-only shapes
/// (symbols, keywords, big integers, sets, unknown tags) to generic
/// visitors. [`Value`]'s visitor unwraps them; other consumers see a small
/// map.
enum MagicBody<'a, R> {
    Text(String),
    TaggedPair(&'a mut Deserializer<R>, String),
    SetElems(&'a mut Deserializer<R>),
}

struct MagicAccess<'a, R> {
    token: &'static str,
    body: Option<MagicBody<'a, R>>,
    keyed: bool,
}

fn visit_text_magic<'de, V: Visitor<'de>>(
    visitor: V,
    token: &'static str,
    text: String,
) -> Result<V::Value> {
    visitor.visit_map(MagicAccess::<&[u8]> {
        token,
        body: Some(MagicBody::Text(text)),
        keyed: false,
    })
}

impl<'de, R: Read> de::MapAccess<'de> for MagicAccess<'_, R> {
    type Error = Error;

    fn next_key_seed<K: de::DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        if self.keyed {
            return Ok(None);
        }
        self.keyed = true;
        let de: StrDeserializer<Error> = self.token.into_deserializer();
        seed.deserialize(de).map(Some)
    }

    fn next_value_seed<S: de::DeserializeSeed<'de>>(&mut self, seed: S) -> Result<S::Value> {
        match self
            .body
            .take()
            .ok_or(Error::Internal("magic value taken twice"))?
        {
            MagicBody::Text(text) => {
                let de: StringDeserializer<Error> = text.into_deserializer();
                seed.deserialize(de)
            }
            MagicBody::TaggedPair(de, name) => seed.deserialize(TaggedPairDeserializer { de, name }),
            MagicBody::SetElems(de) => seed.deserialize(SetElemsDeserializer { de }),
        }
    }
}

/// Yields `[name, inner-value]` for an unregistered tag under a generic
/// target; the inner value is read live off the parser.
struct TaggedPairDeserializer<'a, R> {
    de: &'a mut Deserializer<R>,
    name: String,
}

impl<'de, R: Read> de::Deserializer<'de> for TaggedPairDeserializer<'_, R> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_seq(TagPairAccess {
            de: self.de,
            name: Some(self.name),
            value_read: false,
        })
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str string bytes
        byte_buf option unit unit_struct newtype_struct seq tuple tuple_struct
        map struct enum identifier ignored_any
    }
}

/// Yields the elements of a `#{…}` literal as a sequence (the magic-set
/// payload).
struct SetElemsDeserializer<'a, R> {
    de: &'a mut Deserializer<R>,
}

impl<'de, R: Read> de::Deserializer<'de> for SetElemsDeserializer<'_, R> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_seq(CollAccess::new(self.de, TokenKind::MapEnd))
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str string bytes
        byte_buf option unit unit_struct newtype_struct seq tuple tuple_struct
        map struct enum identifier ignored_any
    }
}

/// Enum binding from a single-entry map `{:variant payload}`.
struct EnumAccess<'a, R> {
    de: &'a mut Deserializer<R>,
}

impl<'de, 'a, R: Read> de::EnumAccess<'de> for EnumAccess<'a, R> {
    type Error = Error;
    type Variant = VariantAccess<'a, R>;

    fn variant_seed<S: de::DeserializeSeed<'de>>(
        self,
        seed: S,
    ) -> Result<(S::Value, VariantAccess<'a, R>)> {
        let token = self.de.must_token()?;
        let text = match token.kind {
            TokenKind::Keyword => token.text[1..].to_string(),
            TokenKind::Symbol => token.text,
            TokenKind::String => self.de.unquote(&token)?,
            _ => return Err(Error::type_mismatch(token.kind.describe(), "enum variant")),
        };
        let de: StringDeserializer<Error> = text.into_deserializer();
        let variant = seed.deserialize(de)?;
        Ok((variant, VariantAccess { de: self.de }))
    }
}

struct VariantAccess<'a, R> {
    de: &'a mut Deserializer<R>,
}

impl<R: Read> VariantAccess<'_, R> {
    fn close(&mut self) -> Result<()> {
        let token = self.de.must_token()?;
        if token.kind == TokenKind::MapEnd {
            Ok(())
        } else {
            Err(Error::UnexpectedToken(token.kind.describe()))
        }
    }
}

impl<'de, R: Read> de::VariantAccess<'de> for VariantAccess<'_, R> {
    type Error = Error;

    fn unit_variant(mut self) -> Result<()> {
        let token = self.de.must_token()?;
        match token.kind {
            TokenKind::Symbol if token.text == "nil" => self.close(),
            _ => Err(Error::type_mismatch(token.kind.describe(), "unit variant")),
        }
    }

    fn newtype_variant_seed<S: de::DeserializeSeed<'de>>(mut self, seed: S) -> Result<S::Value> {
        let value = in_value(seed.deserialize(&mut *self.de))?;
        self.close()?;
        Ok(value)
    }

    fn tuple_variant<V: Visitor<'de>>(mut self, len: usize, visitor: V) -> Result<V::Value> {
        let value = de::Deserializer::deserialize_tuple(&mut *self.de, len, visitor)?;
        self.close()?;
        Ok(value)
    }

    fn struct_variant<V: Visitor<'de>>(
        mut self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let value = de::Deserializer::deserialize_struct(&mut *self.de, "", fields, visitor)?;
        self.close()?;
        Ok(value)
    }
}
