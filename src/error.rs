//! Error types for EDN decoding and encoding.
//!
//! Every failure the codec can produce is a variant of [`Error`]. Lexical
//! errors carry the rune offset (count of Unicode scalars consumed since the
//! start of the stream) where the problem was detected. Tag handler failures
//! are wrapped with the tag name for diagnostic value.
//!
//! Nothing is retried inside the codec; all errors bubble synchronously to
//! the caller of the decode or encode entry point.

use std::fmt;
use thiserror::Error;

/// What went wrong inside the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    /// A numeric literal with a misplaced sign, second decimal point, or
    /// empty exponent.
    #[error("malformed numeric literal")]
    BadNumber,
    /// A rune that cannot start or continue any token, or a multi-letter
    /// char literal that is not one of the named forms.
    #[error("illegal rune form")]
    IllegalRune,
    /// The stream ended inside a string literal.
    #[error("unterminated string literal")]
    UnterminatedString,
    /// A backslash escape the format does not define.
    #[error("unsupported escape sequence")]
    BadEscape,
    /// `#"…"` regex literals are not part of EDN.
    #[error("regex literals are not supported")]
    Regex,
}

/// Represents all possible errors that can occur during EDN decoding or
/// encoding.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// IO error during reading or writing.
    #[error("IO error: {0}")]
    Io(String),

    /// Lexical error, with the rune offset where it was detected.
    #[error("lex error at rune {position}: {kind}")]
    Lex { kind: LexErrorKind, position: usize },

    /// The parser saw a token that is not valid in its context.
    #[error("unexpected token: {0}")]
    UnexpectedToken(&'static str),

    /// The stream ended in the middle of a value.
    #[error("unexpected end of EDN input")]
    UnexpectedEof,

    /// The stream ended cleanly between top-level values. Not a failure when
    /// reading a stream of values; signals that the stream is exhausted.
    #[error("no more values in EDN stream")]
    Eof,

    /// A closing delimiter without a matching opener, or of the wrong kind.
    #[error("unbalanced delimiter: {0}")]
    UnbalancedDelimiter(&'static str),

    /// A tagged value with no registered handler was bound into a concrete
    /// target type.
    #[error("no handler registered for tag #{0}")]
    UnknownTag(String),

    /// A tag handler returned an error.
    #[error("tag handler #{tag} failed: {message}")]
    TagHandler { tag: String, message: String },

    /// An EDN value that cannot be assigned to the requested host type.
    #[error("cannot decode {value} into {target}")]
    TypeMismatch {
        value: &'static str,
        target: String,
    },

    /// A numeric literal that does not fit the host type.
    #[error("numeric value {value} overflows {target}")]
    Overflow { value: String, target: &'static str },

    /// A collection key that cannot be stored in the target map or set.
    #[error("unhashable key for target collection at rune {position}")]
    Unhashable { position: usize },

    /// Strict mode only: a map key with no matching field on the target
    /// struct.
    #[error("unknown field {field} for {target}")]
    UnknownField { field: String, target: &'static str },

    /// A codec bug; should never escape to users.
    #[error("internal invariant violated: {0}")]
    Internal(&'static str),

    /// Free-form message, produced through serde's `custom` hooks.
    #[error("{0}")]
    Message(String),
}

impl Error {
    pub(crate) fn lex(kind: LexErrorKind, position: usize) -> Self {
        Error::Lex { kind, position }
    }

    pub(crate) fn type_mismatch(value: &'static str, target: impl fmt::Display) -> Self {
        Error::TypeMismatch {
            value,
            target: target.to_string(),
        }
    }

    pub(crate) fn overflow(value: impl fmt::Display, target: &'static str) -> Self {
        Error::Overflow {
            value: value.to_string(),
            target,
        }
    }

    pub(crate) fn tag_handler(tag: &str, err: impl fmt::Display) -> Self {
        Error::TagHandler {
            tag: tag.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn io(err: &std::io::Error) -> Self {
        Error::Io(err.to_string())
    }

    /// Returns `true` for the clean end-of-stream signal, as opposed to a
    /// stream that ended mid-value.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::Eof)
    }
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
