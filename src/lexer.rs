//! The EDN lexer: a character-driven state machine with one-rune lookahead.
//!
//! The lexer is fed one Unicode scalar at a time and answers, for each rune,
//! whether it continues the current token, is ignorable whitespace or comment
//! content, completes the token (delimiter-inclusive, like the closing quote
//! of a string), or completed the token just *before* this rune — in which
//! case the rune is pushed back onto the [`RuneReader`] and re-fed as the
//! start of the next token.
//!
//! Commas count as whitespace. Comments run from `;` to the end of the line.
//! `nil`, `true` and `false` are lexed as plain symbols; the binder
//! reclassifies them.

use std::io::{self, Read};

use crate::error::{Error, LexErrorKind, Result};

/// Token classes produced by the lexer.
///
/// `MapEnd` is emitted for every `}` and closes both maps and sets; the
/// token stack decides which one based on the innermost opener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Symbol,
    Keyword,
    String,
    Int,
    Float,
    Char,
    ListStart,
    ListEnd,
    VectorStart,
    VectorEnd,
    MapStart,
    MapEnd,
    SetStart,
    Tag,
    Discard,
}

impl TokenKind {
    pub(crate) fn describe(self) -> &'static str {
        match self {
            TokenKind::Symbol => "symbol",
            TokenKind::Keyword => "keyword",
            TokenKind::String => "string",
            TokenKind::Int => "integer",
            TokenKind::Float => "float",
            TokenKind::Char => "character",
            TokenKind::ListStart => "list",
            TokenKind::ListEnd => "end of list",
            TokenKind::VectorStart => "vector",
            TokenKind::VectorEnd => "end of vector",
            TokenKind::MapStart => "map",
            TokenKind::MapEnd => "end of map",
            TokenKind::SetStart => "set",
            TokenKind::Tag => "tag",
            TokenKind::Discard => "discard",
        }
    }
}

/// A lexed token: its class and the exact source text, delimiters included
/// (`"foo"` keeps its quotes, `:kw` its colon, `#tag` its hash).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub text: String,
}

/// Outcome of feeding one rune (or EOF) to the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lex {
    /// The rune belongs to the current token.
    Cont,
    /// Whitespace or comment content; discard it.
    Ignore,
    /// The rune completes the current token and is part of it.
    End(TokenKind),
    /// The token ended just before this rune; push the rune back.
    EndPrev(TokenKind),
    /// Lexical failure.
    Error(LexErrorKind),
    /// The stream ended in the middle of a token (only from `eof`).
    EofMidToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumStage {
    Int,
    Dot,
    Frac,
    ExpMark,
    ExpSign,
    Exp,
    IntMarked,
    FloatMarked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrEscape {
    None,
    Backslash,
    Unicode(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Comment,
    Symbol { slash_seen: bool },
    Keyword { has_name: bool, slash_seen: bool },
    SignOrSymbol,
    Number(NumStage),
    Str(StrEscape),
    CharLit { len: usize, named: bool },
    /// Just read `#`; deciding between tag, set, discard and regex.
    Dispatch,
    TagName { slash_seen: bool },
}

fn is_whitespace(r: char) -> bool {
    matches!(r, ' ' | '\t' | '\n' | '\r' | ',')
}

fn is_delimiter(r: char) -> bool {
    matches!(r, '(' | ')' | '[' | ']' | '{' | '}')
}

/// Runes that always end a bare token (symbols get to keep `#`, numbers and
/// chars do not).
fn is_terminator(r: char) -> bool {
    is_whitespace(r) || is_delimiter(r) || matches!(r, '"' | ';' | '\\')
}

fn is_symbol_start(r: char) -> bool {
    r.is_alphabetic()
        || matches!(
            r,
            '*' | '!' | '_' | '?' | '$' | '%' | '&' | '=' | '<' | '>' | '.' | '/'
        )
}

fn is_symbol_continue(r: char) -> bool {
    r.is_alphanumeric()
        || matches!(
            r,
            '*' | '!' | '_' | '?' | '$' | '%' | '&' | '=' | '<' | '>' | '+' | '-' | '.' | '\''
                | ':' | '#'
        )
}

/// The character-driven state machine of §the lexer. Fed by [`crate::parser::Parser`].
#[derive(Debug)]
pub(crate) struct Lexer {
    state: State,
}

impl Lexer {
    pub(crate) fn new() -> Self {
        Lexer { state: State::Start }
    }

    /// Resets to the start state. Called before each token.
    pub(crate) fn reset(&mut self) {
        self.state = State::Start;
    }

    /// Feeds one rune to the state machine.
    pub(crate) fn feed(&mut self, r: char) -> Lex {
        match self.state {
            State::Start => self.start(r),
            State::Comment => {
                if r == '\n' {
                    self.state = State::Start;
                }
                Lex::Ignore
            }
            State::Symbol { slash_seen } => self.symbol_like(r, slash_seen, false),
            State::Keyword {
                has_name,
                slash_seen,
            } => {
                if !has_name {
                    if is_symbol_continue(r) || r == '/' {
                        self.state = State::Keyword {
                            has_name: true,
                            slash_seen: r == '/',
                        };
                        Lex::Cont
                    } else {
                        Lex::Error(LexErrorKind::IllegalRune)
                    }
                } else {
                    self.symbol_like(r, slash_seen, true)
                }
            }
            State::SignOrSymbol => {
                if r.is_ascii_digit() {
                    self.state = State::Number(NumStage::Int);
                    Lex::Cont
                } else if is_symbol_continue(r) || r == '/' {
                    self.state = State::Symbol {
                        slash_seen: r == '/',
                    };
                    Lex::Cont
                } else if is_terminator(r) {
                    Lex::EndPrev(TokenKind::Symbol)
                } else {
                    Lex::Error(LexErrorKind::IllegalRune)
                }
            }
            State::Number(stage) => self.number(r, stage),
            State::Str(escape) => self.string(r, escape),
            State::CharLit { len, named } => self.char_lit(r, len, named),
            State::Dispatch => match r {
                '_' => Lex::End(TokenKind::Discard),
                '{' => Lex::End(TokenKind::SetStart),
                '"' => Lex::Error(LexErrorKind::Regex),
                _ if is_symbol_start(r) && r != ':' => {
                    self.state = State::TagName {
                        slash_seen: r == '/',
                    };
                    Lex::Cont
                }
                _ => Lex::Error(LexErrorKind::IllegalRune),
            },
            State::TagName { slash_seen } => {
                if r == '/' {
                    if slash_seen {
                        Lex::Error(LexErrorKind::IllegalRune)
                    } else {
                        self.state = State::TagName { slash_seen: true };
                        Lex::Cont
                    }
                } else if is_symbol_continue(r) {
                    Lex::Cont
                } else if is_terminator(r) {
                    Lex::EndPrev(TokenKind::Tag)
                } else {
                    Lex::Error(LexErrorKind::IllegalRune)
                }
            }
        }
    }

    /// The EOF tick: reports how stream end interacts with the current state.
    pub(crate) fn eof(&mut self) -> Lex {
        match self.state {
            State::Start | State::Comment => Lex::Ignore,
            State::Symbol { .. } | State::SignOrSymbol => Lex::End(TokenKind::Symbol),
            State::Keyword { has_name, .. } => {
                if has_name {
                    Lex::End(TokenKind::Keyword)
                } else {
                    Lex::Error(LexErrorKind::IllegalRune)
                }
            }
            State::Number(stage) => match stage {
                NumStage::Int | NumStage::IntMarked => Lex::End(TokenKind::Int),
                NumStage::Dot | NumStage::Frac | NumStage::Exp | NumStage::FloatMarked => {
                    Lex::End(TokenKind::Float)
                }
                NumStage::ExpMark | NumStage::ExpSign => Lex::Error(LexErrorKind::BadNumber),
            },
            State::Str(_) => Lex::Error(LexErrorKind::UnterminatedString),
            State::CharLit { len, .. } => {
                if len == 0 {
                    Lex::EofMidToken
                } else {
                    Lex::End(TokenKind::Char)
                }
            }
            State::Dispatch => Lex::EofMidToken,
            State::TagName { .. } => Lex::End(TokenKind::Tag),
        }
    }

    fn start(&mut self, r: char) -> Lex {
        match r {
            _ if is_whitespace(r) => Lex::Ignore,
            ';' => {
                self.state = State::Comment;
                Lex::Ignore
            }
            '(' => Lex::End(TokenKind::ListStart),
            ')' => Lex::End(TokenKind::ListEnd),
            '[' => Lex::End(TokenKind::VectorStart),
            ']' => Lex::End(TokenKind::VectorEnd),
            '{' => Lex::End(TokenKind::MapStart),
            '}' => Lex::End(TokenKind::MapEnd),
            '#' => {
                self.state = State::Dispatch;
                Lex::Cont
            }
            '"' => {
                self.state = State::Str(StrEscape::None);
                Lex::Cont
            }
            ':' => {
                self.state = State::Keyword {
                    has_name: false,
                    slash_seen: false,
                };
                Lex::Cont
            }
            '\\' => {
                self.state = State::CharLit {
                    len: 0,
                    named: false,
                };
                Lex::Cont
            }
            '+' | '-' => {
                self.state = State::SignOrSymbol;
                Lex::Cont
            }
            _ if r.is_ascii_digit() => {
                self.state = State::Number(NumStage::Int);
                Lex::Cont
            }
            _ if is_symbol_start(r) => {
                self.state = State::Symbol {
                    slash_seen: r == '/',
                };
                Lex::Cont
            }
            _ => Lex::Error(LexErrorKind::IllegalRune),
        }
    }

    fn symbol_like(&mut self, r: char, slash_seen: bool, keyword: bool) -> Lex {
        let kind = if keyword {
            TokenKind::Keyword
        } else {
            TokenKind::Symbol
        };
        if r == '/' {
            if slash_seen {
                return Lex::Error(LexErrorKind::IllegalRune);
            }
            self.state = if keyword {
                State::Keyword {
                    has_name: true,
                    slash_seen: true,
                }
            } else {
                State::Symbol { slash_seen: true }
            };
            Lex::Cont
        } else if is_symbol_continue(r) {
            Lex::Cont
        } else if is_terminator(r) {
            Lex::EndPrev(kind)
        } else {
            Lex::Error(LexErrorKind::IllegalRune)
        }
    }

    fn number(&mut self, r: char, stage: NumStage) -> Lex {
        use NumStage::*;
        let next = match (stage, r) {
            (Int, '0'..='9') => Int,
            (Int, '.') => Dot,
            (Int, 'e' | 'E') => ExpMark,
            (Int, 'N') => IntMarked,
            (Int, 'M') => FloatMarked,
            (Dot, '0'..='9') => Frac,
            (Dot, 'M') => FloatMarked,
            (Frac, '0'..='9') => Frac,
            (Frac, 'e' | 'E') => ExpMark,
            (Frac, 'M') => FloatMarked,
            (ExpMark, '0'..='9') => Exp,
            (ExpMark, '+' | '-') => ExpSign,
            (ExpSign, '0'..='9') => Exp,
            (Exp, '0'..='9') => Exp,
            (Exp, 'M') => FloatMarked,
            (Int | Dot | Frac | Exp | IntMarked | FloatMarked, _)
                if is_terminator(r) || r == '#' =>
            {
                return Lex::EndPrev(match stage {
                    Int | IntMarked => TokenKind::Int,
                    _ => TokenKind::Float,
                });
            }
            _ => return Lex::Error(LexErrorKind::BadNumber),
        };
        self.state = State::Number(next);
        Lex::Cont
    }

    fn string(&mut self, r: char, escape: StrEscape) -> Lex {
        match escape {
            StrEscape::None => match r {
                '"' => Lex::End(TokenKind::String),
                '\\' => {
                    self.state = State::Str(StrEscape::Backslash);
                    Lex::Cont
                }
                _ => Lex::Cont,
            },
            StrEscape::Backslash => match r {
                '"' | '\\' | 'n' | 't' | 'r' | 'b' | 'f' => {
                    self.state = State::Str(StrEscape::None);
                    Lex::Cont
                }
                'u' => {
                    self.state = State::Str(StrEscape::Unicode(4));
                    Lex::Cont
                }
                _ => Lex::Error(LexErrorKind::BadEscape),
            },
            StrEscape::Unicode(left) => {
                if r.is_ascii_hexdigit() {
                    self.state = if left == 1 {
                        State::Str(StrEscape::None)
                    } else {
                        State::Str(StrEscape::Unicode(left - 1))
                    };
                    Lex::Cont
                } else {
                    Lex::Error(LexErrorKind::BadEscape)
                }
            }
        }
    }

    fn char_lit(&mut self, r: char, len: usize, named: bool) -> Lex {
        if len == 0 {
            if is_whitespace(r) {
                return Lex::Error(LexErrorKind::IllegalRune);
            }
            self.state = State::CharLit {
                len: 1,
                named: r.is_alphabetic(),
            };
            return Lex::Cont;
        }
        if named {
            if r.is_alphanumeric() {
                self.state = State::CharLit {
                    len: len + 1,
                    named: true,
                };
                Lex::Cont
            } else if is_terminator(r) || r == '#' {
                Lex::EndPrev(TokenKind::Char)
            } else {
                Lex::Error(LexErrorKind::IllegalRune)
            }
        } else {
            // single-scalar literal like \' or \ŋ; anything ends it
            Lex::EndPrev(TokenKind::Char)
        }
    }
}

/// One-rune-at-a-time reader over a byte stream, with single-rune pushback.
///
/// Decodes UTF-8 incrementally; the position counter (runes consumed since
/// the start of the stream) feeds lex error diagnostics. Wrap slow readers
/// in a `BufReader`; the crate-level entry points already do.
pub(crate) struct RuneReader<R> {
    inner: R,
    pushback: Option<char>,
    position: usize,
}

impl<R: Read> RuneReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        RuneReader {
            inner,
            pushback: None,
            position: 0,
        }
    }

    /// Rune offset since the start of the stream.
    pub(crate) fn position(&self) -> usize {
        self.position
    }

    /// Returns the next scalar, or `None` at end of stream.
    pub(crate) fn next_rune(&mut self) -> Result<Option<char>> {
        if let Some(r) = self.pushback.take() {
            self.position += 1;
            return Ok(Some(r));
        }
        let first = match self.read_byte()? {
            Some(b) => b,
            None => return Ok(None),
        };
        if first.is_ascii() {
            self.position += 1;
            return Ok(Some(first as char));
        }
        let width = match first {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return Err(Error::lex(LexErrorKind::IllegalRune, self.position)),
        };
        let mut buf = [first, 0, 0, 0];
        for slot in buf.iter_mut().take(width).skip(1) {
            *slot = self.read_byte()?.ok_or(Error::UnexpectedEof)?;
        }
        let s = std::str::from_utf8(&buf[..width])
            .map_err(|_| Error::lex(LexErrorKind::IllegalRune, self.position))?;
        self.position += 1;
        Ok(s.chars().next())
    }

    /// Holds a rune to be returned by the next `next_rune` call. The parser
    /// never holds more than one.
    pub(crate) fn push_back(&mut self, r: char) {
        debug_assert!(self.pushback.is_none(), "double rune pushback");
        self.pushback = Some(r);
        self.position -= 1;
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            return match self.inner.read(&mut byte) {
                Ok(0) => Ok(None),
                Ok(_) => Ok(Some(byte[0])),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => Err(Error::io(&e)),
            };
        }
    }
}
