//! The streaming token parser.
//!
//! [`Parser`] drives the lexer over a byte stream and hands out tokens on
//! demand. It owns the single-token pushback slot (the codec is LL(1)), the
//! discard machinery (`#_` and everything it swallows never reaches the
//! caller of [`Parser::next_token`]), and the raw-capture and skip walks
//! used by tag plumbing and `RawEdn`.
//!
//! [`TokenStack`] tracks open collections so walks know when a top-level
//! value is complete. Per the corrected close semantics, `}` closes iff the
//! innermost opener is a map or set start; `)` and `]` close exactly their
//! own kind.

use std::io::Read;

use crate::error::{Error, Result};
use crate::lexer::{Lex, Lexer, RuneReader, Token, TokenKind};

/// Tracks open containers plus pending tag/discard frames during a value
/// walk. Each container frame counts the values completed inside it; the
/// indenter and pretty-printer use the count to tell map keys from values.
#[derive(Debug, Default)]
pub(crate) struct TokenStack {
    frames: Vec<Frame>,
    toplevel: Option<TokenKind>,
}

#[derive(Debug)]
struct Frame {
    kind: TokenKind,
    count: usize,
}

impl TokenStack {
    pub(crate) fn new() -> Self {
        TokenStack::default()
    }

    /// True once a complete value has been consumed. A discard at top level
    /// does not count: after `#_ x`, the stack is empty but not done.
    pub(crate) fn done(&self) -> bool {
        self.frames.is_empty() && self.toplevel != Some(TokenKind::Discard)
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn peek(&self) -> Option<TokenKind> {
        self.frames.last().map(|f| f.kind)
    }

    /// Count of values completed inside the innermost open frame.
    pub(crate) fn peek_count(&self) -> usize {
        self.frames.last().map_or(0, |f| f.count)
    }

    pub(crate) fn push(&mut self, kind: TokenKind) -> Result<()> {
        if self.frames.is_empty() {
            self.toplevel = Some(kind);
        }
        match kind {
            TokenKind::ListStart
            | TokenKind::VectorStart
            | TokenKind::MapStart
            | TokenKind::SetStart
            | TokenKind::Tag
            | TokenKind::Discard => {
                self.frames.push(Frame { kind, count: 0 });
                return Ok(());
            }
            TokenKind::ListEnd => self.close(TokenKind::ListStart, TokenKind::ListStart, ")")?,
            TokenKind::VectorEnd => {
                self.close(TokenKind::VectorStart, TokenKind::VectorStart, "]")?
            }
            // `}` closes both maps and sets
            TokenKind::MapEnd => self.close(TokenKind::MapStart, TokenKind::SetStart, "}")?,
            _ => {}
        }
        // a value just completed at the current level
        while self.peek() == Some(TokenKind::Tag) {
            self.frames.pop();
        }
        if self.peek() == Some(TokenKind::Discard) {
            // the discard and its value are invisible to the enclosing frame
            self.frames.pop();
        } else if let Some(top) = self.frames.last_mut() {
            top.count += 1;
        }
        Ok(())
    }

    fn close(&mut self, a: TokenKind, b: TokenKind, which: &'static str) -> Result<()> {
        match self.peek() {
            Some(k) if k == a || k == b => {
                self.frames.pop();
                Ok(())
            }
            _ => Err(Error::UnbalancedDelimiter(which)),
        }
    }
}

/// Streaming EDN token source with one-token pushback.
pub(crate) struct Parser<R> {
    reader: RuneReader<R>,
    lexer: Lexer,
    undo: Option<Token>,
}

impl<R: Read> Parser<R> {
    pub(crate) fn new(reader: R) -> Self {
        Parser {
            reader: RuneReader::new(reader),
            lexer: Lexer::new(),
            undo: None,
        }
    }

    /// Rune offset since the start of the stream, for diagnostics.
    pub(crate) fn position(&self) -> usize {
        self.reader.position()
    }

    /// Clears any pushed-back token. Each top-level decode starts clean.
    pub(crate) fn reset(&mut self) {
        self.undo = None;
        self.lexer.reset();
    }

    /// One-token pushback. Using it twice before a read is a codec bug.
    pub(crate) fn undo(&mut self, token: Token) -> Result<()> {
        if self.undo.is_some() {
            return Err(Error::Internal("double token pushback"));
        }
        self.undo = Some(token);
        Ok(())
    }

    /// Returns the next token, transparently walking and dropping anything
    /// claimed by `#_` discards (which may themselves nest arbitrarily).
    /// Clean end of stream is `Error::Eof`.
    pub(crate) fn next_token(&mut self) -> Result<Token> {
        loop {
            let token = self.raw_token(None)?;
            if token.kind == TokenKind::Discard {
                self.skip_next_value().map_err(eof_mid_value)?;
                continue;
            }
            return Ok(token);
        }
    }

    /// Like `next_token` but discards are returned, not resolved, and the
    /// whitespace/comment gap before the token is appended to `gap`. The
    /// compactor needs both.
    pub(crate) fn raw_token_with_gap(&mut self, gap: &mut String) -> Result<Token> {
        self.raw_token(Some(gap))
    }

    fn raw_token(&mut self, mut gap: Option<&mut String>) -> Result<Token> {
        if let Some(token) = self.undo.take() {
            return Ok(token);
        }
        self.lexer.reset();
        let mut text = String::new();
        loop {
            match self.reader.next_rune()? {
                Some(r) => match self.lexer.feed(r) {
                    Lex::Cont => text.push(r),
                    Lex::Ignore => {
                        if let Some(gap) = gap.as_mut() {
                            gap.push(r);
                        }
                    }
                    Lex::End(kind) => {
                        text.push(r);
                        return Ok(Token { kind, text });
                    }
                    Lex::EndPrev(kind) => {
                        self.reader.push_back(r);
                        return Ok(Token { kind, text });
                    }
                    Lex::Error(kind) => return Err(Error::lex(kind, self.reader.position())),
                    Lex::EofMidToken => return Err(Error::Internal("eof signal from feed")),
                },
                None => {
                    return match self.lexer.eof() {
                        Lex::Ignore => Err(Error::Eof),
                        Lex::End(kind) => Ok(Token { kind, text }),
                        Lex::Error(kind) => Err(Error::lex(kind, self.reader.position())),
                        Lex::EofMidToken => Err(Error::UnexpectedEof),
                        Lex::Cont | Lex::EndPrev(_) => {
                            Err(Error::Internal("lexer eof returned continuation"))
                        }
                    };
                }
            }
        }
    }

    /// Reads one complete value and throws it away.
    pub(crate) fn skip_next_value(&mut self) -> Result<()> {
        let mut stack = TokenStack::new();
        loop {
            let token = self.next_token().map_err(eof_mid_value)?;
            stack.push(token.kind)?;
            if stack.done() {
                return Ok(());
            }
        }
    }

    /// Returns the exact source text of the next complete value, original
    /// interior whitespace included. Leading whitespace is not captured; a
    /// pushed-back terminator rune stays out.
    pub(crate) fn capture_next_value(&mut self) -> Result<String> {
        let mut out = String::new();
        let mut stack = TokenStack::new();
        if let Some(token) = self.undo.take() {
            if token.kind == TokenKind::Discard {
                return Err(Error::Internal("discard token in pushback"));
            }
            stack.push(token.kind)?;
            out.push_str(&token.text);
            if stack.done() {
                return Ok(out);
            }
        }
        loop {
            let mut gap = String::new();
            let token = self.raw_token(Some(&mut gap)).map_err(eof_mid_value)?;
            if !out.is_empty() {
                out.push_str(&gap);
            }
            out.push_str(&token.text);
            stack.push(token.kind)?;
            if stack.done() {
                return Ok(out);
            }
        }
    }
}

fn eof_mid_value(err: Error) -> Error {
    if err.is_eof() {
        Error::UnexpectedEof
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<(TokenKind, String)> {
        let mut parser = Parser::new(input.as_bytes());
        let mut out = Vec::new();
        loop {
            match parser.next_token() {
                Ok(t) => out.push((t.kind, t.text)),
                Err(e) if e.is_eof() => return out,
                Err(e) => panic!("lex failure on {input:?}: {e}"),
            }
        }
    }

    #[test]
    fn tokenizes_scalars() {
        assert_eq!(
            tokens(r#"nil true 1 -2.5 "hi" :kw sym \a"#),
            vec![
                (TokenKind::Symbol, "nil".into()),
                (TokenKind::Symbol, "true".into()),
                (TokenKind::Int, "1".into()),
                (TokenKind::Float, "-2.5".into()),
                (TokenKind::String, "\"hi\"".into()),
                (TokenKind::Keyword, ":kw".into()),
                (TokenKind::Symbol, "sym".into()),
                (TokenKind::Char, "\\a".into()),
            ]
        );
    }

    #[test]
    fn tokenizes_collections_without_spaces() {
        assert_eq!(
            tokens(r#"{:a"foo"}"#),
            vec![
                (TokenKind::MapStart, "{".into()),
                (TokenKind::Keyword, ":a".into()),
                (TokenKind::String, "\"foo\"".into()),
                (TokenKind::MapEnd, "}".into()),
            ]
        );
    }

    #[test]
    fn marked_numbers_keep_marker() {
        assert_eq!(
            tokens("5N 1.5M"),
            vec![
                (TokenKind::Int, "5N".into()),
                (TokenKind::Float, "1.5M".into()),
            ]
        );
    }

    #[test]
    fn discard_swallows_one_value() {
        assert_eq!(
            tokens("#_ {:a [1 2]} bar"),
            vec![(TokenKind::Symbol, "bar".into())]
        );
    }

    #[test]
    fn chained_discards() {
        assert_eq!(
            tokens("#_ #_ a b c"),
            vec![(TokenKind::Symbol, "c".into())]
        );
    }

    #[test]
    fn discard_of_tagged_value() {
        assert_eq!(
            tokens("#_ #zap #_ xyz foo bar"),
            vec![(TokenKind::Symbol, "bar".into())]
        );
    }

    #[test]
    fn comments_are_whitespace() {
        assert_eq!(
            tokens("foo ; bar\nbaz"),
            vec![
                (TokenKind::Symbol, "foo".into()),
                (TokenKind::Symbol, "baz".into()),
            ]
        );
    }

    #[test]
    fn undo_roundtrips() {
        let mut parser = Parser::new("a b".as_bytes());
        let a = parser.next_token().unwrap();
        parser.undo(a.clone()).unwrap();
        assert_eq!(parser.next_token().unwrap(), a);
        assert!(parser.undo(a.clone()).is_ok());
        // double undo is an internal invariant violation
        assert!(parser.undo(a).is_err());
    }

    #[test]
    fn capture_preserves_interior_whitespace() {
        let mut parser = Parser::new("[\\space #foo bar :baz 100{#{} 1.0 \"zap\" nil}] tail".as_bytes());
        let raw = parser.capture_next_value().unwrap();
        assert_eq!(raw, "[\\space #foo bar :baz 100{#{} 1.0 \"zap\" nil}]");
        assert_eq!(parser.next_token().unwrap().text, "tail");
    }

    #[test]
    fn capture_scalar_excludes_terminator() {
        let mut parser = Parser::new("foo bar".as_bytes());
        assert_eq!(parser.capture_next_value().unwrap(), "foo");
        assert_eq!(parser.next_token().unwrap().text, "bar");
    }

    #[test]
    fn unbalanced_close_kinds() {
        let mut stack = TokenStack::new();
        stack.push(TokenKind::VectorStart).unwrap();
        assert!(stack.push(TokenKind::MapEnd).is_err());

        let mut stack = TokenStack::new();
        stack.push(TokenKind::SetStart).unwrap();
        assert!(stack.push(TokenKind::MapEnd).is_ok());
    }

    #[test]
    fn tag_consumes_one_value() {
        let mut stack = TokenStack::new();
        stack.push(TokenKind::Tag).unwrap();
        assert!(!stack.done());
        stack.push(TokenKind::Int).unwrap();
        assert!(stack.done());
    }

    #[test]
    fn eof_inside_value_is_unexpected() {
        let mut parser = Parser::new("[1 2".as_bytes());
        let err = parser.skip_next_value().unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof));
    }

    #[test]
    fn eof_between_values_is_clean() {
        let mut parser = Parser::new("  ; trailing\n".as_bytes());
        assert!(parser.next_token().unwrap_err().is_eof());
    }
}
