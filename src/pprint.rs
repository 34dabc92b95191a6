//! Re-serializers over the token stream: compaction and pretty-printing.
//!
//! All three functions re-lex their input rather than building values, so
//! they preserve token spellings exactly (`1.50M` stays `1.50M`) and cost
//! one pass.
//!
//! - [`compact`] squeezes whitespace to the minimum. Comments vanish;
//!   discards survive; when two bare tokens need a separator, the last
//!   whitespace rune of the original gap is reused, so `a,b` keeps its
//!   comma and `foo\nbar` its newline. Compacting is idempotent.
//! - [`indent`] puts every collection on its own indented line, one map
//!   pair per line with a comma after each, and keeps empty collections
//!   closed up. Discards and comments are dropped.
//! - [`pprint`] keeps the first element on the opening-delimiter line and
//!   aligns the rest to that column, in the manner of `clojure.pprint`.
//!   Column accounting is per Unicode scalar.

use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind};
use crate::parser::{Parser, TokenStack};

/// Configuration for [`pprint`]. The fields are accepted for compatibility
/// and do not affect output yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct PPrintOpts {
    pub right_margin: usize,
    pub miser_width: usize,
}

fn starts_bare(token: &Token) -> bool {
    matches!(
        token.kind,
        TokenKind::Symbol
            | TokenKind::Keyword
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Char
            | TokenKind::Tag
            | TokenKind::Discard
            | TokenKind::SetStart
    )
}

fn ends_bare(token: &Token) -> bool {
    // `#_` and `#{` terminate exactly at their last rune; nothing fuses
    // onto them from the right
    matches!(
        token.kind,
        TokenKind::Symbol
            | TokenKind::Keyword
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Char
            | TokenKind::Tag
    )
}

/// Rewrites `src` with the minimum whitespace that lexes back to the same
/// token stream. Comments are removed; discards are kept.
pub fn compact(src: &[u8]) -> Result<String> {
    let mut parser = Parser::new(src);
    let mut stack = TokenStack::new();
    let mut out = String::new();
    let mut prev_bare = false;
    loop {
        let mut gap = String::new();
        let token = match parser.raw_token_with_gap(&mut gap) {
            Ok(token) => token,
            Err(e) if e.is_eof() => {
                if stack.depth() > 0 || (!stack.done() && !out.is_empty()) {
                    return Err(Error::UnexpectedEof);
                }
                return Ok(out);
            }
            Err(e) => return Err(e),
        };
        stack.push(token.kind)?;
        if prev_bare && starts_bare(&token) {
            let sep = gap
                .chars()
                .next_back()
                .filter(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | ','))
                .unwrap_or(' ');
            out.push(sep);
        }
        out.push_str(&token.text);
        prev_bare = ends_bare(&token);
    }
}

fn newline(out: &mut String, prefix: &str, indent: &str, depth: usize) {
    out.push('\n');
    out.push_str(prefix);
    for _ in 0..depth {
        out.push_str(indent);
    }
}

/// Returns an indented form of the first EDN value in `src`. Each
/// collection begins on a new line starting with `prefix` followed by one
/// copy of `indent` per nesting level. The output does not begin with the
/// prefix and has no trailing newline, so it embeds cleanly in other
/// formatted output.
///
/// Whitespace, comments and discards are filtered away.
pub fn indent(src: &[u8], prefix: &str, indent: &str) -> Result<String> {
    let mut parser = Parser::new(src);
    let mut stack = TokenStack::new();
    let mut out = String::new();
    let mut cur_type: Option<TokenKind> = None;
    let mut cur_size = 0usize;
    let mut depth = 0usize;
    loop {
        let token = parser.next_token().map_err(|e| {
            if e.is_eof() && !out.is_empty() {
                Error::UnexpectedEof
            } else {
                e
            }
        })?;
        stack.push(token.kind)?;
        let prev_type = cur_type;
        let prev_size = cur_size;
        if stack.depth() > 0 {
            cur_type = stack.peek();
            cur_size = stack.peek_count();
        }
        match token.kind {
            TokenKind::MapStart
            | TokenKind::VectorStart
            | TokenKind::ListStart
            | TokenKind::SetStart => {
                if prev_type == Some(TokenKind::MapStart) {
                    out.push(' ');
                } else if depth > 0 {
                    newline(&mut out, prefix, indent, depth);
                }
                out.push_str(&token.text);
                depth += 1;
            }
            TokenKind::VectorEnd | TokenKind::ListEnd | TokenKind::MapEnd => {
                depth -= 1;
                // suppress the newline for empty collections
                if prev_size > 0 {
                    newline(&mut out, prefix, indent, depth);
                }
                out.push_str(&token.text);
            }
            TokenKind::Tag => {
                match prev_type {
                    Some(TokenKind::MapStart) => {
                        if prev_size % 2 == 0 {
                            if prev_size > 0 {
                                out.push(',');
                            }
                            newline(&mut out, prefix, indent, depth);
                        } else {
                            out.push(' ');
                        }
                    }
                    Some(
                        TokenKind::SetStart | TokenKind::VectorStart | TokenKind::ListStart,
                    ) => {
                        newline(&mut out, prefix, indent, depth);
                    }
                    _ => {}
                }
                out.push_str(&token.text);
                out.push(' ');
            }
            _ => {
                match prev_type {
                    Some(TokenKind::MapStart) => {
                        if prev_size % 2 == 0 {
                            if prev_size > 0 {
                                out.push(',');
                            }
                            newline(&mut out, prefix, indent, depth);
                        } else {
                            out.push(' ');
                        }
                    }
                    Some(
                        TokenKind::SetStart | TokenKind::VectorStart | TokenKind::ListStart,
                    ) => {
                        newline(&mut out, prefix, indent, depth);
                    }
                    _ => {}
                }
                out.push_str(&token.text);
            }
        }
        if stack.done() {
            return Ok(out);
        }
    }
}

fn pprint_indent(out: &mut String, shift: usize) {
    out.push('\n');
    for _ in 0..shift {
        out.push(' ');
    }
}

/// Returns a readable form of the first EDN value in `src`, close to (but
/// not exactly) `clojure.pprint/pprint`: the first element shares the line
/// with its opening delimiter and later elements align underneath it, with
/// a comma after each map pair.
///
/// Whitespace, comments and discards are filtered away.
pub fn pprint(src: &[u8], _opts: &PPrintOpts) -> Result<String> {
    let mut parser = Parser::new(src);
    let mut stack = TokenStack::new();
    let mut out = String::new();
    let mut shift: Vec<usize> = vec![0];
    let mut col = 0usize;
    let mut prev_coll = false;
    let mut prev_coll_start = 0usize;
    let mut cur_type: Option<TokenKind> = None;
    let mut cur_size = 0usize;
    loop {
        let token = parser.next_token().map_err(|e| {
            if e.is_eof() && !out.is_empty() {
                Error::UnexpectedEof
            } else {
                e
            }
        })?;
        stack.push(token.kind)?;
        let prev_type = cur_type;
        let prev_size = cur_size;
        if stack.depth() > 0 {
            cur_type = stack.peek();
            cur_size = stack.peek_count();
        }
        // indentation, except before closers
        match token.kind {
            TokenKind::VectorEnd | TokenKind::ListEnd | TokenKind::MapEnd => {}
            _ => match prev_type {
                Some(TokenKind::MapStart) => {
                    if prev_size % 2 == 0 && prev_size > 0 {
                        out.push(',');
                        let s = *shift.last().unwrap_or(&0);
                        pprint_indent(&mut out, s);
                        col = s;
                    } else if prev_size % 2 == 1 {
                        out.push(' ');
                        col += 1;
                    }
                }
                Some(TokenKind::SetStart | TokenKind::VectorStart | TokenKind::ListStart) => {
                    if prev_coll {
                        // continue on a new line where the previous
                        // collection started
                        pprint_indent(&mut out, prev_coll_start);
                        col = prev_coll_start;
                    } else if prev_size > 0 {
                        out.push(' ');
                        col += 1;
                    }
                }
                _ => {}
            },
        }
        let width = token.text.chars().count();
        match token.kind {
            TokenKind::MapStart
            | TokenKind::VectorStart
            | TokenKind::ListStart
            | TokenKind::SetStart => {
                out.push_str(&token.text);
                col += width;
                shift.push(col);
            }
            TokenKind::VectorEnd | TokenKind::ListEnd | TokenKind::MapEnd => {
                out.push_str(&token.text);
                prev_coll_start = shift.last().unwrap_or(&1).saturating_sub(1);
                shift.pop();
            }
            TokenKind::Tag => {
                out.push_str(&token.text);
                out.push(' ');
                col += width + 1;
            }
            _ => {
                out.push_str(&token.text);
                col += width;
            }
        }
        prev_coll = matches!(
            token.kind,
            TokenKind::MapEnd | TokenKind::VectorEnd | TokenKind::ListEnd
        );
        if stack.done() {
            return Ok(out);
        }
    }
}
