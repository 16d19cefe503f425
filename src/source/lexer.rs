//! Tokenizer for model source.
//!
//! Tokens borrow identifiers from the source text; string literals are
//! unescaped into the compilation arena.

use super::{Pos, SourceError};
use bumpalo::collections::{String as BumpString, Vec as BumpVec};
use bumpalo::Bump;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind<'a> {
    Ident(&'a str),
    Str(&'a str),
    Int(u64),
    Punct(char),
    Eof,
}

impl std::fmt::Display for TokenKind<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "`{name}`"),
            TokenKind::Str(_) => f.write_str("string literal"),
            TokenKind::Int(value) => write!(f, "`{value}`"),
            TokenKind::Punct(c) => write!(f, "`{c}`"),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub pos: Pos,
}

const PUNCTUATION: &[char] = &['{', '}', '(', ')', ';', ',', '.', '='];

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: u32,
    column: u32,
    arena: &'a Bump,
}

impl<'a> Lexer<'a> {
    fn pos(&self) -> Pos {
        Pos {
            line: self.line,
            column: self.column,
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next()?;
        if next.1 == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(next)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.src.len(), |&(offset, _)| offset)
    }

    fn rest(&mut self) -> &'a str {
        let offset = self.offset();
        &self.src[offset..]
    }

    fn slice_from(&mut self, start: usize) -> &'a str {
        let end = self.offset();
        &self.src[start..end]
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '/' && self.rest().starts_with("//") {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Token<'a>, SourceError> {
        self.skip_trivia();
        let pos = self.pos();
        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos,
            });
        };

        let kind = if is_ident_start(c) {
            let start = self.offset();
            while self.peek().is_some_and(is_ident_continue) {
                self.bump();
            }
            TokenKind::Ident(self.slice_from(start))
        } else if c.is_ascii_digit() {
            let start = self.offset();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
            let digits = self.slice_from(start);
            let value = digits
                .parse()
                .map_err(|_| SourceError::syntax(pos, format!("integer `{digits}` out of range")))?;
            TokenKind::Int(value)
        } else if c == '"' {
            TokenKind::Str(self.string(pos)?)
        } else if PUNCTUATION.contains(&c) {
            self.bump();
            TokenKind::Punct(c)
        } else {
            return Err(SourceError::syntax(pos, format!("unexpected character {c:?}")));
        };
        Ok(Token { kind, pos })
    }

    fn string(&mut self, start: Pos) -> Result<&'a str, SourceError> {
        self.bump();
        let mut text = BumpString::new_in(self.arena);
        loop {
            let pos = self.pos();
            match self.bump().map(|(_, c)| c) {
                None | Some('\n') => {
                    return Err(SourceError::syntax(start, "unterminated string literal"))
                }
                Some('"') => break,
                Some('\\') => match self.bump().map(|(_, c)| c) {
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    Some('n') => text.push('\n'),
                    Some('r') => text.push('\r'),
                    Some('t') => text.push('\t'),
                    Some('u') => text.push(self.unicode_escape(pos)?),
                    _ => return Err(SourceError::syntax(pos, "invalid escape sequence")),
                },
                Some(c) => text.push(c),
            }
        }
        Ok(text.into_bump_str())
    }

    fn unicode_escape(&mut self, pos: Pos) -> Result<char, SourceError> {
        let invalid = || SourceError::syntax(pos, "invalid unicode escape");
        if self.bump().map(|(_, c)| c) != Some('{') {
            return Err(invalid());
        }
        let mut value: u32 = 0;
        let mut digits = 0;
        loop {
            match self.bump().map(|(_, c)| c) {
                Some('}') if digits > 0 => break,
                Some(c) if digits < 6 => {
                    let digit = c.to_digit(16).ok_or_else(invalid)?;
                    value = value * 16 + digit;
                    digits += 1;
                }
                _ => return Err(invalid()),
            }
        }
        char::from_u32(value).ok_or_else(invalid)
    }
}

/// Split `src` into tokens, ending with a single [`TokenKind::Eof`].
pub fn tokenize<'a>(src: &'a str, arena: &'a Bump) -> Result<BumpVec<'a, Token<'a>>, SourceError> {
    let mut lexer = Lexer {
        src,
        chars: src.char_indices().peekable(),
        line: 1,
        column: 1,
        arena,
    };
    let mut tokens = BumpVec::new_in(arena);
    loop {
        let token = lexer.next_token()?;
        tokens.push(token);
        if token.kind == TokenKind::Eof {
            return Ok(tokens);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds<'a>(src: &'a str, arena: &'a Bump) -> Vec<TokenKind<'a>> {
        tokenize(src, arena).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_identifiers_may_contain_dollar() {
        let arena = Bump::new();
        assert_eq!(
            kinds("model TextModel$3 {", &arena),
            vec![
                TokenKind::Ident("model"),
                TokenKind::Ident("TextModel$3"),
                TokenKind::Punct('{'),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_string_escapes_are_decoded() {
        let arena = Bump::new();
        assert_eq!(
            kinds(r#""a\"b\\c\n\u{e9}""#, &arena),
            vec![TokenKind::Str("a\"b\\c\né"), TokenKind::Eof]
        );
    }

    #[test]
    fn test_comments_and_positions() {
        let arena = Bump::new();
        let tokens = tokenize("// header\n  buffer(12)", &arena).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident("buffer"));
        assert_eq!(tokens[0].pos, Pos { line: 2, column: 3 });
        assert_eq!(tokens[2].kind, TokenKind::Int(12));
    }

    #[test]
    fn test_unterminated_string() {
        let arena = Bump::new();
        let err = tokenize("x = \"open", &arena).unwrap_err();
        assert_eq!(
            err,
            SourceError::Syntax {
                line: 1,
                column: 5,
                message: "unterminated string literal".to_string()
            }
        );
    }
}
