// Recursive-descent parser for model source. The grammar is small and fixed:
//
//   model   := "model" IDENT "{" member* "}"
//   member  := "field" IDENT ";"
//            | "new" "(" [IDENT ("," IDENT)*] ")" "{" assign* "}"
//            | "render" "(" IDENT ")" "=" "buffer" "(" [INT] ")" append* ";"
//   assign  := "this" "." IDENT "=" IDENT ";"
//   append  := "." "append" "(" (STRING | "this" "." IDENT "." "evaluate" "(" IDENT ")") ")"
//
// The parser only checks shape. Names are resolved and counted by codegen, which reports
// semantic errors against the positions recorded here. All nodes live in the compilation
// arena.

//! Parser producing the model AST.

use super::lexer::{Token, TokenKind};
use super::{Pos, SourceError};
use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;

/// An identifier with its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Name<'a> {
    pub text: &'a str,
    pub pos: Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assign<'a> {
    pub field: Name<'a>,
    pub value: Name<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece<'a> {
    Literal(&'a str),
    Eval { field: Name<'a>, context: Name<'a> },
}

#[derive(Debug)]
pub enum Member<'a> {
    Field(Name<'a>),
    Constructor {
        pos: Pos,
        params: BumpVec<'a, Name<'a>>,
        assigns: BumpVec<'a, Assign<'a>>,
    },
    Render {
        pos: Pos,
        context: Name<'a>,
        capacity: u32,
        pieces: BumpVec<'a, Piece<'a>>,
    },
}

#[derive(Debug)]
pub struct ModelDecl<'a> {
    pub name: Name<'a>,
    pub members: BumpVec<'a, Member<'a>>,
}

struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    index: usize,
    arena: &'a Bump,
}

impl<'t, 'a> Parser<'t, 'a> {
    fn peek(&self) -> Token<'a> {
        self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.index += 1;
        }
        token
    }

    fn unexpected(&self, expected: &str) -> SourceError {
        let token = self.peek();
        SourceError::syntax(token.pos, format!("expected {expected}, found {}", token.kind))
    }

    fn punct(&mut self, c: char) -> Result<Pos, SourceError> {
        match self.peek().kind {
            TokenKind::Punct(found) if found == c => Ok(self.advance().pos),
            _ => Err(self.unexpected(&format!("`{c}`"))),
        }
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.peek().kind == TokenKind::Punct(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn keyword(&mut self, word: &str) -> Result<Pos, SourceError> {
        match self.peek().kind {
            TokenKind::Ident(found) if found == word => Ok(self.advance().pos),
            _ => Err(self.unexpected(&format!("`{word}`"))),
        }
    }

    fn ident(&mut self) -> Result<Name<'a>, SourceError> {
        match self.peek().kind {
            TokenKind::Ident(text) => Ok(Name {
                text,
                pos: self.advance().pos,
            }),
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn model(&mut self) -> Result<ModelDecl<'a>, SourceError> {
        self.keyword("model")?;
        let name = self.ident()?;
        self.punct('{')?;
        let mut members = BumpVec::new_in(self.arena);
        while !self.eat_punct('}') {
            members.push(self.member()?);
        }
        if self.peek().kind != TokenKind::Eof {
            return Err(self.unexpected("end of input"));
        }
        Ok(ModelDecl { name, members })
    }

    fn member(&mut self) -> Result<Member<'a>, SourceError> {
        match self.peek().kind {
            TokenKind::Ident("field") => {
                self.advance();
                let name = self.ident()?;
                self.punct(';')?;
                Ok(Member::Field(name))
            }
            TokenKind::Ident("new") => self.constructor(),
            TokenKind::Ident("render") => self.render(),
            _ => Err(self.unexpected("`field`, `new`, `render` or `}`")),
        }
    }

    fn constructor(&mut self) -> Result<Member<'a>, SourceError> {
        let pos = self.keyword("new")?;
        self.punct('(')?;
        let mut params = BumpVec::new_in(self.arena);
        if !self.eat_punct(')') {
            loop {
                params.push(self.ident()?);
                if self.eat_punct(')') {
                    break;
                }
                self.punct(',')?;
            }
        }

        self.punct('{')?;
        let mut assigns = BumpVec::new_in(self.arena);
        while !self.eat_punct('}') {
            self.keyword("this")?;
            self.punct('.')?;
            let field = self.ident()?;
            self.punct('=')?;
            let value = self.ident()?;
            self.punct(';')?;
            assigns.push(Assign { field, value });
        }
        Ok(Member::Constructor {
            pos,
            params,
            assigns,
        })
    }

    fn render(&mut self) -> Result<Member<'a>, SourceError> {
        let pos = self.keyword("render")?;
        self.punct('(')?;
        let context = self.ident()?;
        self.punct(')')?;
        self.punct('=')?;
        self.keyword("buffer")?;
        self.punct('(')?;
        let capacity = match self.peek().kind {
            TokenKind::Int(value) => {
                let token = self.advance();
                u32::try_from(value).map_err(|_| {
                    SourceError::syntax(token.pos, format!("buffer capacity {value} out of range"))
                })?
            }
            _ => 0,
        };
        self.punct(')')?;

        let mut pieces = BumpVec::new_in(self.arena);
        while self.eat_punct('.') {
            self.keyword("append")?;
            self.punct('(')?;
            pieces.push(self.piece()?);
            self.punct(')')?;
        }
        self.punct(';')?;
        Ok(Member::Render {
            pos,
            context,
            capacity,
            pieces,
        })
    }

    fn piece(&mut self) -> Result<Piece<'a>, SourceError> {
        if let TokenKind::Str(text) = self.peek().kind {
            self.advance();
            return Ok(Piece::Literal(text));
        }
        match self.peek().kind {
            TokenKind::Ident("this") => {
                self.advance();
                self.punct('.')?;
                let field = self.ident()?;
                self.punct('.')?;
                self.keyword("evaluate")?;
                self.punct('(')?;
                let context = self.ident()?;
                self.punct(')')?;
                Ok(Piece::Eval { field, context })
            }
            _ => Err(self.unexpected("string literal or `this`")),
        }
    }
}

/// Parse a token stream produced by [`super::lexer::tokenize`].
pub fn parse<'a>(tokens: &[Token<'a>], arena: &'a Bump) -> Result<ModelDecl<'a>, SourceError> {
    if tokens.is_empty() {
        return Err(SourceError::syntax(Pos::default(), "empty token stream"));
    }
    Parser {
        tokens,
        index: 0,
        arena,
    }
    .model()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::lexer::tokenize;

    #[test]
    fn test_parses_all_members() {
        let arena = Bump::new();
        let src = r#"model M { field f0; new(a0) { this.f0 = a0; } render(ctx) = buffer(3).append("x").append(this.f0.evaluate(ctx)); }"#;
        let tokens = tokenize(src, &arena).unwrap();
        let decl = parse(&tokens, &arena).unwrap();
        assert_eq!(decl.name.text, "M");
        assert_eq!(decl.members.len(), 3);
        match &decl.members[2] {
            Member::Render {
                capacity, pieces, ..
            } => {
                assert_eq!(*capacity, 3);
                assert_eq!(pieces[0], Piece::Literal("x"));
                assert!(matches!(pieces[1], Piece::Eval { field, .. } if field.text == "f0"));
            }
            other => panic!("expected render, got {other:?}"),
        }
    }

    #[test]
    fn test_reports_expected_token() {
        let arena = Bump::new();
        let tokens = tokenize("model M {\n  field ;\n}", &arena).unwrap();
        let err = parse(&tokens, &arena).unwrap_err();
        assert_eq!(
            err,
            SourceError::Syntax {
                line: 2,
                column: 9,
                message: "expected identifier, found `;`".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_trailing_input() {
        let arena = Bump::new();
        let tokens = tokenize("model M { } model N { }", &arena).unwrap();
        assert!(matches!(
            parse(&tokens, &arena),
            Err(SourceError::Syntax { column: 13, .. })
        ));
    }
}
