// This module is the textual model compiler used by the source backend. It accepts the
// small model language the backend synthesizes (a named model with fields, a constructor
// binding parameters to fields, and a render method written as a chain of appends onto a
// sized buffer) and produces a CompiledUnit. Compilation runs in three passes over one
// bumpalo arena: the lexer produces tokens and unescaped literals, the parser builds the
// AST, and codegen resolves names and emits both bodies. Errors carry 1-based line and
// column positions.

//! Textual model compiler.

pub mod codegen;
pub mod lexer;
pub mod parser;

use crate::unit::{CompiledUnit, UnitError};
use bumpalo::Bump;
use std::fmt;
use thiserror::Error;

/// 1-based source position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("{line}:{column}: syntax error: {message}")]
    Syntax {
        line: u32,
        column: u32,
        message: String,
    },

    #[error("{line}:{column}: {message}")]
    Semantic {
        line: u32,
        column: u32,
        message: String,
    },

    #[error(transparent)]
    Unit(#[from] UnitError),
}

impl SourceError {
    pub(crate) fn syntax(pos: Pos, message: impl Into<String>) -> Self {
        SourceError::Syntax {
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }

    pub(crate) fn semantic(pos: Pos, message: impl Into<String>) -> Self {
        SourceError::Semantic {
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }

    /// Position of a syntax or semantic error.
    pub fn pos(&self) -> Option<Pos> {
        match self {
            SourceError::Syntax { line, column, .. } | SourceError::Semantic { line, column, .. } => {
                Some(Pos {
                    line: *line,
                    column: *column,
                })
            }
            SourceError::Unit(_) => None,
        }
    }
}

/// Compile model source into a unit.
pub fn compile(src: &str) -> Result<CompiledUnit, SourceError> {
    let arena = Bump::new();
    let tokens = lexer::tokenize(src, &arena)?;
    let decl = parser::parse(&tokens, &arena)?;
    let image = codegen::generate(&decl)?;
    log::trace!(
        "compiled model {} ({} tokens, {} arena bytes)",
        image.name,
        tokens.len(),
        arena.allocated_bytes()
    );
    Ok(image.encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{verify, Insn};

    const HELLO: &str = r#"
model Hello$1 {
    field f0;
    new(a0) {
        this.f0 = a0;
    }
    render(ctx) = buffer(8)
        .append("Hello, ")
        .append(this.f0.evaluate(ctx))
        .append("!");
}
"#;

    #[test]
    fn test_compiles_hello() {
        let image = compile(HELLO).unwrap().decode().unwrap();
        assert_eq!(image.name, "Hello$1");
        assert_eq!(image.field_count, 1);
        assert_eq!(image.init.max_stack, 2);
        assert_eq!(image.init.max_locals, 2);
        assert_eq!(image.render.max_stack, 3);
        assert_eq!(image.render.insns[0], Insn::NewBuffer(8));
        verify(&image).unwrap();
    }

    #[test]
    fn test_parameters_may_bind_out_of_order() {
        let src = "model Swap { field x; field y; new(a, b) { this.y = a; this.x = b; } \
                   render(c) = buffer().append(this.x.evaluate(c)); }";
        let image = compile(src).unwrap().decode().unwrap();
        assert_eq!(
            &image.init.insns[..3],
            &[Insn::LoadLocal(0), Insn::LoadLocal(1), Insn::PutField(1)]
        );
        verify(&image).unwrap();
    }

    fn semantic_message(src: &str) -> String {
        match compile(src) {
            Err(SourceError::Semantic { message, .. }) => message,
            other => panic!("expected semantic error, got {other:?}"),
        }
    }

    #[test]
    fn test_semantic_errors() {
        assert_eq!(
            semantic_message("model M { field f; field f; new(a) { this.f = a; } render(c) = buffer(); }"),
            "duplicate field `f`"
        );
        assert_eq!(
            semantic_message("model M { field f; new() { } render(c) = buffer(); }"),
            "constructor takes 0 parameters but the model has 1 fields"
        );
        assert_eq!(
            semantic_message("model M { field f; new(a) { } render(c) = buffer(); }"),
            "field `f` is never assigned"
        );
        assert_eq!(
            semantic_message(
                "model M { field f; new(a) { this.f = a; this.f = a; } render(c) = buffer(); }"
            ),
            "field `f` assigned twice"
        );
        assert_eq!(
            semantic_message(
                "model M { field f; new(a) { this.f = a; } render(c) = buffer().append(this.g.evaluate(c)); }"
            ),
            "unknown field `g`"
        );
        assert_eq!(
            semantic_message(
                "model M { field f; new(a) { this.f = a; } render(c) = buffer().append(this.f.evaluate(d)); }"
            ),
            "evaluate() must be passed the render context `c`, not `d`"
        );
        assert_eq!(
            semantic_message("model M { new() { } }"),
            "model has no render method"
        );
    }

    #[test]
    fn test_oversized_constructor_is_rejected() {
        let count = u16::MAX as usize;
        let mut src = String::from("model Wide {");
        for i in 0..count {
            src.push_str(&format!(" field f{i};"));
        }
        let params: Vec<String> = (0..count).map(|i| format!("a{i}")).collect();
        src.push_str(&format!(" new({}) {{", params.join(", ")));
        for i in 0..count {
            src.push_str(&format!(" this.f{i} = a{i};"));
        }
        src.push_str(" } render(c) = buffer(); }");

        assert_eq!(semantic_message(&src), "too many parameters (65535)");
    }

    #[test]
    fn test_semantic_error_position() {
        let err = compile("model M {\n  new() { }\n  render(c) = buffer()\n    .append(this.nope.evaluate(c));\n}")
            .unwrap_err();
        assert_eq!(err.pos(), Some(Pos { line: 4, column: 18 }));
        assert_eq!(err.to_string(), "4:18: unknown field `nope`");
    }
}
