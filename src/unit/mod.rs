// This module defines compiled units, the artifact both code-generating backends produce
// and the dynamic loader consumes. A unit is a named, self-contained description of one
// specialized model type: a constant pool of literal text, a fixed number of model-typed
// fields, a constructor body (init) that binds construction arguments to fields in
// appearance order, and a render body that builds the output buffer. Each body carries
// its exact operand-stack and local-slot bounds because nothing downstream infers them;
// the verifier checks them before a unit is linked. CompiledUnit is the encoded binary
// form, UnitImage the decoded form, and the writer, verifier and lowering passes live in
// submodules.

//! Compiled units: instruction set, binary codec, writer, verifier and lowering.

pub mod codec;
pub mod insn;
pub mod lower;
pub mod verifier;
pub mod writer;

pub use insn::Insn;
pub use lower::{lower_render, LowerError, RenderOp, RenderProgram};
pub use verifier::{verify, ValueKind, VerifyError, VerifyReport};
pub use writer::{CodeEmitter, UnitWriter};

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Which body of a unit an instruction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Init,
    Render,
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MethodKind::Init => "init",
            MethodKind::Render => "render",
        })
    }
}

/// Malformed unit bytes or an incomplete unit under construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    #[error("bad unit magic")]
    BadMagic,

    #[error("unit truncated at byte {offset}")]
    Truncated { offset: usize },

    #[error("invalid UTF-8 in {what} at byte {offset}")]
    InvalidUtf8 { what: &'static str, offset: usize },

    #[error("unknown opcode {opcode:#04x} at byte {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("{count} trailing bytes after unit")]
    TrailingBytes { count: usize },

    #[error("unit {unit} has no {method} body")]
    MissingBody { unit: String, method: MethodKind },

    #[error("unit name {0:?} is longer than 65535 bytes")]
    NameTooLong(String),
}

/// Instruction sequence of one body plus its resource bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeBody {
    pub max_stack: u16,
    pub max_locals: u16,
    pub insns: Vec<Insn>,
}

/// Decoded unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitImage {
    pub name: String,
    pub constants: Vec<Arc<str>>,
    pub field_count: u32,
    pub init: CodeBody,
    pub render: CodeBody,
}

impl UnitImage {
    pub fn encode(&self) -> CompiledUnit {
        CompiledUnit {
            name: self.name.clone(),
            bytes: codec::encode(self),
        }
    }

    pub fn body(&self, method: MethodKind) -> &CodeBody {
        match method {
            MethodKind::Init => &self.init,
            MethodKind::Render => &self.render,
        }
    }
}

impl fmt::Display for UnitImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "unit {} ({} fields, {} constants)",
            self.name,
            self.field_count,
            self.constants.len()
        )?;
        for (index, constant) in self.constants.iter().enumerate() {
            writeln!(f, "  const #{index} {constant:?}")?;
        }
        for method in [MethodKind::Init, MethodKind::Render] {
            let body = self.body(method);
            writeln!(
                f,
                "  {method}: max_stack={} max_locals={}",
                body.max_stack, body.max_locals
            )?;
            for (index, insn) in body.insns.iter().enumerate() {
                writeln!(f, "    {index:04} {insn}")?;
            }
        }
        Ok(())
    }
}

/// Encoded unit, as handed from a backend to the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    name: String,
    bytes: Vec<u8>,
}

impl CompiledUnit {
    /// Wrap raw unit bytes, reading the embedded name.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, UnitError> {
        let name = codec::peek_name(&bytes)?;
        Ok(Self { name, bytes })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn decode(&self) -> Result<UnitImage, UnitError> {
        codec::decode(&self.bytes)
    }
}
