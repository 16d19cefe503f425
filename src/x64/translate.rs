// Translation of a lowered render program into x86-64 machine code. The generated function
// follows the System V convention with a single argument: a pointer to a frame whose layout
// is described by FrameLayout. The frame holds two helper function pointers, one appending a
// constant-pool entry and one evaluating a field, plus an opaque state pointer the helpers
// use to reach the output buffer. The code keeps the frame pointer in rbx (callee-saved, and
// the single push keeps rsp 16-byte aligned at every call) and emits one indirect helper
// call per render op. Literal and field indices travel in esi.

//! Render program to x86-64 translation.

use super::encoder::{EncodingError, Gp, X64Encoder};
use crate::unit::{RenderOp, RenderProgram};

/// Byte offsets of the helper slots inside the native frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub append_literal: i32,
    pub append_field: i32,
}

/// Assemble `program` into position-independent machine code.
///
/// The result has the signature `extern "C" fn(*mut Frame)`.
pub fn assemble_render(
    program: &RenderProgram,
    layout: FrameLayout,
) -> Result<Vec<u8>, EncodingError> {
    let mut encoder = X64Encoder::new()?;
    encoder.push_reg(Gp::Rbx)?;
    encoder.mov_reg_reg(Gp::Rbx, Gp::Rdi)?;

    for op in &program.ops {
        let (index, slot) = match *op {
            RenderOp::Literal(constant) => (constant, layout.append_literal),
            RenderOp::Field(field) => (field, layout.append_field),
        };
        encoder.mov_reg_reg(Gp::Rdi, Gp::Rbx)?;
        encoder.mov32_reg_imm(Gp::Rsi, index)?;
        encoder.call_mem(Gp::Rbx, slot)?;
    }

    encoder.pop_reg(Gp::Rbx)?;
    encoder.ret()?;
    log::trace!(
        "translated {} render ops into {} instructions",
        program.ops.len(),
        encoder.len()
    );
    encoder.finalize(0)
}
