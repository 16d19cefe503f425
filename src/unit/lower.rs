//! Lowering of verified render bodies.
//!
//! A verified render body always has the shape "new buffer, then a series of
//! (produce text, append)". Lowering replays it over an abstract stack and
//! keeps only the appends, giving the flat program that the threaded and
//! native loader strategies execute.

use super::insn::Insn;
use super::UnitImage;
use thiserror::Error;

/// One step of a lowered render body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOp {
    /// Append constant-pool entry `n`.
    Literal(u32),
    /// Evaluate field `n` against the context and append the result.
    Field(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderProgram {
    /// Capacity hint of the output buffer.
    pub capacity: u32,
    pub ops: Vec<RenderOp>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("render body of {unit} does not lower at instruction {index} (`{mnemonic}`)")]
pub struct LowerError {
    pub unit: String,
    pub index: usize,
    pub mnemonic: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Abstract {
    Receiver,
    Context,
    Buffer,
    Model(u32),
    Literal(u32),
    Evaluated(u32),
}

/// Lower a verified unit's render body.
pub fn lower_render(image: &UnitImage) -> Result<RenderProgram, LowerError> {
    let mut stack: Vec<Abstract> = Vec::with_capacity(image.render.max_stack as usize);
    let mut capacity = 0;
    let mut ops = Vec::new();

    for (index, insn) in image.render.insns.iter().copied().enumerate() {
        let fail = || LowerError {
            unit: image.name.clone(),
            index,
            mnemonic: insn.mnemonic(),
        };
        match insn {
            Insn::LoadLocal(0) => stack.push(Abstract::Receiver),
            Insn::LoadLocal(1) => stack.push(Abstract::Context),
            Insn::NewBuffer(hint) => {
                capacity = hint;
                stack.push(Abstract::Buffer);
            }
            Insn::LoadConst(constant) => stack.push(Abstract::Literal(constant)),
            Insn::GetField(field) => match stack.pop() {
                Some(Abstract::Receiver) => stack.push(Abstract::Model(field)),
                _ => return Err(fail()),
            },
            Insn::InvokeEval => match (stack.pop(), stack.pop()) {
                (Some(Abstract::Context), Some(Abstract::Model(field))) => {
                    stack.push(Abstract::Evaluated(field))
                }
                _ => return Err(fail()),
            },
            Insn::Append => {
                let op = match stack.pop() {
                    Some(Abstract::Literal(constant)) => RenderOp::Literal(constant),
                    Some(Abstract::Evaluated(field)) => RenderOp::Field(field),
                    _ => return Err(fail()),
                };
                if stack.last() != Some(&Abstract::Buffer) {
                    return Err(fail());
                }
                ops.push(op);
            }
            Insn::Return => {
                return match (stack.pop(), stack.is_empty()) {
                    (Some(Abstract::Buffer), true) => Ok(RenderProgram { capacity, ops }),
                    _ => Err(fail()),
                };
            }
            Insn::LoadLocal(_) | Insn::PutField(_) | Insn::ReturnVoid => return Err(fail()),
        }
    }

    Err(LowerError {
        unit: image.name.clone(),
        index: image.render.insns.len(),
        mnemonic: "<end>",
    })
}
