// The verifier runs before any unit is linked. Unit bodies are straight-line code, so a
// single forward pass of typed abstract interpretation is enough: every instruction's
// operands are type-checked against a simulated operand stack, the simulated depth is
// compared against the body's declared max_stack, local indices against the body's local
// table and declared max_locals, and field and constant indices against the unit. The
// init body must assign every field exactly once; the render body may create its buffer
// only on an empty stack. Both bodies must end with their own return with an empty
// stack. Verified units can be executed and lowered without further checks.

//! Bytecode verifier.

use super::insn::Insn;
use super::{CodeBody, MethodKind, UnitImage};
use std::fmt;
use thiserror::Error;

/// Static type of an operand-stack slot or local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Receiver,
    Context,
    Model,
    Buffer,
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Receiver => "receiver",
            ValueKind::Context => "context",
            ValueKind::Model => "model",
            ValueKind::Buffer => "buffer",
            ValueKind::Text => "text",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("{method}@{index}: operand stack exceeds declared max_stack {max_stack}")]
    StackOverflow {
        method: MethodKind,
        index: usize,
        max_stack: u16,
    },

    #[error("{method}@{index}: operand stack underflow")]
    StackUnderflow { method: MethodKind, index: usize },

    #[error("{method}@{index}: expected {expected} operand, found {found}")]
    TypeMismatch {
        method: MethodKind,
        index: usize,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("{method}@{index}: local {local} out of range ({available} locals)")]
    LocalOutOfRange {
        method: MethodKind,
        index: usize,
        local: u16,
        available: usize,
    },

    #[error("{method}: declared max_locals {declared} below required {required}")]
    LocalsTooSmall {
        method: MethodKind,
        declared: u16,
        required: usize,
    },

    #[error("{method}@{index}: field {field} out of range ({field_count} fields)")]
    FieldOutOfRange {
        method: MethodKind,
        index: usize,
        field: u32,
        field_count: u32,
    },

    #[error("{method}@{index}: constant #{constant} out of range ({constant_count} constants)")]
    ConstantOutOfRange {
        method: MethodKind,
        index: usize,
        constant: u32,
        constant_count: usize,
    },

    #[error("{method}@{index}: `{mnemonic}` is not allowed in this body")]
    IllegalInstruction {
        method: MethodKind,
        index: usize,
        mnemonic: &'static str,
    },

    #[error("{method}@{index}: new_buffer requires an empty operand stack")]
    BufferNotFirst { method: MethodKind, index: usize },

    #[error("{method}@{index}: instruction after return")]
    UnreachableCode { method: MethodKind, index: usize },

    #[error("{method}: body does not end with a return")]
    MissingReturn { method: MethodKind },

    #[error("{method}@{index}: operand stack not empty at return")]
    StackNotEmpty { method: MethodKind, index: usize },

    #[error("init: field {field} assigned twice")]
    FieldAssignedTwice { field: u32 },

    #[error("init: field {field} never assigned")]
    FieldUnassigned { field: u32 },
}

/// Stack peaks observed while verifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyReport {
    pub init_peak: u16,
    pub render_peak: u16,
}

/// Verify both bodies of a unit.
pub fn verify(image: &UnitImage) -> Result<VerifyReport, VerifyError> {
    let mut init_locals = Vec::with_capacity(image.field_count as usize + 1);
    init_locals.push(ValueKind::Receiver);
    init_locals.extend(std::iter::repeat(ValueKind::Model).take(image.field_count as usize));

    let init = Frame::new(image, MethodKind::Init, &image.init, &init_locals)?.run()?;
    let render_locals = [ValueKind::Receiver, ValueKind::Context];
    let render = Frame::new(image, MethodKind::Render, &image.render, &render_locals)?.run()?;

    if let Some(field) = init.assigned.iter().position(|assigned| !assigned) {
        return Err(VerifyError::FieldUnassigned {
            field: field as u32,
        });
    }

    Ok(VerifyReport {
        init_peak: init.peak,
        render_peak: render.peak,
    })
}

struct Frame<'a> {
    image: &'a UnitImage,
    method: MethodKind,
    body: &'a CodeBody,
    locals: &'a [ValueKind],
    stack: Vec<ValueKind>,
    peak: u16,
    assigned: Vec<bool>,
}

struct FrameResult {
    peak: u16,
    assigned: Vec<bool>,
}

impl<'a> Frame<'a> {
    fn new(
        image: &'a UnitImage,
        method: MethodKind,
        body: &'a CodeBody,
        locals: &'a [ValueKind],
    ) -> Result<Self, VerifyError> {
        if (body.max_locals as usize) < locals.len() {
            return Err(VerifyError::LocalsTooSmall {
                method,
                declared: body.max_locals,
                required: locals.len(),
            });
        }
        let assigned = match method {
            MethodKind::Init => vec![false; image.field_count as usize],
            MethodKind::Render => Vec::new(),
        };
        Ok(Self {
            image,
            method,
            body,
            locals,
            stack: Vec::with_capacity(body.max_stack as usize),
            peak: 0,
            assigned,
        })
    }

    fn run(mut self) -> Result<FrameResult, VerifyError> {
        let mut returned = false;
        for (index, insn) in self.body.insns.iter().copied().enumerate() {
            if returned {
                return Err(VerifyError::UnreachableCode {
                    method: self.method,
                    index,
                });
            }
            self.step(index, insn)?;
            if insn.is_return() {
                if !self.stack.is_empty() {
                    return Err(VerifyError::StackNotEmpty {
                        method: self.method,
                        index,
                    });
                }
                returned = true;
            }
        }
        if !returned {
            return Err(VerifyError::MissingReturn {
                method: self.method,
            });
        }
        Ok(FrameResult {
            peak: self.peak,
            assigned: self.assigned,
        })
    }

    fn step(&mut self, index: usize, insn: Insn) -> Result<(), VerifyError> {
        let method = self.method;
        match (method, insn) {
            (_, Insn::LoadLocal(local)) => {
                let kind = self.locals.get(local as usize).copied().ok_or(
                    VerifyError::LocalOutOfRange {
                        method,
                        index,
                        local,
                        available: self.locals.len(),
                    },
                )?;
                self.push(index, kind)
            }
            (MethodKind::Init, Insn::PutField(field)) => {
                self.check_field(index, field)?;
                self.pop(index, ValueKind::Model)?;
                self.pop(index, ValueKind::Receiver)?;
                let slot = &mut self.assigned[field as usize];
                if *slot {
                    return Err(VerifyError::FieldAssignedTwice { field });
                }
                *slot = true;
                Ok(())
            }
            (MethodKind::Init, Insn::ReturnVoid) => Ok(()),
            (MethodKind::Render, Insn::GetField(field)) => {
                self.check_field(index, field)?;
                self.pop(index, ValueKind::Receiver)?;
                self.push(index, ValueKind::Model)
            }
            (MethodKind::Render, Insn::NewBuffer(_)) => {
                if !self.stack.is_empty() {
                    return Err(VerifyError::BufferNotFirst { method, index });
                }
                self.push(index, ValueKind::Buffer)
            }
            (MethodKind::Render, Insn::LoadConst(constant)) => {
                if constant as usize >= self.image.constants.len() {
                    return Err(VerifyError::ConstantOutOfRange {
                        method,
                        index,
                        constant,
                        constant_count: self.image.constants.len(),
                    });
                }
                self.push(index, ValueKind::Text)
            }
            (MethodKind::Render, Insn::InvokeEval) => {
                self.pop(index, ValueKind::Context)?;
                self.pop(index, ValueKind::Model)?;
                self.push(index, ValueKind::Text)
            }
            (MethodKind::Render, Insn::Append) => {
                self.pop(index, ValueKind::Text)?;
                self.pop(index, ValueKind::Buffer)?;
                self.push(index, ValueKind::Buffer)
            }
            (MethodKind::Render, Insn::Return) => self.pop(index, ValueKind::Buffer),
            (_, insn) => Err(VerifyError::IllegalInstruction {
                method,
                index,
                mnemonic: insn.mnemonic(),
            }),
        }
    }

    fn check_field(&self, index: usize, field: u32) -> Result<(), VerifyError> {
        if field >= self.image.field_count {
            return Err(VerifyError::FieldOutOfRange {
                method: self.method,
                index,
                field,
                field_count: self.image.field_count,
            });
        }
        Ok(())
    }

    fn push(&mut self, index: usize, kind: ValueKind) -> Result<(), VerifyError> {
        if self.stack.len() >= self.body.max_stack as usize {
            return Err(VerifyError::StackOverflow {
                method: self.method,
                index,
                max_stack: self.body.max_stack,
            });
        }
        self.stack.push(kind);
        self.peak = self.peak.max(self.stack.len() as u16);
        Ok(())
    }

    fn pop(&mut self, index: usize, expected: ValueKind) -> Result<(), VerifyError> {
        match self.stack.pop() {
            None => Err(VerifyError::StackUnderflow {
                method: self.method,
                index,
            }),
            Some(found) if found != expected => Err(VerifyError::TypeMismatch {
                method: self.method,
                index,
                expected,
                found,
            }),
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::writer::{CodeEmitter, UnitWriter};

    fn image_with(fields: u32, init: CodeBody, render: CodeBody) -> UnitImage {
        let mut writer = UnitWriter::new("Verify$0", fields);
        writer.constant("x");
        writer.set_init(init);
        writer.set_render(render);
        writer.finish().unwrap()
    }

    fn one_field_init() -> CodeBody {
        let mut code = CodeEmitter::new();
        code.load_local(0).load_local(1).put_field(0).ret_void();
        code.finish(2, 2)
    }

    fn one_field_render(max_stack: u16) -> CodeBody {
        let mut code = CodeEmitter::new();
        code.new_buffer(1)
            .load_const(0)
            .append()
            .load_local(0)
            .get_field(0)
            .load_local(1)
            .invoke_eval()
            .append()
            .ret();
        code.finish(max_stack, 2)
    }

    #[test]
    fn test_accepts_well_formed_unit() {
        let image = image_with(1, one_field_init(), one_field_render(3));
        let report = verify(&image).unwrap();
        assert_eq!(report.init_peak, 2);
        assert_eq!(report.render_peak, 3);
    }

    #[test]
    fn test_rejects_under_declared_stack() {
        let image = image_with(1, one_field_init(), one_field_render(2));
        assert_eq!(
            verify(&image),
            Err(VerifyError::StackOverflow {
                method: MethodKind::Render,
                index: 5,
                max_stack: 2,
            })
        );
    }

    #[test]
    fn test_rejects_unassigned_and_double_assigned_fields() {
        let mut code = CodeEmitter::new();
        code.ret_void();
        let image = image_with(1, code.finish(0, 2), one_field_render(3));
        assert_eq!(verify(&image), Err(VerifyError::FieldUnassigned { field: 0 }));

        let mut code = CodeEmitter::new();
        code.load_local(0)
            .load_local(1)
            .put_field(0)
            .load_local(0)
            .load_local(1)
            .put_field(0)
            .ret_void();
        let image = image_with(1, code.finish(2, 2), one_field_render(3));
        assert_eq!(verify(&image), Err(VerifyError::FieldAssignedTwice { field: 0 }));
    }

    #[test]
    fn test_rejects_type_confusion() {
        // Appending the context instead of evaluated text.
        let mut code = CodeEmitter::new();
        code.new_buffer(0).load_local(1).append().ret();
        let mut init = CodeEmitter::new();
        init.ret_void();
        let image = image_with(0, init.finish(0, 1), code.finish(2, 2));
        assert_eq!(
            verify(&image),
            Err(VerifyError::TypeMismatch {
                method: MethodKind::Render,
                index: 2,
                expected: ValueKind::Text,
                found: ValueKind::Context,
            })
        );
    }

    #[test]
    fn test_rejects_code_after_return_and_missing_return() {
        let mut init = CodeEmitter::new();
        init.ret_void();
        let mut render = CodeEmitter::new();
        render.new_buffer(0).ret().new_buffer(0);
        let image = image_with(0, init.finish(0, 1), render.finish(1, 2));
        assert_eq!(
            verify(&image),
            Err(VerifyError::UnreachableCode {
                method: MethodKind::Render,
                index: 2,
            })
        );

        let mut init = CodeEmitter::new();
        init.ret_void();
        let mut render = CodeEmitter::new();
        render.new_buffer(0);
        let image = image_with(0, init.finish(0, 1), render.finish(1, 2));
        assert_eq!(
            verify(&image),
            Err(VerifyError::MissingReturn {
                method: MethodKind::Render,
            })
        );
    }

    #[test]
    fn test_rejects_render_only_instructions_in_init() {
        let mut init = CodeEmitter::new();
        init.new_buffer(0).ret_void();
        let image = image_with(0, init.finish(1, 1), one_field_render(3));
        assert_eq!(
            verify(&image),
            Err(VerifyError::IllegalInstruction {
                method: MethodKind::Init,
                index: 0,
                mnemonic: "new_buffer",
            })
        );
    }
}
