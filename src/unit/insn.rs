//! Unit instruction set.
//!
//! Units run on a small typed operand stack. Each body has numbered locals:
//! in `init`, local 0 is the receiver and locals `1..=n` are the construction
//! arguments; in `render`, local 0 is the receiver and local 1 the context.

use std::fmt;

pub mod opcode {
    pub const LOAD_LOCAL: u8 = 0x01;
    pub const PUT_FIELD: u8 = 0x02;
    pub const GET_FIELD: u8 = 0x03;
    pub const NEW_BUFFER: u8 = 0x10;
    pub const LOAD_CONST: u8 = 0x11;
    pub const INVOKE_EVAL: u8 = 0x12;
    pub const APPEND: u8 = 0x13;
    pub const RETURN: u8 = 0x20;
    pub const RETURN_VOID: u8 = 0x21;
}

/// One decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Insn {
    /// Push a local.
    LoadLocal(u16),
    /// Pop a model and the receiver; store the model in a field.
    PutField(u32),
    /// Pop the receiver; push the model stored in a field.
    GetField(u32),
    /// Push a new output buffer with the given capacity hint.
    NewBuffer(u32),
    /// Push a constant-pool string.
    LoadConst(u32),
    /// Pop the context and a model; push the model's output.
    InvokeEval,
    /// Pop a string and the buffer; push the buffer with the string appended.
    Append,
    /// Pop the buffer and finish rendering with it.
    Return,
    /// Finish the constructor.
    ReturnVoid,
}

impl Insn {
    pub const fn opcode(self) -> u8 {
        match self {
            Insn::LoadLocal(_) => opcode::LOAD_LOCAL,
            Insn::PutField(_) => opcode::PUT_FIELD,
            Insn::GetField(_) => opcode::GET_FIELD,
            Insn::NewBuffer(_) => opcode::NEW_BUFFER,
            Insn::LoadConst(_) => opcode::LOAD_CONST,
            Insn::InvokeEval => opcode::INVOKE_EVAL,
            Insn::Append => opcode::APPEND,
            Insn::Return => opcode::RETURN,
            Insn::ReturnVoid => opcode::RETURN_VOID,
        }
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Insn::LoadLocal(_) => "load_local",
            Insn::PutField(_) => "put_field",
            Insn::GetField(_) => "get_field",
            Insn::NewBuffer(_) => "new_buffer",
            Insn::LoadConst(_) => "load_const",
            Insn::InvokeEval => "invoke_eval",
            Insn::Append => "append",
            Insn::Return => "return",
            Insn::ReturnVoid => "return_void",
        }
    }

    /// Operands popped and pushed, in that order.
    pub const fn stack_effect(self) -> (u16, u16) {
        match self {
            Insn::LoadLocal(_) | Insn::NewBuffer(_) | Insn::LoadConst(_) => (0, 1),
            Insn::GetField(_) => (1, 1),
            Insn::PutField(_) => (2, 0),
            Insn::InvokeEval | Insn::Append => (2, 1),
            Insn::Return => (1, 0),
            Insn::ReturnVoid => (0, 0),
        }
    }

    /// Size of the encoded instruction in bytes.
    pub const fn encoded_len(self) -> usize {
        match self {
            Insn::LoadLocal(_) => 3,
            Insn::PutField(_) | Insn::GetField(_) | Insn::NewBuffer(_) | Insn::LoadConst(_) => 5,
            Insn::InvokeEval | Insn::Append | Insn::Return | Insn::ReturnVoid => 1,
        }
    }

    pub const fn is_return(self) -> bool {
        matches!(self, Insn::Return | Insn::ReturnVoid)
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Insn::LoadLocal(index) => write!(f, "{} {}", self.mnemonic(), index),
            Insn::PutField(index) | Insn::GetField(index) => {
                write!(f, "{} f{}", self.mnemonic(), index)
            }
            Insn::NewBuffer(capacity) => write!(f, "{} {}", self.mnemonic(), capacity),
            Insn::LoadConst(index) => write!(f, "{} #{}", self.mnemonic(), index),
            _ => f.write_str(self.mnemonic()),
        }
    }
}
