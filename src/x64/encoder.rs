// This module wraps the iced-x86 code assembler with the handful of instruction forms the
// native render translation needs: pushes and pops of callee-saved registers, register
// moves, 32-bit immediates, indirect calls through a base register plus displacement, and
// return. Gp names the sixteen general-purpose registers by their hardware number and maps
// them onto iced-x86's 64-bit and 32-bit register constants. Every emission returns a
// Result so assembler failures propagate instead of panicking. finalize() resolves the
// instruction stream into position-independent machine code bytes, and disassemble()
// renders bytes back to Intel syntax for inspection tools and tests.

//! x86-64 instruction encoding using iced-x86.

use iced_x86::code_asm::*;
use iced_x86::{Decoder, DecoderOptions, Formatter, IcedError, Instruction, IntelFormatter};

/// Error types for instruction encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Register not usable in the requested form.
    InvalidRegister,
    /// Assembly error from iced-x86.
    AssemblyError(String),
}

impl std::fmt::Display for EncodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodingError::InvalidRegister => write!(f, "Invalid register for operation"),
            EncodingError::AssemblyError(msg) => write!(f, "Assembly error: {msg}"),
        }
    }
}

impl std::error::Error for EncodingError {}

impl From<IcedError> for EncodingError {
    fn from(err: IcedError) -> Self {
        EncodingError::AssemblyError(err.to_string())
    }
}

/// General-purpose register, numbered as in the ModRM encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Gp {
    Rax = 0,
    Rcx,
    Rdx,
    Rbx,
    Rsp,
    Rbp,
    Rsi,
    Rdi,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl Gp {
    fn r64(self) -> AsmRegister64 {
        const GP64_REGS: [AsmRegister64; 16] = [
            rax, rcx, rdx, rbx, rsp, rbp, rsi, rdi,
            r8, r9, r10, r11, r12, r13, r14, r15,
        ];
        GP64_REGS[self as usize]
    }

    fn r32(self) -> AsmRegister32 {
        const GP32_REGS: [AsmRegister32; 16] = [
            eax, ecx, edx, ebx, esp, ebp, esi, edi,
            r8d, r9d, r10d, r11d, r12d, r13d, r14d, r15d,
        ];
        GP32_REGS[self as usize]
    }
}

/// x86-64 instruction encoder using iced-x86.
pub struct X64Encoder {
    assembler: CodeAssembler,
    instructions: usize,
}

impl X64Encoder {
    pub fn new() -> Result<Self, EncodingError> {
        Ok(Self {
            assembler: CodeAssembler::new(64)?,
            instructions: 0,
        })
    }

    /// Number of instructions emitted so far.
    pub fn len(&self) -> usize {
        self.instructions
    }

    pub fn is_empty(&self) -> bool {
        self.instructions == 0
    }

    /// Emit PUSH r64.
    pub fn push_reg(&mut self, reg: Gp) -> Result<(), EncodingError> {
        self.assembler.push(reg.r64())?;
        self.instructions += 1;
        Ok(())
    }

    /// Emit POP r64.
    pub fn pop_reg(&mut self, reg: Gp) -> Result<(), EncodingError> {
        self.assembler.pop(reg.r64())?;
        self.instructions += 1;
        Ok(())
    }

    /// Emit MOV r64, r64.
    pub fn mov_reg_reg(&mut self, dst: Gp, src: Gp) -> Result<(), EncodingError> {
        self.assembler.mov(dst.r64(), src.r64())?;
        self.instructions += 1;
        Ok(())
    }

    /// Emit MOV r32, imm32. The upper half of the 64-bit register is zeroed.
    pub fn mov32_reg_imm(&mut self, dst: Gp, imm: u32) -> Result<(), EncodingError> {
        self.assembler.mov(dst.r32(), imm as i32)?;
        self.instructions += 1;
        Ok(())
    }

    /// Emit indirect CALL through `qword ptr [base + offset]`.
    pub fn call_mem(&mut self, base: Gp, offset: i32) -> Result<(), EncodingError> {
        if base == Gp::Rsp {
            // rsp moves across the call's own push.
            return Err(EncodingError::InvalidRegister);
        }
        self.assembler.call(qword_ptr(base.r64() + offset))?;
        self.instructions += 1;
        Ok(())
    }

    /// Emit RET.
    pub fn ret(&mut self) -> Result<(), EncodingError> {
        self.assembler.ret()?;
        self.instructions += 1;
        Ok(())
    }

    /// Resolve the instruction stream into machine code placed at `ip`.
    pub fn finalize(&mut self, ip: u64) -> Result<Vec<u8>, EncodingError> {
        Ok(self.assembler.assemble(ip)?)
    }
}

/// Render machine code as Intel-syntax text, one instruction per line.
pub fn disassemble(code: &[u8], ip: u64) -> String {
    let mut decoder = Decoder::with_ip(64, code, ip, DecoderOptions::NONE);
    let mut formatter = IntelFormatter::new();
    let mut instruction = Instruction::default();
    let mut text = String::new();
    let mut out = String::new();
    while decoder.can_decode() {
        decoder.decode_out(&mut instruction);
        text.clear();
        formatter.format(&instruction, &mut text);
        out.push_str(&format!("{:08x}  {}\n", instruction.ip(), text));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_instructions() {
        let mut encoder = X64Encoder::new().unwrap();
        encoder.push_reg(Gp::Rbx).unwrap();
        encoder.mov_reg_reg(Gp::Rbx, Gp::Rdi).unwrap();
        encoder.mov32_reg_imm(Gp::Rsi, 7).unwrap();
        encoder.call_mem(Gp::Rbx, 8).unwrap();
        encoder.pop_reg(Gp::Rbx).unwrap();
        encoder.ret().unwrap();
        assert_eq!(encoder.len(), 6);

        let code = encoder.finalize(0).unwrap();
        // push rbx; mov rbx,rdi; mov esi,7; call [rbx+8]; pop rbx; ret
        assert_eq!(code[0], 0x53);
        assert_eq!(code.len(), 14);
        assert_eq!(code[1], 0x48);
        assert_eq!(&code[4..9], &[0xbe, 0x07, 0x00, 0x00, 0x00]);
        assert_eq!(&code[9..12], &[0xff, 0x53, 0x08]);
        assert_eq!(&code[12..], &[0x5b, 0xc3]);

        let listing = disassemble(&code, 0);
        assert!(listing.contains("push rbx"), "{listing}");
        assert!(listing.contains("rbx+8"), "{listing}");
        assert!(listing.trim_end().ends_with("ret"), "{listing}");
    }

    #[test]
    fn test_call_through_rsp_is_rejected() {
        let mut encoder = X64Encoder::new().unwrap();
        assert_eq!(
            encoder.call_mem(Gp::Rsp, 0),
            Err(EncodingError::InvalidRegister)
        );
    }
}
