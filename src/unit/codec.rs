// Binary encoding of compiled units. A unit is laid out as: the magic bytes "TMU\x01",
// the unit name (u16 length + UTF-8), the constant pool (u32 count, then u32 length +
// UTF-8 per entry), the field count (u32), and two code bodies, init then render, each
// as max_stack (u16), max_locals (u16), code length (u32) and the instruction bytes.
// All integers are little endian. Decoding is strict: unknown opcodes, truncation,
// invalid UTF-8 and trailing bytes are all rejected with the byte offset of the fault.

//! Unit binary codec.

use super::insn::{opcode, Insn};
use super::{CodeBody, MethodKind, UnitError, UnitImage};
use std::sync::Arc;

pub const MAGIC: [u8; 4] = *b"TMU\x01";

pub(crate) fn encode(image: &UnitImage) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + image.constants.iter().map(|c| c.len() + 4).sum::<usize>());
    out.extend_from_slice(&MAGIC);
    put_u16(&mut out, image.name.len() as u16);
    out.extend_from_slice(image.name.as_bytes());

    put_u32(&mut out, image.constants.len() as u32);
    for constant in &image.constants {
        put_u32(&mut out, constant.len() as u32);
        out.extend_from_slice(constant.as_bytes());
    }

    put_u32(&mut out, image.field_count);
    encode_body(&mut out, &image.init);
    encode_body(&mut out, &image.render);
    out
}

fn encode_body(out: &mut Vec<u8>, body: &CodeBody) {
    put_u16(out, body.max_stack);
    put_u16(out, body.max_locals);
    let code_len: usize = body.insns.iter().map(|insn| insn.encoded_len()).sum();
    put_u32(out, code_len as u32);
    for insn in &body.insns {
        out.push(insn.opcode());
        match *insn {
            Insn::LoadLocal(index) => put_u16(out, index),
            Insn::PutField(operand)
            | Insn::GetField(operand)
            | Insn::NewBuffer(operand)
            | Insn::LoadConst(operand) => put_u32(out, operand),
            Insn::InvokeEval | Insn::Append | Insn::Return | Insn::ReturnVoid => {}
        }
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn decode(bytes: &[u8]) -> Result<UnitImage, UnitError> {
    let mut reader = ByteReader::new(bytes);
    if reader.take(MAGIC.len())? != MAGIC {
        return Err(UnitError::BadMagic);
    }
    let name = reader.string16("unit name")?;

    let constant_count = reader.u32()?;
    let mut constants = Vec::with_capacity(constant_count.min(1024) as usize);
    for _ in 0..constant_count {
        let len = reader.u32()? as usize;
        let offset = reader.pos;
        let raw = reader.take(len)?;
        let text = std::str::from_utf8(raw).map_err(|_| UnitError::InvalidUtf8 {
            what: "constant",
            offset,
        })?;
        constants.push(Arc::<str>::from(text));
    }

    let field_count = reader.u32()?;
    let init = decode_body(&mut reader, MethodKind::Init)?;
    let render = decode_body(&mut reader, MethodKind::Render)?;

    let remaining = reader.remaining();
    if remaining != 0 {
        return Err(UnitError::TrailingBytes { count: remaining });
    }

    Ok(UnitImage {
        name,
        constants,
        field_count,
        init,
        render,
    })
}

/// Decode only the unit name, for handles that do not need the full image.
pub(crate) fn peek_name(bytes: &[u8]) -> Result<String, UnitError> {
    let mut reader = ByteReader::new(bytes);
    if reader.take(MAGIC.len())? != MAGIC {
        return Err(UnitError::BadMagic);
    }
    reader.string16("unit name")
}

fn decode_body(reader: &mut ByteReader<'_>, method: MethodKind) -> Result<CodeBody, UnitError> {
    let max_stack = reader.u16()?;
    let max_locals = reader.u16()?;
    let code_len = reader.u32()? as usize;
    let start = reader.pos;
    let code = reader.take(code_len)?;

    let mut code_reader = ByteReader::at(code, start);
    let mut insns = Vec::new();
    while code_reader.remaining() > 0 {
        let offset = code_reader.pos;
        let op = code_reader.u8()?;
        let insn = match op {
            opcode::LOAD_LOCAL => Insn::LoadLocal(code_reader.u16()?),
            opcode::PUT_FIELD => Insn::PutField(code_reader.u32()?),
            opcode::GET_FIELD => Insn::GetField(code_reader.u32()?),
            opcode::NEW_BUFFER => Insn::NewBuffer(code_reader.u32()?),
            opcode::LOAD_CONST => Insn::LoadConst(code_reader.u32()?),
            opcode::INVOKE_EVAL => Insn::InvokeEval,
            opcode::APPEND => Insn::Append,
            opcode::RETURN => Insn::Return,
            opcode::RETURN_VOID => Insn::ReturnVoid,
            opcode => return Err(UnitError::UnknownOpcode { opcode, offset }),
        };
        insns.push(insn);
    }
    log::trace!("decoded {} body: {} instructions", method, insns.len());

    Ok(CodeBody {
        max_stack,
        max_locals,
        insns,
    })
}

/// Little-endian cursor over a byte slice. `pos` is absolute within the unit.
struct ByteReader<'a> {
    bytes: &'a [u8],
    base: usize,
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self::at(bytes, 0)
    }

    fn at(bytes: &'a [u8], base: usize) -> Self {
        Self {
            bytes,
            base,
            pos: base,
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - (self.pos - self.base)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], UnitError> {
        let start = self.pos - self.base;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(UnitError::Truncated { offset: self.pos })?;
        self.pos += len;
        Ok(&self.bytes[start..end])
    }

    fn u8(&mut self) -> Result<u8, UnitError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, UnitError> {
        let raw = self.take(2)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }

    fn u32(&mut self) -> Result<u32, UnitError> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn string16(&mut self, what: &'static str) -> Result<String, UnitError> {
        let len = self.u16()? as usize;
        let offset = self.pos;
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| UnitError::InvalidUtf8 { what, offset })
    }
}
