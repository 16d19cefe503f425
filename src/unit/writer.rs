//! Unit construction.
//!
//! [`CodeEmitter`] records one body and tracks the operand-stack depth as it
//! goes, so callers can either declare bounds they computed themselves or take
//! the tracked peak. [`UnitWriter`] owns the constant pool (interning repeated
//! text) and assembles the finished [`UnitImage`].

use super::insn::Insn;
use super::{CodeBody, MethodKind, UnitError, UnitImage};
use hashbrown::HashMap;
use std::sync::Arc;

/// Records the instructions of one body.
#[derive(Debug, Default)]
pub struct CodeEmitter {
    insns: Vec<Insn>,
    depth: u16,
    peak: u16,
}

impl CodeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, insn: Insn) -> &mut Self {
        let (pops, pushes) = insn.stack_effect();
        self.depth = self.depth.saturating_sub(pops) + pushes;
        self.peak = self.peak.max(self.depth);
        log::trace!("emit {insn} (depth {})", self.depth);
        self.insns.push(insn);
        self
    }

    pub fn load_local(&mut self, index: u16) -> &mut Self {
        self.emit(Insn::LoadLocal(index))
    }

    pub fn put_field(&mut self, index: u32) -> &mut Self {
        self.emit(Insn::PutField(index))
    }

    pub fn get_field(&mut self, index: u32) -> &mut Self {
        self.emit(Insn::GetField(index))
    }

    pub fn new_buffer(&mut self, capacity: u32) -> &mut Self {
        self.emit(Insn::NewBuffer(capacity))
    }

    pub fn load_const(&mut self, index: u32) -> &mut Self {
        self.emit(Insn::LoadConst(index))
    }

    pub fn invoke_eval(&mut self) -> &mut Self {
        self.emit(Insn::InvokeEval)
    }

    pub fn append(&mut self) -> &mut Self {
        self.emit(Insn::Append)
    }

    pub fn ret(&mut self) -> &mut Self {
        self.emit(Insn::Return)
    }

    pub fn ret_void(&mut self) -> &mut Self {
        self.emit(Insn::ReturnVoid)
    }

    /// Deepest operand stack seen so far.
    pub fn peak_stack(&self) -> u16 {
        self.peak
    }

    pub fn len(&self) -> usize {
        self.insns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    /// Finish with explicitly declared bounds.
    pub fn finish(self, max_stack: u16, max_locals: u16) -> CodeBody {
        CodeBody {
            max_stack,
            max_locals,
            insns: self.insns,
        }
    }

    /// Finish, declaring the tracked peak as `max_stack`.
    pub fn finish_computed(self, max_locals: u16) -> CodeBody {
        let max_stack = self.peak;
        self.finish(max_stack, max_locals)
    }
}

/// Assembles a unit.
#[derive(Debug)]
pub struct UnitWriter {
    name: String,
    constants: Vec<Arc<str>>,
    interned: HashMap<Arc<str>, u32>,
    field_count: u32,
    init: Option<CodeBody>,
    render: Option<CodeBody>,
}

impl UnitWriter {
    pub fn new(name: impl Into<String>, field_count: u32) -> Self {
        Self {
            name: name.into(),
            constants: Vec::new(),
            interned: HashMap::new(),
            field_count,
            init: None,
            render: None,
        }
    }

    /// Index of `text` in the constant pool, adding it if needed.
    pub fn constant(&mut self, text: &str) -> u32 {
        if let Some(&index) = self.interned.get(text) {
            return index;
        }
        let index = self.constants.len() as u32;
        let text: Arc<str> = Arc::from(text);
        self.constants.push(Arc::clone(&text));
        self.interned.insert(text, index);
        index
    }

    pub fn set_init(&mut self, body: CodeBody) {
        self.init = Some(body);
    }

    pub fn set_render(&mut self, body: CodeBody) {
        self.render = Some(body);
    }

    pub fn finish(self) -> Result<UnitImage, UnitError> {
        if self.name.len() > u16::MAX as usize {
            return Err(UnitError::NameTooLong(self.name));
        }
        let Some(init) = self.init else {
            return Err(UnitError::MissingBody {
                unit: self.name,
                method: MethodKind::Init,
            });
        };
        let Some(render) = self.render else {
            return Err(UnitError::MissingBody {
                unit: self.name,
                method: MethodKind::Render,
            });
        };
        Ok(UnitImage {
            name: self.name,
            constants: self.constants,
            field_count: self.field_count,
            init,
            render,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitter_tracks_peak_depth() {
        let mut code = CodeEmitter::new();
        code.new_buffer(0)
            .load_local(0)
            .get_field(0)
            .load_local(1)
            .invoke_eval()
            .append()
            .ret();
        assert_eq!(code.peak_stack(), 3);

        let body = code.finish_computed(2);
        assert_eq!(body.max_stack, 3);
        assert_eq!(body.insns.len(), 7);
    }

    #[test]
    fn test_constants_are_interned() {
        let mut writer = UnitWriter::new("Interned$0", 0);
        let a = writer.constant("a");
        let b = writer.constant("b");
        assert_eq!(writer.constant("a"), a);
        assert_ne!(a, b);
    }

    #[test]
    fn test_finish_requires_both_bodies() {
        let mut writer = UnitWriter::new("Half$0", 0);
        writer.set_init(CodeBody::default());
        assert_eq!(
            writer.finish(),
            Err(UnitError::MissingBody {
                unit: "Half$0".to_string(),
                method: MethodKind::Render,
            })
        );
    }
}
