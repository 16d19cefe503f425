// The assembly backend writes unit instructions directly, with no textual intermediate.
// The constructor stores argument i + 1 into field i for every field. The render body
// creates a buffer sized to the template's static length, then for each segment either
// pushes the interned literal or loads the field, evaluates it against the context, and
// appends. Both bodies declare bounds computed from the shape of the emitted code rather
// than measured while emitting: the deepest point of init is receiver plus argument, and
// the deepest point of render is buffer, model and context just before invoke_eval.

//! Direct unit assembly.

use super::{capacity_hint, BackendId, UnitCompiler};
use crate::core::error::FatalCause;
use crate::core::fragment::{Segment, UnitPlan};
use crate::unit::{CodeBody, CodeEmitter, CompiledUnit, UnitWriter};

/// Operand stack needed by the init body.
const INIT_MAX_STACK: u16 = 2;
/// Locals of the render body: receiver and context.
const RENDER_MAX_LOCALS: u16 = 2;

/// Emits units straight from a plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssemblyCompiler;

fn emit_init(field_count: u32) -> Result<CodeBody, FatalCause> {
    let max_locals = field_count
        .checked_add(1)
        .and_then(|locals| u16::try_from(locals).ok())
        .ok_or(FatalCause::TooManyFields(field_count))?;
    let mut code = CodeEmitter::new();
    for field in 0..field_count {
        code.load_local(0).load_local(field as u16 + 1).put_field(field);
    }
    code.ret_void();
    Ok(code.finish(INIT_MAX_STACK, max_locals))
}

fn emit_render(plan: &UnitPlan, writer: &mut UnitWriter) -> CodeBody {
    let mut code = CodeEmitter::new();
    code.new_buffer(capacity_hint(plan.static_length()));
    for segment in plan.segments() {
        match segment {
            Segment::Text(text) => {
                let constant = writer.constant(text);
                code.load_const(constant).append();
            }
            Segment::Field(field) => {
                code.load_local(0)
                    .get_field(*field)
                    .load_local(1)
                    .invoke_eval()
                    .append();
            }
        }
    }
    code.ret();

    let max_stack = if plan.field_count() > 0 { 3 } else { 2 };
    code.finish(max_stack, RENDER_MAX_LOCALS)
}

impl UnitCompiler for AssemblyCompiler {
    fn id(&self) -> BackendId {
        BackendId::Assembly
    }

    fn compile_unit(&self, name: &str, plan: &UnitPlan) -> Result<CompiledUnit, FatalCause> {
        let mut writer = UnitWriter::new(name, plan.field_count());
        writer.set_init(emit_init(plan.field_count())?);
        let render = emit_render(plan, &mut writer);
        writer.set_render(render);
        let unit = writer.finish()?.encode();
        log::debug!("assembled {} ({} bytes)", unit.name(), unit.len());
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{verify, Insn};

    fn plan(parts: &[Option<&str>]) -> UnitPlan {
        let mut plan = UnitPlan::new();
        for part in parts {
            match part {
                Some(text) => plan.push_text(text),
                None => {
                    plan.push_field();
                }
            }
        }
        plan
    }

    #[test]
    fn test_declared_bounds_match_verifier_peaks() {
        let plan = plan(&[Some("Hello, "), None, Some("!"), None]);
        let unit = AssemblyCompiler.compile_unit("Asm$0", &plan).unwrap();
        let image = unit.decode().unwrap();
        assert_eq!(image.init.max_stack, 2);
        assert_eq!(image.init.max_locals, 3);
        assert_eq!(image.render.max_stack, 3);
        assert_eq!(image.render.max_locals, 2);

        let report = verify(&image).unwrap();
        assert_eq!(report.init_peak, image.init.max_stack);
        assert_eq!(report.render_peak, image.render.max_stack);
    }

    #[test]
    fn test_render_starts_with_sized_buffer() {
        let plan = plan(&[Some("abc"), None]);
        let image = AssemblyCompiler
            .compile_unit("Asm$1", &plan)
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(image.render.insns[0], Insn::NewBuffer(3));
        assert_eq!(image.constants.len(), 1);
        assert_eq!(image.render.insns.last(), Some(&Insn::Return));
    }
}
