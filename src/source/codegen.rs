// Code generation from the model AST. Name resolution happens here: fields and
// constructor parameters are numbered in declaration order, every constructor assignment
// must bind a declared field to a parameter, every field must be bound exactly once, the
// constructor takes exactly one parameter per field, and each evaluate() call must read a
// declared field with the render parameter as its context. Semantic errors carry the
// position of the offending name. The emitted bodies take their max_stack from the
// emitter's tracked peak.

//! Unit generation for parsed models.

use super::parser::{Assign, Member, ModelDecl, Name, Piece};
use super::{Pos, SourceError};
use crate::unit::{CodeBody, CodeEmitter, UnitImage, UnitWriter};
use hashbrown::HashMap;

struct Scope<'a> {
    kind: &'static str,
    slots: HashMap<&'a str, u32>,
}

impl<'a> Scope<'a> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slots: HashMap::new(),
        }
    }

    fn declare(&mut self, name: Name<'a>) -> Result<u32, SourceError> {
        let index = self.slots.len() as u32;
        if self.slots.insert(name.text, index).is_some() {
            return Err(SourceError::semantic(
                name.pos,
                format!("duplicate {} `{}`", self.kind, name.text),
            ));
        }
        Ok(index)
    }

    fn resolve(&self, name: Name<'a>) -> Result<u32, SourceError> {
        self.slots.get(name.text).copied().ok_or_else(|| {
            SourceError::semantic(name.pos, format!("unknown {} `{}`", self.kind, name.text))
        })
    }

    fn len(&self) -> u32 {
        self.slots.len() as u32
    }
}

fn locals(count: u32, pos: Pos) -> Result<u16, SourceError> {
    u16::try_from(count + 1)
        .map_err(|_| SourceError::semantic(pos, format!("too many parameters ({count})")))
}

fn constructor<'a>(
    fields: &Scope<'a>,
    pos: Pos,
    params: &[Name<'a>],
    assigns: &[Assign<'a>],
) -> Result<CodeBody, SourceError> {
    let mut scope = Scope::new("parameter");
    for param in params {
        scope.declare(*param)?;
    }
    if scope.len() != fields.len() {
        return Err(SourceError::semantic(
            pos,
            format!(
                "constructor takes {} parameters but the model has {} fields",
                scope.len(),
                fields.len()
            ),
        ));
    }

    let max_locals = locals(scope.len(), pos)?;
    let mut assigned = vec![false; fields.len() as usize];
    let mut code = CodeEmitter::new();
    for assign in assigns {
        let field = fields.resolve(assign.field)?;
        let param = scope.resolve(assign.value)?;
        if std::mem::replace(&mut assigned[field as usize], true) {
            return Err(SourceError::semantic(
                assign.field.pos,
                format!("field `{}` assigned twice", assign.field.text),
            ));
        }
        let local = u16::try_from(param + 1).map_err(|_| {
            SourceError::semantic(assign.value.pos, format!("parameter slot {param} out of range"))
        })?;
        code.load_local(0).load_local(local).put_field(field);
    }
    if let Some(missing) = assigned.iter().position(|done| !done) {
        let name = fields
            .slots
            .iter()
            .find_map(|(name, index)| (*index as usize == missing).then_some(*name))
            .unwrap_or_default();
        return Err(SourceError::semantic(
            pos,
            format!("field `{name}` is never assigned"),
        ));
    }
    code.ret_void();
    Ok(code.finish_computed(max_locals))
}

fn render<'a>(
    fields: &Scope<'a>,
    writer: &mut UnitWriter,
    context: Name<'a>,
    capacity: u32,
    pieces: &[Piece<'a>],
) -> Result<CodeBody, SourceError> {
    let mut code = CodeEmitter::new();
    code.new_buffer(capacity);
    for piece in pieces {
        match *piece {
            Piece::Literal(text) => {
                let constant = writer.constant(text);
                code.load_const(constant).append();
            }
            Piece::Eval {
                field,
                context: argument,
            } => {
                let field = fields.resolve(field)?;
                if argument.text != context.text {
                    return Err(SourceError::semantic(
                        argument.pos,
                        format!(
                            "evaluate() must be passed the render context `{}`, not `{}`",
                            context.text, argument.text
                        ),
                    ));
                }
                code.load_local(0)
                    .get_field(field)
                    .load_local(1)
                    .invoke_eval()
                    .append();
            }
        }
    }
    code.ret();
    Ok(code.finish_computed(2))
}

/// Generate the unit image for a parsed model.
pub fn generate(decl: &ModelDecl<'_>) -> Result<UnitImage, SourceError> {
    let mut fields = Scope::new("field");
    for member in decl.members.iter() {
        if let Member::Field(name) = member {
            fields.declare(*name)?;
        }
    }

    let mut writer = UnitWriter::new(decl.name.text, fields.len());
    let mut has_init = false;
    let mut has_render = false;
    for member in decl.members.iter() {
        match member {
            Member::Field(_) => {}
            Member::Constructor {
                pos,
                params,
                assigns,
            } => {
                if std::mem::replace(&mut has_init, true) {
                    return Err(SourceError::semantic(*pos, "duplicate constructor"));
                }
                writer.set_init(constructor(&fields, *pos, params, assigns)?);
            }
            Member::Render {
                pos,
                context,
                capacity,
                pieces,
            } => {
                if std::mem::replace(&mut has_render, true) {
                    return Err(SourceError::semantic(*pos, "duplicate render method"));
                }
                let body = render(&fields, &mut writer, *context, *capacity, pieces)?;
                writer.set_render(body);
            }
        }
    }

    if !has_init {
        return Err(SourceError::semantic(decl.name.pos, "model has no constructor"));
    }
    if !has_render {
        return Err(SourceError::semantic(decl.name.pos, "model has no render method"));
    }
    Ok(writer.finish()?)
}
