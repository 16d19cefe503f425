// Direct execution of verified unit bodies. The interpreter keeps a small operand stack of
// tagged values borrowed from the unit and its instance: the receiver marker, the render
// context, field models, the output buffer marker and produced text. Because every body has
// been verified before linking, operand shapes are known to be correct and mismatches are
// unreachable. Appends write straight into the caller's output string; new_buffer only
// reserves the declared capacity. construct() runs the init body to bind constructor
// arguments to fields.

//! Bytecode interpreter for verified units.

use crate::core::model::ModelRef;
use crate::unit::{CodeBody, Insn};
use std::borrow::Cow;
use std::sync::Arc;

enum Operand<'a, T> {
    Receiver,
    Context,
    Model(&'a ModelRef<T>),
    Buffer,
    Text(Cow<'a, str>),
}

/// Run an init body, returning the bound fields in index order.
pub(crate) fn construct<T>(
    body: &CodeBody,
    field_count: u32,
    args: &[ModelRef<T>],
) -> Vec<ModelRef<T>> {
    let mut fields: Vec<Option<ModelRef<T>>> = vec![None; field_count as usize];
    let mut stack: Vec<Operand<'_, T>> = Vec::with_capacity(body.max_stack as usize);

    for insn in &body.insns {
        match *insn {
            Insn::LoadLocal(0) => stack.push(Operand::Receiver),
            Insn::LoadLocal(local) => stack.push(Operand::Model(&args[local as usize - 1])),
            Insn::PutField(field) => {
                let model = match stack.pop() {
                    Some(Operand::Model(model)) => Arc::clone(model),
                    _ => unreachable!("verified init body"),
                };
                stack.pop();
                fields[field as usize] = Some(model);
            }
            Insn::ReturnVoid => break,
            _ => unreachable!("verified init body"),
        }
    }

    fields
        .into_iter()
        .map(|field| field.unwrap_or_else(|| unreachable!("verified init body")))
        .collect()
}

/// Run a render body, appending the output to `out`.
pub(crate) fn render<T>(
    body: &CodeBody,
    constants: &[Arc<str>],
    fields: &[ModelRef<T>],
    context: &T,
    out: &mut String,
) {
    let mut stack: Vec<Operand<'_, T>> = Vec::with_capacity(body.max_stack as usize);

    for insn in &body.insns {
        match *insn {
            Insn::LoadLocal(0) => stack.push(Operand::Receiver),
            Insn::LoadLocal(_) => stack.push(Operand::Context),
            Insn::NewBuffer(capacity) => {
                out.reserve(capacity as usize);
                stack.push(Operand::Buffer);
            }
            Insn::LoadConst(constant) => {
                stack.push(Operand::Text(Cow::Borrowed(&*constants[constant as usize])))
            }
            Insn::GetField(field) => {
                stack.pop();
                stack.push(Operand::Model(&fields[field as usize]));
            }
            Insn::InvokeEval => {
                let (Some(Operand::Context), Some(Operand::Model(model))) = (stack.pop(), stack.pop())
                else {
                    unreachable!("verified render body")
                };
                stack.push(Operand::Text(Cow::Owned(model.evaluate(context))));
            }
            Insn::Append => match stack.pop() {
                Some(Operand::Text(text)) => out.push_str(&text),
                _ => unreachable!("verified render body"),
            },
            Insn::Return => break,
            Insn::PutField(_) | Insn::ReturnVoid => unreachable!("verified render body"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{constant, model_fn};
    use crate::unit::CodeEmitter;

    #[test]
    fn test_construct_binds_fields_in_order() {
        let mut init = CodeEmitter::new();
        init.load_local(0).load_local(2).put_field(0);
        init.load_local(0).load_local(1).put_field(1);
        init.ret_void();
        let body = init.finish_computed(3);

        let args = vec![constant::<()>("a"), constant::<()>("b")];
        let fields = construct(&body, 2, &args);
        assert!(Arc::ptr_eq(&fields[0], &args[1]));
        assert!(Arc::ptr_eq(&fields[1], &args[0]));
    }

    #[test]
    fn test_render_appends_in_order() {
        let mut code = CodeEmitter::new();
        code.new_buffer(4)
            .load_const(0)
            .append()
            .load_local(0)
            .get_field(0)
            .load_local(1)
            .invoke_eval()
            .append()
            .ret();
        let body = code.finish_computed(2);
        let constants: Vec<Arc<str>> = vec![Arc::from("n=")];
        let fields = vec![model_fn(|n: &i32| n.to_string())];

        let mut out = String::from(">");
        render(&body, &constants, &fields, &12, &mut out);
        assert_eq!(out, ">n=12");
    }
}
