//! Threaded code: a render body pre-linked into a flat list of steps.

use crate::core::model::ModelRef;
use crate::unit::{RenderOp, RenderProgram};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Literal text resolved from the constant pool.
    Text(Arc<str>),
    /// Field to evaluate.
    Field(u32),
}

#[derive(Debug, Clone)]
pub struct ThreadedRender {
    capacity: usize,
    steps: Vec<Step>,
}

impl ThreadedRender {
    pub(crate) fn link(program: &RenderProgram, constants: &[Arc<str>]) -> Self {
        let steps = program
            .ops
            .iter()
            .map(|op| match *op {
                RenderOp::Literal(constant) => Step::Text(Arc::clone(&constants[constant as usize])),
                RenderOp::Field(field) => Step::Field(field),
            })
            .collect();
        Self {
            capacity: program.capacity as usize,
            steps,
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub(crate) fn render<T>(&self, fields: &[ModelRef<T>], context: &T, out: &mut String) {
        out.reserve(self.capacity);
        for step in &self.steps {
            match step {
                Step::Text(text) => out.push_str(text),
                Step::Field(field) => fields[*field as usize].evaluate_into(context, out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::model_fn;

    #[test]
    fn test_link_resolves_constants() {
        let program = RenderProgram {
            capacity: 3,
            ops: vec![RenderOp::Literal(1), RenderOp::Field(0), RenderOp::Literal(0)],
        };
        let constants: Vec<Arc<str>> = vec![Arc::from(")"), Arc::from("(")];
        let threaded = ThreadedRender::link(&program, &constants);
        assert_eq!(threaded.steps()[0], Step::Text(Arc::from("(")));

        let fields = vec![model_fn(|s: &&str| s.to_uppercase())];
        let mut out = String::new();
        threaded.render(&fields, &"ok", &mut out);
        assert_eq!(out, "(OK)");
    }
}
