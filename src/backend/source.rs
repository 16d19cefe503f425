//! Source backend: synthesize model source and compile it.

use super::{capacity_hint, BackendId, UnitCompiler};
use crate::core::error::FatalCause;
use crate::core::fragment::{Segment, UnitPlan};
use crate::source;
use crate::unit::CompiledUnit;
use std::fmt::Write as _;

/// Compiles plans through the textual model compiler.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceCompiler;

/// Quote `text` as a model-source string literal.
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Model source for a unit named `name` rendering `plan`.
pub fn synthesize(name: &str, plan: &UnitPlan) -> String {
    let fields = plan.field_count();
    let mut src = String::with_capacity(128 + plan.static_length() + 48 * fields as usize);

    let _ = writeln!(src, "model {name} {{");
    for field in 0..fields {
        let _ = writeln!(src, "    field f{field};");
    }

    let params: Vec<String> = (0..fields).map(|field| format!("a{field}")).collect();
    let _ = writeln!(src, "    new({}) {{", params.join(", "));
    for field in 0..fields {
        let _ = writeln!(src, "        this.f{field} = a{field};");
    }
    src.push_str("    }\n");

    let capacity = capacity_hint(plan.static_length());
    let _ = write!(src, "    render(ctx) = buffer({capacity})");
    for segment in plan.segments() {
        match segment {
            Segment::Text(text) => {
                let _ = write!(src, "\n        .append({})", escape_literal(text));
            }
            Segment::Field(field) => {
                let _ = write!(src, "\n        .append(this.f{field}.evaluate(ctx))");
            }
        }
    }
    src.push_str(";\n}\n");
    src
}

impl UnitCompiler for SourceCompiler {
    fn id(&self) -> BackendId {
        BackendId::Source
    }

    fn compile_unit(&self, name: &str, plan: &UnitPlan) -> Result<CompiledUnit, FatalCause> {
        // Receiver plus one constructor parameter per field must fit a local index.
        if plan.field_count() >= u32::from(u16::MAX) {
            return Err(FatalCause::TooManyFields(plan.field_count()));
        }
        let text = synthesize(name, plan);
        log::trace!("synthesized source for {name}:\n{text}");
        let unit = source::compile(&text)?;
        log::debug!("compiled {} from {} source bytes", unit.name(), text.len());
        Ok(unit)
    }
}
