// Native render functions. A lowered render program is translated to x86-64 code that
// calls back into two Rust helpers through a #[repr(C)] frame: one appends a constant-pool
// entry, the other evaluates a field and appends its text. The helpers are monomorphized
// per context type, so the machine code itself is independent of T and the same mapping
// serves every instance of the unit. A panic inside a dynamic fragment must not unwind
// through the generated frame: the field helper catches it, records the payload, turns
// every later helper call into a no-op, and the payload is resumed once control is back
// in Rust.

//! Native x86-64 render code.

use crate::core::model::ModelRef;
use crate::loader::LoadError;
use crate::unit::RenderProgram;
use crate::x64::{assemble_render, ExecutableMemory, FrameLayout};
use std::any::Any;
use std::ffi::c_void;
use std::mem::offset_of;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

type Helper = unsafe extern "C" fn(*mut NativeFrame, u32);

#[repr(C)]
struct NativeFrame {
    append_literal: Helper,
    append_field: Helper,
    state: *mut c_void,
}

const LAYOUT: FrameLayout = FrameLayout {
    append_literal: offset_of!(NativeFrame, append_literal) as i32,
    append_field: offset_of!(NativeFrame, append_field) as i32,
};

struct RenderState<'a, T> {
    out: &'a mut String,
    literals: &'a [Arc<str>],
    fields: &'a [ModelRef<T>],
    context: &'a T,
    panic: Option<Box<dyn Any + Send>>,
}

unsafe extern "C" fn append_literal<T>(frame: *mut NativeFrame, index: u32) {
    let state = unsafe { &mut *((*frame).state as *mut RenderState<'_, T>) };
    if state.panic.is_some() {
        return;
    }
    if let Some(text) = state.literals.get(index as usize) {
        state.out.push_str(text);
    }
}

unsafe extern "C" fn append_field<T>(frame: *mut NativeFrame, index: u32) {
    let state = unsafe { &mut *((*frame).state as *mut RenderState<'_, T>) };
    if state.panic.is_some() {
        return;
    }
    let Some(model) = state.fields.get(index as usize) else {
        return;
    };
    let out = &mut *state.out;
    let context = state.context;
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| model.evaluate_into(context, out)))
    {
        state.panic = Some(payload);
    }
}

/// Render code mapped into executable memory.
#[derive(Debug)]
pub struct NativeRender {
    memory: ExecutableMemory,
    capacity: usize,
}

impl NativeRender {
    pub(crate) fn link(program: &RenderProgram) -> Result<Self, LoadError> {
        let code = assemble_render(program, LAYOUT)?;
        let memory = ExecutableMemory::new(&code).map_err(LoadError::Memory)?;
        log::debug!(
            "native render: {} ops, {} code bytes at {:p}",
            program.ops.len(),
            memory.len(),
            memory.as_ptr()
        );
        Ok(Self {
            memory,
            capacity: program.capacity as usize,
        })
    }

    /// The generated machine code.
    pub fn code(&self) -> &[u8] {
        self.memory.code()
    }

    pub(crate) fn render<T>(
        &self,
        literals: &[Arc<str>],
        fields: &[ModelRef<T>],
        context: &T,
        out: &mut String,
    ) {
        out.reserve(self.capacity);
        let mut state = RenderState {
            out,
            literals,
            fields,
            context,
            panic: None,
        };
        let mut frame = NativeFrame {
            append_literal: append_literal::<T>,
            append_field: append_field::<T>,
            state: &mut state as *mut RenderState<'_, T> as *mut c_void,
        };
        let entry: unsafe extern "C" fn(*mut NativeFrame) =
            unsafe { std::mem::transmute(self.memory.as_ptr()) };
        unsafe { entry(&mut frame) };

        if let Some(payload) = state.panic.take() {
            panic::resume_unwind(payload);
        }
    }
}

/// Whether this process may map executable memory.
pub(crate) fn probe() -> bool {
    match ExecutableMemory::new(&[0xc3]) {
        Ok(_) => true,
        Err(err) => {
            log::debug!("native loader unavailable: {err}");
            false
        }
    }
}
