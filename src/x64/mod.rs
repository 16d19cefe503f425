//! x86-64 architecture-specific components.
//!
//! This module contains all x86-64 specific code:
//! - Instruction encoding using iced-x86
//! - Translation of lowered render programs into machine code
//! - Executable page management and ELF export

pub mod encoder;
#[cfg(unix)]
pub mod exec_memory;
pub mod object_file;
pub mod translate;

pub use encoder::{disassemble, EncodingError, Gp, X64Encoder};
#[cfg(unix)]
pub use exec_memory::ExecutableMemory;
pub use object_file::render_object;
pub use translate::{assemble_render, FrameLayout};
