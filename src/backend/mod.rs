// Backends turn a sealed template into an evaluator. The naive backend composes the
// captured models at run time and needs no code generation; the two compiling backends
// produce a CompiledUnit from the template's T-agnostic UnitPlan, which the engine then
// loads and instantiates with the captured models. The source backend goes through
// synthesized model source and the bundled textual compiler; the assembly backend emits
// unit instructions directly. Compiling backends are optional features, and discover()
// picks the first available one from a priority list, falling back to the naive backend.

//! Template backends and backend selection.

pub mod naive;

#[cfg(feature = "assembly")]
pub mod assembly;
#[cfg(feature = "source")]
pub mod source;

use crate::core::error::FatalCause;
use crate::core::fragment::UnitPlan;
use crate::unit::CompiledUnit;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Identifies a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendId {
    Naive,
    Source,
    Assembly,
}

impl BackendId {
    /// Default selection priority.
    pub const PRIORITY: [BackendId; 3] = [BackendId::Assembly, BackendId::Source, BackendId::Naive];

    pub fn as_str(self) -> &'static str {
        match self {
            BackendId::Naive => "naive",
            BackendId::Source => "source",
            BackendId::Assembly => "assembly",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendId::PRIORITY
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| s.to_string())
    }
}

/// Produces compiled units from template plans.
pub trait UnitCompiler: Send + Sync {
    fn id(&self) -> BackendId;

    /// Compile `plan` into a unit named `name`.
    fn compile_unit(&self, name: &str, plan: &UnitPlan) -> Result<CompiledUnit, FatalCause>;
}

/// Whether `id` was compiled into this build.
pub fn is_available(id: BackendId) -> bool {
    match id {
        BackendId::Naive => true,
        BackendId::Source => cfg!(feature = "source"),
        BackendId::Assembly => cfg!(feature = "assembly"),
    }
}

/// First backend in `priority` accepted by `probe`, or [`BackendId::Naive`].
pub fn discover(priority: &[BackendId], probe: impl Fn(BackendId) -> bool) -> BackendId {
    priority
        .iter()
        .copied()
        .find(|id| probe(*id))
        .unwrap_or(BackendId::Naive)
}

/// Render buffer capacity for a template with `static_length` bytes of text.
/// The value is only a hint, so lengths past `u32::MAX` saturate.
pub(crate) fn capacity_hint(static_length: usize) -> u32 {
    u32::try_from(static_length).unwrap_or(u32::MAX)
}

/// Unit compiler for a compiling backend, `None` for the naive backend or a
/// backend left out of this build.
pub fn compiler_for(id: BackendId) -> Option<Arc<dyn UnitCompiler>> {
    match id {
        #[cfg(feature = "assembly")]
        BackendId::Assembly => Some(Arc::new(assembly::AssemblyCompiler)),
        #[cfg(feature = "source")]
        BackendId::Source => Some(Arc::new(source::SourceCompiler)),
        _ => None,
    }
}
