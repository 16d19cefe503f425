//! textmodel - tiered text template compilation.
//!
//! A template is an ordered sequence of static text and dynamic models. The
//! [`TextModelBuilder`] accumulates it and resolves it into a reusable
//! evaluator: trivial templates take a fast path, everything else goes to the
//! engine's backend, which either composes the models at run time or compiles
//! a specialized unit and loads it, down to native x86-64 render code where
//! the platform allows it.
//!
//! # Primary Usage
//!
//! ```
//! use textmodel::{model_fn, TextModel, TextModelBuilder};
//!
//! struct Greeting {
//!     name: String,
//! }
//!
//! let mut builder = TextModelBuilder::<Greeting>::new();
//! builder
//!     .append_text("Hello, ")
//!     .append_model(model_fn(|g: &Greeting| g.name.clone()))
//!     .append_text("!");
//! let model = builder.build().unwrap();
//! let greeting = Greeting { name: "World".to_string() };
//! assert_eq!(model.evaluate(&greeting), "Hello, World!");
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Evaluators, fragments, builder, engine and configuration
//! - [`backend`] - Naive, source-compiling and assembling backends
//! - [`source`] - Textual model compiler used by the source backend
//! - [`unit`] - Compiled unit format, writer, verifier and lowering
//! - [`loader`] - Dynamic loader and its strategies
//! - [`x64`] - x86-64 encoding, executable memory and ELF export

pub mod backend;
pub mod core;
pub mod loader;
#[cfg(feature = "source")]
pub mod source;
pub mod unit;
pub mod x64;

pub use crate::backend::{discover, BackendId, UnitCompiler};
pub use crate::core::{
    constant, model_fn, ConfigError, ConstantModel, EmptyModel, EngineConfig, FatalCause,
    Fragment, ModelRef, TextModel, TextModelBuilder, TextModelEngine, TextModelError,
    TextModelResult, TextModelTemplate, TraceSink,
};
pub use crate::loader::{DynamicLoader, LoadError, LoadedUnit, LoaderKind, UnitModel};
pub use crate::unit::{CompiledUnit, UnitImage};
