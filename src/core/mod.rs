// This module holds the front end and the shared services of textmodel. It defines the
// evaluator contract (TextModel and its trivial kinds), the fragment representation and
// sealed template plans, the fragment accumulator that picks fast paths, and the engine
// that hands everything else to a backend. Configuration, error types, unit naming,
// builder tracing and statistics live here too because every backend depends on them.

//! Core textmodel infrastructure.
//!
//! # Key Components
//!
//! ## Evaluators (`model`)
//! - `TextModel` contract and the `ModelRef` shared handle
//! - Empty, constant and closure-backed models
//!
//! ## Front End (`fragment`, `builder`)
//! - Tagged-union fragments with eager static merging
//! - `TextModelBuilder` with cached and releasing finalizers
//! - `TextModelTemplate` contract for template parsers
//!
//! ## Engine (`engine`, `config`, `names`, `stats`, `trace`)
//! - Backend selection and unit compilation
//! - Environment-driven configuration
//! - Collision-free unit names
//! - Build statistics and tracing hooks

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod fragment;
pub mod model;
pub mod names;
pub mod stats;
pub mod trace;

pub use builder::{TextModelBuilder, TextModelTemplate};
pub use config::{ConfigError, EngineConfig};
pub use engine::TextModelEngine;
pub use error::{FatalCause, TextModelError, TextModelResult};
pub use fragment::{Fragment, SealedTemplate, Segment, UnitPlan};
pub use model::{constant, model_fn, ConstantModel, EmptyModel, FnModel, ModelRef, TextModel};
pub use names::NameAllocator;
pub use stats::{EngineStats, StatsSnapshot};
pub use trace::{LogTraceSink, TraceSink};
