// The dynamic loader turns a CompiledUnit into a live LoadedUnit that can be instantiated
// into evaluators. Loading decodes the unit bytes, verifies both bodies, and links the
// render body with the process's loader strategy. Strategies are tried in the configured
// priority order the first time the loader is used and the winner is cached for the
// loader's lifetime: native x86-64 code in executable pages where the platform allows
// it, threaded code (a pre-linked step list) otherwise, and the bytecode interpreter,
// which has no preconditions, as the final fallback. Unavailable strategies are skipped
// silently. Named units are registered weakly in a Namespace so that names stay unique
// while a unit is alive without the registry keeping any unit alive. The interpreter
// strategy gives every load its own disposable namespace instead of the shared one.

//! Dynamic loading of compiled units.

pub mod interpreter;
#[cfg(all(target_arch = "x86_64", unix))]
pub mod native;
pub mod namespace;
pub mod threaded;

pub use namespace::Namespace;
pub use threaded::{Step, ThreadedRender};

use crate::core::model::{ModelRef, TextModel};
use crate::unit::{
    lower_render, verify, CompiledUnit, LowerError, UnitError, UnitImage, VerifyError,
};
use crate::x64::EncodingError;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Ways of making a unit executable, most capable first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoaderKind {
    Native,
    Threaded,
    Interpreted,
}

impl LoaderKind {
    pub const ALL: [LoaderKind; 3] = [LoaderKind::Native, LoaderKind::Threaded, LoaderKind::Interpreted];

    pub fn as_str(self) -> &'static str {
        match self {
            LoaderKind::Native => "native",
            LoaderKind::Threaded => "threaded",
            LoaderKind::Interpreted => "interpreted",
        }
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoaderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LoaderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| s.to_string())
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("malformed unit: {0}")]
    Decode(#[from] UnitError),

    #[error("unit failed verification: {0}")]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Lower(#[from] LowerError),

    #[error("native translation failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error("cannot map executable memory: {0}")]
    Memory(#[source] std::io::Error),

    #[error("requested name {requested} does not match unit name {embedded}")]
    NameMismatch { requested: String, embedded: String },

    #[error("a live unit named {0} is already loaded")]
    Duplicate(String),

    #[error("unit {unit} takes {expected} models, got {actual}")]
    Arity {
        unit: String,
        expected: u32,
        actual: usize,
    },
}

/// Linked form of a render body.
#[derive(Debug)]
pub enum LinkedCode {
    Interpreted,
    Threaded(ThreadedRender),
    #[cfg(all(target_arch = "x86_64", unix))]
    Native(native::NativeRender),
}

/// One way of linking verified units.
pub trait LoaderStrategy: Send + Sync {
    fn kind(&self) -> LoaderKind;

    /// Whether the strategy can run in this process.
    fn probe(&self) -> bool;

    fn link(&self, image: &UnitImage) -> Result<LinkedCode, LoadError>;
}

struct InterpretedStrategy;

impl LoaderStrategy for InterpretedStrategy {
    fn kind(&self) -> LoaderKind {
        LoaderKind::Interpreted
    }

    fn probe(&self) -> bool {
        true
    }

    fn link(&self, _image: &UnitImage) -> Result<LinkedCode, LoadError> {
        Ok(LinkedCode::Interpreted)
    }
}

struct ThreadedStrategy;

impl LoaderStrategy for ThreadedStrategy {
    fn kind(&self) -> LoaderKind {
        LoaderKind::Threaded
    }

    fn probe(&self) -> bool {
        true
    }

    fn link(&self, image: &UnitImage) -> Result<LinkedCode, LoadError> {
        let program = lower_render(image)?;
        Ok(LinkedCode::Threaded(ThreadedRender::link(
            &program,
            &image.constants,
        )))
    }
}

#[cfg(all(target_arch = "x86_64", unix))]
struct NativeStrategy;

#[cfg(all(target_arch = "x86_64", unix))]
impl LoaderStrategy for NativeStrategy {
    fn kind(&self) -> LoaderKind {
        LoaderKind::Native
    }

    fn probe(&self) -> bool {
        native::probe()
    }

    fn link(&self, image: &UnitImage) -> Result<LinkedCode, LoadError> {
        let program = lower_render(image)?;
        Ok(LinkedCode::Native(native::NativeRender::link(&program)?))
    }
}

fn strategy_for(kind: LoaderKind) -> Option<Box<dyn LoaderStrategy>> {
    match kind {
        #[cfg(all(target_arch = "x86_64", unix))]
        LoaderKind::Native => Some(Box::new(NativeStrategy)),
        #[cfg(not(all(target_arch = "x86_64", unix)))]
        LoaderKind::Native => None,
        LoaderKind::Threaded => Some(Box::new(ThreadedStrategy)),
        LoaderKind::Interpreted => Some(Box::new(InterpretedStrategy)),
    }
}

/// Loads compiled units into the running process.
pub struct DynamicLoader {
    preference: Vec<LoaderKind>,
    strategy: OnceLock<Box<dyn LoaderStrategy>>,
    namespace: Arc<Namespace>,
}

impl fmt::Debug for DynamicLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicLoader")
            .field("preference", &self.preference)
            .field("selected", &self.strategy.get().map(|s| s.kind()))
            .finish()
    }
}

impl Default for DynamicLoader {
    fn default() -> Self {
        Self::new(LoaderKind::ALL.to_vec())
    }
}

impl DynamicLoader {
    /// Loader trying strategies in `preference` order.
    pub fn new(preference: Vec<LoaderKind>) -> Self {
        Self {
            preference,
            strategy: OnceLock::new(),
            namespace: Arc::new(Namespace::new()),
        }
    }

    /// Shared namespace of named units.
    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// The selected strategy, probing on first use.
    pub fn kind(&self) -> LoaderKind {
        self.strategy().kind()
    }

    fn strategy(&self) -> &dyn LoaderStrategy {
        self.strategy
            .get_or_init(|| {
                for kind in &self.preference {
                    match strategy_for(*kind) {
                        Some(strategy) if strategy.probe() => {
                            log::debug!("selected {kind} loader");
                            return strategy;
                        }
                        _ => log::debug!("{kind} loader unavailable"),
                    }
                }
                log::debug!("falling back to interpreted loader");
                Box::new(InterpretedStrategy)
            })
            .as_ref()
    }

    fn prepare(
        &self,
        strategy: &dyn LoaderStrategy,
        name: Option<String>,
        unit: &CompiledUnit,
    ) -> Result<(Option<String>, UnitImage, LinkedCode), LoadError> {
        let image = unit.decode()?;
        if let Some(requested) = &name {
            if *requested != image.name {
                return Err(LoadError::NameMismatch {
                    requested: requested.clone(),
                    embedded: image.name,
                });
            }
        }
        let report = verify(&image)?;
        log::trace!(
            "verified {} (init peak {}, render peak {})",
            image.name,
            report.init_peak,
            report.render_peak
        );
        let code = strategy.link(&image)?;
        Ok((name, image, code))
    }

    fn namespace_for(&self, kind: LoaderKind) -> Arc<Namespace> {
        match kind {
            LoaderKind::Interpreted => Arc::new(Namespace::new()),
            _ => Arc::clone(&self.namespace),
        }
    }

    /// Load one unit. A `name` must equal the unit's embedded name.
    pub fn load(
        &self,
        name: Option<String>,
        unit: &CompiledUnit,
    ) -> Result<Arc<LoadedUnit>, LoadError> {
        let mut loaded = self.load_batch(vec![(name, unit.clone())])?;
        Ok(loaded.remove(0))
    }

    /// Load several units together. Either every unit loads or none does.
    pub fn load_batch(
        &self,
        units: Vec<(Option<String>, CompiledUnit)>,
    ) -> Result<Vec<Arc<LoadedUnit>>, LoadError> {
        let strategy = self.strategy();
        let namespace = self.namespace_for(strategy.kind());

        let mut loaded = Vec::with_capacity(units.len());
        for (name, unit) in &units {
            let (name, image, code) = self.prepare(strategy, name.clone(), unit)?;
            loaded.push(Arc::new(LoadedUnit {
                name,
                image,
                code,
                kind: strategy.kind(),
                namespace: Arc::clone(&namespace),
            }));
        }
        namespace.register_all(&loaded)?;

        for unit in &loaded {
            log::debug!(
                "loaded {} via {} loader",
                unit.image.name,
                unit.kind
            );
        }
        Ok(loaded)
    }
}

/// A verified, linked unit.
#[derive(Debug)]
pub struct LoadedUnit {
    name: Option<String>,
    image: UnitImage,
    code: LinkedCode,
    kind: LoaderKind,
    namespace: Arc<Namespace>,
}

impl LoadedUnit {
    /// Registered name, `None` for anonymous units.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn image(&self) -> &UnitImage {
        &self.image
    }

    pub fn kind(&self) -> LoaderKind {
        self.kind
    }

    pub fn code(&self) -> &LinkedCode {
        &self.code
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// Machine code of the render body, when natively linked.
    pub fn native_code(&self) -> Option<&[u8]> {
        match &self.code {
            #[cfg(all(target_arch = "x86_64", unix))]
            LinkedCode::Native(native) => Some(native.code()),
            _ => None,
        }
    }

    /// Run the init body over `args`, producing an evaluator.
    pub fn instantiate<T: 'static>(
        self: &Arc<Self>,
        args: Vec<ModelRef<T>>,
    ) -> Result<UnitModel<T>, LoadError> {
        if args.len() != self.image.field_count as usize {
            return Err(LoadError::Arity {
                unit: self.image.name.clone(),
                expected: self.image.field_count,
                actual: args.len(),
            });
        }
        let fields = interpreter::construct(&self.image.init, self.image.field_count, &args);
        Ok(UnitModel {
            unit: Arc::clone(self),
            fields: fields.into_boxed_slice(),
        })
    }
}

impl Drop for LoadedUnit {
    fn drop(&mut self) {
        if let Some(name) = &self.name {
            self.namespace.release(name);
        }
    }
}

/// Evaluator backed by a loaded unit.
pub struct UnitModel<T> {
    unit: Arc<LoadedUnit>,
    fields: Box<[ModelRef<T>]>,
}

impl<T> UnitModel<T> {
    pub fn unit(&self) -> &Arc<LoadedUnit> {
        &self.unit
    }
}

impl<T> fmt::Debug for UnitModel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitModel")
            .field("unit", &self.unit.image.name)
            .field("loader", &self.unit.kind)
            .field("fields", &self.fields.len())
            .finish()
    }
}

impl<T> TextModel<T> for UnitModel<T> {
    fn evaluate(&self, context: &T) -> String {
        let mut out = String::new();
        self.evaluate_into(context, &mut out);
        out
    }

    fn evaluate_into(&self, context: &T, out: &mut String) {
        let image = &self.unit.image;
        match &self.unit.code {
            LinkedCode::Interpreted => {
                interpreter::render(&image.render, &image.constants, &self.fields, context, out)
            }
            LinkedCode::Threaded(threaded) => threaded.render(&self.fields, context, out),
            #[cfg(all(target_arch = "x86_64", unix))]
            LinkedCode::Native(native) => {
                native.render(&image.constants, &self.fields, context, out)
            }
        }
    }
}
