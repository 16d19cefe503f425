// TextModelEngine ties the back end together: the selected backend, the dynamic loader,
// the name allocator probing the loader's namespace, and the engine statistics. Builders
// resolve fast paths themselves and hand everything else to perform_compilation(). With
// the naive backend that produces a CompositeModel; with a compiling backend it allocates
// a unit name, compiles the sealed template's plan, loads the unit and instantiates it
// with the captured models in appearance order. Any failure along that path is reported as
// TextModelError::Compilation. Engines are explicit values shared through Arc; global()
// offers a lazily created default configured from the environment.

//! The text model engine.

use crate::backend::naive::CompositeModel;
use crate::backend::{compiler_for, discover, is_available, BackendId, UnitCompiler};
use crate::core::builder::TextModelBuilder;
use crate::core::config::EngineConfig;
use crate::core::error::{FatalCause, TextModelError, TextModelResult};
use crate::core::fragment::SealedTemplate;
use crate::core::model::ModelRef;
use crate::core::names::NameAllocator;
use crate::core::stats::EngineStats;
use crate::loader::DynamicLoader;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Builds evaluators for sealed templates.
pub struct TextModelEngine {
    config: EngineConfig,
    compiler: Option<Arc<dyn UnitCompiler>>,
    loader: Arc<DynamicLoader>,
    names: NameAllocator,
    stats: EngineStats,
}

impl fmt::Debug for TextModelEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextModelEngine")
            .field("backend", &self.backend())
            .field("loader", &self.loader)
            .field("names", &self.names.prefix())
            .finish()
    }
}

static GLOBAL: OnceLock<Arc<TextModelEngine>> = OnceLock::new();

impl TextModelEngine {
    fn assemble(config: EngineConfig, compiler: Option<Arc<dyn UnitCompiler>>) -> Self {
        let loader = Arc::new(DynamicLoader::new(config.loaders.clone()));
        let names = NameAllocator::new(config.name_prefix.clone(), Arc::clone(loader.namespace()));
        log::debug!(
            "text model engine: {} backend, loaders {:?}",
            compiler.as_ref().map_or(BackendId::Naive, |c| c.id()),
            config.loaders
        );
        Self {
            config,
            compiler,
            loader,
            names,
            stats: EngineStats::default(),
        }
    }

    /// Engine using the first available backend of `config.backends`.
    pub fn new(config: EngineConfig) -> TextModelResult<Arc<Self>> {
        config.validate()?;
        let backend = discover(&config.backends, is_available);
        let compiler = compiler_for(backend);
        Ok(Arc::new(Self::assemble(config, compiler)))
    }

    /// Engine compiling through `compiler`, ignoring `config.backends`.
    pub fn with_compiler(
        config: EngineConfig,
        compiler: Arc<dyn UnitCompiler>,
    ) -> TextModelResult<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self::assemble(config, Some(compiler))))
    }

    /// Process-wide default engine, configured from `TEXTMODEL_*` variables on
    /// first use. An invalid environment falls back to the default configuration.
    pub fn global() -> Arc<Self> {
        let engine = GLOBAL.get_or_init(|| {
            let config = EngineConfig::from_env().unwrap_or_else(|err| {
                log::warn!("ignoring textmodel environment configuration: {err}");
                EngineConfig::default()
            });
            let backend = discover(&config.backends, is_available);
            Arc::new(Self::assemble(config, compiler_for(backend)))
        });
        Arc::clone(engine)
    }

    /// Empty builder bound to this engine.
    pub fn builder<T: 'static>(self: &Arc<Self>) -> TextModelBuilder<T> {
        TextModelBuilder::with_engine(Arc::clone(self))
    }

    pub fn backend(&self) -> BackendId {
        self.compiler.as_ref().map_or(BackendId::Naive, |compiler| compiler.id())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn loader(&self) -> &Arc<DynamicLoader> {
        &self.loader
    }

    pub fn names(&self) -> &NameAllocator {
        &self.names
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Evaluator for a template none of the builder fast paths apply to.
    pub fn perform_compilation<T: 'static>(
        &self,
        sealed: SealedTemplate<T>,
    ) -> TextModelResult<ModelRef<T>> {
        let Some(compiler) = &self.compiler else {
            self.stats.record_composite();
            return Ok(Arc::new(CompositeModel::new(sealed)));
        };

        let name = self.names.next();
        let fail = |cause: FatalCause| TextModelError::Compilation {
            backend: compiler.id(),
            unit: name.clone(),
            cause,
        };

        let unit = compiler
            .compile_unit(&name, &sealed.plan)
            .map_err(fail)?;
        let loaded = self
            .loader
            .load(Some(name.clone()), &unit)
            .map_err(|err| fail(err.into()))?;
        let model = loaded
            .instantiate(sealed.models)
            .map_err(|err| fail(err.into()))?;

        let native = loaded.native_code().map_or(0, <[u8]>::len);
        self.stats.record_compiled(unit.len(), native);
        log::debug!(
            "built {} via {} backend and {} loader",
            name,
            compiler.id(),
            loaded.kind()
        );
        Ok(Arc::new(model))
    }
}
