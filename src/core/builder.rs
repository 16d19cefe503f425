// The fragment accumulator is the front end of textmodel. Callers append static text and
// dynamic models in order; adjacent static text merges into a single fragment as it
// arrives, so the finalized sequence never holds two static fragments in a row. The
// builder keeps the dynamic count and the running static length up to date on every
// append, which lets finalization pick a fast path without scanning: empty, all static,
// or a single dynamic model with no text around it. Everything else is sealed and handed
// to the engine. build() caches its result until the next mutation; build_and_release()
// consumes the builder and moves the captured fragments into the sealed template instead of
// cloning them.

//! Fragment accumulator.

use crate::core::engine::TextModelEngine;
use crate::core::error::TextModelResult;
use crate::core::fragment::{Fragment, SealedTemplate};
use crate::core::model::{ConstantModel, EmptyModel, ModelRef};
use crate::core::trace::TraceSink;
use std::fmt;
use std::sync::Arc;

/// Template-building contract driven by template parsers.
pub trait TextModelTemplate<T> {
    fn append_text(&mut self, text: &str) -> &mut Self;

    fn append_model(&mut self, model: ModelRef<T>) -> &mut Self;

    fn clear(&mut self) -> &mut Self;

    /// Evaluator for the current content; the template stays usable.
    fn create(&mut self) -> TextModelResult<ModelRef<T>>;

    /// Evaluator for the current content, consuming the template.
    fn create_and_release(self) -> TextModelResult<ModelRef<T>>
    where
        Self: Sized;
}

/// Accumulates fragments and resolves them into an evaluator.
pub struct TextModelBuilder<T> {
    engine: Arc<TextModelEngine>,
    fragments: Vec<Fragment<T>>,
    dynamic_count: usize,
    static_length: usize,
    cached: Option<ModelRef<T>>,
    trace: Option<Arc<dyn TraceSink>>,
}

impl<T: 'static> Default for TextModelBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TextModelBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextModelBuilder")
            .field("fragments", &self.fragments)
            .field("dynamic_count", &self.dynamic_count)
            .field("static_length", &self.static_length)
            .field("cached", &self.cached.is_some())
            .finish()
    }
}

impl<T: 'static> TextModelBuilder<T> {
    /// Builder on the process-wide engine.
    pub fn new() -> Self {
        Self::with_engine(TextModelEngine::global())
    }

    pub fn with_engine(engine: Arc<TextModelEngine>) -> Self {
        Self {
            engine,
            fragments: Vec::new(),
            dynamic_count: 0,
            static_length: 0,
            cached: None,
            trace: None,
        }
    }

    /// Report every operation to `sink`.
    pub fn with_trace(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(sink);
        self
    }

    fn trace(&self, line: fmt::Arguments<'_>) {
        if let Some(sink) = &self.trace {
            sink.trace(&line.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn dynamic_count(&self) -> usize {
        self.dynamic_count
    }

    /// Byte length of all static text appended so far.
    pub fn static_length(&self) -> usize {
        self.static_length
    }

    /// Whether a built evaluator is cached.
    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    pub fn fragments(&self) -> &[Fragment<T>] {
        &self.fragments
    }

    /// Append static text, merging with a preceding static fragment.
    pub fn append_text(&mut self, text: &str) -> &mut Self {
        if text.is_empty() {
            return self;
        }
        self.trace(format_args!("append text ({} bytes)", text.len()));
        match self.fragments.last_mut() {
            Some(Fragment::Static(last)) => last.push_str(text),
            _ => self.fragments.push(Fragment::Static(text.to_string())),
        }
        self.static_length += text.len();
        self.cached = None;
        self
    }

    /// Append a dynamic fragment.
    pub fn append_model(&mut self, model: ModelRef<T>) -> &mut Self {
        self.dynamic_count += 1;
        self.trace(format_args!("append model (dynamic #{})", self.dynamic_count));
        self.fragments.push(Fragment::Dynamic(model));
        self.cached = None;
        self
    }

    pub fn append(&mut self, fragment: impl Into<Fragment<T>>) -> &mut Self {
        match fragment.into() {
            Fragment::Static(text) => self.append_text(&text),
            Fragment::Dynamic(model) => self.append_model(model),
        }
    }

    /// Remove all fragments. Clearing an empty builder keeps its cache.
    pub fn clear(&mut self) -> &mut Self {
        if self.fragments.is_empty() {
            self.trace(format_args!("clear (already empty)"));
            return self;
        }
        self.trace(format_args!("clear ({} fragments)", self.fragments.len()));
        self.fragments.clear();
        self.dynamic_count = 0;
        self.static_length = 0;
        self.cached = None;
        self
    }

    /// Evaluator for the current fragments, cached until the next mutation.
    pub fn build(&mut self) -> TextModelResult<ModelRef<T>> {
        if let Some(model) = &self.cached {
            self.trace(format_args!("build (cached)"));
            return Ok(Arc::clone(model));
        }
        self.trace(format_args!("build"));
        let model = self.resolve(false)?;
        self.cached = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Evaluator for the current fragments, consuming the builder.
    pub fn build_and_release(mut self) -> TextModelResult<ModelRef<T>> {
        if let Some(model) = self.cached.take() {
            self.trace(format_args!("build_and_release (cached)"));
            return Ok(model);
        }
        self.trace(format_args!("build_and_release"));
        self.resolve(true)
    }

    fn take_fragments(&mut self, releasing: bool) -> Vec<Fragment<T>> {
        if releasing {
            std::mem::take(&mut self.fragments)
        } else {
            self.fragments.clone()
        }
    }

    fn resolve(&mut self, releasing: bool) -> TextModelResult<ModelRef<T>> {
        let engine = Arc::clone(&self.engine);
        let stats = engine.stats();
        if self.fragments.is_empty() {
            stats.record_empty();
            return Ok(Arc::new(EmptyModel));
        }

        if self.dynamic_count == 0 {
            // Adjacent text is merged on append, so this is the only fragment.
            let text: String = self
                .take_fragments(releasing)
                .into_iter()
                .filter_map(|fragment| match fragment {
                    Fragment::Static(text) => Some(text),
                    Fragment::Dynamic(_) => None,
                })
                .collect();
            stats.record_constant();
            return Ok(Arc::new(ConstantModel::new(text)));
        }

        if self.dynamic_count == 1 && self.static_length == 0 {
            if let Some(Fragment::Dynamic(model)) = self.fragments.first() {
                stats.record_pass_through();
                return Ok(Arc::clone(model));
            }
        }

        let sealed = SealedTemplate::seal(self.take_fragments(releasing));
        log::trace!(
            "sealed template: {} segments, {} fields, {} static bytes",
            sealed.plan.segments().len(),
            sealed.plan.field_count(),
            sealed.plan.static_length()
        );
        engine.perform_compilation(sealed)
    }
}

impl<T: 'static> TextModelTemplate<T> for TextModelBuilder<T> {
    fn append_text(&mut self, text: &str) -> &mut Self {
        TextModelBuilder::append_text(self, text)
    }

    fn append_model(&mut self, model: ModelRef<T>) -> &mut Self {
        TextModelBuilder::append_model(self, model)
    }

    fn clear(&mut self) -> &mut Self {
        TextModelBuilder::clear(self)
    }

    fn create(&mut self) -> TextModelResult<ModelRef<T>> {
        self.build()
    }

    fn create_and_release(self) -> TextModelResult<ModelRef<T>> {
        self.build_and_release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendId;
    use crate::core::config::EngineConfig;
    use crate::core::model::{constant, model_fn, TextModel};
    use crate::core::trace::testing::Recorder;

    fn naive() -> Arc<TextModelEngine> {
        TextModelEngine::new(EngineConfig::default().backend(BackendId::Naive)).unwrap()
    }

    #[test]
    fn test_static_text_merges() {
        let mut builder = naive().builder::<()>();
        builder.append_text("a").append_text("").append_text("b");
        assert_eq!(builder.len(), 1);
        assert_eq!(builder.static_length(), 2);

        builder.append_model(constant("c")).append_text("d");
        assert_eq!(builder.len(), 3);
        assert_eq!(builder.dynamic_count(), 1);
    }

    #[test]
    fn test_build_caches_until_mutation() {
        let mut builder = naive().builder::<u8>();
        builder.append_text("x=").append_model(model_fn(|x: &u8| x.to_string()));
        let first = builder.build().unwrap();
        let second = builder.build().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        builder.append_text(";");
        assert!(!builder.is_cached());
        assert_eq!(builder.build().unwrap().evaluate(&3), "x=3;");
    }

    #[test]
    fn test_clear_on_empty_keeps_cache() {
        let mut builder = naive().builder::<()>();
        let empty = builder.build().unwrap();
        builder.clear();
        assert!(builder.is_cached());
        assert!(Arc::ptr_eq(&empty, &builder.build().unwrap()));
    }

    #[test]
    fn test_fast_path_kinds() {
        let engine = naive();
        let model = engine.builder::<()>().build_and_release().unwrap();
        assert!(!model.is_dynamic());

        let mut builder = engine.builder::<()>();
        builder.append_text("static");
        let model = builder.build_and_release().unwrap();
        assert!(!model.is_dynamic());
        assert_eq!(model.evaluate(&()), "static");

        let only = model_fn(|_: &()| "only".to_string());
        let mut builder = engine.builder::<()>();
        builder.append_model(Arc::clone(&only));
        assert!(Arc::ptr_eq(&builder.build().unwrap(), &only));

        let snapshot = engine.stats().snapshot();
        assert_eq!((snapshot.empty, snapshot.constant, snapshot.pass_through), (1, 1, 1));
        assert_eq!(snapshot.composite, 0);
    }

    #[test]
    fn test_trace_lines() {
        let recorder = Arc::new(Recorder::default());
        let mut builder = naive().builder::<()>().with_trace(recorder.clone());
        builder.append_text("ab").clear().clear();
        builder.build().unwrap();
        builder.build().unwrap();
        assert_eq!(
            *recorder.lines.lock(),
            vec![
                "append text (2 bytes)",
                "clear (1 fragments)",
                "clear (already empty)",
                "build",
                "build (cached)",
            ]
        );
    }
}
