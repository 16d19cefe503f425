// This module defines the rendering contract shared by every layer of textmodel. A
// TextModel maps a borrowed context value to a String and reports whether it reads that
// context at all, which lets composite builders and optimizers treat constant models as
// plain text. Models are Send + Sync and immutable once constructed so a single compiled
// model can serve any number of concurrent render calls. ModelRef is the shared handle
// used for dynamic fragments. The static kinds (EmptyModel, ConstantModel) back the
// builder's fast paths, and FnModel adapts ordinary closures into dynamic fragments.

//! Evaluator contract and the trivial model kinds.

use std::fmt;
use std::sync::Arc;

/// A pure function from a context value to rendered text.
///
/// Implementations must not keep shared mutable state: `evaluate` may be
/// called concurrently from any number of threads.
pub trait TextModel<T>: Send + Sync {
    /// Render this model for `context`.
    fn evaluate(&self, context: &T) -> String;

    /// Render into an existing buffer.
    ///
    /// Composite models call this so that nested models can write straight
    /// into the outer buffer instead of allocating a temporary.
    fn evaluate_into(&self, context: &T, out: &mut String) {
        out.push_str(&self.evaluate(context));
    }

    /// Whether the output depends on the context.
    fn is_dynamic(&self) -> bool {
        true
    }
}

impl<T> fmt::Debug for dyn TextModel<T> + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TextModel")
    }
}

/// Shared handle to a model, as captured by dynamic fragments.
pub type ModelRef<T> = Arc<dyn TextModel<T>>;

/// Model that renders nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyModel;

impl<T> TextModel<T> for EmptyModel {
    fn evaluate(&self, _context: &T) -> String {
        String::new()
    }

    fn evaluate_into(&self, _context: &T, _out: &mut String) {}

    fn is_dynamic(&self) -> bool {
        false
    }
}

/// Model that ignores its context and renders a fixed string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantModel {
    text: Arc<str>,
}

impl ConstantModel {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl<T> TextModel<T> for ConstantModel {
    fn evaluate(&self, _context: &T) -> String {
        self.text.to_string()
    }

    fn evaluate_into(&self, _context: &T, out: &mut String) {
        out.push_str(&self.text);
    }

    fn is_dynamic(&self) -> bool {
        false
    }
}

/// Closure adapter; see [`model_fn`].
#[derive(Clone, Copy)]
pub struct FnModel<F> {
    render: F,
}

impl<F> fmt::Debug for FnModel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnModel").finish_non_exhaustive()
    }
}

impl<T, F> TextModel<T> for FnModel<F>
where
    F: Fn(&T) -> String + Send + Sync,
{
    fn evaluate(&self, context: &T) -> String {
        (self.render)(context)
    }
}

/// Wrap a closure as a dynamic fragment.
///
/// ```
/// use textmodel::{model_fn, TextModel};
///
/// let upper = model_fn(|name: &String| name.to_uppercase());
/// assert_eq!(upper.evaluate(&"ada".to_string()), "ADA");
/// ```
pub fn model_fn<T, F>(render: F) -> ModelRef<T>
where
    T: 'static,
    F: Fn(&T) -> String + Send + Sync + 'static,
{
    Arc::new(FnModel { render })
}

/// Shorthand for an `Arc`-wrapped [`ConstantModel`].
pub fn constant<T: 'static>(text: impl Into<Arc<str>>) -> ModelRef<T> {
    Arc::new(ConstantModel::new(text))
}
