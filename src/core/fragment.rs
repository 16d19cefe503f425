// This module holds the fragment representation used by the builder front end and the
// sealed, backend-facing form of a finished template. A Fragment is an explicit sum type:
// static text kept in an owned, growable buffer so adjacent appends can merge in place,
// or a dynamic model handle. Sealing turns the mutable fragment list into a UnitPlan,
// which is independent of the context type (text segments become immutable Arc<str>,
// dynamic fragments become numbered field slots in appearance order), plus the ordered
// list of captured models. Backends compile the plan; loaders bind the models.

//! Fragments and sealed templates.

use super::model::ModelRef;
use std::fmt;
use std::sync::Arc;

/// One element appended to a builder.
pub enum Fragment<T> {
    /// Literal text. Adjacent static fragments are always merged.
    Static(String),
    /// A captured model, opaque to the builder.
    Dynamic(ModelRef<T>),
}

impl<T> Fragment<T> {
    pub fn is_static(&self) -> bool {
        matches!(self, Fragment::Static(_))
    }
}

impl<T> Clone for Fragment<T> {
    fn clone(&self) -> Self {
        match self {
            Fragment::Static(text) => Fragment::Static(text.clone()),
            Fragment::Dynamic(model) => Fragment::Dynamic(Arc::clone(model)),
        }
    }
}

impl<T> fmt::Debug for Fragment<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::Static(text) => f.debug_tuple("Static").field(text).finish(),
            Fragment::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl<T> From<&str> for Fragment<T> {
    fn from(text: &str) -> Self {
        Fragment::Static(text.to_owned())
    }
}

impl<T> From<String> for Fragment<T> {
    fn from(text: String) -> Self {
        Fragment::Static(text)
    }
}

impl<T> From<ModelRef<T>> for Fragment<T> {
    fn from(model: ModelRef<T>) -> Self {
        Fragment::Dynamic(model)
    }
}

/// One segment of a sealed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(Arc<str>),
    /// Index of a captured model, counted in appearance order.
    Field(u32),
}

/// Context-independent shape of a sealed template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitPlan {
    segments: Vec<Segment>,
    field_count: u32,
    static_length: usize,
}

impl UnitPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text segment. Empty text is ignored and adjacent text merges.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.static_length += text.len();
        if let Some(Segment::Text(last)) = self.segments.last_mut() {
            let mut merged = String::with_capacity(last.len() + text.len());
            merged.push_str(last);
            merged.push_str(text);
            *last = Arc::from(merged);
        } else {
            self.segments.push(Segment::Text(Arc::from(text)));
        }
    }

    /// Append the next field slot and return its index.
    pub fn push_field(&mut self) -> u32 {
        let index = self.field_count;
        self.segments.push(Segment::Field(index));
        self.field_count += 1;
        index
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn field_count(&self) -> u32 {
        self.field_count
    }

    /// Total byte length of all text segments.
    pub fn static_length(&self) -> usize {
        self.static_length
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// A finalized template: the plan plus the models bound to its field slots.
pub struct SealedTemplate<T> {
    pub plan: UnitPlan,
    pub models: Vec<ModelRef<T>>,
}

impl<T> SealedTemplate<T> {
    /// Seal a fragment sequence, consuming it.
    pub fn seal<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = Fragment<T>>,
    {
        let mut plan = UnitPlan::new();
        let mut models = Vec::new();
        for fragment in fragments {
            match fragment {
                Fragment::Static(text) => plan.push_text(&text),
                Fragment::Dynamic(model) => {
                    plan.push_field();
                    models.push(model);
                }
            }
        }
        Self { plan, models }
    }
}

impl<T> fmt::Debug for SealedTemplate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedTemplate")
            .field("plan", &self.plan)
            .field("models", &self.models.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::constant;

    #[test]
    fn test_plan_merges_adjacent_text() {
        let mut plan = UnitPlan::new();
        plan.push_text("a");
        plan.push_text("");
        plan.push_text("bc");
        assert_eq!(plan.push_field(), 0);
        plan.push_text("d");
        assert_eq!(plan.push_field(), 1);

        assert_eq!(
            plan.segments(),
            &[
                Segment::Text(Arc::from("abc")),
                Segment::Field(0),
                Segment::Text(Arc::from("d")),
                Segment::Field(1),
            ]
        );
        assert_eq!(plan.static_length(), 4);
        assert_eq!(plan.field_count(), 2);
    }

    #[test]
    fn test_seal_keeps_model_order() {
        let a = constant::<()>("A");
        let b = constant::<()>("B");
        let sealed = SealedTemplate::seal(vec![
            Fragment::Dynamic(Arc::clone(&a)),
            Fragment::from("-"),
            Fragment::Dynamic(Arc::clone(&b)),
        ]);
        assert_eq!(sealed.plan.field_count(), 2);
        assert!(Arc::ptr_eq(&sealed.models[0], &a));
        assert!(Arc::ptr_eq(&sealed.models[1], &b));
    }
}
