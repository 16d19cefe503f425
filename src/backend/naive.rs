//! Composite evaluator: renders parts in order, no code generation.

use crate::core::fragment::{Segment, SealedTemplate};
use crate::core::model::{ModelRef, TextModel};
use std::fmt;
use std::sync::Arc;

enum Part<T> {
    Text(Arc<str>),
    Model(ModelRef<T>),
}

/// Ordered list of literal text and sub-models.
pub struct CompositeModel<T> {
    parts: Vec<Part<T>>,
    static_length: usize,
}

impl<T> CompositeModel<T> {
    pub fn new(sealed: SealedTemplate<T>) -> Self {
        let SealedTemplate { plan, models } = sealed;
        let mut models = models.into_iter();
        let parts = plan
            .segments()
            .iter()
            .filter_map(|segment| match segment {
                Segment::Text(text) => Some(Part::Text(Arc::clone(text))),
                Segment::Field(_) => models.next().map(Part::Model),
            })
            .collect();
        Self {
            parts,
            static_length: plan.static_length(),
        }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl<T> fmt::Debug for CompositeModel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeModel")
            .field("parts", &self.parts.len())
            .field("static_length", &self.static_length)
            .finish()
    }
}

impl<T> TextModel<T> for CompositeModel<T> {
    fn evaluate(&self, context: &T) -> String {
        let mut out = String::with_capacity(self.static_length);
        self.evaluate_into(context, &mut out);
        out
    }

    fn evaluate_into(&self, context: &T, out: &mut String) {
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Model(model) => model.evaluate_into(context, out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fragment::Fragment;
    use crate::core::model::model_fn;

    #[test]
    fn test_renders_parts_in_order() {
        let sealed = SealedTemplate::seal(vec![
            Fragment::from("["),
            Fragment::Dynamic(model_fn(|n: &u32| n.to_string())),
            Fragment::from("|"),
            Fragment::Dynamic(model_fn(|n: &u32| (n * 2).to_string())),
            Fragment::from("]"),
        ]);
        let composite = CompositeModel::new(sealed);
        assert_eq!(composite.len(), 5);
        assert_eq!(composite.evaluate(&21), "[21|42]");
    }
}
