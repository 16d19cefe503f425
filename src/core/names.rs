//! Unique unit names.

use crate::loader::Namespace;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hands out `prefix + counter` names not taken in a namespace.
///
/// The counter only grows, so concurrent callers never receive the same
/// name; the namespace probe skips names already held by live units, such as
/// units loaded under explicit names.
#[derive(Debug)]
pub struct NameAllocator {
    prefix: String,
    counter: AtomicU64,
    namespace: Arc<Namespace>,
}

impl NameAllocator {
    pub fn new(prefix: impl Into<String>, namespace: Arc<Namespace>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
            namespace,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Next free name.
    pub fn next(&self) -> String {
        loop {
            let n = self.counter.fetch_add(1, Ordering::Relaxed);
            let name = format!("{}{}", self.prefix, n);
            if !self.namespace.contains(&name) {
                return name;
            }
            log::trace!("unit name {name} is taken, probing further");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_sequential() {
        let names = NameAllocator::new("T$", Arc::new(Namespace::new()));
        assert_eq!(names.next(), "T$0");
        assert_eq!(names.next(), "T$1");
        assert_eq!(names.prefix(), "T$");
    }
}
