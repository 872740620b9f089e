//! Per-call execution context with immutable derivation.
//!
//! A [`Context`] is a chain of typed values scoped to one in-flight call.
//! Deriving a child via [`Context::with_value`] never mutates the parent, so
//! concurrent calls sharing an ancestor cannot observe each other's
//! attachments. Lookup walks child-to-parent; the nearest attachment wins.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Node>>,
}

struct Node {
    key: TypeId,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Node>>,
}

impl Context {
    pub fn new() -> Self {
        Self { head: None }
    }

    /// Returns a child context carrying `value`, keyed by its type.
    ///
    /// The receiver is left untouched; the child shadows any value of the
    /// same type attached further up the chain.
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        Self {
            head: Some(Arc::new(Node {
                key: TypeId::of::<T>(),
                value: Arc::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// Looks up the nearest value of type `T`, if any.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            if n.key == TypeId::of::<T>() {
                return n.value.downcast_ref::<T>();
            }
            node = n.parent.as_deref();
        }
        None
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0usize;
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            depth += 1;
            node = n.parent.as_deref();
        }
        f.debug_struct("Context").field("depth", &depth).finish()
    }
}
