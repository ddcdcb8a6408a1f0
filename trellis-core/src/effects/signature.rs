//! Dependency signatures.
//!
//! A [`Signature`] is the ordered sequence of opaque comparison values an
//! effect's dependency selector produces. Two signatures match when they
//! have the same length and every pair of values compares equal; the values
//! themselves are type-erased, so a selector can mix strings, numbers, and
//! any other `PartialEq` type. A mismatched pair of types never compares
//! equal.

use std::any::Any;
use std::fmt;

use smallvec::SmallVec;

/// A single comparison value inside a signature.
///
/// Implemented for every `PartialEq + 'static` type through the blanket impl.
pub trait SignatureValue: Any {
    fn as_any(&self) -> &dyn Any;

    /// Shallow equality against another erased value.
    fn shallow_eq(&self, other: &dyn SignatureValue) -> bool;
}

impl<T: PartialEq + Any> SignatureValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn shallow_eq(&self, other: &dyn SignatureValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| self == other)
    }
}

/// Ordered comparison values produced by a dependency selector.
#[derive(Default)]
pub struct Signature {
    values: SmallVec<[Box<dyn SignatureValue>; 4]>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<V: SignatureValue>(&mut self, value: V) {
        self.values.push(Box::new(value));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pairwise shallow comparison. Differing lengths never match.
    pub fn matches(&self, other: &Signature) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a.shallow_eq(b.as_ref()))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature").field("len", &self.values.len()).finish()
    }
}

/// Build a [`Signature`] from a list of values.
///
/// ```rust,ignore
/// let username = store.username.clone();
/// dep(move || signature![username.get()], move || { /* cleanup */ })
/// ```
#[macro_export]
macro_rules! signature {
    () => {
        $crate::effects::Signature::new()
    };
    ($($value:expr),+ $(,)?) => {{
        let mut sig = $crate::effects::Signature::new();
        $( sig.push($value); )+
        sig
    }};
}
