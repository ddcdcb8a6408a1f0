//! Observable store fields.
//!
//! An [`Observable`] wraps one field of a store behind an explicit
//! getter/setter pair. Reading through [`Observable::get`] while a consumer
//! is tracking records the read against that consumer; writing through
//! [`Observable::set`] stores the value and, only when it actually changed,
//! notifies the subscribers whose last-read set contains the field.
//!
//! Handles are cheap clones sharing the same underlying slot, so a store can
//! hand a field to an effect selector or an event handler without borrowing
//! itself.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::EffectError;

use super::context;
use super::registry::Registry;

/// Unique identifier for an observable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(u64);

impl FieldId {
    /// Generate a new unique field ID.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct Slot<T> {
    id: FieldId,
    value: RefCell<T>,
}

/// An observable field holding a value of type `T`.
///
/// # Example
///
/// ```rust,ignore
/// let username = Observable::new(String::from("A"));
///
/// // Read (tracked when a consumer is evaluating)
/// let current = username.get();
///
/// // Write (notifies subscribers when the value changed)
/// username.set(String::from("B"))?;
/// ```
pub struct Observable<T> {
    slot: Rc<Slot<T>>,
}

impl<T> Observable<T>
where
    T: Clone + PartialEq + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            slot: Rc::new(Slot {
                id: FieldId::next(),
                value: RefCell::new(value),
            }),
        }
    }

    /// The field's unique ID.
    pub fn id(&self) -> FieldId {
        self.slot.id
    }

    /// Read the value, recording the read against the active consumer.
    ///
    /// Outside any tracking context this is a plain read.
    pub fn get(&self) -> T {
        context::record_read(self.slot.id);
        self.slot.value.borrow().clone()
    }

    /// Read the value without recording a dependency.
    pub fn get_untracked(&self) -> T {
        self.slot.value.borrow().clone()
    }

    /// Store a new value and notify subscribers if it changed.
    ///
    /// Equal values are dropped without notification. When the write happens
    /// inside a batch, a tracking pass, or a running notification pass, the
    /// notification is deferred to the enclosing drain point; otherwise the
    /// pass runs before `set` returns, and the first effect failure it hits
    /// is the returned error.
    pub fn set(&self, value: T) -> Result<(), EffectError> {
        {
            let mut current = self.slot.value.borrow_mut();
            if *current == value {
                return Ok(());
            }
            *current = value;
        }
        tracing::trace!(field = ?self.slot.id, "field changed");
        Registry::notify(self.slot.id)
    }

    /// Compute a new value from the current one and store it.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<(), EffectError> {
        let next = f(&self.slot.value.borrow());
        self.set(next)
    }
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T> Debug for Observable<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.slot.id)
            .field("value", &self.get_untracked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_set() {
        let field = Observable::new(0);
        assert_eq!(field.get(), 0);

        field.set(42).unwrap();
        assert_eq!(field.get(), 42);
    }

    #[test]
    fn update_derives_from_current_value() {
        let field = Observable::new(10);
        field.update(|v| v + 5).unwrap();
        assert_eq!(field.get(), 15);
    }

    #[test]
    fn clone_shares_state() {
        let a = Observable::new(0);
        let b = a.clone();

        a.set(42).unwrap();
        assert_eq!(b.get(), 42);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn field_ids_are_unique() {
        let a = Observable::new(0);
        let b = Observable::new(0);

        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn tracked_read_records_against_active_frame() {
        let field = Observable::new(1);
        let consumer = super::super::consumer::ConsumerId::next();

        let guard = context::push_tracking(consumer);
        let _ = field.get();
        let reads = guard.finish();

        assert_eq!(reads.as_slice(), &[field.id()]);
    }

    #[test]
    fn untracked_read_records_nothing() {
        let field = Observable::new(1);
        let consumer = super::super::consumer::ConsumerId::next();

        let guard = context::push_tracking(consumer);
        let _ = field.get_untracked();
        let reads = guard.finish();

        assert!(reads.is_empty());
    }
}
