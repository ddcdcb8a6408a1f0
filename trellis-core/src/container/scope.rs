//! Scope tree.
//!
//! A scope is a lifecycle-bound region of the UI tree that may own store
//! instances. Scopes form a tree mirroring the component hierarchy: the
//! parent link is weak and used only for upward provider lookup, while
//! children are owned top-down so teardown cascades through an explicit
//! list rather than through back-references.
//!
//! Unmounting a scope tears down its children first, then its own stores in
//! reverse registration order, running every effect's pending cleanup
//! exactly once. Dropping the last handle to a scope unmounts it.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::effects::Reaction;
use crate::error::{EffectError, StoreError};
use crate::reactive::batch;
use crate::store::{Props, Store};

use super::resolve;

/// Unique identifier for a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A store registered in a scope, together with its effect reactions and the
/// erased props binder used by [`Scope::set_props`].
pub(super) struct StoreEntry {
    pub(super) name: &'static str,
    pub(super) instance: Rc<dyn Any>,
    pub(super) bind_props: Rc<dyn Fn(&Props) -> Result<(), EffectError>>,
    pub(super) reactions: Vec<Rc<Reaction>>,
}

pub(super) struct ScopeInner {
    pub(super) id: ScopeId,
    pub(super) parent: Option<Weak<ScopeInner>>,
    pub(super) children: RefCell<Vec<Rc<ScopeInner>>>,
    pub(super) entries: RefCell<IndexMap<TypeId, StoreEntry>>,
    pub(super) resolving: RefCell<Vec<TypeId>>,
    pub(super) props: RefCell<Option<Props>>,
    pub(super) mounted: Cell<bool>,
}

impl ScopeInner {
    fn new(parent: Option<Weak<ScopeInner>>) -> Rc<Self> {
        Rc::new(Self {
            id: ScopeId::next(),
            parent,
            children: RefCell::new(Vec::new()),
            entries: RefCell::new(IndexMap::new()),
            resolving: RefCell::new(Vec::new()),
            props: RefCell::new(None),
            mounted: Cell::new(true),
        })
    }

    /// Register a constructed instance. Visible to descendant resolutions
    /// from this point on.
    pub(super) fn register<S: Store>(&self, instance: Rc<S>, reactions: Vec<Rc<Reaction>>) {
        let binder: Rc<dyn Fn(&Props) -> Result<(), EffectError>> = {
            let instance = instance.clone();
            Rc::new(move |props: &Props| instance.bind_props(props))
        };
        let erased: Rc<dyn Any> = instance;
        self.entries.borrow_mut().insert(
            TypeId::of::<S>(),
            StoreEntry {
                name: S::NAME,
                instance: erased,
                bind_props: binder,
                reactions,
            },
        );
        tracing::debug!(store = S::NAME, scope = ?self.id, "store registered");
    }

    pub(super) fn own_instance(&self, type_id: TypeId) -> Option<Rc<dyn Any>> {
        self.entries.borrow().get(&type_id).map(|entry| entry.instance.clone())
    }

    fn unmount(self: &Rc<Self>) {
        if !self.mounted.replace(false) {
            return;
        }
        tracing::debug!(scope = ?self.id, "scope unmounting");

        // Children first, in mount order.
        let children: Vec<_> = self.children.borrow_mut().drain(..).collect();
        for child in children {
            child.unmount();
        }

        // Own stores in reverse registration order; each reaction runs its
        // pending cleanup exactly once and never reschedules.
        let entries: Vec<StoreEntry> = {
            let mut map = self.entries.borrow_mut();
            map.drain(..).map(|(_, entry)| entry).collect()
        };
        for entry in entries.into_iter().rev() {
            tracing::debug!(store = entry.name, scope = ?self.id, "store released");
            for reaction in &entry.reactions {
                reaction.dispose();
            }
        }

        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            parent.children.borrow_mut().retain(|sibling| !Rc::ptr_eq(sibling, self));
        }
    }
}

/// Handle to a node in the scope tree.
///
/// Clones share the same node. The node unmounts when [`Scope::unmount`] is
/// called or when the last handle drops, whichever happens first.
pub struct Scope {
    inner: Rc<ScopeInner>,
}

impl Scope {
    /// Create a root scope.
    pub fn root() -> Self {
        let inner = ScopeInner::new(None);
        tracing::debug!(scope = ?inner.id, "root scope mounted");
        Self { inner }
    }

    /// Create a child scope bound to a nested UI subtree.
    pub fn child(&self) -> Self {
        let inner = ScopeInner::new(Some(Rc::downgrade(&self.inner)));
        self.inner.children.borrow_mut().push(inner.clone());
        tracing::debug!(scope = ?inner.id, parent = ?self.inner.id, "child scope mounted");
        Self { inner }
    }

    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    /// Resolve a store against this scope.
    ///
    /// Walks from this scope to the root and returns the first instance an
    /// enclosing scope owns. When none does, a self-registering store is
    /// instantiated here (constructor dependencies resolved recursively,
    /// declared effects run once), while a provided-only store fails with
    /// [`StoreError::UnresolvedDependency`].
    pub fn resolve<S: Store>(&self) -> Result<Rc<S>, StoreError> {
        resolve::resolve_from::<S>(self)
    }

    /// Instantiate a store at this scope, shadowing any ancestor provider
    /// for this subtree. Returns the existing instance if this scope already
    /// provides one.
    pub fn provide<S: Store>(&self) -> Result<Rc<S>, StoreError> {
        resolve::provide_at::<S>(self)
    }

    /// Install props on this scope and re-run every owned store's props
    /// binding inside a single batch.
    pub fn set_props(&self, props: Props) -> Result<(), EffectError> {
        *self.inner.props.borrow_mut() = Some(props.clone());

        // Snapshot the binders so a binding that resolves stores does not
        // observe the entry map mid-iteration.
        let binders: Vec<Rc<dyn Fn(&Props) -> Result<(), EffectError>>> = self
            .inner
            .entries
            .borrow()
            .values()
            .map(|entry| entry.bind_props.clone())
            .collect();

        batch(|| -> Result<(), EffectError> {
            for bind in &binders {
                bind.as_ref()(&props)?;
            }
            Ok(())
        })?
    }

    /// The props currently installed on this scope, if any.
    pub fn props(&self) -> Option<Props> {
        self.inner.props.borrow().clone()
    }

    /// Tear down this scope: children first, then own stores in reverse
    /// registration order. Idempotent.
    pub fn unmount(&self) {
        self.inner.unmount();
    }

    pub(super) fn inner(&self) -> &Rc<ScopeInner> {
        &self.inner
    }
}

impl Clone for Scope {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        // Last external handle unmounts the node. Children held by a mounted
        // parent keep an extra strong reference, so they outlive their own
        // handles until the parent cascades.
        if Rc::strong_count(&self.inner) == 1 {
            self.inner.unmount();
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("mounted", &self.inner.mounted.get())
            .field("stores", &self.inner.entries.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_scopes_unmount_with_parent() {
        let root = Scope::root();
        let child = root.child();
        let grandchild = child.child();

        assert!(child.is_mounted());
        assert!(grandchild.is_mounted());

        root.unmount();

        assert!(!root.is_mounted());
        assert!(!child.is_mounted());
        assert!(!grandchild.is_mounted());
    }

    #[test]
    fn unmount_is_idempotent() {
        let root = Scope::root();
        root.unmount();
        root.unmount();
        assert!(!root.is_mounted());
    }

    #[test]
    fn unmounting_child_detaches_it_from_parent() {
        let root = Scope::root();
        let child = root.child();

        assert_eq!(root.inner.children.borrow().len(), 1);
        child.unmount();
        assert_eq!(root.inner.children.borrow().len(), 0);
        assert!(root.is_mounted());
    }

    #[test]
    fn dropping_last_handle_unmounts() {
        let root = Scope::root();
        let child = root.child();
        let child_inner = child.inner.clone();

        // The parent still holds the child, so dropping the handle alone
        // does not unmount it.
        drop(child);
        assert!(child_inner.mounted.get());

        drop(root);
        assert!(!child_inner.mounted.get());
    }

    #[test]
    fn props_round_trip() {
        let scope = Scope::root();
        assert!(scope.props().is_none());

        scope.set_props(Props::new(42u32)).unwrap();
        let props = scope.props().unwrap();
        assert_eq!(props.downcast::<u32>(), Some(&42));
    }
}
