//! Store resolution.
//!
//! Resolution walks from the requesting scope to the root and returns the
//! first instance an enclosing scope owns. When no scope provides one, the
//! instance is created at the requesting scope itself — stores are provided
//! where first requested unless an ancestor provides them explicitly.
//!
//! Instantiation resolves every declared constructor dependency against the
//! owning scope first (recursively, so a dependency chain materializes
//! bottom-up), constructs the instance, registers it so descendant
//! resolutions can see it, applies the scope's props binding, and schedules
//! every declared effect for its unconditional first run. Re-entering the
//! same (store, scope) pair while its construction is still in progress is a
//! cycle and fails; it is not retried.

use std::any::{Any, TypeId};
use std::rc::Rc;

use crate::effects::Reaction;
use crate::error::StoreError;
use crate::reactive::batch;
use crate::store::{Provision, Store};

use super::scope::{Scope, ScopeInner};

/// Constructor-time resolution handle passed to [`Store::construct`].
///
/// Every resolution goes against the scope that will own the instance under
/// construction, so dependencies land at (or are shared from) the right
/// place in the tree.
pub struct Injector<'a> {
    scope: &'a Scope,
}

impl Injector<'_> {
    /// Resolve a constructor dependency.
    pub fn resolve<D: Store>(&mut self) -> Result<Rc<D>, StoreError> {
        self.scope.resolve::<D>()
    }
}

pub(super) fn resolve_from<S: Store>(scope: &Scope) -> Result<Rc<S>, StoreError> {
    if !scope.is_mounted() {
        return Err(StoreError::ScopeUnmounted { store: S::NAME });
    }

    if let Some(instance) = find_in_chain(scope.inner(), TypeId::of::<S>()) {
        return Ok(downcast::<S>(instance));
    }

    match S::PROVISION {
        Provision::ProvidedOnly => {
            tracing::debug!(store = S::NAME, scope = ?scope.id(), "no provider in scope chain");
            Err(StoreError::UnresolvedDependency { store: S::NAME })
        }
        Provision::SelfRegistering => instantiate::<S>(scope),
    }
}

pub(super) fn provide_at<S: Store>(scope: &Scope) -> Result<Rc<S>, StoreError> {
    if !scope.is_mounted() {
        return Err(StoreError::ScopeUnmounted { store: S::NAME });
    }

    if let Some(instance) = scope.inner().own_instance(TypeId::of::<S>()) {
        return Ok(downcast::<S>(instance));
    }

    instantiate::<S>(scope)
}

/// Nearest-enclosing-provider lookup, walking parent links to the root.
fn find_in_chain(scope: &Rc<ScopeInner>, type_id: TypeId) -> Option<Rc<dyn Any>> {
    let mut current = Some(scope.clone());
    while let Some(node) = current {
        if let Some(instance) = node.own_instance(type_id) {
            return Some(instance);
        }
        current = node.parent.as_ref().and_then(std::rc::Weak::upgrade);
    }
    None
}

fn downcast<S: Store>(instance: Rc<dyn Any>) -> Rc<S> {
    instance
        .downcast::<S>()
        .ok()
        .expect("store entry registered under mismatched type key")
}

/// Create the instance at `scope`. Declared effects run before this returns
/// (unless an outer batch is open), so their first failure surfaces here.
fn instantiate<S: Store>(scope: &Scope) -> Result<Rc<S>, StoreError> {
    match batch(|| build::<S>(scope)) {
        Ok(result) => result,
        Err(effect_error) => Err(StoreError::Effect(effect_error)),
    }
}

fn build<S: Store>(scope: &Scope) -> Result<Rc<S>, StoreError> {
    let inner = scope.inner().clone();
    let type_id = TypeId::of::<S>();

    {
        let mut resolving = inner.resolving.borrow_mut();
        if resolving.contains(&type_id) {
            tracing::debug!(store = S::NAME, scope = ?inner.id, "resolution re-entered");
            return Err(StoreError::CyclicDependency { store: S::NAME });
        }
        resolving.push(type_id);
    }

    struct ResolvingGuard {
        scope: Rc<ScopeInner>,
        type_id: TypeId,
    }

    impl Drop for ResolvingGuard {
        fn drop(&mut self) {
            self.scope
                .resolving
                .borrow_mut()
                .retain(|id| *id != self.type_id);
        }
    }

    let guard = ResolvingGuard {
        scope: inner.clone(),
        type_id,
    };

    tracing::debug!(store = S::NAME, scope = ?inner.id, "instantiating store");

    // Declared dependencies first, in declaration order.
    for dependency in S::dependencies() {
        tracing::trace!(
            store = S::NAME,
            dependency = dependency.name(),
            "resolving constructor dependency"
        );
        dependency.resolve(scope)?;
    }

    let mut injector = Injector { scope };
    let instance = Rc::new(S::construct(&mut injector)?);
    drop(guard);

    let reactions: Vec<Rc<Reaction>> = S::effects()
        .iter()
        .map(|decl| Reaction::new(instance.clone(), decl))
        .collect();

    // Registered before effects run, so descendant resolutions triggered by
    // an effect body already see this instance.
    inner.register::<S>(instance.clone(), reactions.clone());

    let props = inner.props.borrow().clone();
    if let Some(props) = props {
        instance.bind_props(&props)?;
    }

    for reaction in &reactions {
        reaction.schedule();
    }

    Ok(instance)
}
