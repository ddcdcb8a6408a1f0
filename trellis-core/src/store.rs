//! Store declaration surface.
//!
//! A store is a view-model type registered with the container through the
//! [`Store`] trait. The trait carries the descriptor metadata that class
//! annotations express in other ecosystems: a stable name, a provision mode,
//! the ordered list of constructor dependencies, the declared effect methods,
//! and an optional props hook. All of it is attached at definition time; the
//! container consumes it during resolution.
//!
//! # Example
//!
//! ```rust,ignore
//! struct UserStore {
//!     username: Observable<String>,
//!     app: Rc<AppStore>,
//! }
//!
//! impl Store for UserStore {
//!     const NAME: &'static str = "UserStore";
//!
//!     fn dependencies() -> Vec<Dependency> {
//!         vec![Dependency::of::<AppStore>()]
//!     }
//!
//!     fn construct(injector: &mut Injector<'_>) -> Result<Self, StoreError> {
//!         Ok(Self {
//!             username: Observable::new(String::new()),
//!             app: injector.resolve()?,
//!         })
//!     }
//!
//!     fn effects() -> Vec<EffectDecl<Self>> {
//!         vec![EffectDecl::new("on_username_change", |store: &Self| {
//!             let username = store.username.get();
//!             println!("username is now {username}");
//!             Ok(EffectOutcome::None)
//!         })]
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use crate::container::{Injector, Scope};
use crate::effects::Signature;
use crate::error::{BoxedError, EffectError, StoreError};

/// Where a store may be instantiated when no enclosing scope provides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provision {
    /// The store registers itself at the scope where it is first requested.
    SelfRegistering,
    /// The store must be provided by an explicit [`Scope::provide`] call in an
    /// enclosing scope; resolution fails otherwise.
    ProvidedOnly,
}

/// A view-model type managed by the container.
///
/// One instance exists per (store type, providing scope) while that scope is
/// mounted. Constructor dependencies are wired through [`Store::construct`],
/// which receives an [`Injector`] bound to the scope the instance will be
/// registered in.
pub trait Store: Any {
    /// Stable name used in errors and logs.
    const NAME: &'static str;

    /// Provision mode; self-registering unless overridden.
    const PROVISION: Provision = Provision::SelfRegistering;

    /// Ordered constructor dependency list.
    ///
    /// Every entry is resolved against the owning scope before `construct`
    /// runs, in declaration order.
    fn dependencies() -> Vec<Dependency>
    where
        Self: Sized,
    {
        Vec::new()
    }

    /// Build the instance, resolving dependencies through the injector.
    fn construct(injector: &mut Injector<'_>) -> Result<Self, StoreError>
    where
        Self: Sized;

    /// Declared effect methods. Each runs once, unconditionally, when the
    /// instance is first resolved, and again whenever its dependencies change.
    fn effects() -> Vec<EffectDecl<Self>>
    where
        Self: Sized,
    {
        Vec::new()
    }

    /// Hook invoked with the scope's props after construction and on every
    /// [`Scope::set_props`]. Runs inside a batch, so field writes coalesce.
    fn bind_props(&self, _props: &Props) -> Result<(), EffectError> {
        Ok(())
    }
}

/// A declared constructor dependency on another store type.
///
/// Carries the dependency's identity plus an erased resolution thunk so the
/// container can resolve the declared list in order without knowing the
/// concrete types.
pub struct Dependency {
    name: &'static str,
    type_id: TypeId,
    resolve: fn(&Scope) -> Result<(), StoreError>,
}

impl Dependency {
    /// Declare a dependency on store type `D`.
    pub fn of<D: Store>() -> Self {
        fn thunk<D: Store>(scope: &Scope) -> Result<(), StoreError> {
            scope.resolve::<D>().map(|_| ())
        }

        Self {
            name: D::NAME,
            type_id: TypeId::of::<D>(),
            resolve: thunk::<D>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn resolve(&self, scope: &Scope) -> Result<(), StoreError> {
        (self.resolve)(scope)
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency").field("name", &self.name).finish()
    }
}

/// Cleanup callback captured from an effect run. Runs at most once, before
/// the effect's next run or at scope teardown.
pub type CleanupFn = Box<dyn FnOnce()>;

/// Dependency selector attached through [`dep`]. Evaluated without tracking.
pub type SelectorFn = Box<dyn Fn() -> Signature>;

/// What an effect body returns.
pub type EffectResult = Result<EffectOutcome, BoxedError>;

/// A declared effect method on a store.
pub struct EffectDecl<S: ?Sized> {
    name: &'static str,
    run: fn(&S) -> EffectResult,
}

impl<S> EffectDecl<S> {
    pub fn new(name: &'static str, run: fn(&S) -> EffectResult) -> Self {
        Self { name, run }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn run(&self) -> fn(&S) -> EffectResult {
        self.run
    }
}

impl<S> fmt::Debug for EffectDecl<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectDecl").field("name", &self.name).finish()
    }
}

/// Value returned by an effect body.
///
/// `None` declares nothing; `Cleanup` captures a teardown callback and keeps
/// the effect in default (read-tracked) dependency mode; `Tracked` switches
/// the effect to explicit dependency selection.
pub enum EffectOutcome {
    None,
    Cleanup(CleanupFn),
    Tracked {
        selector: SelectorFn,
        cleanup: Option<CleanupFn>,
    },
}

impl EffectOutcome {
    /// Capture a cleanup while staying in default dependency mode.
    pub fn cleanup(f: impl FnOnce() + 'static) -> Self {
        Self::Cleanup(Box::new(f))
    }

    /// Switch to an explicit dependency selector with no cleanup.
    ///
    /// An empty selector output means the effect runs once and never again.
    pub fn tracked(selector: impl Fn() -> Signature + 'static) -> Self {
        Self::Tracked {
            selector: Box::new(selector),
            cleanup: None,
        }
    }
}

impl fmt::Debug for EffectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("EffectOutcome::None"),
            Self::Cleanup(_) => f.write_str("EffectOutcome::Cleanup"),
            Self::Tracked { .. } => f.write_str("EffectOutcome::Tracked"),
        }
    }
}

/// Declare an explicit dependency selector together with a cleanup.
///
/// The selector takes no arguments and returns the ordered comparison values
/// for this effect. Before each re-run the scheduler evaluates it again and
/// compares the output pairwise against the previous one; the effect only
/// re-runs when the output changed. The cleanup runs before that re-run, or
/// at teardown.
pub fn dep(
    selector: impl Fn() -> Signature + 'static,
    cleanup: impl FnOnce() + 'static,
) -> EffectOutcome {
    EffectOutcome::Tracked {
        selector: Box::new(selector),
        cleanup: Some(Box::new(cleanup)),
    }
}

/// Type-erased props value carried by a scope.
#[derive(Clone)]
pub struct Props {
    value: Rc<dyn Any>,
}

impl Props {
    pub fn new<P: Any>(value: P) -> Self {
        Self { value: Rc::new(value) }
    }

    /// Borrow the props as a concrete type, if it matches.
    pub fn downcast<P: Any>(&self) -> Option<&P> {
        self.value.downcast_ref()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Props")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn props_downcast_matches_concrete_type() {
        let props = Props::new(String::from("title"));

        assert_eq!(props.downcast::<String>().map(String::as_str), Some("title"));
        assert!(props.downcast::<i32>().is_none());
    }

    #[test]
    fn effect_outcome_debug_names_variant() {
        assert_eq!(format!("{:?}", EffectOutcome::None), "EffectOutcome::None");
        assert_eq!(
            format!("{:?}", EffectOutcome::cleanup(|| {})),
            "EffectOutcome::Cleanup"
        );
    }
}
