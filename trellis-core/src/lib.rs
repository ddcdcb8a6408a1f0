//! Trellis Core
//!
//! This crate provides the runtime for the Trellis store container: a
//! reactive dependency-injection layer for UI view-models. It implements:
//!
//! - A scope tree that owns singleton store instances per provider scope
//! - Observable store fields with field-level read tracking
//! - A subscription registry connecting fields to renders and effects
//! - An effect scheduler with guaranteed cleanup ordering
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `container`: scope tree, provider lookup, and store instantiation
//! - `reactive`: observables, tracking context, registry, and scheduling
//! - `effects`: declared effect reactions and dependency signatures
//! - `store`: the declaration surface store authors implement
//!
//! # Example
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use trellis_core::{
//!     EffectDecl, EffectOutcome, Injector, Observable, Scope, Store, StoreError,
//! };
//!
//! struct CounterStore {
//!     count: Observable<i32>,
//! }
//!
//! impl Store for CounterStore {
//!     const NAME: &'static str = "CounterStore";
//!
//!     fn construct(_injector: &mut Injector<'_>) -> Result<Self, StoreError> {
//!         Ok(Self { count: Observable::new(0) })
//!     }
//!
//!     fn effects() -> Vec<EffectDecl<Self>> {
//!         vec![EffectDecl::new("log_count", |store: &Self| {
//!             println!("count: {}", store.count.get());
//!             Ok(EffectOutcome::None)
//!         })]
//!     }
//! }
//!
//! let scope = Scope::root();
//! let counter = scope.resolve::<CounterStore>()?;
//! // "count: 0" — the declared effect ran once on resolution.
//!
//! counter.count.set(1)?;
//! // "count: 1" — the effect re-ran because `count` was in its read set.
//! # Ok::<(), StoreError>(())
//! ```

pub mod container;
pub mod effects;
pub mod error;
pub mod reactive;
pub mod store;

pub use container::{Injector, Scope, ScopeId};
pub use effects::{Signature, SignatureValue};
pub use error::{BoxedError, EffectError, StoreError};
pub use reactive::{batch, flush, is_batching, untracked, Observable, Renderer};
pub use store::{
    dep, CleanupFn, Dependency, EffectDecl, EffectOutcome, EffectResult, Props, Provision,
    SelectorFn, Store,
};
