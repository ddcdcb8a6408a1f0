//! Dependency-injection container.
//!
//! The container resolves store types into singleton instances owned by
//! nodes of a [`Scope`] tree. Lookup walks outward to the nearest enclosing
//! provider; instantiation happens at the requesting scope when nothing
//! above provides the store, wiring constructor dependencies recursively and
//! scheduling declared effects for their first run.

mod resolve;
mod scope;

pub use resolve::Injector;
pub use scope::{Scope, ScopeId};
