//! Error types for the store container and effect scheduler.
//!
//! Container errors happen at resolution time and abort that resolution.
//! Effect errors happen after a mutation and abort the scheduling pass that
//! surfaced them, without disturbing the bookkeeping of other consumers in
//! the same pass. Nothing is swallowed internally: every failure is returned
//! from the library entry point that triggered it.

use thiserror::Error;

/// Boxed error source produced by an effect body.
pub type BoxedError = Box<dyn std::error::Error + 'static>;

/// Errors raised while resolving stores in a scope tree.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Resolution re-entered the same store in the same scope while its
    /// construction was still in progress.
    #[error("cyclic dependency detected while resolving store `{store}`")]
    CyclicDependency { store: &'static str },

    /// A provided-only store was requested but no enclosing scope provides it.
    #[error("no provider found for store `{store}` in the enclosing scope chain")]
    UnresolvedDependency { store: &'static str },

    /// The scope was already unmounted when resolution was attempted.
    #[error("cannot resolve store `{store}` on an unmounted scope")]
    ScopeUnmounted { store: &'static str },

    /// An effect failed during the scheduling pass started by this resolution
    /// (declared effects run once, unconditionally, on first resolution).
    #[error(transparent)]
    Effect(#[from] EffectError),
}

/// A failure escaping an effect body.
///
/// The original error is preserved unmodified as the source; the store and
/// effect names identify which declared effect produced it.
#[derive(Debug, Error)]
#[error("effect `{store}::{effect}` failed: {source}")]
pub struct EffectError {
    pub store: &'static str,
    pub effect: &'static str,
    #[source]
    pub source: BoxedError,
}
