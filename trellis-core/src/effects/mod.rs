//! Effect scheduling.
//!
//! Declared effect methods become [`Reaction`]s when their store is
//! resolved: each reaction runs once unconditionally, then re-runs when its
//! dependencies change, with its previous cleanup invoked first. Dependency
//! changes are detected either through the fields the body read on its last
//! run (default mode) or through an explicit selector whose output is
//! compared as a [`Signature`].
//!
//! The scheduler is synchronous. An effect body may hand work to an executor
//! and return immediately; the cleanup-before-next-run ordering is enforced
//! for the synchronous part only, and in-flight asynchronous work is never
//! cancelled.

mod reaction;
mod signature;

pub use signature::{Signature, SignatureValue};

pub(crate) use reaction::Reaction;
