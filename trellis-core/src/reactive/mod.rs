//! Reactivity engine.
//!
//! This module implements field-level dependency tracking between store
//! fields and their consumers.
//!
//! # Concepts
//!
//! ## Observables
//!
//! An [`Observable`] is one store field behind a getter/setter pair. Reads
//! performed while a consumer is evaluating are recorded against that
//! consumer; writes that change the value notify exactly the consumers whose
//! last-read set contains the field.
//!
//! ## Consumers
//!
//! A consumer is a tracked reader: either a rendering unit (see
//! [`Renderer`]) or a declared effect method managed by the effect
//! scheduler. Each tracking pass fully replaces the consumer's read set, so
//! dependencies follow the most recent evaluation.
//!
//! ## Scheduling
//!
//! Writes enqueue their affected consumers instead of running them inline.
//! The queue drains after the current synchronous evaluation: at the end of
//! a [`batch`], at the end of the outermost tracking pass, or right away for
//! a lone write. Within one drain a consumer runs at most once.

mod consumer;
mod context;
mod observable;
mod registry;
mod scheduler;

pub use consumer::{ConsumerId, Renderer};
pub use context::untracked;
pub use observable::{FieldId, Observable};
pub use scheduler::{batch, flush, is_batching};

pub(crate) use consumer::Consumer;
pub(crate) use registry::Registry;
pub(crate) use scheduler::{enqueue, flush_if_idle};
