//! Effect consumers.
//!
//! A [`Reaction`] binds one declared effect method to one store instance and
//! drives it through its lifecycle: an unconditional first run when the
//! instance is resolved, re-runs when the effect's dependencies change, and
//! a final cleanup at scope teardown.
//!
//! # Dependency modes
//!
//! By default a reaction depends on whatever fields its body read during its
//! last run; the read set is re-captured on every execution, so conditional
//! reads shift the dependencies run by run. When the body returns a
//! [`dep`](crate::store::dep) outcome, the reaction switches to explicit
//! mode: before each re-run the stored selector is evaluated again (without
//! tracking) and compared pairwise against the signature captured after the
//! previous run; an unchanged output skips the run entirely, and an empty
//! output therefore means "run once, never again".
//!
//! # Cleanup ordering
//!
//! A captured cleanup runs exactly once, either immediately before the next
//! run of the same reaction or at teardown. A skipped re-run (unchanged
//! signature) leaves the cleanup pending.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::EffectError;
use crate::reactive::{self, Consumer, ConsumerId, Registry};
use crate::store::{CleanupFn, EffectDecl, EffectOutcome, EffectResult, SelectorFn, Store};

use super::signature::Signature;

/// Lifecycle phase of a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Scheduled,
    Cleaning,
    Running,
    Disposed,
}

/// One declared effect method bound to one store instance.
pub(crate) struct Reaction {
    id: ConsumerId,
    store: &'static str,
    effect: &'static str,
    body: Box<dyn Fn() -> EffectResult>,
    phase: Cell<Phase>,
    pending_cleanup: RefCell<Option<CleanupFn>>,
    selector: RefCell<Option<SelectorFn>>,
    last_signature: RefCell<Option<Signature>>,
}

impl Reaction {
    /// Bind a declared effect to its instance and register it for lookups.
    pub(crate) fn new<S: Store>(instance: Rc<S>, decl: &EffectDecl<S>) -> Rc<Self> {
        let run = decl.run();
        let reaction = Rc::new(Self {
            id: ConsumerId::next(),
            store: S::NAME,
            effect: decl.name(),
            body: Box::new(move || run(&instance)),
            phase: Cell::new(Phase::Idle),
            pending_cleanup: RefCell::new(None),
            selector: RefCell::new(None),
            last_signature: RefCell::new(None),
        });
        Registry::register(reaction.clone());
        reaction
    }

    pub(crate) fn id(&self) -> ConsumerId {
        self.id
    }

    /// Queue the reaction for the next notification pass.
    pub(crate) fn schedule(&self) {
        if self.phase.get() == Phase::Disposed {
            return;
        }
        if self.phase.get() == Phase::Idle {
            self.phase.set(Phase::Scheduled);
        }
        reactive::enqueue(self.id);
    }

    /// Whether a re-run is due. Only explicit-selector reactions can skip.
    fn should_run(&self) -> bool {
        let selector = self.selector.borrow();
        let previous = self.last_signature.borrow();
        match (selector.as_ref(), previous.as_ref()) {
            (Some(selector), Some(previous)) => {
                let fresh = reactive::untracked(|| selector());
                !fresh.matches(previous)
            }
            _ => true,
        }
    }

    fn take_cleanup(&self) -> Option<CleanupFn> {
        self.pending_cleanup.borrow_mut().take()
    }

    /// Run the pending cleanup and retire the reaction.
    ///
    /// Called at scope teardown. Idempotent: the first call runs the cleanup
    /// and unsubscribes, later calls do nothing.
    pub(crate) fn dispose(&self) {
        if self.phase.get() == Phase::Disposed {
            return;
        }
        self.phase.set(Phase::Disposed);
        if let Some(cleanup) = self.take_cleanup() {
            tracing::trace!(store = self.store, effect = self.effect, "running final cleanup");
            cleanup();
        }
        Registry::unsubscribe(self.id);
    }
}

impl Consumer for Reaction {
    fn id(&self) -> ConsumerId {
        self.id
    }

    fn label(&self) -> &'static str {
        self.effect
    }

    fn is_live(&self) -> bool {
        self.phase.get() != Phase::Disposed
    }

    fn run(self: Rc<Self>) -> Result<(), EffectError> {
        if self.phase.get() == Phase::Disposed {
            return Ok(());
        }

        if !self.should_run() {
            tracing::trace!(
                store = self.store,
                effect = self.effect,
                "dependency signature unchanged, skipping"
            );
            self.phase.set(Phase::Idle);
            return Ok(());
        }

        if let Some(cleanup) = self.take_cleanup() {
            self.phase.set(Phase::Cleaning);
            tracing::trace!(store = self.store, effect = self.effect, "running cleanup");
            cleanup();
        }

        self.phase.set(Phase::Running);
        tracing::trace!(store = self.store, effect = self.effect, "running effect");

        let reaction = self.clone();
        let outcome = Registry::track(self.clone() as Rc<dyn Consumer>, move || (reaction.body)())?;

        let result = match outcome {
            Ok(EffectOutcome::None) => {
                *self.selector.borrow_mut() = None;
                *self.last_signature.borrow_mut() = None;
                Ok(())
            }
            Ok(EffectOutcome::Cleanup(cleanup)) => {
                *self.pending_cleanup.borrow_mut() = Some(cleanup);
                *self.selector.borrow_mut() = None;
                *self.last_signature.borrow_mut() = None;
                Ok(())
            }
            Ok(EffectOutcome::Tracked { selector, cleanup }) => {
                let baseline = reactive::untracked(|| selector());
                *self.last_signature.borrow_mut() = Some(baseline);
                *self.selector.borrow_mut() = Some(selector);
                *self.pending_cleanup.borrow_mut() = cleanup;
                Ok(())
            }
            Err(source) => Err(EffectError {
                store: self.store,
                effect: self.effect,
                source,
            }),
        };

        if self.phase.get() != Phase::Disposed {
            self.phase.set(Phase::Idle);
        }
        result
    }
}
