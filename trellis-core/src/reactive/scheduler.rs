//! Notification scheduler.
//!
//! Field writes do not run their consumers from inside the write. The
//! scheduler collects the consumers touched by a write into a pending queue
//! and drains the queue at a well-defined point: immediately after the write
//! when nothing else is evaluating, or at the end of the enclosing batch /
//! tracking pass otherwise. The queue is a set, so a consumer runs at most
//! once per pass no matter how many of its fields changed.
//!
//! # Draining
//!
//! Each pass drains a snapshot of the queue taken at pass start. Consumers
//! that unsubscribe mid-pass are skipped when their turn comes; consumers
//! enqueued mid-pass (writes performed by an effect or re-render) are picked
//! up by the next pass of the same drain loop. A runaway loop of effects that
//! keep re-triggering themselves is cut off after a bounded number of passes.
//!
//! A failing consumer does not stop the pass: the remaining consumers still
//! run so their bookkeeping completes, and the first error is returned from
//! the entry point that triggered the drain.

use std::cell::RefCell;

use indexmap::IndexSet;

use crate::error::EffectError;

use super::consumer::ConsumerId;
use super::context;
use super::registry::Registry;

thread_local! {
    static SCHEDULER: RefCell<SchedulerState> = RefCell::new(SchedulerState::default());
}

#[derive(Default)]
struct SchedulerState {
    queue: IndexSet<ConsumerId>,
    batch_depth: usize,
    flushing: bool,
}

/// Passes before a self-triggering update loop is considered runaway.
const MAX_FLUSH_PASSES: u32 = 1000;

/// Add a consumer to the pending queue.
pub(crate) fn enqueue(id: ConsumerId) {
    SCHEDULER.with(|s| {
        if s.borrow_mut().queue.insert(id) {
            tracing::trace!(consumer = ?id, "consumer scheduled");
        }
    });
}

/// Drain the queue unless a batch, tracking pass, or running drain defers it.
pub(crate) fn flush_if_idle() -> Result<(), EffectError> {
    let deferred = SCHEDULER.with(|s| {
        let state = s.borrow();
        state.flushing || state.batch_depth > 0
    }) || context::in_tracking_pass();

    if deferred {
        Ok(())
    } else {
        flush()
    }
}

/// Whether a batch is currently open.
pub fn is_batching() -> bool {
    SCHEDULER.with(|s| s.borrow().batch_depth > 0)
}

/// Group several writes into a single notification pass.
///
/// Consumers touched by writes inside `f` run once after `f` returns, not
/// once per write. Batches nest; only the outermost drains the queue.
///
/// # Example
///
/// ```rust,ignore
/// batch(|| {
///     store.first_name.set("Ada".into())?;
///     store.last_name.set("Lovelace".into())?;
///     Ok(())
/// })??; // consumers reading both fields re-ran once
/// ```
pub fn batch<R>(f: impl FnOnce() -> R) -> Result<R, EffectError> {
    SCHEDULER.with(|s| s.borrow_mut().batch_depth += 1);

    struct BatchGuard;

    impl Drop for BatchGuard {
        fn drop(&mut self) {
            SCHEDULER.with(|s| s.borrow_mut().batch_depth -= 1);
        }
    }

    let result = {
        let _guard = BatchGuard;
        f()
    };

    flush_if_idle()?;
    Ok(result)
}

/// Drain all pending notifications now.
///
/// Runs every queued consumer at most once per pass, repeating until the
/// queue stays empty. Returns the first effect failure encountered, after
/// the remaining consumers of the drain have run.
pub fn flush() -> Result<(), EffectError> {
    let already_flushing = SCHEDULER.with(|s| {
        let mut state = s.borrow_mut();
        if state.flushing {
            true
        } else {
            state.flushing = true;
            false
        }
    });
    if already_flushing {
        return Ok(());
    }

    struct FlushGuard;

    impl Drop for FlushGuard {
        fn drop(&mut self) {
            SCHEDULER.with(|s| s.borrow_mut().flushing = false);
        }
    }

    let _guard = FlushGuard;
    let mut first_error: Option<EffectError> = None;
    let mut passes = 0u32;

    loop {
        let snapshot: Vec<ConsumerId> =
            SCHEDULER.with(|s| s.borrow_mut().queue.drain(..).collect());
        if snapshot.is_empty() {
            break;
        }

        passes += 1;
        if passes > MAX_FLUSH_PASSES {
            panic!(
                "maximum update depth exceeded: a consumer keeps re-triggering \
                 itself; check for effects that write to fields they depend on"
            );
        }

        for id in snapshot {
            // Consumers unsubscribed earlier in the pass simply drop out.
            let Some(consumer) = Registry::get(id) else {
                continue;
            };
            if !consumer.is_live() {
                continue;
            }

            tracing::trace!(consumer = ?id, kind = consumer.label(), "running consumer");
            if let Err(err) = consumer.run() {
                tracing::debug!(consumer = ?id, error = %err, "consumer failed");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
