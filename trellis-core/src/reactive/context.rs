//! Tracking context.
//!
//! The context records which consumer is currently evaluating. While a
//! consumer is on top of the stack, every observable field read is appended
//! to that consumer's pending read set; the registry installs the collected
//! set when the evaluation finishes.
//!
//! # Implementation
//!
//! A thread-local stack of frames. Tracking a consumer pushes a frame; the
//! frame is popped when the returned guard drops, so the stack stays
//! consistent even if the evaluated closure panics. Nested evaluations (a
//! consumer evaluated while another is active) push and pop in LIFO order,
//! so the outer frame resumes collecting once the inner one finishes.
//!
//! Reads that happen with no frame on the stack are plain reads: nothing is
//! recorded and no error is raised.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::consumer::ConsumerId;
use super::observable::FieldId;

/// Fields read during one tracking frame. Most consumers touch a handful.
pub(crate) type ReadSet = SmallVec<[FieldId; 8]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

enum Frame {
    /// A consumer is evaluating; reads are collected.
    Tracking {
        consumer: ConsumerId,
        reads: ReadSet,
    },
    /// Reads are deliberately ignored until this frame pops.
    Untracked,
}

/// Guard that pops its frame when dropped.
pub(crate) struct FrameGuard {
    depth: usize,
    finished: bool,
}

impl FrameGuard {
    /// Pop the frame and return the reads it collected.
    pub(crate) fn finish(mut self) -> ReadSet {
        self.finished = true;
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(stack.len(), self.depth, "tracking frame popped out of order");
            match stack.pop() {
                Some(Frame::Tracking { reads, .. }) => reads,
                _ => ReadSet::new(),
            }
        })
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if !self.finished {
            CONTEXT_STACK.with(|stack| {
                stack.borrow_mut().pop();
            });
        }
    }
}

/// Push a tracking frame for `consumer`.
pub(crate) fn push_tracking(consumer: ConsumerId) -> FrameGuard {
    CONTEXT_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(Frame::Tracking {
            consumer,
            reads: ReadSet::new(),
        });
        FrameGuard {
            depth: stack.len(),
            finished: false,
        }
    })
}

/// Push a frame that masks tracking until it pops.
pub(crate) fn push_untracked() -> FrameGuard {
    CONTEXT_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(Frame::Untracked);
        FrameGuard {
            depth: stack.len(),
            finished: false,
        }
    })
}

/// Record a field read against the innermost tracking frame, if any.
pub(crate) fn record_read(field: FieldId) {
    CONTEXT_STACK.with(|stack| {
        if let Some(Frame::Tracking { reads, .. }) = stack.borrow_mut().last_mut() {
            reads.push(field);
        }
    });
}

/// The consumer on top of the stack, if the innermost frame is tracking.
pub(crate) fn active_consumer() -> Option<ConsumerId> {
    CONTEXT_STACK.with(|stack| match stack.borrow().last() {
        Some(Frame::Tracking { consumer, .. }) => Some(*consumer),
        _ => None,
    })
}

/// Whether any tracking frame is on the stack.
///
/// Writes that happen while this is true are deferred to the end of the
/// outermost evaluation instead of flushing inline.
pub(crate) fn in_tracking_pass() -> bool {
    CONTEXT_STACK.with(|stack| {
        stack
            .borrow()
            .iter()
            .any(|frame| matches!(frame, Frame::Tracking { .. }))
    })
}

/// Run `f` with read tracking suppressed.
///
/// Useful inside an effect body to read a field without depending on it.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let guard = push_untracked();
    let result = f();
    let _ = guard.finish();
    result
}
