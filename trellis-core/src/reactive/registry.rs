//! Subscription registry.
//!
//! The registry is the central coordinator between observable fields and
//! their consumers. It keeps two maps: field → subscribed consumers, and
//! consumer → last-read field set. The maps are kept mirror-consistent:
//! a consumer is subscribed to exactly the fields in its last-read set.
//!
//! # How It Works
//!
//! 1. [`Registry::track`] runs a closure with a consumer as the active
//!    tracking context, then replaces that consumer's read set with exactly
//!    the fields read during the closure. Replacement, not merge — stale
//!    reads from an earlier pass must not cause phantom notifications.
//!
//! 2. [`Registry::notify`] looks up the consumers subscribed to a changed
//!    field and enqueues each with the scheduler. Consumers are held as weak
//!    references; dropped ones are skipped at drain time.
//!
//! 3. [`Registry::unsubscribe`] removes a consumer from every field's
//!    subscriber set, called on teardown.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexSet;

use crate::error::EffectError;

use super::consumer::{Consumer, ConsumerId};
use super::context::{self, ReadSet};
use super::observable::FieldId;
use super::scheduler;

thread_local! {
    static REGISTRY: RefCell<RegistryState> = RefCell::new(RegistryState::default());
}

#[derive(Default)]
struct RegistryState {
    consumers: HashMap<ConsumerId, Weak<dyn Consumer>>,
    field_subscribers: HashMap<FieldId, IndexSet<ConsumerId>>,
    consumer_reads: HashMap<ConsumerId, IndexSet<FieldId>>,
}

/// The subscription registry. All state lives in thread-local storage; the
/// type itself only namespaces the operations.
pub(crate) struct Registry;

impl Registry {
    /// Make a consumer reachable for notification lookups.
    pub(crate) fn register(consumer: Rc<dyn Consumer>) {
        REGISTRY.with(|r| {
            r.borrow_mut()
                .consumers
                .insert(consumer.id(), Rc::downgrade(&consumer));
        });
    }

    /// Look up a registered consumer, if it is still alive.
    pub(crate) fn get(id: ConsumerId) -> Option<Rc<dyn Consumer>> {
        REGISTRY.with(|r| r.borrow().consumers.get(&id).and_then(Weak::upgrade))
    }

    /// Run `f` with `consumer` as the active tracking context and replace the
    /// consumer's read set with exactly the fields read during `f`.
    ///
    /// If this is the outermost evaluation and no batch or notification pass
    /// is active, pending notifications are drained before returning.
    pub(crate) fn track<R>(
        consumer: Rc<dyn Consumer>,
        f: impl FnOnce() -> R,
    ) -> Result<R, EffectError> {
        let id = consumer.id();
        Self::register(consumer);

        let guard = context::push_tracking(id);
        let result = f();
        let reads = guard.finish();

        Self::replace_reads(id, reads);
        scheduler::flush_if_idle()?;
        Ok(result)
    }

    fn replace_reads(id: ConsumerId, reads: ReadSet) {
        REGISTRY.with(|r| {
            let mut state = r.borrow_mut();

            if let Some(old) = state.consumer_reads.remove(&id) {
                for field in &old {
                    if let Some(subscribers) = state.field_subscribers.get_mut(field) {
                        subscribers.shift_remove(&id);
                    }
                }
            }

            let mut set = IndexSet::with_capacity(reads.len());
            for field in reads {
                if set.insert(field) {
                    state.field_subscribers.entry(field).or_default().insert(id);
                }
            }
            state.consumer_reads.insert(id, set);
        });
    }

    /// Enqueue every consumer whose last-read set contains `field`, then
    /// drain the queue unless a batch, tracking pass, or running pass defers
    /// it.
    pub(crate) fn notify(field: FieldId) -> Result<(), EffectError> {
        let targets: Vec<ConsumerId> = REGISTRY.with(|r| {
            r.borrow()
                .field_subscribers
                .get(&field)
                .map(|subscribers| subscribers.iter().copied().collect())
                .unwrap_or_default()
        });

        if targets.is_empty() {
            return Ok(());
        }

        tracing::trace!(field = ?field, consumers = targets.len(), "notifying subscribers");
        for id in targets {
            scheduler::enqueue(id);
        }
        scheduler::flush_if_idle()
    }

    /// Remove a consumer from every field's subscriber set.
    pub(crate) fn unsubscribe(id: ConsumerId) {
        REGISTRY.with(|r| {
            let mut state = r.borrow_mut();
            state.consumers.remove(&id);
            if let Some(old) = state.consumer_reads.remove(&id) {
                for field in &old {
                    if let Some(subscribers) = state.field_subscribers.get_mut(field) {
                        subscribers.shift_remove(&id);
                    }
                }
            }
        });
    }

    /// The fields currently recorded as the consumer's last-read set.
    #[cfg(test)]
    pub(crate) fn reads_of(id: ConsumerId) -> Vec<FieldId> {
        REGISTRY.with(|r| {
            r.borrow()
                .consumer_reads
                .get(&id)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::reactive::observable::Observable;

    struct ProbeConsumer {
        id: ConsumerId,
        runs: Cell<u32>,
        live: Cell<bool>,
    }

    impl ProbeConsumer {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                id: ConsumerId::next(),
                runs: Cell::new(0),
                live: Cell::new(true),
            })
        }
    }

    impl Consumer for ProbeConsumer {
        fn id(&self) -> ConsumerId {
            self.id
        }

        fn label(&self) -> &'static str {
            "probe"
        }

        fn is_live(&self) -> bool {
            self.live.get()
        }

        fn run(self: Rc<Self>) -> Result<(), EffectError> {
            self.runs.set(self.runs.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn track_installs_read_set() {
        let probe = ProbeConsumer::new();
        let field = Observable::new(0);

        Registry::track(probe.clone(), || {
            let _ = field.get();
        })
        .unwrap();

        assert_eq!(Registry::reads_of(probe.id), vec![field.id()]);
    }

    #[test]
    fn track_replaces_rather_than_merges() {
        let probe = ProbeConsumer::new();
        let first = Observable::new(0);
        let second = Observable::new(0);

        Registry::track(probe.clone(), || {
            let _ = first.get();
        })
        .unwrap();
        Registry::track(probe.clone(), || {
            let _ = second.get();
        })
        .unwrap();

        assert_eq!(Registry::reads_of(probe.id), vec![second.id()]);

        // The stale field no longer notifies the consumer.
        first.set(1).unwrap();
        assert_eq!(probe.runs.get(), 0);

        second.set(1).unwrap();
        assert_eq!(probe.runs.get(), 1);
    }

    #[test]
    fn duplicate_reads_collapse() {
        let probe = ProbeConsumer::new();
        let field = Observable::new(0);

        Registry::track(probe.clone(), || {
            let _ = field.get();
            let _ = field.get();
            let _ = field.get();
        })
        .unwrap();

        assert_eq!(Registry::reads_of(probe.id), vec![field.id()]);
    }

    #[test]
    fn notify_runs_only_matching_consumers() {
        let reader = ProbeConsumer::new();
        let bystander = ProbeConsumer::new();
        let field = Observable::new(0);
        let other = Observable::new(0);

        Registry::track(reader.clone(), || {
            let _ = field.get();
        })
        .unwrap();
        Registry::track(bystander.clone(), || {
            let _ = other.get();
        })
        .unwrap();

        field.set(7).unwrap();

        assert_eq!(reader.runs.get(), 1);
        assert_eq!(bystander.runs.get(), 0);
    }

    #[test]
    fn equal_write_does_not_notify() {
        let probe = ProbeConsumer::new();
        let field = Observable::new(5);

        Registry::track(probe.clone(), || {
            let _ = field.get();
        })
        .unwrap();

        field.set(5).unwrap();
        assert_eq!(probe.runs.get(), 0);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let probe = ProbeConsumer::new();
        let field = Observable::new(0);

        Registry::track(probe.clone(), || {
            let _ = field.get();
        })
        .unwrap();

        Registry::unsubscribe(probe.id);
        field.set(1).unwrap();

        assert_eq!(probe.runs.get(), 0);
        assert!(Registry::reads_of(probe.id).is_empty());
    }
}
