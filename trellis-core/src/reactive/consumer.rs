//! Consumers of observable state.
//!
//! A consumer is any tracked reader of store fields. Two kinds exist: render
//! consumers (an opaque rendering unit that is re-invoked on notification)
//! and effect consumers (one declared effect method bound to one store
//! instance, managed by the effect scheduler). Both are identified by a
//! [`ConsumerId`] and looked up through the subscription registry when a
//! notification batch runs.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::EffectError;

use super::registry::Registry;

/// Unique identifier for a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(u64);

impl ConsumerId {
    /// Generate a new unique consumer ID.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A runnable subscriber to observable fields.
///
/// `run` re-evaluates the consumer: a render consumer re-invokes its render
/// closure under tracking, an effect consumer goes through its cleanup/re-run
/// protocol. The scheduler skips consumers that report themselves dead.
pub(crate) trait Consumer {
    fn id(&self) -> ConsumerId;

    /// Short label for logs.
    fn label(&self) -> &'static str;

    fn is_live(&self) -> bool;

    fn run(self: Rc<Self>) -> Result<(), EffectError>;
}

struct RenderUnit {
    id: ConsumerId,
    render: RefCell<Box<dyn FnMut()>>,
    live: Cell<bool>,
}

impl Consumer for RenderUnit {
    fn id(&self) -> ConsumerId {
        self.id
    }

    fn label(&self) -> &'static str {
        "render"
    }

    fn is_live(&self) -> bool {
        self.live.get()
    }

    fn run(self: Rc<Self>) -> Result<(), EffectError> {
        if !self.live.get() {
            return Ok(());
        }
        let unit = self.clone();
        Registry::track(self as Rc<dyn Consumer>, move || {
            let mut render = unit.render.borrow_mut();
            (*render)()
        })
    }
}

/// Handle for a rendering unit at the host boundary.
///
/// The host hands over its re-render closure; every [`Renderer::render`] call
/// runs it under tracking, so store fields read inside (including through
/// `Scope::resolve`) subscribe the unit. When a subscribed field changes, the
/// closure is re-invoked in the next notification batch.
///
/// Dropping the handle unsubscribes the unit. Rendering is non-reentrant: a
/// unit must not re-render itself from inside its own render closure.
pub struct Renderer {
    inner: Rc<RenderUnit>,
}

impl Renderer {
    pub fn new(render: impl FnMut() + 'static) -> Self {
        let inner = Rc::new(RenderUnit {
            id: ConsumerId::next(),
            render: RefCell::new(Box::new(render)),
            live: Cell::new(true),
        });
        Registry::register(inner.clone());
        Self { inner }
    }

    pub fn id(&self) -> ConsumerId {
        self.inner.id
    }

    /// Invoke the render closure under tracking, replacing the unit's read
    /// set with exactly the fields read during this pass.
    pub fn render(&self) -> Result<(), EffectError> {
        self.inner.clone().run()
    }

    /// Unsubscribe from every field. Further notifications skip this unit.
    pub fn dispose(&self) {
        if self.inner.live.replace(false) {
            Registry::unsubscribe(self.inner.id);
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("id", &self.inner.id)
            .field("live", &self.inner.live.get())
            .finish()
    }
}
