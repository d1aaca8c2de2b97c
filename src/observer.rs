use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// The event broadcast after a [`CoroutineContext`](crate::context::CoroutineContext) made a
/// step.
#[derive(Debug)]
pub struct Stepped<'a, Y> {
    /// The most recently yielded value. On the step discovering exhaustion, it is the value of
    /// the previous step.
    pub value: Option<&'a Y>,
    /// True if this step finished the coroutine.
    pub finished: bool,
}

/// Identifies a registered observer, see [`SteppedSignal::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer<Y> = Arc<dyn Fn(&Stepped<'_, Y>) + Send + Sync>;

struct Registry<Y> {
    next_id: u64,
    observers: Vec<(ObserverId, Observer<Y>)>,
}

/// A list of callbacks notified after each step. Cloning it gives another handle to the same
/// list.
///
/// Observers are invoked outside of the registry lock, so they can subscribe or unsubscribe
/// (themselves included) while being notified. Such changes take effect from the next
/// emission.
pub struct SteppedSignal<Y> {
    registry: Arc<Mutex<Registry<Y>>>,
}

impl<Y> SteppedSignal<Y> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                observers: Vec::new(),
            })),
        }
    }

    /// Register `observer`, returning the id needed to remove it.
    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&Stepped<'_, Y>) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        let id = ObserverId(registry.next_id);
        registry.next_id += 1;
        registry.observers.push((id, Arc::new(observer)));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.observers.len();
        registry.observers.retain(|(other, _)| *other != id);
        registry.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.registry.lock().observers.len()
    }

    pub(crate) fn emit(&self, event: &Stepped<'_, Y>) {
        let observers: Vec<Observer<Y>> = {
            let registry = self.registry.lock();
            if registry.observers.is_empty() {
                return;
            }
            registry.observers.iter().map(|(_, o)| Arc::clone(o)).collect()
        };

        for observer in observers {
            observer(event);
        }
    }
}

impl<Y> Default for SteppedSignal<Y> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Y> Clone for SteppedSignal<Y> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<Y> fmt::Debug for SteppedSignal<Y> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SteppedSignal")
            .field("observers", &self.observer_count())
            .finish()
    }
}
