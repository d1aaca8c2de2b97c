use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bevy::log::{debug, error, trace};
use bevy::prelude::Resource;
use bevy::utils::Instant;
use oneshot::TryRecvError;
use parking_lot::Mutex;

use crate::context::CoroutineContext;
use crate::error::{CoroutineError, Result};

/// What [`CoroutineController::update`] does when a coroutine body panics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Log the panic, abort the faulty coroutine and keep stepping the others. The aborted
    /// coroutine is removed at the end of the pass and its handle reports
    /// [`CoroutineError::Panicked`].
    #[default]
    Isolate,
    /// Abort the faulty coroutine and resume unwinding, skipping the rest of the pass. The
    /// aborted coroutine is removed before the panic leaves the controller and its handle
    /// reports [`CoroutineError::Panicked`]. Coroutines not stepped yet are stepped again on
    /// the next update.
    Propagate,
}

struct Slot<Y> {
    context: CoroutineContext<Y>,
    fault: Option<CoroutineError>,
    on_done: Option<oneshot::Sender<Result<()>>>,
}

/// A coroutine owned by the controller. `finished` mirrors the context so that reaping never
/// has to lock a slot while the list is locked.
struct Entry<Y> {
    slot: Mutex<Slot<Y>>,
    finished: AtomicBool,
}

/// Steps every coroutine once per [`update`](Self::update), and drops those which are
/// finished.
///
/// Cloning a controller gives another handle to the same set of coroutines, which is how a
/// coroutine body can add new coroutines while being stepped.
#[derive(Resource)]
pub struct CoroutineController<Y: Send + 'static = ()> {
    entries: Arc<Mutex<Vec<Arc<Entry<Y>>>>>,
    policy: FaultPolicy,
}

impl<Y: Send + 'static> CoroutineController<Y> {
    pub fn new() -> Self {
        Self::with_policy(FaultPolicy::default())
    }

    pub fn with_policy(policy: FaultPolicy) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            policy,
        }
    }

    pub fn fault_policy(&self) -> FaultPolicy {
        self.policy
    }

    /// Add a coroutine iterating over `sequence`. It is stepped for the first time on the next
    /// update.
    pub fn add<I>(&self, sequence: I)
    where
        I: IntoIterator<Item = Y> + Clone + Send + 'static,
        I::IntoIter: Send + 'static,
    {
        self.push(CoroutineContext::new(sequence), None);
    }

    /// Add a coroutine whose body is produced by `factory`.
    pub fn add_with<F, I>(&self, factory: F)
    where
        F: FnMut() -> I + Send + 'static,
        I: IntoIterator<Item = Y>,
        I::IntoIter: Send + 'static,
    {
        self.push(CoroutineContext::from_factory(factory), None);
    }

    /// Adopt an existing context. It is reset first, its enabled flag and observers are kept.
    pub fn add_context(&self, context: CoroutineContext<Y>) {
        self.push(context, None);
    }

    /// Same as [`add`](Self::add), returning a handle to follow the coroutine.
    pub fn spawn<I>(&self, sequence: I) -> CoroHandle
    where
        I: IntoIterator<Item = Y> + Clone + Send + 'static,
        I::IntoIter: Send + 'static,
    {
        self.spawn_context(CoroutineContext::new(sequence))
    }

    /// Same as [`add_with`](Self::add_with), returning a handle to follow the coroutine.
    pub fn spawn_with<F, I>(&self, factory: F) -> CoroHandle
    where
        F: FnMut() -> I + Send + 'static,
        I: IntoIterator<Item = Y>,
        I::IntoIter: Send + 'static,
    {
        self.spawn_context(CoroutineContext::from_factory(factory))
    }

    /// Same as [`add_context`](Self::add_context), returning a handle to follow the coroutine.
    pub fn spawn_context(&self, context: CoroutineContext<Y>) -> CoroHandle {
        let (sender, receiver) = oneshot::channel();
        self.push(context, Some(sender));
        CoroHandle {
            receiver,
            result: None,
        }
    }

    fn push(
        &self,
        mut context: CoroutineContext<Y>,
        on_done: Option<oneshot::Sender<Result<()>>>,
    ) {
        context.reset();
        let entry = Arc::new(Entry {
            slot: Mutex::new(Slot {
                context,
                fault: None,
                on_done,
            }),
            finished: AtomicBool::new(false),
        });

        let mut entries = self.entries.lock();
        entries.push(entry);
        trace!("Coroutine added, {} in the controller", entries.len());
    }

    /// Step every coroutine once, in insertion order, then remove the finished ones.
    ///
    /// Coroutines added while this runs, by a body or another thread, are first stepped on the
    /// next update.
    pub fn update(&self) {
        let snapshot: Vec<Arc<Entry<Y>>> = self.entries.lock().clone();

        for entry in &snapshot {
            let mut slot = entry.slot.lock();
            let stepped = panic::catch_unwind(AssertUnwindSafe(|| slot.context.step()));

            if let Err(payload) = stepped {
                let fault = CoroutineError::from_panic(payload.as_ref());
                error!("{fault}, the coroutine is aborted");
                slot.context.abort();
                slot.fault = Some(fault);
                entry.finished.store(true, Ordering::Release);

                if self.policy == FaultPolicy::Propagate {
                    drop(slot);
                    self.reap();
                    panic::resume_unwind(payload);
                }
                continue;
            }

            entry
                .finished
                .store(slot.context.is_finished(), Ordering::Release);
        }

        self.reap();
    }

    /// Call [`update`](Self::update) until there is no coroutine left or `timeout` elapses.
    /// Returns whether the controller is empty.
    pub fn update_until_empty(&self, timeout: Duration) -> bool {
        let started = Instant::now();
        while !self.is_empty() {
            if started.elapsed() > timeout {
                debug!(
                    "{} coroutines still running after {:?}",
                    self.len(),
                    timeout
                );
                return false;
            }
            self.update();
        }
        true
    }

    fn reap(&self) {
        let mut finished = Vec::new();
        self.entries.lock().retain(|entry| {
            if entry.finished.load(Ordering::Acquire) {
                finished.push(Arc::clone(entry));
                false
            } else {
                true
            }
        });

        for entry in finished {
            let mut slot = entry.slot.lock();
            if let Some(sender) = slot.on_done.take() {
                let result = match slot.fault.take() {
                    Some(fault) => Err(fault),
                    None => Ok(()),
                };
                if sender.send(result).is_err() {
                    trace!("Coroutine finished after its handle was dropped");
                }
            }
        }
    }

    /// Number of coroutines in the controller.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<Y: Send + 'static> Default for CoroutineController<Y> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Y: Send + 'static> Clone for CoroutineController<Y> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            policy: self.policy,
        }
    }
}

impl<Y: Send + 'static> fmt::Debug for CoroutineController<Y> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoroutineController")
            .field("len", &self.len())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Reports how a coroutine added with one of the `spawn` methods ended.
pub struct CoroHandle {
    receiver: oneshot::Receiver<Result<()>>,
    result: Option<Result<()>>,
}

impl CoroHandle {
    /// Returns `None` while the coroutine is running. Once it has been removed from its
    /// controller, returns `Ok(())` if it finished normally, or the reason it did not.
    pub fn try_result(&mut self) -> Option<&Result<()>> {
        if self.result.is_none() {
            match self.receiver.try_recv() {
                Ok(result) => self.result = Some(result),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.result = Some(Err(CoroutineError::Dropped));
                }
            }
        }
        self.result.as_ref()
    }

    pub fn is_finished(&mut self) -> bool {
        self.try_result().is_some()
    }
}
