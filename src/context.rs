use std::fmt;
use std::time::Duration;

use bevy::utils::Instant;

use crate::observer::{Stepped, SteppedSignal};

type Cursor<Y> = Box<dyn Iterator<Item = Y> + Send>;
type Factory<Y> = Box<dyn FnMut() -> Cursor<Y> + Send>;

const ERR_COLD: &str = "A coroutine context was stepped before being reset.
Call `reset` once before the first step, or hand the context
to a `CoroutineController` which does it when adopting it.";

/// The outcome of [`CoroutineContext::advance`].
#[derive(Debug, PartialEq, Eq)]
pub enum Step<'a, Y> {
    /// The body produced a value and can be stepped again.
    Yielded(&'a Y),
    /// The body is exhausted. This is returned once, by the step discovering it.
    Finished,
    /// Nothing happened, the context is either disabled or already finished.
    Idle,
}

/// Drives one coroutine body, a lazy sequence of values, one element per step.
///
/// A context is created cold: [`reset`](Self::reset) materializes the cursor and must be called
/// before the first step. Stepping a cold context panics.
pub struct CoroutineContext<Y> {
    factory: Factory<Y>,
    cursor: Option<Cursor<Y>>,
    current: Option<Y>,
    enabled: bool,
    finished: bool,
    steps: u64,
    stepped: SteppedSignal<Y>,
}

impl<Y: 'static> CoroutineContext<Y> {
    /// Create a context over a re-iterable sequence. Each [`reset`](Self::reset) iterates a fresh
    /// clone of it.
    pub fn new<I>(sequence: I) -> Self
    where
        I: IntoIterator<Item = Y> + Clone + Send + 'static,
        I::IntoIter: Send + 'static,
    {
        Self::from_factory(move || sequence.clone())
    }

    /// Create a context whose cursor is produced by `factory`, called once per
    /// [`reset`](Self::reset).
    pub fn from_factory<F, I>(mut factory: F) -> Self
    where
        F: FnMut() -> I + Send + 'static,
        I: IntoIterator<Item = Y>,
        I::IntoIter: Send + 'static,
    {
        Self {
            factory: Box::new(move || Box::new(factory().into_iter()) as Cursor<Y>),
            cursor: None,
            current: None,
            enabled: true,
            finished: false,
            steps: 0,
            stepped: SteppedSignal::new(),
        }
    }
}

impl<Y> CoroutineContext<Y> {
    /// (Re)create the cursor from the original sequence and mark the context as not finished.
    /// Does not change [`is_enabled`](Self::is_enabled).
    pub fn reset(&mut self) {
        self.cursor = Some((self.factory)());
        self.current = None;
        self.finished = false;
        self.steps = 0;
    }

    /// Advance the body by one element.
    ///
    /// # Panics
    /// If the context was never [`reset`](Self::reset), or if the body itself panics.
    pub fn advance(&mut self) -> Step<'_, Y> {
        if self.finished {
            return Step::Idle;
        }
        let Some(cursor) = self.cursor.as_mut() else {
            panic!("{ERR_COLD}");
        };
        if !self.enabled {
            return Step::Idle;
        }

        self.steps += 1;
        match cursor.next() {
            Some(value) => {
                let value: &Y = self.current.insert(value);
                self.stepped.emit(&Stepped {
                    value: Some(value),
                    finished: false,
                });
                Step::Yielded(value)
            }
            None => {
                self.finished = true;
                self.cursor = None;
                self.stepped.emit(&Stepped {
                    value: self.current.as_ref(),
                    finished: true,
                });
                Step::Finished
            }
        }
    }

    /// Advance the body by one element. Returns true only if this step finished the coroutine,
    /// a gated step returns false.
    pub fn step(&mut self) -> bool {
        matches!(self.advance(), Step::Finished)
    }

    /// Same as [`step`](Self::step), also returning the value produced by this step, if any.
    pub fn step_out(&mut self) -> (bool, Option<&Y>) {
        match self.advance() {
            Step::Yielded(value) => (false, Some(value)),
            Step::Finished => (true, None),
            Step::Idle => (false, None),
        }
    }

    /// Step in a loop on the calling thread until the coroutine finishes or `timeout` elapses.
    /// Returns whether the coroutine is finished. There is no way to interrupt it early.
    pub fn step_until(&mut self, timeout: Duration) -> bool {
        let started = Instant::now();
        while !self.finished {
            if started.elapsed() > timeout {
                return false;
            }
            self.step();
        }
        true
    }

    /// Drop the cursor and mark the context as finished, without notifying observers.
    /// A later [`reset`](Self::reset) starts the body over.
    pub fn abort(&mut self) {
        self.cursor = None;
        self.finished = true;
    }

    /// The last value yielded since the last reset.
    pub fn current(&self) -> Option<&Y> {
        self.current.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// False until the first [`reset`](Self::reset).
    pub fn is_started(&self) -> bool {
        self.cursor.is_some() || self.finished
    }

    /// Number of steps which advanced the body since the last reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Notified after every step that advanced the body, the finishing one included.
    pub fn stepped(&self) -> &SteppedSignal<Y> {
        &self.stepped
    }
}

impl<Y: fmt::Debug> fmt::Debug for CoroutineContext<Y> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoroutineContext")
            .field("current", &self.current)
            .field("enabled", &self.enabled)
            .field("finished", &self.finished)
            .field("started", &self.is_started())
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}
