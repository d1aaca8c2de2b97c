use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bevy::utils::Instant;

/// A predicate a coroutine body can consult (or yield) to know whether it may make progress.
///
/// Once [`can_execute`](ExecutionBlockRequest::can_execute) returned `true`, it keeps returning
/// `true`: a request never re-arms itself.
pub trait ExecutionBlockRequest: Send + Sync {
    /// Returns true if the blocked work may resume now.
    fn can_execute(&self) -> bool;
}

impl<R: ExecutionBlockRequest + ?Sized> ExecutionBlockRequest for Box<R> {
    fn can_execute(&self) -> bool {
        (**self).can_execute()
    }
}

impl<R: ExecutionBlockRequest + ?Sized> ExecutionBlockRequest for Arc<R> {
    fn can_execute(&self) -> bool {
        (**self).can_execute()
    }
}

impl<R: ExecutionBlockRequest + ?Sized> ExecutionBlockRequest for &R {
    fn can_execute(&self) -> bool {
        (**self).can_execute()
    }
}

/// Blocks until a certain amount of wall-clock time has passed since its creation.
///
/// A zero duration unblocks immediately, otherwise the elapsed time must be strictly greater
/// than the blocking time.
#[derive(Debug, Clone, Copy)]
pub struct TimeBlockRequest {
    started_at: Instant,
    blocking_time: Duration,
}

impl TimeBlockRequest {
    pub fn new(blocking_time: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            blocking_time,
        }
    }

    pub fn blocking_time(&self) -> Duration {
        self.blocking_time
    }

    /// Time elapsed since this request was created.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl ExecutionBlockRequest for TimeBlockRequest {
    fn can_execute(&self) -> bool {
        self.blocking_time.is_zero() || self.elapsed() > self.blocking_time
    }
}

/// Blocks for a given number of queries. Every call to
/// [`can_execute`](ExecutionBlockRequest::can_execute) counts as one try, and the request
/// unblocks once the number of tries exceeds `required_tries`.
#[derive(Debug)]
pub struct UpdateCountBlockRequest {
    required_tries: u32,
    tries: AtomicU64,
}

impl UpdateCountBlockRequest {
    pub fn new(required_tries: u32) -> Self {
        Self {
            required_tries,
            tries: AtomicU64::new(0),
        }
    }

    pub fn required_tries(&self) -> u32 {
        self.required_tries
    }

    /// Number of times this request has been queried so far.
    pub fn tries(&self) -> u64 {
        self.tries.load(Ordering::Acquire)
    }
}

impl ExecutionBlockRequest for UpdateCountBlockRequest {
    fn can_execute(&self) -> bool {
        // The incremented value must come from the same atomic operation, a separate load
        // could observe another caller's increment.
        let tries = self.tries.fetch_add(1, Ordering::AcqRel) + 1;
        tries > u64::from(self.required_tries)
    }
}

/// Returns an iterator yielding `()` for every step during which `request` is still blocked,
/// and ending as soon as it unblocks. Chain it between two phases of an iterator body to
/// suspend the body cooperatively.
pub fn wait_on<R: ExecutionBlockRequest>(request: R) -> WaitOn<R> {
    WaitOn {
        request,
        done: false,
    }
}

/// See [`wait_on`].
#[must_use = "iterators are lazy and do nothing unless consumed"]
#[derive(Debug, Clone)]
pub struct WaitOn<R> {
    request: R,
    done: bool,
}

impl<R> WaitOn<R> {
    pub fn request(&self) -> &R {
        &self.request
    }
}

impl<R: ExecutionBlockRequest> Iterator for WaitOn<R> {
    type Item = ();

    fn next(&mut self) -> Option<()> {
        if self.done || self.request.can_execute() {
            self.done = true;
            None
        } else {
            Some(())
        }
    }
}
